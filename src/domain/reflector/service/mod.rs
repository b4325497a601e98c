pub mod reflector_status_service;
