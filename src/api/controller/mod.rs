pub mod reflector;
