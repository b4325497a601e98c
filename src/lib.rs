pub mod api;
pub mod app_state;
pub mod bootstrap;
pub mod core;
pub mod domain;
pub mod errors;
pub mod routes;
pub mod scheduler;
