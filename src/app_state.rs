use std::sync::Arc;

use crate::core::reflector::ReflectorRegistry;
use crate::domain::reflector::service::reflector_status_service::ReflectorService;

#[derive(Clone)]
pub struct AppState {
    pub reflector_service: Arc<ReflectorService>,
}

pub fn build_app_state(registry: Arc<ReflectorRegistry>) -> AppState {
    AppState {
        reflector_service: Arc::new(ReflectorService::new(registry)),
    }
}
