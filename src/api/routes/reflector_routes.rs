//! Reflector routes (e.g., /api/v1/reflectors/*)

use axum::{routing::get, Router};

use crate::api::controller::reflector::ReflectorController;
use crate::app_state::AppState;

pub fn reflector_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(ReflectorController::list))
        .route("/{resource_type}", get(ReflectorController::get))
}
