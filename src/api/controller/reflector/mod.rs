//! Reflector controller: exposes sync state and counters of every reflector

use axum::extract::{Path, State};
use axum::Json;

use crate::api::dto::reflector_dto::{ReflectorListDto, ReflectorStatusDto};
use crate::api::dto::ApiResponse;
use crate::api::util::json::to_json;
use crate::app_state::AppState;
use crate::errors::AppError;

pub struct ReflectorController;

impl ReflectorController {
    pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<ReflectorListDto>>, AppError> {
        to_json(state.reflector_service.list_reflectors().await)
    }

    pub async fn get(
        State(state): State<AppState>,
        Path(resource_type): Path<String>,
    ) -> Result<Json<ApiResponse<ReflectorStatusDto>>, AppError> {
        match state.reflector_service.get_reflector(&resource_type).await {
            Some(status) => Ok(Json(ApiResponse::ok(status))),
            None => Err(AppError::NotFound(format!("no reflector for resource type '{resource_type}'"))),
        }
    }
}
