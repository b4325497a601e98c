//! Reflector status DTOs
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::reflector::{ReflectorStats, SyncState};

#[derive(Debug, Serialize)]
pub struct ReflectorStatusDto {
    pub resource_type: String,
    pub sync: SyncState,
    pub synced: bool,
    pub stats: ReflectorStats,
}

#[derive(Debug, Serialize)]
pub struct ReflectorListDto {
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub synced: usize,
    pub reflectors: Vec<ReflectorStatusDto>,
}
