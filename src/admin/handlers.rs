use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::registry::BackendDescriptor;
use crate::reload::{ReloadReason, ReloadSummary};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub generation: u64,
    pub backends: usize,
    pub skipped: usize,
    pub active_connections: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let registry = state.registry.current();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        generation: registry.generation(),
        backends: registry.len(),
        skipped: registry.skipped(),
        active_connections: state.tracker.active_count(),
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendDescriptor>> {
    let registry = state.registry.current();
    Json(
        registry
            .descriptors()
            .into_iter()
            .map(|d| BackendDescriptor::clone(&d))
            .collect(),
    )
}

pub async fn post_reload(
    State(state): State<AdminState>,
) -> Result<Json<ReloadSummary>, (StatusCode, Json<ErrorBody>)> {
    state
        .reload
        .reload(ReloadReason::Admin)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(error = %e, "Admin reload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
        })
}
