//! Reload and refresh-status endpoints

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;
use talk_to_core::RefreshStatus;
use tracing::info;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reload", post(reload))
        .route("/reload-status", get(reload_status))
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,
}

impl StatusResponse {
    fn failure(error: &str) -> Self {
        StatusResponse {
            ok: false,
            message: None,
            error: Some(error.to_string()),
            exception_message: None,
        }
    }
}

/// POST /reload - Re-read the config and restart the calendar refresh
async fn reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    info!("will reload");
    state.talk_to().reload()?;
    Ok(Json(ReloadResponse { ok: true }))
}

/// GET /reload-status - Report on the current refresh chain
async fn reload_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let response = match state.talk_to().refresh_status() {
        None => StatusResponse::failure("Task not found"),
        Some(RefreshStatus::Running) => StatusResponse {
            ok: true,
            message: Some("Task is running".to_string()),
            error: None,
            exception_message: None,
        },
        Some(RefreshStatus::Failed(message)) => StatusResponse {
            exception_message: Some(message),
            ..StatusResponse::failure("Task had an exception")
        },
        Some(RefreshStatus::Cancelled) => StatusResponse::failure("Task was cancelled"),
    };
    Json(response)
}
