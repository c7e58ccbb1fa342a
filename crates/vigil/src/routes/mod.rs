//! HTTP route handlers for Vigil.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use vigil_common::VigilError;

use crate::state::AppState;

mod entity;
mod health;
mod moderation;
mod submission;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Inbound moderation webhook (called by the classification service)
        .route(
            "/mollom/moderate/{content_id}/{action}",
            get(moderation::moderate).post(moderation::moderate),
        )

        // CMS facing endpoints
        .route("/submissions/check", post(submission::check_submission))
        .route(
            "/entities/{entity_type}/{entity_id}",
            put(entity::save_entity).delete(entity::delete_entity),
        )
        .route(
            "/entities/{entity_type}/{entity_id}/feedback",
            post(entity::send_feedback),
        )

        .nest("/admin", admin_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Admin routes
fn admin_routes() -> Router<AppState> {
    Router::new().route("/keys/verify", post(verify_keys))
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps service errors onto status codes with a JSON message
pub struct ApiError(VigilError);

impl From<VigilError> for ApiError {
    fn from(e: VigilError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        }
        let message = match self.0 {
            // Already phrased for end users
            VigilError::ServiceUnavailable(message) => message,
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

// === Admin Handlers ===

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatus {
    ok: bool,
    public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

async fn verify_keys(State(state): State<AppState>) -> Json<KeyStatus> {
    let public_key = state.client.public_key();
    let status = match state.client.verify_keys().await {
        Ok(()) => KeyStatus {
            ok: true,
            public_key,
            code: None,
            message: None,
        },
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "API key verification failed");
            KeyStatus {
                ok: false,
                public_key,
                code: Some(e.code()),
                message: Some(e.to_string()),
            }
        }
    };
    Json(status)
}
