//! Form submission checks.

use axum::{Json, extract::State};

use super::ApiError;
use crate::state::AppState;
use crate::submission::{Submission, SubmissionOutcome};

/// Run one submission attempt; 503 when the service is down and the
/// fallback policy blocks
pub async fn check_submission(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> Result<Json<SubmissionOutcome>, ApiError> {
    let entity_type = submission.entity_type.clone();
    let outcome = state.workflow.validate(submission).await?;
    tracing::debug!(
        entity_type = %entity_type,
        accepted = outcome.is_accepted(),
        errors = outcome.errors.len(),
        "Submission checked"
    );
    Ok(Json(outcome))
}
