use crate::ingest::Submission;
use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Serialize;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/notification", post(notify))
        .with_state(state)
}

#[derive(Serialize)]
struct NotifyResponse {
    sent: bool,
}

async fn notify(
    State(state): State<SharedState>,
    Json(submission): Json<Submission>,
) -> Result<Json<NotifyResponse>, StatusCode> {
    let notifier = state
        .notifier
        .as_ref()
        .ok_or(StatusCode::SERVICE_UNAVAILABLE)?;

    let sent = notifier
        .notify_low_scores(&submission, state.ingestor.definition())
        .await
        .map_err(|e| {
            tracing::error!("Failed to send notification: {}", e);
            StatusCode::BAD_GATEWAY
        })?;

    Ok(Json(NotifyResponse { sent }))
}
