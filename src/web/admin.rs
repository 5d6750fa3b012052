use crate::state::SharedState;
use axum::{extract::State, http::StatusCode, routing::post, Router};

// Access control for /admin is enforced by the fronting proxy.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/cache/reload", post(reload_caches))
        .with_state(state)
}

async fn reload_caches(State(state): State<SharedState>) -> StatusCode {
    state.ingestor.invalidate_caches().await;
    tracing::info!("Question mapping and dropdown caches cleared on request");
    StatusCode::NO_CONTENT
}
