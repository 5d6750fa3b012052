pub mod admin;
pub mod notification;
pub mod survey;

use crate::state::SharedState;
use axum::{routing::get, Router};

async fn health() -> &'static str {
    "OK"
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(survey::router(state.clone()))
        .merge(notification::router(state.clone()))
        .nest("/admin", admin::router(state))
}
