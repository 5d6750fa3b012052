use crate::ingest::Submission;
use crate::middleware::rate_limit::client_key;
use crate::state::SharedState;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/survey", post(submit))
        .route("/survey/update", post(complete))
        .with_state(state)
}

#[derive(Deserialize)]
struct SubmitParams {
    survey_sent_id: Option<i32>,
}

#[derive(Serialize)]
struct SubmitResponse {
    response_id: i32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletePayload {
    survey_sent_id: i32,
    response_id: i32,
}

async fn submit(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<SharedState>,
    Query(params): Query<SubmitParams>,
    Json(submission): Json<Submission>,
) -> Result<(StatusCode, Json<SubmitResponse>), StatusCode> {
    let client = client_key(peer, &headers, state.trust_forwarded_for);
    if !state.submit_limiter.check(&client).await {
        tracing::warn!("Rate limit exceeded for survey submission from {}", client);
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let response_id = state
        .ingestor
        .process_survey_response(state.store.as_ref(), &submission, state.survey_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    // The response is already committed; linking and alerts must not fail the request.
    if let Some(survey_sent_id) = params.survey_sent_id {
        match state.store.complete_survey_sent(survey_sent_id, response_id).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("No sent survey {} to link to response {}", survey_sent_id, response_id),
            Err(e) => tracing::error!(
                "Failed to link sent survey {} to response {}: {}",
                survey_sent_id,
                response_id,
                e
            ),
        }
    }

    if let Some(notifier) = state.notifier.clone() {
        let ingestor = state.ingestor.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier
                .notify_low_scores(&submission, ingestor.definition())
                .await
            {
                tracing::error!("Failed to send low score notification for response {}: {}", response_id, e);
            }
        });
    }

    Ok((StatusCode::CREATED, Json(SubmitResponse { response_id })))
}

async fn complete(
    State(state): State<SharedState>,
    Json(payload): Json<CompletePayload>,
) -> StatusCode {
    match state
        .store
        .complete_survey_sent(payload.survey_sent_id, payload.response_id)
        .await
    {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::NOT_FOUND,
        Err(e) => {
            tracing::error!("Error updating sent survey {}: {}", payload.survey_sent_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
