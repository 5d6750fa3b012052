use crate::db::SurveyStore;
use crate::ingest::SurveyIngestor;
use crate::middleware::RateLimiter;
use crate::services::WebhookNotifier;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SurveyStore>,
    pub ingestor: Arc<SurveyIngestor>,
    pub notifier: Option<WebhookNotifier>,
    pub submit_limiter: RateLimiter,
    pub trust_forwarded_for: bool,
    pub survey_id: i32, // survey every submission is filed under
}

pub type SharedState = Arc<AppState>;
