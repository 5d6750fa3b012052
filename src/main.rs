mod config;
mod db;
mod domain;
mod error;
mod ingest;
mod middleware;
mod services;
mod state;
mod web;

use crate::config::AppConfig;
use crate::db::{PgSurveyStore, SurveyStore};
use crate::domain::definition::SurveyDefinition;
use crate::ingest::{backfill_mappings, DropdownOptionResolver, QuestionNameMapper, SurveyIngestor};
use crate::middleware::RateLimiter;
use crate::services::WebhookNotifier;
use crate::state::SharedState;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if config.run_migrations {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run database migrations: {}", e);
                e
            })?;
        tracing::info!("Database migrations completed");
    }

    let definition = Arc::new(SurveyDefinition::load(&config.survey_definition)?);
    if definition.is_empty() {
        tracing::warn!(
            "Survey definition {} declares no questions, every submitted field will be skipped",
            config.survey_definition.display()
        );
    } else {
        tracing::info!(
            "Loaded {} questions from {}",
            definition.len(),
            config.survey_definition.display()
        );
    }

    let store: Arc<dyn SurveyStore> = Arc::new(PgSurveyStore::new(pool));
    let mapper = Arc::new(QuestionNameMapper::new());
    let dropdowns = Arc::new(DropdownOptionResolver::new());

    if config.backfill_mappings {
        tracing::info!("Backfilling question name mappings...");
        backfill_mappings(store.as_ref(), &mapper, &definition, config.survey_id).await;
    }

    let ingestor = Arc::new(SurveyIngestor::new(
        definition,
        mapper,
        dropdowns,
        config.insert_chunk_size,
    )?);

    // A failure here is retried on the first submission.
    if let Err(e) = ingestor.warm_mappings(store.as_ref()).await {
        tracing::warn!("Could not preload question mappings: {}", e);
    }

    let shared: SharedState = Arc::new(state::AppState {
        store,
        ingestor,
        notifier: config.notification_webhook.clone().map(WebhookNotifier::new),
        submit_limiter: RateLimiter::per_minute(config.submit_rate_limit),
        trust_forwarded_for: config.trust_forwarded_for,
        survey_id: config.survey_id,
    });

    let scheduler = JobScheduler::new().await?;

    if let Some(cron) = config.mapping_refresh_cron.as_deref() {
        let shared_for_refresh = shared.clone();
        scheduler
            .add(Job::new_async(cron, move |_uuid, _l| {
                let state = shared_for_refresh.clone();
                Box::pin(async move {
                    state.ingestor.invalidate_caches().await;
                    if let Err(e) = state.ingestor.warm_mappings(state.store.as_ref()).await {
                        tracing::error!("Failed to reload question mappings: {}", e);
                    }
                })
            })?)
            .await?;
        tracing::info!("Mapping cache refresh scheduled: {}", cron);
    }

    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                state.submit_limiter.cleanup().await;
            })
        })?)
        .await?;

    scheduler.start().await?;

    let app = Router::new()
        .merge(web::routes(shared.clone()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
