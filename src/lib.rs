pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};
use crate::core::time::SystemClock;
use crate::services::notifier::LogNotifier;
use crate::tasks::scheduler::{PgQuizStatusStore, QuizStatusScheduler};

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;
    api::errors::expose_internal_details(!settings.runtime().environment.is_production());

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    if let Err(err) = redis.connect().await {
        tracing::error!(error = %err, "Failed to connect to Redis; rate limiting disabled");
    } else {
        tracing::info!("Redis connected successfully");
    }

    let clock = Arc::new(SystemClock);
    let notifier = Arc::new(LogNotifier::new(settings.runtime().environment));
    let state = AppState::new(settings, db_pool.clone(), redis.clone(), clock.clone(), notifier);

    if let Err(err) = core::bootstrap::ensure_admin(&state).await {
        tracing::error!(error = %err, "Failed to ensure default admin");
    }

    let scheduler = status_scheduler(state.settings(), db_pool, clock);
    if state.settings().quiz().scheduler_enabled {
        scheduler.start();
    } else {
        tracing::info!("Quiz status scheduler disabled; run quizora-worker instead");
    }

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Quizora API listening"
    );

    let result =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    scheduler.stop().await;
    tracing::info!("Quiz status scheduler stopped");

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    result?;

    Ok(())
}

/// Standalone status refresher for deployments that keep the API scheduler off.
pub async fn run_worker() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    let scheduler = status_scheduler(&settings, db_pool, Arc::new(SystemClock));
    scheduler.start();
    tracing::info!(environment = %settings.runtime().environment.as_str(), "Quizora worker running");

    core::shutdown::shutdown_signal().await;

    scheduler.stop().await;
    tracing::info!("Quizora worker stopped");
    Ok(())
}

fn status_scheduler(
    settings: &Settings,
    db_pool: sqlx::PgPool,
    clock: Arc<SystemClock>,
) -> QuizStatusScheduler {
    QuizStatusScheduler::new(
        Arc::new(PgQuizStatusStore::new(db_pool)),
        clock,
        settings.quiz().status_interval(),
    )
}
