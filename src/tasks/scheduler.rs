use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use time::PrimitiveDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::core::metrics;
use crate::core::time::Clock;
use crate::db::types::QuizStatus;
use crate::repositories;
use crate::services::quiz_lifecycle;

/// The fields of a quiz the status pass needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct QuizWindow {
    pub(crate) id: String,
    pub(crate) status: QuizStatus,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
}

#[async_trait]
pub(crate) trait QuizStatusStore: Send + Sync {
    /// Every quiz that is not cancelled.
    async fn list_open_windows(&self) -> Result<Vec<QuizWindow>>;

    async fn update_status(
        &self,
        quiz_id: &str,
        status: QuizStatus,
        now: PrimitiveDateTime,
    ) -> Result<()>;
}

pub(crate) struct PgQuizStatusStore {
    pool: PgPool,
}

impl PgQuizStatusStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizStatusStore for PgQuizStatusStore {
    async fn list_open_windows(&self) -> Result<Vec<QuizWindow>> {
        Ok(repositories::quizzes::list_open_windows(&self.pool).await?)
    }

    async fn update_status(
        &self,
        quiz_id: &str,
        status: QuizStatus,
        now: PrimitiveDateTime,
    ) -> Result<()> {
        repositories::quizzes::set_status_unless_cancelled(&self.pool, quiz_id, status, now)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct PassReport {
    pub(crate) examined: usize,
    pub(crate) updated: usize,
    pub(crate) failed: usize,
}

/// Re-derive the status of every open quiz and persist the ones that drifted.
///
/// A failed row write is logged and counted; the pass moves on to the next quiz.
pub(crate) async fn run_pass(store: &dyn QuizStatusStore, clock: &dyn Clock) -> Result<PassReport> {
    let windows = store.list_open_windows().await?;
    let now = clock.now();
    let mut report = PassReport { examined: windows.len(), ..PassReport::default() };

    for window in windows {
        let next =
            quiz_lifecycle::refresh_status(window.status, now, window.start_time, window.end_time);
        if next == window.status {
            continue;
        }

        if let Err(err) = store.update_status(&window.id, next, now).await {
            report.failed += 1;
            tracing::warn!(quiz_id = %window.id, error = %err, "Quiz status update failed");
            continue;
        }
        report.updated += 1;
        tracing::info!(
            quiz_id = %window.id,
            from = window.status.as_str(),
            to = next.as_str(),
            "Quiz status updated"
        );
    }

    Ok(report)
}

struct RunningLoop {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic quiz status refresher; at most one loop runs per scheduler.
pub(crate) struct QuizStatusScheduler {
    store: Arc<dyn QuizStatusStore>,
    clock: Arc<dyn Clock>,
    period: Duration,
    running: Mutex<Option<RunningLoop>>,
}

impl QuizStatusScheduler {
    pub(crate) fn new(
        store: Arc<dyn QuizStatusStore>,
        clock: Arc<dyn Clock>,
        period: Duration,
    ) -> Self {
        Self { store, clock, period, running: Mutex::new(None) }
    }

    /// Spawn the loop. Returns `false` if it was already running.
    pub(crate) fn start(&self) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if running.as_ref().is_some_and(|current| !current.handle.is_finished()) {
            tracing::debug!("Quiz status scheduler already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(status_loop(
            self.store.clone(),
            self.clock.clone(),
            self.period,
            shutdown_rx,
        ));
        *running = Some(RunningLoop { shutdown: shutdown_tx, handle });

        tracing::info!(interval_seconds = self.period.as_secs(), "Quiz status scheduler started");
        true
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        let running = self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        running.as_ref().is_some_and(|current| !current.handle.is_finished())
    }

    pub(crate) async fn stop(&self) {
        let current = {
            let mut running = self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            running.take()
        };
        let Some(current) = current else {
            return;
        };

        if current.shutdown.send(true).is_err() {
            tracing::warn!("Quiz status loop exited before shutdown signal");
        }
        if let Err(err) = current.handle.await {
            tracing::error!(error = %err, "Quiz status loop join failed");
        }
    }
}

async fn status_loop(
    store: Arc<dyn QuizStatusStore>,
    clock: Arc<dyn Clock>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // First tick completes immediately.
    let mut tick = interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                match run_pass(store.as_ref(), clock.as_ref()).await {
                    Ok(report) => {
                        metrics::record_status_pass(report.examined, report.updated, report.failed);
                        tracing::debug!(
                            examined = report.examined,
                            updated = report.updated,
                            failed = report.failed,
                            "Quiz status pass finished"
                        );
                    }
                    Err(err) => {
                        metrics::record_status_pass_failure();
                        tracing::error!(error = %err, "Quiz status pass failed");
                    }
                }
            }
        }
    }
}
