use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_login(outcome: &'static str) {
    metrics::counter!("auth_login_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_status_pass(examined: usize, updated: usize, failed: usize) {
    metrics::counter!("quiz_status_passes_total").increment(1);
    metrics::counter!("quiz_status_updates_total").increment(updated as u64);
    metrics::counter!("quiz_status_update_failures_total").increment(failed as u64);
    metrics::gauge!("quiz_status_last_examined").set(examined as f64);
}

pub(crate) fn record_status_pass_failure() {
    metrics::counter!("quiz_status_pass_failures_total").increment(1);
}

pub(crate) fn record_submission(grade: &str) {
    metrics::counter!("quiz_submissions_total", "grade" => grade.to_string()).increment(1);
}
