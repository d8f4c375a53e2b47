use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::services::AppState;

/// Install the Prometheus recorder and expose it at /metrics.
pub fn setup_metrics() -> anyhow::Result<Router<AppState>> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(Router::new().route("/metrics", get(move || async move { handle.render() })))
}
