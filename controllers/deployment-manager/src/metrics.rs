//! Prometheus metrics and the `/metrics` + `/healthz` endpoint.

use crate::error::ControllerError;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Reconcile outcome label for successful passes
pub const RESULT_SUCCESS: &str = "success";
/// Reconcile outcome label for failed passes
pub const RESULT_ERROR: &str = "error";

/// Metrics shared by every reconciler.
#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    reconciles: IntCounterVec,
    duration: HistogramVec,
    active_monitors: IntGauge,
}

impl Metrics {
    /// Build and register the collectors in a private registry.
    ///
    /// # Errors
    ///
    /// Returns the registry error if a collector cannot be registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reconciles = IntCounterVec::new(
            Opts::new("deployment_manager_reconcile_total", "Reconcile passes by kind and result"),
            &["kind", "result"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new(
                "deployment_manager_reconcile_duration_seconds",
                "Duration of reconcile passes",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["kind"],
        )?;
        let active_monitors = IntGauge::new(
            "deployment_manager_active_monitors",
            "Background monitors currently running",
        )?;

        registry.register(Box::new(reconciles.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(active_monitors.clone()))?;

        Ok(Self {
            registry,
            reconciles,
            duration,
            active_monitors,
        })
    }

    /// Count one reconcile pass and observe its duration.
    pub fn record_reconcile(&self, kind: &str, result: &str, elapsed: Duration) {
        self.reconciles.with_label_values(&[kind, result]).inc();
        self.duration.with_label_values(&[kind]).observe(elapsed.as_secs_f64());
    }

    /// Publish the number of running monitors.
    pub fn set_active_monitors(&self, count: usize) {
        self.active_monitors.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    /// Text exposition of every collector.
    ///
    /// # Errors
    ///
    /// Returns the encoder error when the families cannot be rendered.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn healthz() -> &'static str {
    "ok"
}

/// Router serving `/metrics` and `/healthz`.
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

/// Serve the metrics endpoint until the process exits.
///
/// # Errors
///
/// Returns [`ControllerError::InvalidConfig`] when the address cannot be
/// bound and [`ControllerError::Watch`] if the server stops.
pub async fn serve(addr: SocketAddr, metrics: Arc<Metrics>) -> Result<(), ControllerError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ControllerError::InvalidConfig(format!("cannot bind metrics address {}: {}", addr, e)))?;
    info!("Metrics server listening on {}", addr);

    axum::serve(listener, router(metrics))
        .await
        .map_err(|e| ControllerError::Watch(format!("metrics server stopped: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_recorded_series() {
        let metrics = Metrics::new().expect("collectors register");
        metrics.record_reconcile("Host", RESULT_SUCCESS, Duration::from_millis(120));
        metrics.record_reconcile("Host", RESULT_ERROR, Duration::from_millis(30));
        metrics.set_active_monitors(3);

        let text = metrics.encode().expect("encode");
        assert!(text.contains(r#"deployment_manager_reconcile_total{kind="Host",result="success"} 1"#));
        assert!(text.contains(r#"deployment_manager_reconcile_total{kind="Host",result="error"} 1"#));
        assert!(text.contains("deployment_manager_active_monitors 3"));
        assert!(text.contains("deployment_manager_reconcile_duration_seconds_bucket"));
    }
}
