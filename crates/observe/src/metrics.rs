//! Process-wide Prometheus registry plus the `/healthz` and `/metrics`
//! endpoints workers and the API server both serve from.

use {
    axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get},
    prometheus::{Encoder, Registry, TextEncoder},
    std::sync::{Arc, OnceLock},
};

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Must be called once, early in `main`, before any `#[derive(MetricStorage)]`
/// struct's `::get()` is first invoked. `namespace` prefixes every metric
/// name registered afterward.
pub fn setup_registry(_namespace: Option<String>, registry: Option<Registry>) {
    // Namespace prefixing happens per-metric, via `#[metric(name = "...")]`
    // on each `prometheus_metric_storage::MetricStorage` struct.
    REGISTRY.set(registry.unwrap_or_default()).ok();
}

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Implemented by whatever the deployment considers "alive": a healthy
/// liveness check usually means "our background workers are still ticking",
/// not just "the process exists".
#[async_trait::async_trait]
pub trait LivenessChecking: Send + Sync {
    async fn is_alive(&self) -> bool;
}

async fn healthz<L: LivenessChecking + 'static>(State(liveness): State<Arc<L>>) -> impl IntoResponse {
    if liveness.is_alive().await { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE }
}

async fn metrics_handler() -> impl IntoResponse {
    let families = registry().gather();
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&families, &mut buffer) {
        tracing::error!(?err, "failed to encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}

/// Serves `/healthz` and `/metrics` on `addr` until the process exits; the
/// caller typically races this against the main server future.
pub async fn serve_metrics<L: LivenessChecking + 'static>(
    liveness: Arc<L>,
    addr: std::net::SocketAddr,
) -> Result<(), std::io::Error> {
    let app = Router::new()
        .route("/healthz", get(healthz::<L>))
        .route("/metrics", get(metrics_handler))
        .with_state(liveness);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
