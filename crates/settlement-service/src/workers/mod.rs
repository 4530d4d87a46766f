//! Background loops that only the primary replica runs (`WORKER_ID` unset):
//! outbox drain, order expiry, corridor fulfillment timeout. Each is an
//! independent `tokio::select!` loop with its own poll cadence and backoff,
//! mirroring [`engine::batch_writer::BatchWriter::run`]'s
//! tick-vs-shutdown-token shape.

pub mod corridor_timeout;
pub mod expiry;
pub mod outbox;

use std::time::Duration;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Exponential backoff applied only to a worker's own poll cadence on DB
/// error; never surfaced to request clients.
pub struct Backoff {
    current: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self { current: Duration::from_millis(500) }
    }

    pub async fn sleep(&mut self) {
        tokio::time::sleep(self.current).await;
        self.current = (self.current * 2).min(MAX_BACKOFF);
    }

    pub fn reset(&mut self) {
        self.current = Duration::from_millis(500);
    }
}

/// Writes a per-worker heartbeat file each successful cycle. Non-critical:
/// failures are logged, never fatal to the worker loop.
#[derive(Clone)]
pub struct Heartbeat {
    dir: std::path::PathBuf,
}

impl Heartbeat {
    pub fn new(dir: std::path::PathBuf) -> Self {
        Self { dir }
    }

    pub fn beat(&self, worker: &str) {
        let path = self.dir.join(format!("{worker}.heartbeat"));
        if let Err(err) = std::fs::write(&path, chrono::Utc::now().to_rfc3339()) {
            tracing::warn!(?err, worker, "failed to write heartbeat file");
        }
    }
}
