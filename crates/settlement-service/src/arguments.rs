use {std::{net::SocketAddr, time::Duration}, tracing::level_filters::LevelFilter};

#[derive(clap::Parser)]
#[clap(version)]
pub struct Arguments {
    #[clap(long, env, default_value = "settlement_service=debug,tower_http=info,sqlx=warn")]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,

    /// Url of the Postgres database. By default connects to locally running postgres.
    #[clap(long, env, default_value = "postgresql://")]
    pub db_url: url::Url,

    /// Address the HTTP API and `/ws/orders` socket bind to.
    #[clap(long, env, default_value = "0.0.0.0:4010")]
    pub bind_addr: SocketAddr,

    /// Address the `/healthz` and `/metrics` endpoints bind to.
    #[clap(long, env, default_value = "0.0.0.0:9090")]
    pub metrics_address: SocketAddr,

    /// Allowed CORS origin for the HTTP API. Unset disables CORS entirely.
    #[clap(long, env)]
    pub cors_origin: Option<String>,

    /// Identifies this process as a secondary replica. Absent (the default)
    /// means this process is primary: it runs the subscription fabric and
    /// every background worker. Secondaries only serve the request/response
    /// HTTP API.
    #[clap(long, env)]
    pub worker_id: Option<String>,

    /// Enables off-chain balance mutations on escrow lock/release/refund and
    /// corridor settlement, instead of assuming an external chain watcher
    /// performs them. Intended for local/staging deployments without a live
    /// chain integration.
    #[clap(long, env)]
    pub mock_mode: bool,

    /// Maximum rows the batch writer holds before it flushes early,
    /// regardless of `batch_flush_interval`.
    #[clap(long, env, default_value = "200")]
    pub batch_max_buffer: usize,

    /// Upper bound on how long a batched audit/outbox/reputation row can sit
    /// before being flushed.
    #[clap(long, env, default_value = "50ms", value_parser = humantime::parse_duration)]
    pub batch_flush_interval: Duration,

    #[clap(long, env, default_value = "500ms", value_parser = humantime::parse_duration)]
    pub outbox_poll_interval: Duration,

    #[clap(long, env, default_value = "100")]
    pub outbox_batch_size: i64,

    #[clap(long, env, default_value = "5s", value_parser = humantime::parse_duration)]
    pub expiry_poll_interval: Duration,

    #[clap(long, env, default_value = "200")]
    pub expiry_batch_size: i64,

    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub corridor_poll_interval: Duration,

    #[clap(long, env, default_value = "100")]
    pub corridor_batch_size: i64,

    /// Directory a heartbeat file is touched in once per worker cycle.
    /// Non-critical; used only by external liveness probes that can't reach
    /// `/healthz`.
    #[clap(long, env)]
    pub heartbeat_dir: Option<std::path::PathBuf>,
}

impl std::fmt::Display for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "log_filter: {}", self.log_filter)?;
        writeln!(f, "log_stderr_threshold: {}", self.log_stderr_threshold)?;
        writeln!(f, "db_url: (redacted)")?;
        writeln!(f, "bind_addr: {}", self.bind_addr)?;
        writeln!(f, "metrics_address: {}", self.metrics_address)?;
        writeln!(f, "cors_origin: {:?}", self.cors_origin)?;
        writeln!(f, "worker_id: {:?}", self.worker_id)?;
        writeln!(f, "mock_mode: {}", self.mock_mode)?;
        writeln!(f, "batch_max_buffer: {}", self.batch_max_buffer)?;
        writeln!(f, "batch_flush_interval: {:?}", self.batch_flush_interval)?;
        writeln!(f, "outbox_poll_interval: {:?}", self.outbox_poll_interval)?;
        writeln!(f, "outbox_batch_size: {}", self.outbox_batch_size)?;
        writeln!(f, "expiry_poll_interval: {:?}", self.expiry_poll_interval)?;
        writeln!(f, "expiry_batch_size: {}", self.expiry_batch_size)?;
        writeln!(f, "corridor_poll_interval: {:?}", self.corridor_poll_interval)?;
        write!(f, "corridor_batch_size: {}", self.corridor_batch_size)
    }
}
