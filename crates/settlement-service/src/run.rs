use {
    crate::{api, arguments::Arguments, workers},
    clap::Parser,
    engine::{BatchWriter, CorridorEngine, OrderEngine, SubscriptionFabric},
    observe::metrics::LivenessChecking,
    sqlx::postgres::PgPoolOptions,
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

pub struct Liveness {
    pool: sqlx::PgPool,
}

#[async_trait::async_trait]
impl LivenessChecking for Liveness {
    async fn is_alive(&self) -> bool {
        self.pool.acquire().await.is_ok()
    }
}

pub async fn start(args: impl Iterator<Item = String>) {
    let args = Arguments::parse_from(args);
    observe::tracing::initialize(args.log_filter.as_str(), args.log_stderr_threshold);
    observe::panic_hook::install();
    tracing::info!("running settlement-service with validated arguments:\n{}", args);
    observe::metrics::setup_registry(Some("settlement_service".into()), None);
    run(args).await;
}

/// Assumes tracing and the metrics registry have already been set up.
pub async fn run(args: Arguments) {
    let pool = PgPoolOptions::new()
        .max_connections(32)
        .connect(args.db_url.as_str())
        .await
        .expect("failed to connect to the database");

    let shutdown = CancellationToken::new();

    let batch_writer = BatchWriter::new(pool.clone(), args.batch_max_buffer);
    let batch_writer_handle = {
        let batch_writer = batch_writer.clone();
        let shutdown = shutdown.clone();
        let flush_ms = args.batch_flush_interval.as_millis() as u64;
        tokio::spawn(async move { batch_writer.run(flush_ms, shutdown).await })
    };

    let fabric = SubscriptionFabric::new();
    let order_engine = OrderEngine::new(pool.clone(), batch_writer.clone(), fabric.clone());
    let corridor_engine = CorridorEngine::new(pool.clone());

    let is_primary = args.worker_id.is_none();
    let heartbeat = args.heartbeat_dir.clone().map(workers::Heartbeat::new);
    let mut worker_handles = Vec::new();
    if is_primary {
        tracing::info!("running as primary: starting outbox, expiry, and corridor-timeout workers");
        worker_handles.push(tokio::spawn(workers::outbox::run_forever(
            pool.clone(),
            args.outbox_poll_interval,
            args.outbox_batch_size,
            heartbeat.clone(),
            shutdown.clone(),
        )));
        worker_handles.push(tokio::spawn(workers::expiry::run_forever(
            pool.clone(),
            order_engine.clone(),
            args.expiry_poll_interval,
            args.expiry_batch_size,
            heartbeat.clone(),
            shutdown.clone(),
        )));
        worker_handles.push(tokio::spawn(workers::corridor_timeout::run_forever(
            pool.clone(),
            order_engine.clone(),
            args.corridor_poll_interval,
            args.corridor_batch_size,
            heartbeat.clone(),
            shutdown.clone(),
        )));
    } else {
        tracing::info!(worker_id = ?args.worker_id, "running as a non-primary replica: workers disabled");
    }

    let state = api::AppState { pool: pool.clone(), order_engine, corridor_engine, fabric, mock_mode: args.mock_mode };
    let app = api::router(state, args.cors_origin.clone());

    let liveness = Arc::new(Liveness { pool });
    let metrics_address = args.metrics_address;

    let listener = tokio::net::TcpListener::bind(&args.bind_addr).await.expect("failed to bind HTTP listener");
    tracing::info!(addr = ?args.bind_addr, "serving HTTP API");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(shutdown.clone()));

    tokio::select! {
        result = server => {
            if let Err(err) = result {
                tracing::error!(?err, "HTTP server exited with an error");
            }
        }
        result = observe::metrics::serve_metrics(liveness, metrics_address) => {
            if let Err(err) = result {
                tracing::error!(?err, "metrics server exited with an error");
            }
        }
    }

    shutdown.cancel();
    let _ = batch_writer_handle.await;
    for handle in worker_handles {
        let _ = handle.await;
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async { tokio::signal::ctrl_c().await.expect("failed to install ctrl-c handler") };
    tokio::select! {
        _ = ctrl_c => {}
        () = shutdown.cancelled() => {}
    }
    tracing::info!("shutdown signal received, draining in-flight work");
}
