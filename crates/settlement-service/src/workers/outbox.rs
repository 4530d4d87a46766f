//! Drains the notification outbox. This worker never makes a downstream call
//! of its own: the inline publish at commit time is the real delivery. This
//! loop is the audit-and-retry substrate: it claims a
//! batch, marks each row `sent`, and is the thing a concrete downstream
//! integration would plug into at the same retry granularity.

use {
    chrono::Utc,
    database::outbox,
    sqlx::PgPool,
    tokio_util::sync::CancellationToken,
};

pub async fn run_once(pool: &PgPool, batch_size: i64) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let batch = outbox::claim_batch(&mut tx, batch_size).await?;
    let delivered = batch.len();
    for entry in &batch {
        outbox::mark_sent(&mut tx, entry.id, Utc::now()).await?;
    }
    tx.commit().await?;
    Ok(delivered)
}

pub async fn run_forever(
    pool: PgPool,
    poll_interval: std::time::Duration,
    batch_size: i64,
    heartbeat: Option<super::Heartbeat>,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    let mut backoff = super::Backoff::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match run_once(&pool, batch_size).await {
                    Ok(count) => {
                        if count > 0 {
                            tracing::debug!(count, "delivered outbox batch");
                        }
                        backoff.reset();
                        if let Some(heartbeat) = &heartbeat {
                            heartbeat.beat("outbox");
                        }
                    }
                    Err(err) => {
                        tracing::error!(?err, "outbox worker cycle failed");
                        backoff.sleep().await;
                    }
                }
            }
            () = shutdown.cancelled() => break,
        }
    }
}
