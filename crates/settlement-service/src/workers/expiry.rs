//! Periodic expiry of stale orders: `pending` past its 15-minute window
//! expires outright; anything with escrow already locked goes to `disputed`
//! instead of silently refunding; everything else is cancelled.

use {
    chrono::{DateTime, Utc},
    database::{
        orders,
        types::{ActorType, OrderStatus},
    },
    engine::{OrderEngine, OrderError},
    sqlx::PgPool,
    tokio_util::sync::CancellationToken,
};

/// Selects one cycle's batch under `FOR UPDATE SKIP LOCKED`, releases that
/// lock, then drives each order through [`OrderEngine::transition`] (which
/// re-locks it individually). A second replica picking the same row up
/// between those two steps just loses the race on that one order; `transition`
/// reports it as an error, which is logged and otherwise ignored.
pub async fn run_once(
    pool: &PgPool,
    order_engine: &OrderEngine,
    batch_size: i64,
    now: DateTime<Utc>,
) -> Result<usize, OrderError> {
    let mut tx = pool.begin().await?;
    let candidates = orders::lock_expired_batch(&mut tx, now, batch_size).await?;
    tx.commit().await?;

    let mut expired = 0;
    for order in candidates {
        let target = if order.status == OrderStatus::Pending {
            OrderStatus::Expired
        } else if order.escrow_tx_hash.is_some() {
            OrderStatus::Disputed
        } else {
            OrderStatus::Cancelled
        };

        match order_engine
            .transition(order.id, target, ActorType::System, None, Some("expired".to_string()), None, now)
            .await
        {
            Ok(_) => expired += 1,
            Err(err) => tracing::warn!(order_id = %order.id, ?err, "expiry transition failed"),
        }
    }
    Ok(expired)
}

pub async fn run_forever(
    pool: PgPool,
    order_engine: OrderEngine,
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
                match run_once(&pool, &order_engine, batch_size, Utc::now()).await {
                    Ok(count) => {
                        if count > 0 {
                            tracing::info!(count, "expired stale orders");
                        }
                        backoff.reset();
                        if let Some(heartbeat) = &heartbeat {
                            heartbeat.beat("expiry");
                        }
                    }
                    Err(err) => {
                        tracing::error!(?err, "expiry worker cycle failed");
                        backoff.sleep().await;
                    }
                }
            }
            () = shutdown.cancelled() => break,
        }
    }
}
