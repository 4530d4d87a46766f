//! Refunds corridor fulfillments the matched LP never sent fiat for in time.

use {
    chrono::{DateTime, Utc},
    database::corridor_fulfillments,
    engine::{OrderEngine, corridor_buyer},
    sqlx::PgPool,
    tokio_util::sync::CancellationToken,
};

pub async fn run_once(
    pool: &PgPool,
    order_engine: &OrderEngine,
    batch_size: i64,
    now: DateTime<Utc>,
) -> Result<usize, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let overdue = corridor_fulfillments::lock_timed_out_batch(&mut tx, now, batch_size).await?;
    let mut refunded = Vec::with_capacity(overdue.len());

    for fulfillment in &overdue {
        let Some(order) = database::orders::lock_for_update(&mut tx, fulfillment.order_id).await? else {
            tracing::warn!(order_id = %fulfillment.order_id, "corridor fulfillment references missing order");
            continue;
        };
        let (buyer_entity_type, buyer_entity_id) = corridor_buyer(&order);
        if let Err(err) =
            engine::corridor_engine::timeout_refund(&mut tx, fulfillment, buyer_entity_type, buyer_entity_id, now).await
        {
            tracing::error!(?err, fulfillment_id = %fulfillment.id, "corridor timeout refund failed");
            continue;
        }
        refunded.push(fulfillment.order_id);
    }
    tx.commit().await?;

    for order_id in &refunded {
        if let Err(err) = order_engine.detach_corridor_to_bank(*order_id, now).await {
            tracing::error!(?err, order_id = %order_id, "failed to detach timed-out corridor order");
        }
    }
    Ok(refunded.len())
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
                            tracing::info!(count, "refunded overdue corridor fulfillments");
                        }
                        backoff.reset();
                        if let Some(heartbeat) = &heartbeat {
                            heartbeat.beat("corridor_timeout");
                        }
                    }
                    Err(err) => {
                        tracing::error!(?err, "corridor timeout worker cycle failed");
                        backoff.sleep().await;
                    }
                }
            }
            () = shutdown.cancelled() => break,
        }
    }
}
