//! At-least-once delivery queue for order-event notifications. Rows are
//! inserted in the same transaction as the state change they describe, then
//! drained by a worker that claims a batch with `FOR UPDATE SKIP LOCKED`,
//! attempts delivery, and marks each row sent or bumps its retry count.

use {
    chrono::{DateTime, Utc},
    crate::{OrderId, PgTransaction, types::OutboxStatus},
    serde::Serialize,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: uuid::Uuid,
    pub order_id: OrderId,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

pub async fn insert(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    order_id: OrderId,
    event_type: &str,
    payload: &serde_json::Value,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO notification_outbox (id, order_id, event_type, payload, status, attempts, created_at)
VALUES ($1, $2, $3, $4, 'pending', 0, $5)
    "#;
    sqlx::query(QUERY)
        .bind(id)
        .bind(order_id)
        .bind(event_type)
        .bind(payload)
        .bind(created_at)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}

/// Claims up to `batch_size` pending (or previously failed) rows for delivery
/// and marks them `processing` so a second worker replica can't also pick
/// them up.
pub async fn claim_batch(
    ex: &mut PgTransaction<'_>,
    batch_size: i64,
) -> Result<Vec<OutboxEntry>, sqlx::Error> {
    const QUERY: &str = r#"
UPDATE notification_outbox
SET status = 'processing'
WHERE id IN (
    SELECT id FROM notification_outbox
    WHERE status IN ('pending', 'failed')
    ORDER BY created_at ASC
    LIMIT $1
    FOR UPDATE SKIP LOCKED
)
RETURNING *
    "#;
    sqlx::query_as(QUERY).bind(batch_size).fetch_all(ex.deref_mut()).await
}

pub async fn mark_sent(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    delivered_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    const QUERY: &str =
        "UPDATE notification_outbox SET status = 'sent', delivered_at = $2 WHERE id = $1";
    sqlx::query(QUERY)
        .bind(id)
        .bind(delivered_at)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}

pub async fn mark_failed(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    error: &str,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE notification_outbox
SET status = 'failed', attempts = attempts + 1, last_error = $2
WHERE id = $1
    "#;
    sqlx::query(QUERY).bind(id).bind(error).execute(ex.deref_mut()).await.map(|_| ())
}
