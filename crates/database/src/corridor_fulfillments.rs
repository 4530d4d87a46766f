//! One row per order routed through the sAED corridor instead of direct bank
//! settlement: which provider matched it, the fiat leg's own sub-lifecycle
//! (`pending` -> `payment_sent` -> `completed`/`failed`), and the deadline the
//! corridor timeout worker polls against.

use {
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    crate::{FulfillmentId, OrderId, PgTransaction, types::FulfillmentStatus},
    serde::Serialize,
    sqlx::PgConnection,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct CorridorFulfillment {
    pub id: FulfillmentId,
    pub order_id: OrderId,
    pub provider_id: uuid::Uuid,
    pub provider_merchant_id: uuid::Uuid,
    pub saed_amount: BigDecimal,
    pub fiat_amount: BigDecimal,
    pub corridor_fee: BigDecimal,
    pub status: FulfillmentStatus,
    pub matched_at: DateTime<Utc>,
    pub payment_sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub timeout_at: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    ex: &mut PgTransaction<'_>,
    id: FulfillmentId,
    order_id: OrderId,
    provider_id: uuid::Uuid,
    provider_merchant_id: uuid::Uuid,
    saed_amount: &BigDecimal,
    fiat_amount: &BigDecimal,
    corridor_fee: &BigDecimal,
    matched_at: DateTime<Utc>,
    timeout_at: DateTime<Utc>,
) -> Result<CorridorFulfillment, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO corridor_fulfillments (
    id, order_id, provider_id, provider_merchant_id, saed_amount, fiat_amount,
    corridor_fee, status, matched_at, timeout_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9)
RETURNING *
    "#;
    sqlx::query_as(QUERY)
        .bind(id)
        .bind(order_id)
        .bind(provider_id)
        .bind(provider_merchant_id)
        .bind(saed_amount)
        .bind(fiat_amount)
        .bind(corridor_fee)
        .bind(matched_at)
        .bind(timeout_at)
        .fetch_one(ex.deref_mut())
        .await
}

pub async fn lock_for_update(
    ex: &mut PgTransaction<'_>,
    id: FulfillmentId,
) -> Result<Option<CorridorFulfillment>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM corridor_fulfillments WHERE id = $1 FOR UPDATE";
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex.deref_mut()).await
}

pub async fn save(
    ex: &mut PgTransaction<'_>,
    fulfillment: &CorridorFulfillment,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE corridor_fulfillments SET
    status = $2,
    payment_sent_at = $3,
    completed_at = $4,
    failed_at = $5
WHERE id = $1
    "#;
    sqlx::query(QUERY)
        .bind(fulfillment.id)
        .bind(fulfillment.status)
        .bind(fulfillment.payment_sent_at)
        .bind(fulfillment.completed_at)
        .bind(fulfillment.failed_at)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}

/// A provider merchant's own open fulfillments, for its dashboard/poll
/// endpoint.
pub async fn for_provider_active(
    ex: &mut PgConnection,
    provider_merchant_id: uuid::Uuid,
) -> Result<Vec<CorridorFulfillment>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM corridor_fulfillments
WHERE provider_merchant_id = $1 AND status IN ('pending', 'payment_sent')
ORDER BY matched_at ASC
    "#;
    sqlx::query_as(QUERY).bind(provider_merchant_id).fetch_all(ex).await
}

/// Fulfillments still open past their deadline. Polled by the corridor
/// timeout worker, same `SKIP LOCKED` pattern as [`crate::orders::lock_expired_batch`].
pub async fn lock_timed_out_batch(
    ex: &mut PgTransaction<'_>,
    now: DateTime<Utc>,
    batch_size: i64,
) -> Result<Vec<CorridorFulfillment>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM corridor_fulfillments
WHERE status IN ('pending', 'payment_sent') AND timeout_at < $1
ORDER BY timeout_at ASC
LIMIT $2
FOR UPDATE SKIP LOCKED
    "#;
    sqlx::query_as(QUERY).bind(now).bind(batch_size).fetch_all(ex.deref_mut()).await
}
