//! One row per order. This is the hottest table in the store: every mutating
//! call in `engine::order_engine` reads it with `FOR UPDATE` before writing
//! it back whole.

use {
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    crate::{OfferId, OrderId, PgTransaction, types::*},
    serde::Serialize,
    sqlx::PgConnection,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: uuid::Uuid,
    pub merchant_id: uuid::Uuid,
    pub buyer_merchant_id: Option<uuid::Uuid>,
    pub offer_id: OfferId,
    pub direction: Direction,
    pub payment_method: PaymentMethod,
    pub crypto_amount: BigDecimal,
    pub crypto_currency: String,
    pub fiat_amount: BigDecimal,
    pub fiat_currency: String,
    pub rate: BigDecimal,
    pub protocol_fee_percent: Option<BigDecimal>,
    pub protocol_fee_amount: Option<BigDecimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub escrowed_at: Option<DateTime<Utc>>,
    pub payment_sent_at: Option<DateTime<Utc>>,
    pub payment_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub escrow_tx_hash: Option<String>,
    pub escrow_trade_id: Option<String>,
    pub escrow_creator_wallet: Option<String>,
    pub escrow_program_address: Option<String>,
    pub escrow_debited_entity_type: Option<EntityType>,
    pub escrow_debited_entity_id: Option<uuid::Uuid>,
    pub escrow_debited_amount: Option<BigDecimal>,
    pub escrow_debited_at: Option<DateTime<Utc>>,
    pub release_tx_hash: Option<String>,
    pub refund_tx_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub cancelled_by_actor_type: Option<ActorType>,
    pub cancelled_by_actor_id: Option<uuid::Uuid>,
    pub cancellation_reason: Option<String>,
    pub extension_count: i32,
    pub max_extensions: i32,
    pub extension_requested_by: Option<ActorType>,
    pub extension_requested_at: Option<DateTime<Utc>>,
    pub extension_minutes: i32,
    pub order_version: i64,
    pub payment_via: PaymentVia,
    pub corridor_fulfillment_id: Option<uuid::Uuid>,
    pub payment_details: Option<serde_json::Value>,
}

/// Fields required to create an order. `status`, `order_version`,
/// `expires_at`, `payment_via` and `id` are derived by
/// [`insert_order`], not supplied by the caller.
pub struct NewOrder {
    pub order_number: String,
    pub user_id: uuid::Uuid,
    pub merchant_id: uuid::Uuid,
    pub buyer_merchant_id: Option<uuid::Uuid>,
    pub offer_id: OfferId,
    pub direction: Direction,
    pub payment_method: PaymentMethod,
    pub crypto_amount: BigDecimal,
    pub crypto_currency: String,
    pub fiat_amount: BigDecimal,
    pub fiat_currency: String,
    pub rate: BigDecimal,
    pub protocol_fee_percent: Option<BigDecimal>,
    pub protocol_fee_amount: Option<BigDecimal>,
    pub payment_details: Option<serde_json::Value>,
    pub escrow_tx_hash: Option<String>,
    pub extension_minutes: i32,
}

pub async fn insert_order(
    ex: &mut PgTransaction<'_>,
    id: OrderId,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    new: &NewOrder,
) -> Result<Order, sqlx::Error> {
    let status = if new.escrow_tx_hash.is_some() {
        OrderStatus::Escrowed
    } else {
        OrderStatus::Pending
    };
    const QUERY: &str = r#"
INSERT INTO orders (
    id, order_number, user_id, merchant_id, buyer_merchant_id, offer_id,
    direction, payment_method, crypto_amount, crypto_currency, fiat_amount,
    fiat_currency, rate, protocol_fee_percent, protocol_fee_amount, status,
    created_at, escrowed_at, escrow_tx_hash, expires_at, extension_count,
    max_extensions, extension_minutes, order_version, payment_via, payment_details
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
        $17, $18, $19, $20, 0, 3, $21, 1, 'bank', $22)
RETURNING *
    "#;
    sqlx::query_as(QUERY)
        .bind(id)
        .bind(&new.order_number)
        .bind(new.user_id)
        .bind(new.merchant_id)
        .bind(new.buyer_merchant_id)
        .bind(new.offer_id)
        .bind(new.direction)
        .bind(new.payment_method)
        .bind(&new.crypto_amount)
        .bind(&new.crypto_currency)
        .bind(&new.fiat_amount)
        .bind(&new.fiat_currency)
        .bind(&new.rate)
        .bind(&new.protocol_fee_percent)
        .bind(&new.protocol_fee_amount)
        .bind(status)
        .bind(created_at)
        .bind(new.escrow_tx_hash.is_some().then_some(created_at))
        .bind(&new.escrow_tx_hash)
        .bind(expires_at)
        .bind(new.extension_minutes)
        .bind(&new.payment_details)
        .fetch_one(ex.deref_mut())
        .await
}

/// Locks the order row for the duration of the caller's transaction. Every
/// mutating operation in `order_engine` starts here.
pub async fn lock_for_update(
    ex: &mut PgTransaction<'_>,
    id: OrderId,
) -> Result<Option<Order>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM orders WHERE id = $1 FOR UPDATE";
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex.deref_mut()).await
}

pub async fn read(ex: &mut PgConnection, id: OrderId) -> Result<Option<Order>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM orders WHERE id = $1";
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await
}

/// Writes every mutable column back. Called once per mutating operation,
/// after the engine has produced the next in-memory state of a locked row.
pub async fn save(ex: &mut PgTransaction<'_>, order: &Order) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE orders SET
    buyer_merchant_id = $2,
    merchant_id = $3,
    status = $4,
    accepted_at = $5,
    escrowed_at = $6,
    payment_sent_at = $7,
    payment_confirmed_at = $8,
    completed_at = $9,
    cancelled_at = $10,
    expired_at = $11,
    escrow_tx_hash = $12,
    escrow_trade_id = $13,
    escrow_creator_wallet = $14,
    escrow_program_address = $15,
    escrow_debited_entity_type = $16,
    escrow_debited_entity_id = $17,
    escrow_debited_amount = $18,
    escrow_debited_at = $19,
    release_tx_hash = $20,
    refund_tx_hash = $21,
    expires_at = $22,
    cancelled_by_actor_type = $23,
    cancelled_by_actor_id = $24,
    cancellation_reason = $25,
    extension_count = $26,
    extension_requested_by = $27,
    extension_requested_at = $28,
    order_version = $29,
    payment_via = $30,
    corridor_fulfillment_id = $31
WHERE id = $1
    "#;
    sqlx::query(QUERY)
        .bind(order.id)
        .bind(order.buyer_merchant_id)
        .bind(order.merchant_id)
        .bind(order.status)
        .bind(order.accepted_at)
        .bind(order.escrowed_at)
        .bind(order.payment_sent_at)
        .bind(order.payment_confirmed_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .bind(order.expired_at)
        .bind(&order.escrow_tx_hash)
        .bind(&order.escrow_trade_id)
        .bind(&order.escrow_creator_wallet)
        .bind(&order.escrow_program_address)
        .bind(order.escrow_debited_entity_type)
        .bind(order.escrow_debited_entity_id)
        .bind(&order.escrow_debited_amount)
        .bind(order.escrow_debited_at)
        .bind(&order.release_tx_hash)
        .bind(&order.refund_tx_hash)
        .bind(order.expires_at)
        .bind(order.cancelled_by_actor_type)
        .bind(order.cancelled_by_actor_id)
        .bind(&order.cancellation_reason)
        .bind(order.extension_count)
        .bind(order.extension_requested_by)
        .bind(order.extension_requested_at)
        .bind(order.order_version)
        .bind(order.payment_via)
        .bind(order.corridor_fulfillment_id)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}

/// Orders past their deadline and not yet in a terminal state. Used by the
/// expiry worker; `FOR UPDATE SKIP LOCKED` lets multiple worker replicas scan
/// concurrently without contending on the same rows.
pub async fn lock_expired_batch(
    ex: &mut PgTransaction<'_>,
    now: DateTime<Utc>,
    batch_size: i64,
) -> Result<Vec<Order>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM orders
WHERE status NOT IN ('completed', 'cancelled', 'expired')
  AND expires_at IS NOT NULL
  AND expires_at < $1
ORDER BY expires_at ASC
LIMIT $2
FOR UPDATE SKIP LOCKED
    "#;
    sqlx::query_as(QUERY)
        .bind(now)
        .bind(batch_size)
        .fetch_all(ex.deref_mut())
        .await
}
