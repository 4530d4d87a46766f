//! Merchant-advertised liquidity. `available_amount` is decremented
//! optimistically in the `WHERE` clause at order creation rather than via a
//! separate `SELECT ... FOR UPDATE` + check, so two concurrent creates racing
//! for the last of an offer's liquidity resolve without either transaction
//! blocking on the other.

use {
    bigdecimal::BigDecimal,
    crate::{OfferId, PgTransaction, types::Direction, types::PaymentMethod},
    serde::Serialize,
    sqlx::PgConnection,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Offer {
    pub id: OfferId,
    pub merchant_id: uuid::Uuid,
    pub direction: Direction,
    pub payment_method: PaymentMethod,
    pub rate: BigDecimal,
    pub available_amount: BigDecimal,
    pub min_amount: BigDecimal,
    pub max_amount: BigDecimal,
    pub active: bool,
}

pub async fn read(ex: &mut PgConnection, id: OfferId) -> Result<Option<Offer>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM offers WHERE id = $1";
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await
}

/// Atomically reserves `amount` of liquidity, returning `None` if the offer
/// doesn't have enough left (or doesn't exist, or is inactive). No row lock
/// is taken: the `available_amount >= $2` guard in the `WHERE` clause is the
/// whole concurrency story.
pub async fn reserve(
    ex: &mut PgTransaction<'_>,
    id: OfferId,
    amount: &BigDecimal,
) -> Result<Option<Offer>, sqlx::Error> {
    const QUERY: &str = r#"
UPDATE offers
SET available_amount = available_amount - $2
WHERE id = $1 AND active AND available_amount >= $2
RETURNING *
    "#;
    sqlx::query_as(QUERY)
        .bind(id)
        .bind(amount)
        .fetch_optional(ex.deref_mut())
        .await
}

/// Returns liquidity consumed by an order that is cancelling or expiring
/// before reaching a terminal state that would have kept it consumed.
pub async fn restore(
    ex: &mut PgTransaction<'_>,
    id: OfferId,
    amount: &BigDecimal,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = "UPDATE offers SET available_amount = available_amount + $2 WHERE id = $1";
    sqlx::query(QUERY)
        .bind(id)
        .bind(amount)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}
