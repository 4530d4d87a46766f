//! Audit record of every USDT<->sAED conversion the conversion engine
//! performs on behalf of an order, at the rate in effect at conversion time.

use {
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    crate::{ConversionId, OrderId, PgTransaction},
    serde::Serialize,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct SyntheticConversion {
    pub id: ConversionId,
    pub order_id: OrderId,
    pub from_currency: String,
    pub to_currency: String,
    pub from_amount: BigDecimal,
    pub to_amount: BigDecimal,
    pub rate: BigDecimal,
    pub created_at: DateTime<Utc>,
}

#[allow(clippy::too_many_arguments)]
pub async fn insert(
    ex: &mut PgTransaction<'_>,
    id: ConversionId,
    order_id: OrderId,
    from_currency: &str,
    to_currency: &str,
    from_amount: &BigDecimal,
    to_amount: &BigDecimal,
    rate: &BigDecimal,
    created_at: DateTime<Utc>,
) -> Result<SyntheticConversion, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO synthetic_conversions (
    id, order_id, from_currency, to_currency, from_amount, to_amount, rate, created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
RETURNING *
    "#;
    sqlx::query_as(QUERY)
        .bind(id)
        .bind(order_id)
        .bind(from_currency)
        .bind(to_currency)
        .bind(from_amount)
        .bind(to_amount)
        .bind(rate)
        .bind(created_at)
        .fetch_one(ex.deref_mut())
        .await
}

pub async fn find_by_id(
    ex: &mut PgTransaction<'_>,
    id: ConversionId,
) -> Result<Option<SyntheticConversion>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM synthetic_conversions WHERE id = $1";
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex.deref_mut()).await
}

pub async fn for_order(
    ex: &mut PgTransaction<'_>,
    order_id: OrderId,
) -> Result<Vec<SyntheticConversion>, sqlx::Error> {
    const QUERY: &str =
        "SELECT * FROM synthetic_conversions WHERE order_id = $1 ORDER BY created_at ASC";
    sqlx::query_as(QUERY).bind(order_id).fetch_all(ex.deref_mut()).await
}
