//! Per-merchant liquidity provider configuration for the sAED corridor:
//! fee, rating, capacity (separate from `balances`, since a provider's
//! corridor capacity is a configured ceiling rather than a wallet),
//! optional service-hour window, and whether it currently accepts new
//! matches. One row per merchant.

use {
    bigdecimal::BigDecimal,
    chrono::{DateTime, Timelike, Utc},
    crate::PgTransaction,
    serde::Serialize,
    sqlx::PgConnection,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct CorridorProvider {
    pub id: uuid::Uuid,
    pub merchant_id: uuid::Uuid,
    pub name: String,
    pub fee_percentage: BigDecimal,
    pub rating: BigDecimal,
    pub available_saed: BigDecimal,
    pub min_order_saed: BigDecimal,
    pub max_order_saed: BigDecimal,
    pub active: bool,
    pub service_hours_start: Option<i16>,
    pub service_hours_end: Option<i16>,
    pub created_at: DateTime<Utc>,
}

impl CorridorProvider {
    /// Whether `now` falls inside this provider's service-hour window.
    /// A provider with no window set is always in-hours. The window wraps
    /// past midnight when `start > end` (e.g. 22-06 covers the overnight
    /// shift).
    pub fn in_service_hours(&self, now: DateTime<Utc>) -> bool {
        let (Some(start), Some(end)) = (self.service_hours_start, self.service_hours_end) else {
            return true;
        };
        let hour = i16::try_from(now.hour()).expect("hour fits in i16");
        if start <= end { (start..end).contains(&hour) } else { hour >= start || hour < end }
    }
}

pub async fn read(ex: &mut PgConnection, id: uuid::Uuid) -> Result<Option<CorridorProvider>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM corridor_providers WHERE id = $1";
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await
}

pub async fn list(ex: &mut PgConnection) -> Result<Vec<CorridorProvider>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM corridor_providers ORDER BY name ASC";
    sqlx::query_as(QUERY).fetch_all(ex).await
}

/// Upserts a merchant's corridor config, keyed on `merchant_id`.
/// `available_saed` is only set on insert; re-posting for the same merchant
/// updates fee, rating, capacity limits, service hours, and `active` without
/// clobbering whatever capacity the corridor engine has already consumed,
/// and without changing the row's own `id`.
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    ex: &mut PgConnection,
    id: uuid::Uuid,
    merchant_id: uuid::Uuid,
    name: &str,
    fee_percentage: &BigDecimal,
    rating: &BigDecimal,
    available_saed: &BigDecimal,
    min_order_saed: &BigDecimal,
    max_order_saed: &BigDecimal,
    active: bool,
    service_hours_start: Option<i16>,
    service_hours_end: Option<i16>,
    created_at: DateTime<Utc>,
) -> Result<CorridorProvider, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO corridor_providers (
    id, merchant_id, name, fee_percentage, rating, available_saed,
    min_order_saed, max_order_saed, active, service_hours_start, service_hours_end, created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
ON CONFLICT (merchant_id) DO UPDATE SET
    name = EXCLUDED.name,
    fee_percentage = EXCLUDED.fee_percentage,
    rating = EXCLUDED.rating,
    min_order_saed = EXCLUDED.min_order_saed,
    max_order_saed = EXCLUDED.max_order_saed,
    active = EXCLUDED.active,
    service_hours_start = EXCLUDED.service_hours_start,
    service_hours_end = EXCLUDED.service_hours_end
RETURNING *
    "#;
    sqlx::query_as(QUERY)
        .bind(id)
        .bind(merchant_id)
        .bind(name)
        .bind(fee_percentage)
        .bind(rating)
        .bind(available_saed)
        .bind(min_order_saed)
        .bind(max_order_saed)
        .bind(active)
        .bind(service_hours_start)
        .bind(service_hours_end)
        .bind(created_at)
        .fetch_one(ex)
        .await
}

/// Active, amount-capable providers for `amount`, excluding `excluded_merchant_id`,
/// cheapest fee first with rating as the tiebreak. Service-hour eligibility
/// depends on the caller's own `now` and is applied afterward with
/// [`CorridorProvider::in_service_hours`], not in this query.
pub async fn available_for(
    ex: &mut PgConnection,
    amount: &BigDecimal,
    excluded_merchant_id: Option<uuid::Uuid>,
) -> Result<Vec<CorridorProvider>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM corridor_providers
WHERE active AND available_saed >= $1 AND min_order_saed <= $1 AND max_order_saed >= $1
  AND ($2::uuid IS NULL OR merchant_id != $2)
ORDER BY fee_percentage ASC, rating DESC
    "#;
    sqlx::query_as(QUERY).bind(amount).bind(excluded_merchant_id).fetch_all(ex).await
}

/// Same eligibility predicate as [`available_for`], `FOR UPDATE` so Match can
/// hold the row it selects across the fee computation and reservation that
/// follow, and excluding both sides of the trade (`seller_merchant_id` is
/// mandatory, `excluded_buyer_merchant_id` is `None` when the buyer isn't a
/// merchant).
pub async fn lock_eligible_for_match(
    ex: &mut PgTransaction<'_>,
    amount: &BigDecimal,
    seller_merchant_id: uuid::Uuid,
    excluded_buyer_merchant_id: Option<uuid::Uuid>,
) -> Result<Vec<CorridorProvider>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM corridor_providers
WHERE active AND available_saed >= $1 AND min_order_saed <= $1 AND max_order_saed >= $1
  AND merchant_id != $2
  AND ($3::uuid IS NULL OR merchant_id != $3)
ORDER BY fee_percentage ASC, rating DESC
FOR UPDATE
    "#;
    sqlx::query_as(QUERY)
        .bind(amount)
        .bind(seller_merchant_id)
        .bind(excluded_buyer_merchant_id)
        .fetch_all(ex.deref_mut())
        .await
}

pub async fn reserve(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    amount: &BigDecimal,
) -> Result<Option<CorridorProvider>, sqlx::Error> {
    const QUERY: &str = r#"
UPDATE corridor_providers
SET available_saed = available_saed - $2
WHERE id = $1 AND active AND available_saed >= $2
RETURNING *
    "#;
    sqlx::query_as(QUERY).bind(id).bind(amount).fetch_optional(ex.deref_mut()).await
}

pub async fn restore(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    amount: &BigDecimal,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = "UPDATE corridor_providers SET available_saed = available_saed + $2 WHERE id = $1";
    sqlx::query(QUERY).bind(id).bind(amount).execute(ex.deref_mut()).await.map(|_| ())
}
