//! Per-entity balance rows backing escrow debits/credits, corridor sAED
//! locks, and USDT<->sAED conversion. Not named as a table in the distilled
//! spec, but every balance mutation it describes needs exactly this: one row
//! per `(entity_type, entity_id)`, locked individually.

use {
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    crate::{PgTransaction, types::EntityType},
    serde::Serialize,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Balance {
    pub entity_type: EntityType,
    pub entity_id: uuid::Uuid,
    pub usdt_balance: BigDecimal,
    pub sinr_balance: BigDecimal,
    pub updated_at: DateTime<Utc>,
}

pub async fn lock_for_update(
    ex: &mut PgTransaction<'_>,
    entity_type: EntityType,
    entity_id: uuid::Uuid,
) -> Result<Option<Balance>, sqlx::Error> {
    const QUERY: &str =
        "SELECT * FROM balances WHERE entity_type = $1 AND entity_id = $2 FOR UPDATE";
    sqlx::query_as(QUERY)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(ex.deref_mut())
        .await
}

/// Ensures a balance row exists, returning it locked. New entities start at
/// zero on both legs.
pub async fn lock_or_create(
    ex: &mut PgTransaction<'_>,
    entity_type: EntityType,
    entity_id: uuid::Uuid,
    now: DateTime<Utc>,
) -> Result<Balance, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO balances (entity_type, entity_id, usdt_balance, sinr_balance, updated_at)
VALUES ($1, $2, 0, 0, $3)
ON CONFLICT (entity_type, entity_id) DO NOTHING
    "#;
    sqlx::query(QUERY)
        .bind(entity_type)
        .bind(entity_id)
        .bind(now)
        .execute(ex.deref_mut())
        .await?;
    Ok(lock_for_update(ex, entity_type, entity_id)
        .await?
        .expect("row just inserted or already present"))
}

/// Applies `delta` (positive credits, negative debits) to the USDT leg and
/// returns `(balance_before, balance_after)` for the caller's ledger entry.
pub async fn adjust_usdt(
    ex: &mut PgTransaction<'_>,
    entity_type: EntityType,
    entity_id: uuid::Uuid,
    delta: &BigDecimal,
    now: DateTime<Utc>,
) -> Result<(BigDecimal, BigDecimal), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE balances SET usdt_balance = usdt_balance + $3, updated_at = $4
WHERE entity_type = $1 AND entity_id = $2
RETURNING usdt_balance - $3 AS before, usdt_balance AS after
    "#;
    #[derive(sqlx::FromRow)]
    struct Row {
        before: BigDecimal,
        after: BigDecimal,
    }
    let row: Row = sqlx::query_as(QUERY)
        .bind(entity_type)
        .bind(entity_id)
        .bind(delta)
        .bind(now)
        .fetch_one(ex.deref_mut())
        .await?;
    Ok((row.before, row.after))
}

/// Same as [`adjust_usdt`] but for the sAED (`sinr_balance`) leg, in fils.
pub async fn adjust_sinr(
    ex: &mut PgTransaction<'_>,
    entity_type: EntityType,
    entity_id: uuid::Uuid,
    delta: &BigDecimal,
    now: DateTime<Utc>,
) -> Result<(BigDecimal, BigDecimal), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE balances SET sinr_balance = sinr_balance + $3, updated_at = $4
WHERE entity_type = $1 AND entity_id = $2
RETURNING sinr_balance - $3 AS before, sinr_balance AS after
    "#;
    #[derive(sqlx::FromRow)]
    struct Row {
        before: BigDecimal,
        after: BigDecimal,
    }
    let row: Row = sqlx::query_as(QUERY)
        .bind(entity_type)
        .bind(entity_id)
        .bind(delta)
        .bind(now)
        .fetch_one(ex.deref_mut())
        .await?;
    Ok((row.before, row.after))
}
