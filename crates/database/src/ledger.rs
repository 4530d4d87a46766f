//! Append-only double-entry lines. Every balance mutation in
//! `balances.rs` is paired with exactly one insert here, in the same
//! transaction, so the sum of ledger entries for an entity always
//! reconciles against its balance row (checked by the invariant verifier).

use {
    bigdecimal::BigDecimal,
    chrono::{DateTime, Utc},
    crate::{OrderId, PgTransaction, types::EntityType, types::LedgerEntryType},
    serde::Serialize,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: uuid::Uuid,
    pub entry_type: LedgerEntryType,
    pub entity_type: EntityType,
    pub entity_id: uuid::Uuid,
    pub order_id: Option<OrderId>,
    pub currency: String,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
    pub created_at: DateTime<Utc>,
}

pub struct NewLedgerEntry<'a> {
    pub entry_type: LedgerEntryType,
    pub entity_type: EntityType,
    pub entity_id: uuid::Uuid,
    pub order_id: Option<OrderId>,
    pub currency: &'a str,
    pub amount: BigDecimal,
    pub balance_before: BigDecimal,
    pub balance_after: BigDecimal,
}

pub async fn insert(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    entry: NewLedgerEntry<'_>,
    created_at: DateTime<Utc>,
) -> Result<LedgerEntry, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO ledger_entries (
    id, entry_type, entity_type, entity_id, order_id, currency, amount,
    balance_before, balance_after, created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
RETURNING *
    "#;
    sqlx::query_as(QUERY)
        .bind(id)
        .bind(entry.entry_type)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.order_id)
        .bind(entry.currency)
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(created_at)
        .fetch_one(ex.deref_mut())
        .await
}

pub async fn for_order(
    ex: &mut PgTransaction<'_>,
    order_id: OrderId,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM ledger_entries WHERE order_id = $1 ORDER BY created_at ASC";
    sqlx::query_as(QUERY).bind(order_id).fetch_all(ex.deref_mut()).await
}

/// Sum of signed amounts for an entity, used by the invariant verifier to
/// cross-check against the live balance row.
pub async fn entity_total(
    ex: &mut PgTransaction<'_>,
    entity_type: EntityType,
    entity_id: uuid::Uuid,
    currency: &str,
) -> Result<BigDecimal, sqlx::Error> {
    const QUERY: &str = r#"
SELECT COALESCE(SUM(amount), 0) FROM ledger_entries
WHERE entity_type = $1 AND entity_id = $2 AND currency = $3
    "#;
    sqlx::query_scalar(QUERY)
        .bind(entity_type)
        .bind(entity_id)
        .bind(currency)
        .fetch_one(ex.deref_mut())
        .await
}
