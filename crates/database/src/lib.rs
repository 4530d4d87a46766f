//! Transactional row store for the settlement core.
//!
//! Design mirrors the convention used throughout this module: functions that
//! must execute as part of a bigger transaction take `&mut PgTransaction`,
//! functions that are fine running standalone take `&mut PgConnection`. This
//! lets callers compose multi-step writes into one commit while still
//! allowing individual queries to be exercised in isolation by tests.
//!
//! Tests open a transaction, run queries against it, and never commit so the
//! rollback on drop leaves the database untouched, which keeps Postgres-backed
//! tests safe to run in parallel.

pub mod balances;
pub mod corridor_fulfillments;
pub mod corridor_providers;
pub mod disputes;
pub mod ledger;
pub mod offers;
pub mod order_events;
pub mod orders;
pub mod outbox;
pub mod reputation_events;
pub mod synthetic_conversions;
pub mod types;

use sqlx::{Executor, PgPool};

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;
pub type OrderId = uuid::Uuid;
pub type OfferId = uuid::Uuid;
pub type FulfillmentId = uuid::Uuid;
pub type DisputeId = uuid::Uuid;
pub type ConversionId = uuid::Uuid;

/// The names of all tables this core owns.
pub const ALL_TABLES: &[&str] = &[
    "orders",
    "offers",
    "balances",
    "ledger_entries",
    "notification_outbox",
    "order_events",
    "reputation_events",
    "corridor_providers",
    "corridor_fulfillments",
    "synthetic_conversions",
    "disputes",
];

/// Delete all data in the database. Only used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>) -> sqlx::Result<()> {
    for table in ALL_TABLES {
        ex.execute(format!("TRUNCATE {table} CASCADE;").as_str())
            .await?;
    }
    Ok(())
}

/// Like above but more ergonomic for tests that only hold a pool.
#[allow(non_snake_case)]
pub async fn clear_DANGER(pool: &PgPool) -> sqlx::Result<()> {
    let mut transaction = pool.begin().await?;
    clear_DANGER_(&mut transaction).await?;
    transaction.commit().await
}

pub fn is_duplicate_record_error(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use {super::*, sqlx::Connection};

    #[tokio::test]
    #[ignore]
    async fn postgres_clear() {
        let mut con = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut con = con.begin().await.unwrap();
        clear_DANGER_(&mut con).await.unwrap();
    }
}
