//! Signals fed into a merchant's or user's reputation score: completed
//! orders, cancellations, disputes lost, expiries attributable to one side.
//! Purely additive; scoring itself happens outside this crate.

use {
    chrono::{DateTime, Utc},
    crate::{OrderId, PgTransaction, types::EntityType},
    serde::Serialize,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct ReputationEvent {
    pub id: uuid::Uuid,
    pub entity_type: EntityType,
    pub entity_id: uuid::Uuid,
    pub order_id: Option<OrderId>,
    pub event_type: String,
    pub weight: i32,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    entity_type: EntityType,
    entity_id: uuid::Uuid,
    order_id: Option<OrderId>,
    event_type: &str,
    weight: i32,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO reputation_events (id, entity_type, entity_id, order_id, event_type, weight, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
    sqlx::query(QUERY)
        .bind(id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(order_id)
        .bind(event_type)
        .bind(weight)
        .bind(created_at)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}

pub async fn for_entity(
    ex: &mut PgTransaction<'_>,
    entity_type: EntityType,
    entity_id: uuid::Uuid,
) -> Result<Vec<ReputationEvent>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT * FROM reputation_events WHERE entity_type = $1 AND entity_id = $2 ORDER BY created_at ASC
    "#;
    sqlx::query_as(QUERY)
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(ex.deref_mut())
        .await
}
