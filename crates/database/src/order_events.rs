//! Append-only audit trail of every order transition. Distinct from the
//! outbox: this table is never drained, it is the permanent record used to
//! answer "what happened to this order and when."

use {
    chrono::{DateTime, Utc},
    crate::{OrderId, PgTransaction, types::ActorType},
    serde::Serialize,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct OrderEvent {
    pub id: uuid::Uuid,
    pub order_id: OrderId,
    pub event_type: String,
    pub actor_type: ActorType,
    pub actor_id: Option<uuid::Uuid>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    ex: &mut PgTransaction<'_>,
    id: uuid::Uuid,
    order_id: OrderId,
    event_type: &str,
    actor_type: ActorType,
    actor_id: Option<uuid::Uuid>,
    metadata: Option<&serde_json::Value>,
    created_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO order_events (id, order_id, event_type, actor_type, actor_id, metadata, created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7)
    "#;
    sqlx::query(QUERY)
        .bind(id)
        .bind(order_id)
        .bind(event_type)
        .bind(actor_type)
        .bind(actor_id)
        .bind(metadata)
        .bind(created_at)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}

pub async fn for_order(
    ex: &mut PgTransaction<'_>,
    order_id: OrderId,
) -> Result<Vec<OrderEvent>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM order_events WHERE order_id = $1 ORDER BY created_at ASC";
    sqlx::query_as(QUERY).bind(order_id).fetch_all(ex.deref_mut()).await
}
