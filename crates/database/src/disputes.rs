//! A dispute freezes its order in [`crate::types::OrderStatus::Disputed`]
//! until resolved; resolution decides whether escrow releases to the
//! merchant, refunds to the user, or splits.

use {
    chrono::{DateTime, Utc},
    crate::{DisputeId, OrderId, PgTransaction, types::ActorType, types::DisputeResolutionKind, types::DisputeStatus},
    serde::Serialize,
    std::ops::DerefMut,
};

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct Dispute {
    pub id: DisputeId,
    pub order_id: OrderId,
    pub raised_by_actor_type: ActorType,
    pub raised_by_actor_id: uuid::Uuid,
    pub reason: String,
    pub status: DisputeStatus,
    pub resolution: Option<DisputeResolutionKind>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

pub async fn insert(
    ex: &mut PgTransaction<'_>,
    id: DisputeId,
    order_id: OrderId,
    raised_by_actor_type: ActorType,
    raised_by_actor_id: uuid::Uuid,
    reason: &str,
    created_at: DateTime<Utc>,
) -> Result<Dispute, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO disputes (
    id, order_id, raised_by_actor_type, raised_by_actor_id, reason, status, created_at
)
VALUES ($1, $2, $3, $4, $5, 'open', $6)
RETURNING *
    "#;
    sqlx::query_as(QUERY)
        .bind(id)
        .bind(order_id)
        .bind(raised_by_actor_type)
        .bind(raised_by_actor_id)
        .bind(reason)
        .bind(created_at)
        .fetch_one(ex.deref_mut())
        .await
}

pub async fn lock_for_update(
    ex: &mut PgTransaction<'_>,
    id: DisputeId,
) -> Result<Option<Dispute>, sqlx::Error> {
    const QUERY: &str = "SELECT * FROM disputes WHERE id = $1 FOR UPDATE";
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex.deref_mut()).await
}

pub async fn open_for_order(
    ex: &mut PgTransaction<'_>,
    order_id: OrderId,
) -> Result<Option<Dispute>, sqlx::Error> {
    const QUERY: &str =
        "SELECT * FROM disputes WHERE order_id = $1 AND status != 'resolved' FOR UPDATE";
    sqlx::query_as(QUERY).bind(order_id).fetch_optional(ex.deref_mut()).await
}

pub async fn set_status(
    ex: &mut PgTransaction<'_>,
    id: DisputeId,
    status: DisputeStatus,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = "UPDATE disputes SET status = $2 WHERE id = $1";
    sqlx::query(QUERY).bind(id).bind(status).execute(ex.deref_mut()).await.map(|_| ())
}

pub async fn resolve(
    ex: &mut PgTransaction<'_>,
    id: DisputeId,
    resolution: DisputeResolutionKind,
    resolution_notes: Option<&str>,
    resolved_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE disputes
SET status = 'resolved', resolution = $2, resolution_notes = $3, resolved_at = $4
WHERE id = $1
    "#;
    sqlx::query(QUERY)
        .bind(id)
        .bind(resolution)
        .bind(resolution_notes)
        .bind(resolved_at)
        .execute(ex.deref_mut())
        .await
        .map(|_| ())
}
