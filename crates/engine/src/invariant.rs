//! Post-commit, read-only checks run after release and refund. These never
//! run inside the committing transaction: by the time they run, the money
//! has already moved, so a failure here is forensic, not preventive.

use {
    database::{PgTransaction, orders, types::OrderStatus},
    std::ops::DerefMut,
};

pub struct ReleaseExpectation {
    pub order_id: uuid::Uuid,
    pub expected_min_order_version: i64,
}

pub struct RefundExpectation {
    pub order_id: uuid::Uuid,
    pub expected_min_order_version: i64,
}

/// `status == completed`, `release_tx_hash` populated, `order_version` at
/// least the caller's expectation. Failures are logged as critical but not
/// surfaced to the caller: the on-chain release already happened.
pub async fn verify_release(
    ex: &mut PgTransaction<'_>,
    expectation: ReleaseExpectation,
) -> Result<bool, sqlx::Error> {
    let Some(order) = orders::read(ex.deref_mut(), expectation.order_id).await? else {
        tracing::error!(order_id = %expectation.order_id, code = "ORDER_RELEASE_INVARIANT_FAILED", "order missing at release verification");
        return Ok(false);
    };
    let ok = order.status == OrderStatus::Completed
        && order.release_tx_hash.is_some()
        && order.order_version >= expectation.expected_min_order_version;
    if !ok {
        tracing::error!(
            order_id = %expectation.order_id,
            status = ?order.status,
            release_tx_hash = ?order.release_tx_hash,
            order_version = order.order_version,
            code = "ORDER_RELEASE_INVARIANT_FAILED",
            "release invariant check failed"
        );
    }
    Ok(ok)
}

/// `status == cancelled`, `cancelled_at` populated, `order_version` at least
/// the caller's expectation. A failure here is escalated: surfaced to the
/// caller as a 500 `ORDER_REFUND_INVARIANT_FAILED` by the HTTP layer.
pub async fn verify_refund(
    ex: &mut PgTransaction<'_>,
    expectation: RefundExpectation,
) -> Result<bool, sqlx::Error> {
    let Some(order) = orders::read(ex.deref_mut(), expectation.order_id).await? else {
        tracing::error!(order_id = %expectation.order_id, code = "ORDER_REFUND_INVARIANT_FAILED", "order missing at refund verification");
        return Ok(false);
    };
    let ok = order.status == OrderStatus::Cancelled
        && order.cancelled_at.is_some()
        && order.order_version >= expectation.expected_min_order_version;
    if !ok {
        tracing::error!(
            order_id = %expectation.order_id,
            status = ?order.status,
            cancelled_at = ?order.cancelled_at,
            order_version = order.order_version,
            code = "ORDER_REFUND_INVARIANT_FAILED",
            "refund invariant check failed"
        );
    }
    Ok(ok)
}
