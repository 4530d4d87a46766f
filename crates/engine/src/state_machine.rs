//! Pure, in-memory order lifecycle rules. Nothing in this module touches the
//! store or the clock; every function is a total, side-effect-free mapping
//! from inputs to a verdict, which is what lets [`crate::order_engine`] call
//! it inside a held row lock without extending the critical section.

use database::types::{ActorType, OrderStatus};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{from:?} -> {to:?} is not a reachable transition")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("{0:?} is a transient status and may not be written; did you mean {1:?}?")]
    TransientTarget(OrderStatus, OrderStatus),
    #[error("only the system actor may drive an order to expired")]
    OnlySystemMayExpire,
    #[error("actor is not a party to this order")]
    ActorNotAParty,
    #[error("a merchant may not accept their own order unless it is explicitly M2M")]
    MerchantCannotAcceptOwnOrder,
    #[error("cannot complete an order with an open escrow debit that was never released")]
    CannotCompleteWithoutRelease,
}

/// Extra facts about the order and caller that the DAG alone can't encode.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext {
    pub order_user_id: uuid::Uuid,
    pub order_merchant_id: uuid::Uuid,
    pub order_buyer_merchant_id: Option<uuid::Uuid>,
    pub escrow_tx_hash_set: bool,
    pub release_tx_hash_set: bool,
    pub is_m2m: bool,
    pub actor_type: ActorType,
    pub actor_id: Option<uuid::Uuid>,
}

/// Edges of the status DAG, independent of actor. `to` values here are
/// always settled (non-transient) statuses; transient targets are rejected
/// before this table is even consulted.
const EDGES: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Accepted),
    (OrderStatus::Pending, OrderStatus::Cancelled),
    (OrderStatus::Pending, OrderStatus::Expired),
    (OrderStatus::Accepted, OrderStatus::Escrowed),
    (OrderStatus::Accepted, OrderStatus::Cancelled),
    (OrderStatus::Accepted, OrderStatus::Expired),
    (OrderStatus::Escrowed, OrderStatus::PaymentSent),
    (OrderStatus::Escrowed, OrderStatus::Disputed),
    (OrderStatus::Escrowed, OrderStatus::Cancelled),
    (OrderStatus::PaymentSent, OrderStatus::PaymentConfirmed),
    (OrderStatus::PaymentSent, OrderStatus::Disputed),
    (OrderStatus::PaymentConfirmed, OrderStatus::Completed),
    (OrderStatus::PaymentConfirmed, OrderStatus::Disputed),
    (OrderStatus::Disputed, OrderStatus::Completed),
    (OrderStatus::Disputed, OrderStatus::Cancelled),
];

/// `validateTransition(from, to, actor)` from the design: encodes the DAG
/// plus the actor-role constraints a caller must satisfy to drive it.
pub fn validate_transition(
    from: OrderStatus,
    to: OrderStatus,
    ctx: &TransitionContext,
) -> Result<(), TransitionError> {
    if to.is_transient() {
        return Err(TransitionError::TransientTarget(to, to.normalize()));
    }
    if from == to {
        // Acceptance does not regress an already-escrowed order; treat as a
        // no-op success rather than a DAG violation.
        if to == OrderStatus::Escrowed {
            return Ok(());
        }
        return Err(TransitionError::InvalidTransition { from, to });
    }
    if !EDGES.contains(&(from, to)) {
        return Err(TransitionError::InvalidTransition { from, to });
    }
    if to == OrderStatus::Expired && ctx.actor_type != ActorType::System {
        return Err(TransitionError::OnlySystemMayExpire);
    }
    if to == OrderStatus::Accepted {
        let is_party = ctx.actor_id == Some(ctx.order_user_id)
            || ctx.actor_id == Some(ctx.order_merchant_id)
            || ctx.actor_id == ctx.order_buyer_merchant_id;
        if !is_party {
            return Err(TransitionError::ActorNotAParty);
        }
        if ctx.actor_type == ActorType::Merchant
            && ctx.actor_id == Some(ctx.order_merchant_id)
            && !ctx.is_m2m
        {
            return Err(TransitionError::MerchantCannotAcceptOwnOrder);
        }
    }
    if to == OrderStatus::Completed && ctx.escrow_tx_hash_set && !ctx.release_tx_hash_set {
        return Err(TransitionError::CannotCompleteWithoutRelease);
    }
    Ok(())
}

pub fn is_transient_status(status: OrderStatus) -> bool {
    status.is_transient()
}

pub fn normalize_status(status: OrderStatus) -> OrderStatus {
    status.normalize()
}

/// `getTransitionEventType(from, to)`: the canonical outbox/audit event name
/// for a transition, e.g. `status_changed_to_escrowed`.
pub fn transition_event_type(to: OrderStatus) -> String {
    format!("status_changed_to_{}", to.normalize().as_str())
}

/// True when cancelling or expiring out of a state that had consumed offer
/// liquidity and had not yet reached a terminal settlement that consumed it
/// for good (i.e. `completed`).
pub fn should_restore_liquidity(from: OrderStatus, to: OrderStatus) -> bool {
    matches!(to, OrderStatus::Cancelled | OrderStatus::Expired) && from != OrderStatus::Completed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TransitionContext {
        TransitionContext {
            order_user_id: uuid::Uuid::new_v4(),
            order_merchant_id: uuid::Uuid::new_v4(),
            order_buyer_merchant_id: None,
            escrow_tx_hash_set: false,
            release_tx_hash_set: false,
            is_m2m: false,
            actor_type: ActorType::User,
            actor_id: None,
        }
    }

    #[test]
    fn rejects_transient_target() {
        let err = validate_transition(OrderStatus::Pending, OrderStatus::EscrowPending, &ctx());
        assert_eq!(err, Err(TransitionError::TransientTarget(OrderStatus::EscrowPending, OrderStatus::Escrowed)));
    }

    #[test]
    fn only_system_expires() {
        let mut c = ctx();
        c.actor_type = ActorType::User;
        let err = validate_transition(OrderStatus::Pending, OrderStatus::Expired, &c);
        assert_eq!(err, Err(TransitionError::OnlySystemMayExpire));

        c.actor_type = ActorType::System;
        assert!(validate_transition(OrderStatus::Pending, OrderStatus::Expired, &c).is_ok());
    }

    #[test]
    fn acceptance_does_not_regress_escrowed() {
        let mut c = ctx();
        c.actor_id = Some(c.order_user_id);
        assert!(validate_transition(OrderStatus::Escrowed, OrderStatus::Accepted, &c).is_err());
        // Same-status re-acceptance of an escrowed order is a no-op success.
        assert_eq!(validate_transition(OrderStatus::Escrowed, OrderStatus::Escrowed, &c), Ok(()));
    }

    #[test]
    fn merchant_cannot_accept_own_order_unless_m2m() {
        let mut c = ctx();
        c.actor_type = ActorType::Merchant;
        c.actor_id = Some(c.order_merchant_id);
        assert_eq!(
            validate_transition(OrderStatus::Pending, OrderStatus::Accepted, &c),
            Err(TransitionError::MerchantCannotAcceptOwnOrder)
        );
        c.is_m2m = true;
        assert!(validate_transition(OrderStatus::Pending, OrderStatus::Accepted, &c).is_ok());
    }

    #[test]
    fn completion_requires_release_when_escrowed() {
        let mut c = ctx();
        c.escrow_tx_hash_set = true;
        c.release_tx_hash_set = false;
        assert_eq!(
            validate_transition(OrderStatus::PaymentConfirmed, OrderStatus::Completed, &c),
            Err(TransitionError::CannotCompleteWithoutRelease)
        );
        c.release_tx_hash_set = true;
        assert!(validate_transition(OrderStatus::PaymentConfirmed, OrderStatus::Completed, &c).is_ok());
    }

    #[test]
    fn should_restore_liquidity_matches_cancel_and_expire_not_completed() {
        assert!(should_restore_liquidity(OrderStatus::Escrowed, OrderStatus::Cancelled));
        assert!(should_restore_liquidity(OrderStatus::Pending, OrderStatus::Expired));
        assert!(!should_restore_liquidity(OrderStatus::PaymentConfirmed, OrderStatus::Completed));
    }

    #[test]
    fn event_type_uses_normalized_status() {
        assert_eq!(transition_event_type(OrderStatus::Escrowed), "status_changed_to_escrowed");
    }
}
