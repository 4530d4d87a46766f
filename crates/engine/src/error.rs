//! Error taxonomy shared by the order and corridor engines. Each variant
//! carries the `errorCode`-style tag the HTTP layer maps to a status code;
//! the mapping itself lives at that layer, not here.

use crate::state_machine::TransitionError;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(uuid::Uuid),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("offer does not have enough available liquidity for this amount")]
    InsufficientLiquidity,
    #[error("escrow is already locked for this order")]
    AlreadyEscrowed,
    #[error("order status changed since this operation was requested")]
    OrderStatusChanged,
    #[error("payer balance is insufficient to cover the escrow amount")]
    InsufficientBalance,
    #[error("this order never recorded an escrow debit to refund")]
    NoDebitRecord,
    #[error("extension_count has reached max_extensions for this order")]
    MaxExtensionsReached,
    #[error("actor is not authorized to perform this action")]
    NotAuthorized,
    #[error("release invariant check failed for order {0}")]
    ReleaseInvariantFailed(uuid::Uuid),
    #[error("refund invariant check failed for order {0}")]
    RefundInvariantFailed(uuid::Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CorridorError {
    #[error("order {0} not found")]
    OrderNotFound(uuid::Uuid),
    #[error("no liquidity provider is currently available for this amount")]
    NoLpAvailable,
    #[error("buyer balance record not found")]
    BuyerNotFound,
    #[error("buyer does not have enough sAED balance locked")]
    InsufficientSaed,
    #[error("fulfillment {0} not found")]
    FulfillmentNotFound(uuid::Uuid),
    #[error("actor is not the assigned provider for this fulfillment")]
    NotAuthorized,
    #[error("fulfillment is not in a state that accepts this transition")]
    InvalidFulfillmentState,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("account balance record not found")]
    AccountNotFound,
    #[error("insufficient balance for this conversion")]
    InsufficientBalance,
    #[error("conversion would exceed the account's exposure limit")]
    ExposureLimitExceeded,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
