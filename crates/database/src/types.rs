//! Enumerations backed by Postgres types (`CREATE TYPE ... AS ENUM`).
//!
//! These are the wire types the store persists. The engine's state machine
//! works with the same enums directly rather than through a translation
//! layer: `OrderStatus` has no meaning independent of the row it lives on, so
//! splitting it into a "pure" and a "row" copy would just be two names for
//! one concept.

use serde::{Deserialize, Serialize};

/// Settled and transient order lifecycle states. `EscrowPending` and
/// `Releasing` are transient: [`crate::orders::insert_order`] and
/// [`crate::orders::update_status`] both reject them.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Escrowed,
    PaymentSent,
    PaymentConfirmed,
    Disputed,
    Completed,
    Cancelled,
    Expired,
    /// In-flight only; never committed.
    EscrowPending,
    /// In-flight only; never committed.
    Releasing,
}

impl OrderStatus {
    pub const TERMINAL: &'static [OrderStatus] =
        &[OrderStatus::Completed, OrderStatus::Cancelled, OrderStatus::Expired];

    pub fn is_terminal(self) -> bool {
        Self::TERMINAL.contains(&self)
    }

    pub fn is_transient(self) -> bool {
        matches!(self, Self::EscrowPending | Self::Releasing)
    }

    /// Collapses a transient status to the settled form it stands in for.
    pub fn normalize(self) -> Self {
        match self {
            Self::EscrowPending => Self::Escrowed,
            Self::Releasing => Self::Completed,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Escrowed => "escrowed",
            Self::PaymentSent => "payment_sent",
            Self::PaymentConfirmed => "payment_confirmed",
            Self::Disputed => "disputed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::EscrowPending => "escrow_pending",
            Self::Releasing => "releasing",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "actor_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    User,
    Merchant,
    System,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Bank,
    Cash,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_via", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentVia {
    Bank,
    SaedCorridor,
}

/// Who paid (or will be refunded) the escrow debit, or who owns a ledger
/// line / balance row. Same two kinds the whole platform deals in.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entity_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    User,
    Merchant,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ledger_entry_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    EscrowLock,
    EscrowRelease,
    EscrowRefund,
    CorridorSaedLock,
    CorridorSaedTransfer,
    SyntheticConversion,
    FeeDeduction,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "outbox_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Sent,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fulfillment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    Pending,
    PaymentSent,
    Completed,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    UserConfirmed,
    MerchantConfirmed,
    Resolved,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "dispute_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DisputeResolutionKind {
    User,
    Merchant,
    Split,
}
