//! Maps the engine's error taxonomy onto the HTTP surface: `{success,
//! data?, error?}`, with a stable `errorCode` tag per variant.

use {
    axum::{Json, http::StatusCode, response::IntoResponse},
    engine::{ConversionError, CorridorError, OrderError},
    serde::Serialize,
};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing required field: {0}")]
    Validation(&'static str),
    #[error("missing x-actor-type/x-actor-id headers")]
    MissingActor,
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Corridor(#[from] CorridorError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Serialize)]
struct Envelope {
    success: bool,
    error: ErrorBody,
}

fn reply(status: StatusCode, code: &'static str, message: String) -> axum::response::Response {
    (status, Json(Envelope { success: false, error: ErrorBody { code, message } })).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let message = self.to_string();
        match self {
            Self::Validation(_) => reply(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),
            Self::MissingActor => reply(StatusCode::UNAUTHORIZED, "MISSING_ACTOR", message),

            Self::Order(OrderError::NotFound(_)) => reply(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            Self::Order(OrderError::InvalidTransition(_)) => reply(StatusCode::BAD_REQUEST, "INVALID_TRANSITION", message),
            Self::Order(OrderError::NoDebitRecord) => reply(StatusCode::BAD_REQUEST, "NO_DEBIT_RECORD", message),
            Self::Order(OrderError::MaxExtensionsReached) => reply(StatusCode::BAD_REQUEST, "MAX_EXTENSIONS_REACHED", message),
            Self::Order(OrderError::InsufficientBalance) => reply(StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE", message),
            Self::Order(OrderError::InsufficientLiquidity) => {
                reply(StatusCode::CONFLICT, "INSUFFICIENT_LIQUIDITY", message)
            }
            Self::Order(OrderError::AlreadyEscrowed) => reply(StatusCode::CONFLICT, "ALREADY_ESCROWED", message),
            Self::Order(OrderError::OrderStatusChanged) => reply(StatusCode::CONFLICT, "ORDER_STATUS_CHANGED", message),
            Self::Order(OrderError::NotAuthorized) => reply(StatusCode::FORBIDDEN, "NOT_AUTHORIZED", message),
            Self::Order(OrderError::ReleaseInvariantFailed(_)) => {
                tracing::error!(%message, "release invariant failed");
                reply(StatusCode::INTERNAL_SERVER_ERROR, "ORDER_RELEASE_INVARIANT_FAILED", message)
            }
            Self::Order(OrderError::RefundInvariantFailed(_)) => {
                tracing::error!(%message, "refund invariant failed");
                reply(StatusCode::INTERNAL_SERVER_ERROR, "ORDER_REFUND_INVARIANT_FAILED", message)
            }
            Self::Order(OrderError::Database(err)) => {
                tracing::error!(?err, "database error");
                reply(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "internal error".into())
            }

            Self::Corridor(CorridorError::OrderNotFound(_)) => reply(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            Self::Corridor(CorridorError::FulfillmentNotFound(_)) => reply(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            Self::Corridor(CorridorError::BuyerNotFound) => reply(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            Self::Corridor(CorridorError::NoLpAvailable) => reply(StatusCode::CONFLICT, "NO_LP_AVAILABLE", message),
            Self::Corridor(CorridorError::InsufficientSaed) => reply(StatusCode::BAD_REQUEST, "INSUFFICIENT_SAED", message),
            Self::Corridor(CorridorError::NotAuthorized) => reply(StatusCode::FORBIDDEN, "NOT_AUTHORIZED", message),
            Self::Corridor(CorridorError::InvalidFulfillmentState) => {
                reply(StatusCode::BAD_REQUEST, "INVALID_FULFILLMENT_STATE", message)
            }
            Self::Corridor(CorridorError::Database(err)) => {
                tracing::error!(?err, "database error");
                reply(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "internal error".into())
            }

            Self::Conversion(ConversionError::AccountNotFound) => reply(StatusCode::NOT_FOUND, "NOT_FOUND", message),
            Self::Conversion(ConversionError::InsufficientBalance) => {
                reply(StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE", message)
            }
            Self::Conversion(ConversionError::ExposureLimitExceeded) => {
                reply(StatusCode::BAD_REQUEST, "EXPOSURE_LIMIT_EXCEEDED", message)
            }
            Self::Conversion(ConversionError::Database(err)) => {
                tracing::error!(?err, "database error");
                reply(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "internal error".into())
            }
        }
    }
}
