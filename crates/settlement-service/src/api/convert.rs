use {
    super::{AppState, error::ApiError, ok},
    axum::{Json, extract::State, http::StatusCode, response::Response},
    bigdecimal::BigDecimal,
    chrono::Utc,
    database::types::EntityType,
    engine::conversion::{self, ConversionDirection, ConvertInput},
    serde::Deserialize,
    std::sync::Arc,
};

#[derive(Deserialize)]
pub struct ConvertRequest {
    pub entity_type: EntityType,
    pub entity_id: uuid::Uuid,
    pub order_id: uuid::Uuid,
    pub amount: BigDecimal,
    pub rate: BigDecimal,
    pub idempotency_key: Option<uuid::Uuid>,
}

async fn convert(state: Arc<AppState>, req: ConvertRequest, direction: ConversionDirection) -> Result<Response, ApiError> {
    let id = req.idempotency_key.unwrap_or_else(uuid::Uuid::new_v4);
    let input = ConvertInput {
        entity_type: req.entity_type,
        entity_id: req.entity_id,
        order_id: req.order_id,
        direction,
        amount: req.amount,
        rate: req.rate,
        idempotency_key: req.idempotency_key,
    };
    let mut tx = state.pool.begin().await.map_err(engine::ConversionError::Database)?;
    let outcome = conversion::convert(&mut tx, id, input, Utc::now()).await?;
    tx.commit().await.map_err(engine::ConversionError::Database)?;
    Ok(ok(StatusCode::OK, outcome_body(outcome)))
}

#[derive(serde::Serialize)]
struct ConvertResponse {
    conversion_id: uuid::Uuid,
    from_amount: BigDecimal,
    to_amount: BigDecimal,
    replayed: bool,
}

fn outcome_body(outcome: conversion::ConvertOutcome) -> ConvertResponse {
    ConvertResponse {
        conversion_id: outcome.conversion_id,
        from_amount: outcome.from_amount,
        to_amount: outcome.to_amount,
        replayed: outcome.replayed,
    }
}

pub async fn usdt_to_sinr(State(state): State<Arc<AppState>>, Json(req): Json<ConvertRequest>) -> Result<Response, ApiError> {
    convert(state, req, ConversionDirection::UsdtToSaed).await
}

pub async fn sinr_to_usdt(State(state): State<Arc<AppState>>, Json(req): Json<ConvertRequest>) -> Result<Response, ApiError> {
    convert(state, req, ConversionDirection::SaedToUsdt).await
}
