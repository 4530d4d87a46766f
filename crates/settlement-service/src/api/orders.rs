use {
    super::{AppState, actor_headers, error::ApiError, ok},
    axum::{
        Json,
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        response::Response,
    },
    bigdecimal::BigDecimal,
    chrono::Utc,
    database::{
        orders::{self, NewOrder},
        types::{ActorType, DisputeResolutionKind, OrderStatus},
    },
    serde::Deserialize,
    std::sync::Arc,
};

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub order_number: String,
    pub user_id: uuid::Uuid,
    pub merchant_id: uuid::Uuid,
    pub buyer_merchant_id: Option<uuid::Uuid>,
    pub offer_id: uuid::Uuid,
    pub direction: database::types::Direction,
    pub payment_method: database::types::PaymentMethod,
    pub crypto_amount: BigDecimal,
    pub crypto_currency: String,
    pub fiat_amount: BigDecimal,
    pub fiat_currency: String,
    pub rate: BigDecimal,
    pub protocol_fee_percent: Option<BigDecimal>,
    pub protocol_fee_amount: Option<BigDecimal>,
    pub payment_details: Option<serde_json::Value>,
    #[serde(default)]
    pub escrow_tx_hash: Option<String>,
    #[serde(default = "default_extension_minutes")]
    pub extension_minutes: i32,
}

fn default_extension_minutes() -> i32 {
    30
}

impl From<CreateOrderRequest> for NewOrder {
    fn from(req: CreateOrderRequest) -> Self {
        NewOrder {
            order_number: req.order_number,
            user_id: req.user_id,
            merchant_id: req.merchant_id,
            buyer_merchant_id: req.buyer_merchant_id,
            offer_id: req.offer_id,
            direction: req.direction,
            payment_method: req.payment_method,
            crypto_amount: req.crypto_amount,
            crypto_currency: req.crypto_currency,
            fiat_amount: req.fiat_amount,
            fiat_currency: req.fiat_currency,
            rate: req.rate,
            protocol_fee_percent: req.protocol_fee_percent,
            protocol_fee_amount: req.protocol_fee_amount,
            payment_details: req.payment_details,
            escrow_tx_hash: req.escrow_tx_hash,
            extension_minutes: req.extension_minutes,
        }
    }
}

pub async fn get_order(State(state): State<Arc<AppState>>, Path(id): Path<uuid::Uuid>) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(engine::OrderError::Database)?;
    let order = orders::read(&mut conn, id).await.map_err(engine::OrderError::Database)?.ok_or(engine::OrderError::NotFound(id))?;
    Ok(ok(StatusCode::OK, order))
}

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    if req.order_number.is_empty() {
        return Err(ApiError::Validation("order_number"));
    }
    let order = state.order_engine.create(req.into(), Utc::now()).await?;
    Ok(ok(StatusCode::CREATED, order))
}

pub async fn create_merchant_order(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Response, ApiError> {
    if req.order_number.is_empty() {
        return Err(ApiError::Validation("order_number"));
    }
    let order = state.order_engine.create(req.into(), Utc::now()).await?;
    Ok(ok(StatusCode::CREATED, order))
}

#[derive(Deserialize)]
pub struct PatchOrderRequest {
    pub to: OrderStatus,
    pub actor_type: ActorType,
    pub actor_id: Option<uuid::Uuid>,
    pub reason: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn patch_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<PatchOrderRequest>,
) -> Result<Response, ApiError> {
    let order =
        state.order_engine.transition(id, req.to, req.actor_type, req.actor_id, req.reason, req.metadata, Utc::now()).await?;
    Ok(ok(StatusCode::OK, order))
}

#[derive(Deserialize)]
pub struct DeleteOrderQuery {
    pub actor_type: ActorType,
    pub actor_id: Option<uuid::Uuid>,
    pub reason: Option<String>,
}

/// Escrow-locked orders take the atomic refund path; anything earlier is a
/// plain cancellation transition.
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    Query(query): Query<DeleteOrderQuery>,
) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(engine::OrderError::Database)?;
    let current = orders::read(&mut conn, id).await.map_err(engine::OrderError::Database)?.ok_or(engine::OrderError::NotFound(id))?;
    drop(conn);

    let order = if current.escrow_tx_hash.is_some() {
        state.order_engine.cancel_with_refund(id, query.actor_type, query.actor_id, query.reason, Utc::now()).await?
    } else {
        state
            .order_engine
            .transition(id, OrderStatus::Cancelled, query.actor_type, query.actor_id, query.reason, None, Utc::now())
            .await?
    };
    Ok(ok(StatusCode::OK, order))
}

#[derive(Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum FinalizationEvent {
    Release { tx_hash: String },
    Refund { reason: Option<String> },
}

pub async fn post_event(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    headers: HeaderMap,
    Json(event): Json<FinalizationEvent>,
) -> Result<Response, ApiError> {
    let (actor_type, actor_id) = actor_headers(&headers)?;
    let order = match event {
        FinalizationEvent::Release { tx_hash } => {
            state.order_engine.release(id, tx_hash, state.mock_mode, Utc::now()).await?
        }
        FinalizationEvent::Refund { reason } => {
            state.order_engine.cancel_with_refund(id, actor_type, Some(actor_id), reason, Utc::now()).await?
        }
    };
    Ok(ok(StatusCode::OK, order))
}

#[derive(Deserialize)]
pub struct EscrowRequest {
    pub tx_hash: String,
    pub escrow_creator_wallet: Option<String>,
    pub escrow_program_address: Option<String>,
}

pub async fn post_escrow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<EscrowRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .order_engine
        .escrow_lock(id, req.tx_hash, req.escrow_creator_wallet, req.escrow_program_address, state.mock_mode, Utc::now())
        .await?;
    Ok(ok(StatusCode::OK, order))
}

#[derive(Deserialize)]
pub struct OpenDisputeRequest {
    pub raised_by_actor_type: ActorType,
    pub raised_by_actor_id: uuid::Uuid,
    pub reason: String,
}

pub async fn post_dispute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<OpenDisputeRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .order_engine
        .open_dispute(uuid::Uuid::new_v4(), id, req.raised_by_actor_type, req.raised_by_actor_id, req.reason, Utc::now())
        .await?;
    Ok(ok(StatusCode::CREATED, order))
}

#[derive(Deserialize)]
pub struct ConfirmDisputeRequest {
    pub dispute_id: uuid::Uuid,
    pub confirming_actor: ActorType,
    pub resolution: DisputeResolutionKind,
    pub user_split_percent: Option<BigDecimal>,
}

pub async fn post_dispute_confirm(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ConfirmDisputeRequest>,
) -> Result<Response, ApiError> {
    let order = state
        .order_engine
        .confirm_dispute(req.dispute_id, req.confirming_actor, req.resolution, req.user_split_percent, Utc::now())
        .await?;
    Ok(ok(StatusCode::OK, order))
}

#[derive(Deserialize)]
pub struct ExpireRequest {
    pub batch_size: Option<i64>,
}

#[derive(serde::Serialize)]
pub struct ExpireResponse {
    pub expired: usize,
}

pub async fn post_expire(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExpireRequest>,
) -> Result<Response, ApiError> {
    let batch_size = req.batch_size.unwrap_or(200);
    let expired =
        crate::workers::expiry::run_once(&state.pool, &state.order_engine, batch_size, Utc::now()).await?;
    Ok(ok(StatusCode::OK, ExpireResponse { expired }))
}
