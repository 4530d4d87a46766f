use {
    super::{AppState, error::ApiError, ok},
    axum::{
        Json,
        extract::{Path, Query, State},
        http::StatusCode,
        response::Response,
    },
    bigdecimal::BigDecimal,
    chrono::Utc,
    database::{corridor_fulfillments, corridor_providers, types::EntityType},
    serde::{Deserialize, Serialize},
    std::sync::Arc,
};

#[derive(Deserialize)]
pub struct MatchRequest {
    pub order_id: uuid::Uuid,
    pub buyer_entity_type: EntityType,
    pub buyer_entity_id: uuid::Uuid,
    pub fiat_fils: BigDecimal,
}

pub async fn post_match(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MatchRequest>,
) -> Result<Response, ApiError> {
    let input = engine::corridor_engine::MatchInput {
        order_id: req.order_id,
        buyer_entity_type: req.buyer_entity_type,
        buyer_entity_id: req.buyer_entity_id,
        fiat_fils: req.fiat_fils,
    };
    let fulfillment_id = uuid::Uuid::new_v4();
    let fulfillment = state.corridor_engine.match_order(fulfillment_id, input, Utc::now()).await?;
    state.order_engine.attach_corridor(req.order_id, fulfillment.id).await?;
    Ok(ok(StatusCode::CREATED, fulfillment))
}

#[derive(Deserialize)]
pub struct PatchFulfillmentRequest {
    pub actor_merchant_id: uuid::Uuid,
}

pub async fn patch_fulfillment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<PatchFulfillmentRequest>,
) -> Result<Response, ApiError> {
    let fulfillment = state.corridor_engine.mark_payment_sent(id, req.actor_merchant_id, Utc::now()).await?;
    Ok(ok(StatusCode::OK, fulfillment))
}

#[derive(Deserialize)]
pub struct FulfillmentsQuery {
    pub provider_merchant_id: uuid::Uuid,
}

pub async fn get_fulfillments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FulfillmentsQuery>,
) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(engine::CorridorError::Database)?;
    let fulfillments = corridor_fulfillments::for_provider_active(&mut conn, query.provider_merchant_id)
        .await
        .map_err(engine::CorridorError::Database)?;
    Ok(ok(StatusCode::OK, fulfillments))
}

pub async fn get_providers(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(engine::CorridorError::Database)?;
    let providers = corridor_providers::list(&mut conn).await.map_err(engine::CorridorError::Database)?;
    Ok(ok(StatusCode::OK, providers))
}

#[derive(Deserialize)]
pub struct UpsertProviderRequest {
    pub merchant_id: uuid::Uuid,
    pub name: String,
    pub fee_percentage: BigDecimal,
    #[serde(default = "default_rating")]
    pub rating: BigDecimal,
    pub available_saed: BigDecimal,
    pub min_order_saed: BigDecimal,
    pub max_order_saed: BigDecimal,
    #[serde(default = "default_active")]
    pub active: bool,
    pub service_hours_start: Option<i16>,
    pub service_hours_end: Option<i16>,
}

fn default_active() -> bool {
    true
}

fn default_rating() -> BigDecimal {
    BigDecimal::from(0)
}

pub async fn post_provider(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpsertProviderRequest>,
) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(engine::CorridorError::Database)?;
    let provider = corridor_providers::upsert(
        &mut conn,
        uuid::Uuid::new_v4(),
        req.merchant_id,
        &req.name,
        &req.fee_percentage,
        &req.rating,
        &req.available_saed,
        &req.min_order_saed,
        &req.max_order_saed,
        req.active,
        req.service_hours_start,
        req.service_hours_end,
        Utc::now(),
    )
    .await
    .map_err(engine::CorridorError::Database)?;
    Ok(ok(StatusCode::CREATED, provider))
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub merchant_id: uuid::Uuid,
    pub amount: BigDecimal,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub eligible_count: usize,
    pub cheapest_fee_percentage: Option<BigDecimal>,
}

pub async fn get_availability(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Response, ApiError> {
    let mut conn = state.pool.acquire().await.map_err(engine::CorridorError::Database)?;
    let providers = corridor_providers::available_for(&mut conn, &query.amount, Some(query.merchant_id))
        .await
        .map_err(engine::CorridorError::Database)?;
    let now = Utc::now();
    let eligible = providers.into_iter().filter(|p| p.in_service_hours(now));
    let mut eligible_count = 0usize;
    let mut cheapest_fee_percentage = None;
    for provider in eligible {
        if cheapest_fee_percentage.is_none() {
            cheapest_fee_percentage = Some(provider.fee_percentage.clone());
        }
        eligible_count += 1;
    }
    Ok(ok(StatusCode::OK, AvailabilityResponse { eligible_count, cheapest_fee_percentage }))
}
