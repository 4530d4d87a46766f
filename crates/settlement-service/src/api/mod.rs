//! The `/v1/*` JSON API and the `/ws/orders` live-update socket, plus
//! `/healthz` and `/metrics`. Routes are a thin translation layer: parse the
//! request, call into `engine`, map the result onto the envelope described
//! for the HTTP surface.

mod convert;
mod corridor;
mod error;
mod orders;
mod ws;

use {
    axum::{
        Json, Router,
        http::{HeaderMap, StatusCode},
        response::{IntoResponse, Response},
        routing::{get, patch, post},
    },
    database::types::ActorType,
    engine::{CorridorEngine, OrderEngine, SubscriptionFabric},
    error::ApiError,
    observe::distributed_tracing::tracing_axum::{make_span, record_trace_id},
    serde::Serialize,
    sqlx::PgPool,
    std::sync::Arc,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub order_engine: OrderEngine,
    pub corridor_engine: CorridorEngine,
    pub fabric: SubscriptionFabric,
    pub mock_mode: bool,
}

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

fn ok<T: Serialize>(status: StatusCode, data: T) -> Response {
    (status, Json(Envelope { success: true, data })).into_response()
}

/// Parses the `x-actor-type` / `x-actor-id` headers the finalization and
/// dispute routes key authorization on.
fn actor_headers(headers: &HeaderMap) -> Result<(ActorType, uuid::Uuid), ApiError> {
    let actor_type = headers
        .get("x-actor-type")
        .and_then(|v| v.to_str().ok())
        .and_then(parse_actor_type)
        .ok_or(ApiError::MissingActor)?;
    let actor_id = headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| uuid::Uuid::parse_str(s).ok())
        .ok_or(ApiError::MissingActor)?;
    Ok((actor_type, actor_id))
}

fn parse_actor_type(raw: &str) -> Option<ActorType> {
    match raw.to_ascii_lowercase().as_str() {
        "user" => Some(ActorType::User),
        "merchant" => Some(ActorType::Merchant),
        "system" => Some(ActorType::System),
        _ => None,
    }
}

pub fn router(state: AppState, cors_origin: Option<String>) -> Router {
    let app = Router::new()
        .route("/v1/orders/{id}", get(orders::get_order).patch(orders::patch_order).delete(orders::delete_order))
        .route("/v1/orders", post(orders::create_order))
        .route("/v1/merchant/orders", post(orders::create_merchant_order))
        .route("/v1/orders/{id}/events", post(orders::post_event))
        .route("/v1/orders/{id}/escrow", post(orders::post_escrow))
        .route("/v1/orders/{id}/dispute", post(orders::post_dispute))
        .route("/v1/orders/{id}/dispute/confirm", post(orders::post_dispute_confirm))
        .route("/v1/orders/expire", post(orders::post_expire))
        .route("/v1/corridor/match", post(corridor::post_match))
        .route("/v1/corridor/fulfillments/{id}", patch(corridor::patch_fulfillment))
        .route("/v1/corridor/fulfillments", get(corridor::get_fulfillments))
        .route("/v1/corridor/providers", get(corridor::get_providers).post(corridor::post_provider))
        .route("/v1/corridor/availability", get(corridor::get_availability))
        .route("/v1/convert/usdt-to-sinr", post(convert::usdt_to_sinr))
        .route("/v1/convert/sinr-to-usdt", post(convert::sinr_to_usdt))
        .route("/ws/orders", get(ws::handler))
        .with_state(Arc::new(state));

    let app = match cors_origin {
        Some(origin) => app.layer(cors_layer(origin)),
        None => app,
    };

    app.layer(axum::middleware::from_fn(|req, next: axum::middleware::Next| async move {
        let req = record_trace_id(req);
        next.run(req).await
    }))
    .layer(tower_http::trace::TraceLayer::new_for_http().make_span_with(make_span))
}

fn cors_layer(origin: String) -> tower_http::cors::CorsLayer {
    use tower_http::cors::CorsLayer;
    match origin.as_str() {
        "*" => CorsLayer::permissive(),
        other => CorsLayer::new()
            .allow_origin(other.parse::<axum::http::HeaderValue>().expect("valid CORS origin"))
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    }
}
