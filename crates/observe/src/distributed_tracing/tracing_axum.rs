//! Glue between `tower_http::trace::TraceLayer` and our request-id
//! convention: every inbound request gets a short id, logged on the span
//! that wraps the whole request and echoed into the few log lines that
//! need to be correlated across the order lifecycle.

use {
    axum::{body::Body, extract::Request, http::Request as HttpRequest},
    tracing::Span,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Builds the [`tracing::Span`] `TraceLayer` opens for each request. Kept
/// deliberately thin: method, path and the request id, not headers or
/// bodies.
pub fn make_span(request: &HttpRequest<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %request_id,
    )
}

/// Stamps a request id onto the request before it reaches `make_span`,
/// generating one if the caller didn't supply `x-request-id`. Call this
/// from an `axum::middleware::from_fn` layer applied *inside* the
/// `TraceLayer` so the id it stamps is visible to `make_span`.
pub fn record_trace_id(mut request: Request) -> Request {
    if !request.headers().contains_key(REQUEST_ID_HEADER) {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = axum::http::HeaderValue::from_str(&id) {
            request.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
    }
    request
}
