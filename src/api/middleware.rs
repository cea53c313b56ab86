//! Cross-cutting layers for the REST router

use crate::api::error::ApiError;
use crate::crypto::is_lower_hex;
use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tower_http::set_header::SetResponseHeaderLayer;

/// One access-log line per request
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let response = next.run(req).await;

    log::info!(
        "{} {} -> {} ({}ms)",
        method,
        target,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

/// Let `/blocks/{hash}` match only `[a-f0-9]+` segments, for every method
///
/// A miss gets the same response as an unknown route.
pub async fn require_block_hash(req: Request, next: Next) -> Response {
    let hash = req.uri().path().rsplit('/').next().unwrap_or_default();
    if is_lower_hex(hash) {
        next.run(req).await
    } else {
        ApiError::no_route(req.method(), req.uri().path()).into_response()
    }
}

/// Stamp `Content-Type: application/json` on every response
pub fn json_content_type() -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    )
}
