//! Request ID middleware for log correlation and request metrics.

use axum::{
    extract::{FromRequestParts, MatchedPath, Request},
    http::{HeaderMap, HeaderValue, request::Parts},
    middleware::Next,
    response::Response,
};
use std::{convert::Infallible, time::Instant};
use uuid::Uuid;

use crate::metrics;

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied ID that is propagated as-is
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation ID of the current request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// Reuse a sane client-supplied ID or generate a fresh UUID
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Attach a request ID, echo it in the response and record the request.
///
/// # Example
///
/// ```no_run
/// use axum::{Router, routing::get, middleware};
/// use ca_server::api::request_id::request_id_middleware;
///
/// # async fn example() {
/// let app: Router = Router::new()
///     .route("/", get(|| async { "Hello" }))
///     .layer(middleware::from_fn(request_id_middleware));
/// # }
/// ```
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_headers(request.headers());
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    request.extensions_mut().insert(request_id.clone());

    tracing::info!(
        request_id = %request_id.as_str(),
        method = %method,
        uri = %request.uri(),
        "Request started"
    );

    let started = Instant::now();
    let mut response = next.run(request).await;

    if let Ok(header_value) = HeaderValue::from_str(request_id.as_str()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let status = response.status();
    metrics::http_requests_total(method.as_str(), &path, status.as_u16());
    tracing::info!(
        request_id = %request_id.as_str(),
        status = %status,
        duration_ms = started.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

/// Axum extractor for request ID. Outside the middleware a fresh ID is generated.
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId::from_headers(&parts.headers)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_request_id_is_kept() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("test-id-123"));

        assert_eq!(RequestId::from_headers(&headers).as_str(), "test-id-123");
    }

    #[test]
    fn test_request_id_generated_when_missing() {
        let request_id = RequestId::from_headers(&HeaderMap::new());
        assert!(Uuid::parse_str(request_id.as_str()).is_ok());
    }

    #[test]
    fn test_oversized_request_id_replaced() {
        let mut headers = HeaderMap::new();
        let long = "x".repeat(MAX_REQUEST_ID_LEN + 1);
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(&long).unwrap());

        let request_id = RequestId::from_headers(&headers);
        assert!(Uuid::parse_str(request_id.as_str()).is_ok());
    }
}
