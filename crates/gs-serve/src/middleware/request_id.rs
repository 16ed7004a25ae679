use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use ulid::Ulid;

pub const HEADER_NAME: &str = "x-request-id";

pub fn header_name() -> HeaderName {
    HeaderName::from_static(HEADER_NAME)
}

/// Issues `req_<ulid>` for requests that arrive without an id.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&format!("req_{}", Ulid::new()))
            .ok()
            .map(RequestId::new)
    }
}

pub fn request_id_of(id: &RequestId) -> Option<String> {
    id.header_value().to_str().ok().map(str::to_string)
}

/// Span around one request. Every event logged while handling it, the
/// callback outcome included, carries the request id.
pub fn request_span(request: &Request<Body>) -> Span {
    let id = request
        .extensions()
        .get::<RequestId>()
        .and_then(request_id_of)
        .unwrap_or_default();
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = %id,
    )
}
