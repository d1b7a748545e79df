use axum::{
    body::{to_bytes, Body, Bytes, HttpBody},
    extract::Request,
    http::header::CONTENT_LENGTH,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

/// Bodies declared larger than this are passed through unlogged
const MAX_BODY_BYTES: usize = 1024 * 1024;
const MAX_LOGGED_CHARS: usize = 2000;
const X_REQUEST_ID: &str = "x-request-id";

/// Log each request and response with a shared request id.
///
/// The id comes from `x-request-id` when present. Bodies up to `MAX_BODY_BYTES`
/// are buffered so they can be logged, then handed on unchanged. Logging never
/// rejects a request; handlers own their error shapes.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let request_id = resolve_request_id(&request);
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let (mut parts, body) = request.into_parts();
    let request = if !exceeds_log_limit(&body) {
        let bytes = to_bytes(body, MAX_BODY_BYTES).await.unwrap_or_else(|e| {
            tracing::error!(request_id = %request_id, "Failed to read request body: {}", e);
            parts.headers.remove(CONTENT_LENGTH);
            Bytes::new()
        });

        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body = %loggable_body(&bytes),
            "→ Request"
        );
        Request::from_parts(parts, Body::from(bytes))
    } else {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            body_bytes = body.size_hint().lower(),
            "→ Request (body not logged)"
        );
        Request::from_parts(parts, body)
    };

    let response = next.run(request).await;

    let status = response.status();
    let (mut parts, body) = response.into_parts();
    if exceeds_log_limit(&body) {
        tracing::info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "← Response (body not logged)"
        );
        return Response::from_parts(parts, body);
    }

    let bytes = to_bytes(body, MAX_BODY_BYTES).await.unwrap_or_else(|e| {
        tracing::error!(request_id = %request_id, "Failed to read response body: {}", e);
        // The declared length no longer matches the empty body
        parts.headers.remove(CONTENT_LENGTH);
        Bytes::new()
    });

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = status.as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        body = %loggable_body(&bytes),
        "← Response"
    );

    Response::from_parts(parts, Body::from(bytes))
}

/// Known to be larger than `MAX_BODY_BYTES`; unknown sizes are still buffered
fn exceeds_log_limit(body: &Body) -> bool {
    body.size_hint().lower() > MAX_BODY_BYTES as u64
}

fn resolve_request_id(request: &Request) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn loggable_body(bytes: &[u8]) -> String {
    truncate_body(String::from_utf8_lossy(bytes).trim(), MAX_LOGGED_CHARS)
}

/// Cut `body` to at most `max_chars` characters, noting the original size
fn truncate_body(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        None => body.to_string(),
        Some((cut, _)) => format!(
            "{}...[truncated, {} bytes total]",
            &body[..cut],
            body.len()
        ),
    }
}
