//! # Trace ID Middleware
//!
//! Honours an incoming `X-Trace-Id` header or generates a fresh id, runs the
//! request inside a span carrying it, exposes it to handlers as a
//! [`TraceId`] extension, and echoes it on the response.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info_span, Instrument};

use crate::constants::TRACE_ID_HEADER;
use crate::logging::new_trace_id;

/// Correlation id for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceId(pub String);

impl TraceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub async fn propagate_trace_id(mut request: Request, next: Next) -> Response {
    let trace_id = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_trace_id);

    request
        .extensions_mut()
        .insert(TraceId(trace_id.clone()));

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let mut response = async {
        debug!("Trace assigned for request");
        next.run(request).await
    }
    .instrument(span)
    .await;

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }

    response
}
