use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const SOURCE: &str = "courtside::http::response";
static REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tags the request with an id, reusing a caller-supplied `x-request-id`
/// when it is a plausible token, and echoes it on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty() && value.len() <= 64)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID.clone(), value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Logs every response. Handlers answer upstream failures with 200 and an
/// `error` field, so an attached [`ErrorReport`] counts as a failure too.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();
    let start = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let elapsed_ms = start.elapsed().as_millis();

    match response.extensions_mut().remove::<ErrorReport>() {
        None if status >= 500 => error!(
            target = SOURCE,
            status,
            method = %method,
            path = %path,
            elapsed_ms,
            request_id = %request_id,
            "request failed without a diagnostic",
        ),
        None => info!(
            target = SOURCE,
            status,
            method = %method,
            path = %path,
            elapsed_ms,
            request_id = %request_id,
            "request served",
        ),
        Some(report) => {
            let detail = report.messages.first().map(String::as_str).unwrap_or("");
            if status >= 500 {
                error!(
                    target = SOURCE,
                    status,
                    method = %method,
                    path = %path,
                    query = %query,
                    elapsed_ms,
                    source = report.source,
                    detail,
                    chain = ?report.messages,
                    request_id = %request_id,
                    "request failed",
                );
            } else {
                warn!(
                    target = SOURCE,
                    status,
                    cause = report.status.as_u16(),
                    method = %method,
                    path = %path,
                    query = %query,
                    elapsed_ms,
                    source = report.source,
                    detail,
                    request_id = %request_id,
                    "request answered with an error body",
                );
            }
        }
    }

    response
}
