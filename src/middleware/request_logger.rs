use axum::{
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Logs each request and its outcome under a request id, honouring one
/// supplied by the caller.
pub async fn request_logger_middleware<B>(mut req: Request<B>, next: Next<B>) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let header_value = HeaderValue::from_str(&request_id).ok();

    let method = req.method().clone();
    let uri = req.uri().clone();
    let start = Instant::now();

    if let Some(value) = &header_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    tracing::info!(request_id = %request_id, method = %method, uri = %uri, "Incoming request");

    let mut response = next.run(req).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Outgoing response"
    );

    if let Some(value) = header_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::post, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/test", post(|| async { "ok" }))
            .layer(axum::middleware::from_fn(request_logger_middleware))
    }

    #[tokio::test]
    async fn adds_request_id() {
        let response = app()
            .oneshot(Request::builder().method("POST").uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn echoes_caller_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/test")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "abc-123");
    }
}
