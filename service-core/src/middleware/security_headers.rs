use axum::{extract::Request, http::header, middleware::Next, response::IntoResponse};

/// Path prefix whose responses may be framed by the same origin (inline
/// attachment previews).
pub const INLINE_PREVIEW_PREFIX: &str = "/api/upload";

pub async fn security_headers_middleware(req: Request, next: Next) -> impl IntoResponse {
    let is_inline_preview = req.uri().path().starts_with(INLINE_PREVIEW_PREFIX);

    let mut response = next.run(req).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        header::HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        header::HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );

    if is_inline_preview {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static(
                "default-src 'none'; img-src 'self'; media-src 'self'; frame-ancestors 'self'",
            ),
        );
        headers.insert(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("SAMEORIGIN"),
        );
    } else {
        headers.insert(
            header::CONTENT_SECURITY_POLICY,
            header::HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        );
        headers.insert(
            header::X_FRAME_OPTIONS,
            header::HeaderValue::from_static("DENY"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use axum::{Router, body::Body, middleware::from_fn, routing::get};
    use tower::util::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/api/upload", get(|| async { "file" }))
            .route("/api/sales", get(|| async { "[]" }))
            .layer(from_fn(security_headers_middleware))
    }

    #[tokio::test]
    async fn attachment_previews_allow_same_origin_framing() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/upload?filename=a.pdf")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    }

    #[tokio::test]
    async fn api_routes_deny_framing() {
        let response = app()
            .oneshot(Request::builder().uri("/api/sales").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    }
}
