/// Security headers middleware
///
/// Adds OWASP-recommended response headers to every response. The API only
/// serves JSON, so the content security policy forbids loading anything.
///
/// # Headers Applied
///
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options: DENY`
/// - `Referrer-Policy: no-referrer`
/// - `Permissions-Policy`: every powerful feature disabled
/// - `Content-Security-Policy: default-src 'none'; frame-ancestors 'none'`
/// - `Cache-Control: no-store` unless the handler set its own
/// - `Strict-Transport-Security` (production only)
///
/// # Example
///
/// ```no_run
/// use axum::{extract::Request, middleware::{self, Next}, Router};
/// use tallyboard_api::middleware::security::security_headers;
///
/// let production = true;
/// let app: Router = Router::new().layer(middleware::from_fn(move |req: Request, next: Next| {
///     security_headers(production, req, next)
/// }));
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

const PERMISSIONS_POLICY: &str =
    "geolocation=(), microphone=(), camera=(), payment=(), usb=(), interest-cohort=()";

/// Runs the request, then sets the security headers on the response
pub async fn security_headers(enable_hsts: bool, request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(
        "Permissions-Policy",
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
    );

    if !headers.contains_key(header::CACHE_CONTROL) {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    }

    if enable_hsts {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::StatusCode,
        middleware,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn app(enable_hsts: bool) -> Router {
        async fn handler() -> impl IntoResponse {
            (StatusCode::OK, "test")
        }

        async fn cached() -> impl IntoResponse {
            ([(header::CACHE_CONTROL, "max-age=60")], "cached")
        }

        Router::new()
            .route("/test", get(handler))
            .route("/cached", get(cached))
            .layer(middleware::from_fn(move |req: Request, next: Next| {
                security_headers(enable_hsts, req, next)
            }))
    }

    async fn get_headers(enable_hsts: bool, uri: &str) -> axum::http::HeaderMap {
        let response = app(enable_hsts)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        response.headers().clone()
    }

    #[tokio::test]
    async fn test_security_headers_applied() {
        let headers = get_headers(false, "/test").await;

        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(headers.get("Referrer-Policy").unwrap(), "no-referrer");
        assert_eq!(headers.get("Cache-Control").unwrap(), "no-store");
        assert!(headers.get("Content-Security-Policy").is_some());
        assert!(headers.get("Permissions-Policy").is_some());
    }

    #[tokio::test]
    async fn test_handler_cache_control_kept() {
        let headers = get_headers(false, "/cached").await;
        assert_eq!(headers.get("Cache-Control").unwrap(), "max-age=60");
    }

    #[tokio::test]
    async fn test_hsts_only_in_production() {
        assert!(get_headers(true, "/test").await.get("Strict-Transport-Security").is_some());
        assert!(get_headers(false, "/test").await.get("Strict-Transport-Security").is_none());
    }
}
