//! Tests for cross-origin requests from the browser frontend.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{BACKEND_URL, FRONTEND_URL, access_cookie, create_test_app, create_user};
use step_journey::oauth::Providers;
use tower::ServiceExt;

fn preflight(uri: &str, origin: &str, method: &str) -> Request<Body> {
    Request::builder()
        .method("OPTIONS")
        .uri(uri)
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, method)
        .body(Body::empty())
        .unwrap()
}

fn header_str<'a, B>(response: &'a axum::http::Response<B>, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).map(|v| v.to_str().unwrap())
}

#[tokio::test]
async fn test_preflight_from_frontend_skips_auth() {
    let t = create_test_app(Providers::empty()).await;

    let response = t
        .app
        .oneshot(preflight("/api/v1/users/me", FRONTEND_URL, "GET"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(FRONTEND_URL)
    );
    assert_eq!(
        header_str(&response, header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
        Some("true")
    );
    let methods = header_str(&response, header::ACCESS_CONTROL_ALLOW_METHODS).unwrap();
    for method in ["GET", "POST", "OPTIONS", "PUT", "DELETE"] {
        assert!(methods.contains(method), "{}", methods);
    }
}

#[tokio::test]
async fn test_preflight_from_backend_origin_is_allowed() {
    let t = create_test_app(Providers::empty()).await;

    let response = t
        .app
        .oneshot(preflight("/api/v1/auth/logout", BACKEND_URL, "POST"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(BACKEND_URL)
    );
}

#[tokio::test]
async fn test_unknown_origin_is_not_echoed() {
    let t = create_test_app(Providers::empty()).await;

    let response = t
        .app
        .oneshot(preflight("/api/v1/users/me", "http://evil.test", "GET"))
        .await
        .unwrap();

    assert!(header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}

#[tokio::test]
async fn test_credentialed_request_from_frontend() {
    let t = create_test_app(Providers::empty()).await;
    let user = create_user(&t.db, "alice@example.com", "alice").await;

    let request = Request::builder()
        .uri("/api/v1/users/me")
        .header(header::ORIGIN, FRONTEND_URL)
        .header(header::COOKIE, access_cookie(&t.jwt, &user))
        .body(Body::empty())
        .unwrap();
    let response = t.app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, header::ACCESS_CONTROL_ALLOW_ORIGIN),
        Some(FRONTEND_URL)
    );
    assert_eq!(
        header_str(&response, header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
        Some("true")
    );
}
