//! Router tests that need no database.
//!
//! Each test drives the full middleware stack through `oneshot`.

#![allow(clippy::unwrap_used)]

use axum::{
    body::to_bytes,
    http::{Method, StatusCode, header},
    response::Response,
};
use serde_json::{Value, json};
use tower::ServiceExt;

use worktally_integration_tests::{TEST_APP_URL, request, test_app};

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_is_ok() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn test_readiness_reports_unreachable_database() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health/ready", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_security_headers_are_set() {
    let response = test_app()
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::REFERRER_POLICY], "no-referrer");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
}

#[tokio::test]
async fn test_request_id_is_generated_and_echoed() {
    let app = test_app();

    let response = app
        .clone()
        .oneshot(request(Method::GET, "/health", None))
        .await
        .unwrap();
    assert!(!response.headers()["x-request-id"].is_empty());

    let mut req = request(Method::GET, "/health", None);
    req.headers_mut()
        .insert("x-request-id", "req-from-proxy".parse().unwrap());
    let response = app.oneshot(req).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-from-proxy");
}

#[tokio::test]
async fn test_member_routes_require_login() {
    for (method, uri) in [
        (Method::GET, "/api/me"),
        (Method::GET, "/api/team"),
        (Method::POST, "/api/checkins"),
        (Method::GET, "/api/checkins/me"),
        (Method::GET, "/api/worklogs"),
        (Method::GET, "/api/issues?q=ABC"),
    ] {
        let response = test_app()
            .oneshot(request(method.clone(), uri, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
        assert_eq!(json_body(response).await["error"], "Not logged in");
    }
}

#[tokio::test]
async fn test_admin_routes_require_login() {
    for (method, uri) in [
        (Method::GET, "/api/admin/users"),
        (Method::GET, "/api/admin/organization"),
        (Method::GET, "/api/admin/stats?days=7"),
        (Method::DELETE, "/api/admin/users/1"),
    ] {
        let response = test_app()
            .oneshot(request(method.clone(), uri, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{method} {uri}");
    }
}

#[tokio::test]
async fn test_signup_rejects_invalid_input() {
    let cases = [
        json!({ "organization_name": "  ", "name": "Ada", "email": "ada@example.com" }),
        json!({ "organization_name": "Acme", "name": "", "email": "ada@example.com" }),
        json!({ "organization_name": "Acme", "name": "Ada", "email": "not-an-email" }),
    ];

    for body in cases {
        let response = test_app()
            .oneshot(request(Method::POST, "/api/signup", Some(body.clone())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        assert!(json_body(response).await["error"].is_string());
    }
}

#[tokio::test]
async fn test_signup_is_rate_limited() {
    let app = test_app();
    let body = json!({ "organization_name": "", "name": "Ada", "email": "ada@example.com" });

    let mut statuses = Vec::new();
    let mut limited = None;
    for _ in 0..8 {
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/signup", Some(body.clone())))
            .await
            .unwrap();
        statuses.push(response.status());
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            limited = Some(response);
        }
    }

    assert_eq!(statuses[0], StatusCode::BAD_REQUEST);
    let limited = limited.unwrap();
    assert!(limited.headers().contains_key(header::RETRY_AFTER));
    assert_eq!(json_body(limited).await["error"], "Too many requests");
}

#[tokio::test]
async fn test_oauth_callback_errors_redirect_to_login() {
    let cases = [
        ("/auth/jira/callback?error=access_denied", "jira_denied"),
        ("/auth/jira/callback?state=abc", "missing_code"),
        ("/auth/jira/signup", "invalid_invitation"),
    ];

    for (uri, code) in cases {
        let response = test_app()
            .oneshot(request(Method::GET, uri, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(
            response.headers()[header::LOCATION],
            format!("{TEST_APP_URL}/login?error={code}").as_str(),
            "{uri}"
        );
    }
}

#[tokio::test]
async fn test_cors_preflight_allows_frontend() {
    let mut req = request(Method::OPTIONS, "/api/me", None);
    req.headers_mut()
        .insert(header::ORIGIN, TEST_APP_URL.parse().unwrap());
    req.headers_mut()
        .insert(header::ACCESS_CONTROL_REQUEST_METHOD, "GET".parse().unwrap());

    let response = test_app().oneshot(req).await.unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        TEST_APP_URL
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = test_app()
        .oneshot(request(Method::GET, "/api/nope", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
