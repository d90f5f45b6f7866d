//! Integration tests for Worktally.
//!
//! # Running Tests
//!
//! ```bash
//! # Router tests (no database needed)
//! cargo test -p worktally-integration-tests
//!
//! # Service tests against a throwaway database per test
//! DATABASE_URL=postgres://localhost/postgres cargo test -p worktally-integration-tests --test database -- --ignored
//!
//! # Live tests against a running server
//! WORKTALLY_TEST_URL=http://localhost:3000 cargo test -p worktally-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `router` - Drives the real router with `tower::ServiceExt::oneshot`
//!   over a lazily-connected pool that is never reached
//! - `database` - Auth and repository tests on `sqlx::test` databases with a
//!   `wiremock` Jira (`#[ignore]`d)
//! - `live` - HTTP tests against a running server (`#[ignore]`d)

use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request},
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;

use worktally_server::config::{JiraConfig, ServerConfig};
use worktally_server::state::AppState;

/// Frontend origin used by the test configuration.
pub const TEST_APP_URL: &str = "http://localhost:5173";

/// Configuration for router tests; nothing here is contacted.
#[must_use]
pub fn test_config() -> ServerConfig {
    ServerConfig {
        database_url: SecretString::from("postgres://worktally@127.0.0.1:1/worktally_test"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        app_url: TEST_APP_URL.to_string(),
        session_secret: SecretString::from("k3Jz9QpL2vX8mN4rT6wY1aB5cD7eF0gH"),
        invitation_ttl_days: 7,
        jira: JiraConfig {
            client_id: "worktally-test-client".to_string(),
            client_secret: SecretString::from("Zq8Lm3Xv1Tn6Rb9Wc4Yd"),
            auth_base: "http://127.0.0.1:1".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
        },
        email: None,
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Build the full application router over a pool that connects lazily.
///
/// Requests that reach the database fail fast since nothing listens on
/// the configured port.
///
/// # Panics
///
/// Panics if the database URL cannot be parsed.
#[must_use]
#[allow(clippy::expect_used)]
pub fn test_app() -> Router {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy("postgres://worktally@127.0.0.1:1/worktally_test")
        .expect("valid database URL");

    worktally_server::app(AppState::new(config, pool))
}

/// Build a request with a client IP header for the rate limiter.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn request(method: Method, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", "203.0.113.7");

    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("valid request")
}

/// Base URL of a running server for live tests.
#[must_use]
pub fn live_base_url() -> String {
    std::env::var("WORKTALLY_TEST_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}
