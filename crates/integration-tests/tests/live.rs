//! Live tests against a running server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (`wt-cli migrate`)
//! - The server running (`cargo run -p worktally-server`)
//!
//! Run with: `cargo test -p worktally-integration-tests -- --ignored`

#![allow(clippy::unwrap_used)]

use reqwest::{Client, StatusCode, redirect::Policy};
use serde_json::{Value, json};

use worktally_integration_tests::live_base_url;

fn client() -> Client {
    Client::builder()
        .cookie_store(true)
        .redirect(Policy::none())
        .build()
        .unwrap()
}

fn unique_email(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}-{nanos}@example.com")
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_live_readiness() {
    let resp = client()
        .get(format!("{}/health/ready", live_base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_live_signup_then_duplicate_email() {
    let base_url = live_base_url();
    let email = unique_email("signup");
    let body = json!({
        "organization_name": "Live Test Org",
        "name": "Live Admin",
        "email": email,
    });

    let resp = client()
        .post(format!("{base_url}/api/signup"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["user"]["role"], "admin");
    assert_eq!(created["user"]["status"], "pending");
    let signup_url = created["signup_url"].as_str().unwrap();
    assert!(signup_url.contains("/auth/jira/signup?token="));

    let resp = client()
        .post(format!("{base_url}/api/signup"))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_live_signup_link_redirects_to_atlassian() {
    let base_url = live_base_url();
    let client = client();

    let created: Value = client
        .post(format!("{base_url}/api/signup"))
        .json(&json!({
            "organization_name": "Live Redirect Org",
            "name": "Live Admin",
            "email": unique_email("redirect"),
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .get(created["signup_url"].as_str().unwrap())
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()["location"].to_str().unwrap();
    assert!(location.contains("/authorize?"));
    assert!(location.contains("state="));
}

#[tokio::test]
#[ignore = "requires a running server"]
async fn test_live_logout_without_session() {
    let resp = client()
        .post(format!("{}/auth/logout", live_base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
