//! Jira Cloud client: Atlassian OAuth 2.0 (3LO) and the REST API v3.
//!
//! # OAuth Flow
//!
//! 1. Generate authorization URL with `authorization_url()`
//! 2. Redirect the user to Atlassian's consent page
//! 3. Atlassian redirects back with an authorization code
//! 4. Exchange the code for tokens with `exchange_code()`
//! 5. Resolve the account (`current_account()`) and its sites
//!    (`accessible_resources()`)
//! 6. Call site-scoped endpoints under `/ex/jira/{cloud_id}`
//!
//! Issue picker results are cached with `moka` for 60 seconds.
//!
//! # Example
//!
//! ```rust,ignore
//! use worktally_server::jira::JiraClient;
//!
//! let client = JiraClient::new(&config.jira);
//! let url = client.authorization_url(&config.jira_redirect_uri(), &state);
//!
//! // After the OAuth callback
//! let token = client.exchange_code(&code, &config.jira_redirect_uri()).await?;
//! let sites = client.accessible_resources(&token.access_token).await?;
//! let issues = client.search_issues(&token.access_token, &sites[0].id, "deploy").await?;
//! ```

pub mod adf;
mod types;

pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use moka::future::Cache;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::json;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::JiraConfig;

/// OAuth scopes requested from Atlassian.
pub const SCOPES: &str = "read:jira-work write:jira-work read:jira-user read:me offline_access";

/// Format of the `started` field on worklogs.
const STARTED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const PICKER_PAGE_SIZE: u32 = 20;
const SEARCH_PAGE_SIZE: u32 = 100;
const MAX_SEARCH_PAGES: usize = 10;

/// Errors that can occur when talking to Jira.
#[derive(Debug, Error)]
pub enum JiraError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Jira answered with an error status.
    #[error("Jira API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Response could not be interpreted.
    #[error("parse error: {0}")]
    Parse(String),

    /// The access token was rejected.
    #[error("Jira rejected the access token")]
    Unauthorized,
}

/// Returns true if `key` looks like a Jira issue key (`PROJ-123`).
#[must_use]
pub fn is_issue_key(key: &str) -> bool {
    let Some((project, number)) = key.rsplit_once('-') else {
        return false;
    };

    let mut chars = project.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_uppercase());
    let rest_valid = project.len() >= 2
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');

    starts_with_letter
        && rest_valid
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

/// Quote a value for use inside a JQL string literal.
fn jql_quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Build the JQL for the issue picker.
fn picker_jql(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "assignee = currentUser() AND statusCategory != Done ORDER BY updated DESC"
            .to_string();
    }

    let upper = text.to_ascii_uppercase();
    if is_issue_key(&upper) {
        return format!(
            "key = {} OR text ~ {} ORDER BY updated DESC",
            jql_quote(&upper),
            jql_quote(text)
        );
    }

    format!("text ~ {} ORDER BY updated DESC", jql_quote(&format!("{text}*")))
}

/// Build the JQL listing issues the current user logged work on.
fn worklog_jql(from: NaiveDate, to: NaiveDate) -> String {
    format!(
        "worklogAuthor = currentUser() AND worklogDate >= \"{}\" AND worklogDate <= \"{}\"",
        from.format("%Y-%m-%d"),
        to.format("%Y-%m-%d")
    )
}

/// Short, non-reversible fingerprint of an access token for cache keys.
fn token_fingerprint(access_token: &str) -> String {
    let digest = Sha256::digest(access_token.as_bytes());
    hex::encode(digest.get(..8).unwrap_or_default())
}

fn parse_started(raw: &str) -> Result<DateTime<Utc>, JiraError> {
    DateTime::parse_from_str(raw, STARTED_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| JiraError::Parse(format!("invalid worklog start '{raw}': {e}")))
}

fn convert_worklog(issue_key: &str, raw: RawWorklog) -> Result<Worklog, JiraError> {
    let (author_account_id, author_name) = raw
        .author
        .map(|a| (a.account_id, a.display_name))
        .unwrap_or_default();

    Ok(Worklog {
        id: raw.id,
        issue_key: issue_key.to_string(),
        issue_summary: None,
        author_account_id,
        author_name,
        started: parse_started(&raw.started)?,
        time_spent_seconds: raw.time_spent_seconds,
        comment: raw
            .comment
            .as_ref()
            .map(adf::to_plain_text)
            .filter(|c| !c.is_empty()),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Jira Client
// ─────────────────────────────────────────────────────────────────────────────

/// Client for Atlassian OAuth and the Jira Cloud REST API.
///
/// Cheaply cloneable; all clones share the HTTP connection pool and cache.
#[derive(Clone)]
pub struct JiraClient {
    inner: Arc<JiraClientInner>,
}

struct JiraClientInner {
    client: reqwest::Client,
    auth_base: String,
    api_base: String,
    client_id: String,
    client_secret: SecretString,
    issue_cache: Cache<String, Vec<IssueSummary>>,
}

impl JiraClient {
    /// Create a new Jira client.
    #[must_use]
    pub fn new(config: &JiraConfig) -> Self {
        let issue_cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(60))
            .build();

        Self {
            inner: Arc::new(JiraClientInner {
                client: reqwest::Client::new(),
                auth_base: config.auth_base.clone(),
                api_base: config.api_base.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                issue_cache,
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // OAuth Flow
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate the Atlassian authorization URL.
    ///
    /// # Arguments
    ///
    /// * `redirect_uri` - The callback URL registered for the OAuth app
    /// * `state` - A random string stored in the session to prevent CSRF attacks
    #[must_use]
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?\
            audience=api.atlassian.com&\
            client_id={}&\
            scope={}&\
            redirect_uri={}&\
            state={}&\
            response_type=code&\
            prompt=consent",
            self.inner.auth_base,
            urlencoding::encode(&self.inner.client_id),
            urlencoding::encode(SCOPES),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns an error if the token exchange fails.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<JiraToken, JiraError> {
        let body = json!({
            "grant_type": "authorization_code",
            "client_id": self.inner.client_id,
            "client_secret": self.inner.client_secret.expose_secret(),
            "code": code,
            "redirect_uri": redirect_uri,
        });
        self.token_request(&body).await
    }

    /// Obtain a new access token from a refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails.
    #[instrument(skip_all)]
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<JiraToken, JiraError> {
        let body = json!({
            "grant_type": "refresh_token",
            "client_id": self.inner.client_id,
            "client_secret": self.inner.client_secret.expose_secret(),
            "refresh_token": refresh_token,
        });
        self.token_request(&body).await
    }

    async fn token_request(&self, body: &serde_json::Value) -> Result<JiraToken, JiraError> {
        let url = format!("{}/oauth/token", self.inner.auth_base);
        let response = self
            .inner
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .json(body)
            .send()
            .await?;

        let token: TokenResponse = Self::read_json(response).await?;
        Ok(token.into())
    }

    /// Get the Atlassian account behind an access token.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn current_account(&self, access_token: &str) -> Result<JiraAccount, JiraError> {
        let url = format!("{}/me", self.inner.api_base);
        self.get_json(access_token, &url).await
    }

    /// List the Jira sites an access token can reach.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn accessible_resources(
        &self,
        access_token: &str,
    ) -> Result<Vec<JiraSite>, JiraError> {
        let url = format!("{}/oauth/token/accessible-resources", self.inner.api_base);
        self.get_json(access_token, &url).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Issues
    // ─────────────────────────────────────────────────────────────────────────

    /// Search issues for the issue picker.
    ///
    /// Empty `text` lists open issues assigned to the current user; otherwise
    /// a key or free-text search runs. Results are cached for 60 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, access_token), fields(cloud_id = %cloud_id))]
    pub async fn search_issues(
        &self,
        access_token: &str,
        cloud_id: &str,
        text: &str,
    ) -> Result<Vec<IssueSummary>, JiraError> {
        let cache_key = format!(
            "issues:{cloud_id}:{}:{}",
            token_fingerprint(access_token),
            text.trim().to_lowercase()
        );

        if let Some(issues) = self.inner.issue_cache.get(&cache_key).await {
            debug!("Cache hit for issue search");
            return Ok(issues);
        }

        let page = self
            .search_page(access_token, cloud_id, &picker_jql(text), PICKER_PAGE_SIZE, None)
            .await?;
        let issues: Vec<IssueSummary> = page.issues.into_iter().map(Into::into).collect();

        self.inner.issue_cache.insert(cache_key, issues.clone()).await;
        Ok(issues)
    }

    /// List issues the current user logged work on between two dates (inclusive).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, access_token), fields(cloud_id = %cloud_id))]
    pub async fn issues_with_worklogs(
        &self,
        access_token: &str,
        cloud_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IssueSummary>, JiraError> {
        let jql = worklog_jql(from, to);
        let mut issues = Vec::new();
        let mut next_page: Option<String> = None;

        for _ in 0..MAX_SEARCH_PAGES {
            let page = self
                .search_page(access_token, cloud_id, &jql, SEARCH_PAGE_SIZE, next_page.as_deref())
                .await?;
            issues.extend(page.issues.into_iter().map(IssueSummary::from));

            match page.next_page_token {
                Some(token) => next_page = Some(token),
                None => break,
            }
        }

        Ok(issues)
    }

    async fn search_page(
        &self,
        access_token: &str,
        cloud_id: &str,
        jql: &str,
        max_results: u32,
        next_page_token: Option<&str>,
    ) -> Result<SearchResponse, JiraError> {
        let url = self.site_url(cloud_id, "/search/jql");
        let mut body = json!({
            "jql": jql,
            "fields": ["summary", "status"],
            "maxResults": max_results,
        });
        if let Some(token) = next_page_token {
            body["nextPageToken"] = json!(token);
        }

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(access_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        Self::read_json(response).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Worklogs
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch every worklog on an issue started within `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails or a worklog cannot be parsed.
    #[instrument(skip(self, access_token), fields(cloud_id = %cloud_id, issue_key = %issue_key))]
    pub async fn issue_worklogs(
        &self,
        access_token: &str,
        cloud_id: &str,
        issue_key: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Worklog>, JiraError> {
        let url = self.site_url(
            cloud_id,
            &format!("/issue/{}/worklog", urlencoding::encode(issue_key)),
        );
        let started_after = from.timestamp_millis();
        let started_before = to.timestamp_millis();

        let mut worklogs = Vec::new();
        let mut start_at: i64 = 0;

        loop {
            let page_url = format!(
                "{url}?startAt={start_at}&maxResults=5000&startedAfter={started_after}&startedBefore={started_before}"
            );
            let page: WorklogPage = self.get_json(access_token, &page_url).await?;

            let fetched = i64::try_from(page.worklogs.len()).unwrap_or(i64::MAX);
            for raw in page.worklogs {
                worklogs.push(convert_worklog(issue_key, raw)?);
            }

            start_at = page.start_at.saturating_add(fetched);
            if fetched == 0 || page.max_results == 0 || start_at >= page.total {
                break;
            }
        }

        Ok(worklogs)
    }

    /// Add a worklog to an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, access_token, worklog), fields(cloud_id = %cloud_id, issue_key = %issue_key))]
    pub async fn add_worklog(
        &self,
        access_token: &str,
        cloud_id: &str,
        issue_key: &str,
        worklog: &NewWorklog,
    ) -> Result<Worklog, JiraError> {
        let url = self.site_url(
            cloud_id,
            &format!("/issue/{}/worklog", urlencoding::encode(issue_key)),
        );

        let mut body = json!({
            "started": worklog.started.format(STARTED_FORMAT).to_string(),
            "timeSpentSeconds": worklog.time_spent_seconds,
        });
        if let Some(comment) = worklog.comment.as_deref().filter(|c| !c.trim().is_empty()) {
            body["comment"] = adf::from_plain_text(comment);
        }

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(access_token)
            .timeout(REQUEST_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let raw: RawWorklog = Self::read_json(response).await?;
        convert_worklog(issue_key, raw)
    }

    /// Delete a worklog.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self, access_token), fields(cloud_id = %cloud_id, issue_key = %issue_key))]
    pub async fn delete_worklog(
        &self,
        access_token: &str,
        cloud_id: &str,
        issue_key: &str,
        worklog_id: &str,
    ) -> Result<(), JiraError> {
        let url = self.site_url(
            cloud_id,
            &format!(
                "/issue/{}/worklog/{}",
                urlencoding::encode(issue_key),
                urlencoding::encode(worklog_id)
            ),
        );

        let response = self
            .inner
            .client
            .delete(&url)
            .bearer_auth(access_token)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Request helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn site_url(&self, cloud_id: &str, path: &str) -> String {
        format!(
            "{}/ex/jira/{}/rest/api/3{}",
            self.inner.api_base,
            urlencoding::encode(cloud_id),
            path
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        access_token: &str,
        url: &str,
    ) -> Result<T, JiraError> {
        let response = self
            .inner
            .client
            .get(url)
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        Self::read_json(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, JiraError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(JiraError::Unauthorized);
        }

        let message = response.text().await.unwrap_or_default();
        Err(JiraError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, JiraError> {
        let response = Self::check_status(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| JiraError::Parse(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client() -> JiraClient {
        JiraClient::new(&JiraConfig {
            client_id: "my client".to_string(),
            client_secret: SecretString::from("s3cr3t-Value"),
            auth_base: "https://auth.atlassian.com".to_string(),
            api_base: "https://api.atlassian.com".to_string(),
        })
    }

    #[test]
    fn test_is_issue_key() {
        assert!(is_issue_key("OPS-1"));
        assert!(is_issue_key("AB2_X-12345"));
        assert!(!is_issue_key("ops-1"));
        assert!(!is_issue_key("O-1"));
        assert!(!is_issue_key("1OPS-1"));
        assert!(!is_issue_key("OPS-"));
        assert!(!is_issue_key("OPS-12a"));
        assert!(!is_issue_key("OPS"));
    }

    #[test]
    fn test_authorization_url() {
        let url = client().authorization_url("http://localhost:3000/auth/jira/callback", "st4te");
        assert!(url.starts_with("https://auth.atlassian.com/authorize?"));
        assert!(url.contains("audience=api.atlassian.com"));
        assert!(url.contains("client_id=my%20client"));
        assert!(url.contains("scope=read%3Ajira-work%20write%3Ajira-work"));
        assert!(url.contains("offline_access"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fjira%2Fcallback"));
        assert!(url.contains("state=st4te"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("prompt=consent"));
    }

    #[test]
    fn test_site_url() {
        assert_eq!(
            client().site_url("cloud-1", "/search/jql"),
            "https://api.atlassian.com/ex/jira/cloud-1/rest/api/3/search/jql"
        );
    }

    #[test]
    fn test_picker_jql() {
        assert!(picker_jql("  ").starts_with("assignee = currentUser()"));
        assert_eq!(
            picker_jql("ops-7"),
            "key = \"OPS-7\" OR text ~ \"ops-7\" ORDER BY updated DESC"
        );
        assert_eq!(
            picker_jql("say \"hi\""),
            "text ~ \"say \\\"hi\\\"*\" ORDER BY updated DESC"
        );
    }

    #[test]
    fn test_worklog_jql() {
        let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        assert_eq!(
            worklog_jql(from, to),
            "worklogAuthor = currentUser() AND worklogDate >= \"2026-03-01\" AND worklogDate <= \"2026-03-31\""
        );
    }

    #[test]
    fn test_parse_started_formats() {
        let dt = parse_started("2026-03-02T09:30:00.000+0100").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-02T08:30:00+00:00");

        let dt = parse_started("2026-03-02T09:30:00+01:00").unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-03-02T08:30:00+00:00");

        assert!(matches!(parse_started("yesterday"), Err(JiraError::Parse(_))));
    }

    #[test]
    fn test_started_format_output() {
        let dt = DateTime::parse_from_rfc3339("2026-03-02T08:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            dt.format(STARTED_FORMAT).to_string(),
            "2026-03-02T08:30:00.000+0000"
        );
    }

    #[test]
    fn test_convert_worklog_reads_comment() {
        let raw = RawWorklog {
            id: "1".to_string(),
            author: Some(RawAuthor {
                account_id: Some("acc".to_string()),
                display_name: Some("Ada".to_string()),
            }),
            started: "2026-03-02T09:30:00.000+0000".to_string(),
            time_spent_seconds: 600,
            comment: Some(adf::from_plain_text("Standup")),
        };
        let worklog = convert_worklog("OPS-1", raw).unwrap();
        assert_eq!(worklog.issue_key, "OPS-1");
        assert_eq!(worklog.author_account_id.as_deref(), Some("acc"));
        assert_eq!(worklog.comment.as_deref(), Some("Standup"));
    }

    #[test]
    fn test_token_fingerprint_is_stable_and_short() {
        let a = token_fingerprint("token-a");
        assert_eq!(a, token_fingerprint("token-a"));
        assert_ne!(a, token_fingerprint("token-b"));
        assert_eq!(a.len(), 16);
    }

    mod http {
        use serde_json::json;
        use wiremock::matchers::{body_partial_json, header, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::*;

        const WORKLOG_PATH: &str = "/ex/jira/cloud-1/rest/api/3/issue/OPS-1/worklog";
        const SEARCH_PATH: &str = "/ex/jira/cloud-1/rest/api/3/search/jql";

        fn client_for(server: &MockServer) -> JiraClient {
            JiraClient::new(&JiraConfig {
                client_id: "client".to_string(),
                client_secret: SecretString::from("secret"),
                auth_base: server.uri(),
                api_base: server.uri(),
            })
        }

        fn raw_worklog(id: &str, started: &str) -> serde_json::Value {
            json!({
                "id": id,
                "author": { "accountId": "acc-1", "displayName": "Ada" },
                "started": started,
                "timeSpentSeconds": 1800,
            })
        }

        fn issue(key: &str) -> serde_json::Value {
            json!({ "id": key, "key": key, "fields": { "summary": format!("{key} summary") } })
        }

        fn window() -> (DateTime<Utc>, DateTime<Utc>) {
            let from = DateTime::parse_from_rfc3339("2026-03-02T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc);
            (from, from + chrono::Duration::days(1))
        }

        #[tokio::test]
        async fn test_exchange_code_posts_authorization_grant() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth/token"))
                .and(body_partial_json(json!({
                    "grant_type": "authorization_code",
                    "client_id": "client",
                    "client_secret": "secret",
                    "code": "c0de",
                    "redirect_uri": "http://localhost/cb",
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": "at-1",
                    "refresh_token": "rt-1",
                    "expires_in": 3600,
                })))
                .expect(1)
                .mount(&server)
                .await;

            let token = client_for(&server)
                .exchange_code("c0de", "http://localhost/cb")
                .await
                .unwrap();
            assert_eq!(token.access_token, "at-1");
            assert_eq!(token.refresh_token.as_deref(), Some("rt-1"));
            assert_eq!(token.expires_in, Some(3600));
        }

        #[tokio::test]
        async fn test_refresh_rejection_keeps_status() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth/token"))
                .and(body_partial_json(json!({
                    "grant_type": "refresh_token",
                    "refresh_token": "rt-old",
                })))
                .respond_with(
                    ResponseTemplate::new(400).set_body_string("{\"error\":\"invalid_grant\"}"),
                )
                .mount(&server)
                .await;

            let err = client_for(&server).refresh_token("rt-old").await.unwrap_err();
            match err {
                JiraError::Api { status, message } => {
                    assert_eq!(status, 400);
                    assert!(message.contains("invalid_grant"));
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn test_unauthorized_token_is_reported() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/me"))
                .respond_with(ResponseTemplate::new(401))
                .mount(&server)
                .await;

            let err = client_for(&server).current_account("stale").await.unwrap_err();
            assert!(matches!(err, JiraError::Unauthorized));
        }

        #[tokio::test]
        async fn test_account_and_sites_use_bearer_token() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/me"))
                .and(header("authorization", "Bearer at-1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "account_id": "acc-1",
                    "email": "ada@example.com",
                    "name": "Ada",
                })))
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path("/oauth/token/accessible-resources"))
                .and(header("authorization", "Bearer at-1"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                    { "id": "cloud-1", "url": "https://acme.atlassian.net", "name": "Acme" },
                ])))
                .mount(&server)
                .await;

            let client = client_for(&server);
            let account = client.current_account("at-1").await.unwrap();
            assert_eq!(account.account_id, "acc-1");
            let sites = client.accessible_resources("at-1").await.unwrap();
            assert_eq!(sites.len(), 1);
            assert_eq!(sites[0].id, "cloud-1");
        }

        #[tokio::test]
        async fn test_issue_worklogs_follows_pages() {
            let server = MockServer::start().await;
            let (from, to) = window();
            Mock::given(method("GET"))
                .and(path(WORKLOG_PATH))
                .and(query_param("startAt", "0"))
                .and(query_param("startedAfter", from.timestamp_millis().to_string()))
                .and(query_param("startedBefore", to.timestamp_millis().to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "startAt": 0,
                    "maxResults": 2,
                    "total": 3,
                    "worklogs": [
                        raw_worklog("1", "2026-03-02T09:00:00.000+0000"),
                        raw_worklog("2", "2026-03-02T10:00:00.000+0000"),
                    ],
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(path(WORKLOG_PATH))
                .and(query_param("startAt", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "startAt": 2,
                    "maxResults": 2,
                    "total": 3,
                    "worklogs": [raw_worklog("3", "2026-03-02T11:00:00.000+0000")],
                })))
                .expect(1)
                .mount(&server)
                .await;

            let worklogs = client_for(&server)
                .issue_worklogs("at-1", "cloud-1", "OPS-1", from, to)
                .await
                .unwrap();
            let ids: Vec<&str> = worklogs.iter().map(|w| w.id.as_str()).collect();
            assert_eq!(ids, ["1", "2", "3"]);
            assert!(worklogs.iter().all(|w| w.issue_key == "OPS-1"));
        }

        #[tokio::test]
        async fn test_issues_with_worklogs_follows_next_page_token() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(SEARCH_PATH))
                .and(body_partial_json(json!({ "nextPageToken": "page-2" })))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "issues": [issue("OPS-2")] })),
                )
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(SEARCH_PATH))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "issues": [issue("OPS-1")],
                    "nextPageToken": "page-2",
                })))
                .expect(1)
                .mount(&server)
                .await;

            let from = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
            let to = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
            let issues = client_for(&server)
                .issues_with_worklogs("at-1", "cloud-1", from, to)
                .await
                .unwrap();
            let keys: Vec<&str> = issues.iter().map(|i| i.key.as_str()).collect();
            assert_eq!(keys, ["OPS-1", "OPS-2"]);
        }

        #[tokio::test]
        async fn test_search_issues_is_cached() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(SEARCH_PATH))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "issues": [issue("OPS-1")] })),
                )
                .expect(1)
                .mount(&server)
                .await;

            let client = client_for(&server);
            let first = client.search_issues("at-1", "cloud-1", "Deploy").await.unwrap();
            let second = client.search_issues("at-1", "cloud-1", " deploy ").await.unwrap();
            assert_eq!(first.len(), 1);
            assert_eq!(second[0].key, first[0].key);
            assert_eq!(first[0].summary, "OPS-1 summary");
        }

        #[tokio::test]
        async fn test_add_worklog_sends_comment_as_adf() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path(WORKLOG_PATH))
                .and(body_partial_json(json!({
                    "started": "2026-03-02T09:00:00.000+0000",
                    "timeSpentSeconds": 1800,
                    "comment": { "type": "doc", "version": 1 },
                })))
                .respond_with(ResponseTemplate::new(201).set_body_json(raw_worklog(
                    "10",
                    "2026-03-02T09:00:00.000+0000",
                )))
                .expect(1)
                .mount(&server)
                .await;

            let (from, _) = window();
            let worklog = client_for(&server)
                .add_worklog(
                    "at-1",
                    "cloud-1",
                    "OPS-1",
                    &NewWorklog {
                        started: from + chrono::Duration::hours(9),
                        time_spent_seconds: 1800,
                        comment: Some("Standup".to_string()),
                    },
                )
                .await
                .unwrap();
            assert_eq!(worklog.id, "10");
        }

        #[tokio::test]
        async fn test_delete_missing_worklog_is_api_error() {
            let server = MockServer::start().await;
            Mock::given(method("DELETE"))
                .and(path(format!("{WORKLOG_PATH}/99")))
                .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .delete_worklog("at-1", "cloud-1", "OPS-1", "99")
                .await
                .unwrap_err();
            assert!(matches!(err, JiraError::Api { status: 404, .. }));
        }
    }
}
