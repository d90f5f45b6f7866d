//! Types for the Atlassian OAuth 2.0 (3LO) flow and Jira REST responses.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::JiraCredentials;

// ─────────────────────────────────────────────────────────────────────────────
// OAuth Types
// ─────────────────────────────────────────────────────────────────────────────

/// Jira access token obtained via OAuth.
#[derive(Clone, Serialize, Deserialize)]
pub struct JiraToken {
    /// The access token for API requests.
    pub access_token: String,
    /// The rotating refresh token (`offline_access` scope).
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds.
    pub expires_in: Option<i64>,
    /// Unix timestamp when the token was obtained.
    pub obtained_at: i64,
}

impl JiraToken {
    /// Check if the access token is expired (with 60s buffer).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_in.is_some_and(|expires_in| {
            let now = Utc::now().timestamp();
            let expires_at = self.obtained_at.saturating_add(expires_in);
            now >= expires_at.saturating_sub(60)
        })
    }

    /// Absolute expiry time, if the server reported a representable lifetime.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(|expires_in| self.obtained_at.checked_add(expires_in))
            .and_then(|at| Utc.timestamp_opt(at, 0).single())
    }

    /// Convert into the form persisted on the user row.
    ///
    /// Atlassian only sometimes rotates the refresh token, so a missing one
    /// keeps `previous_refresh`.
    #[must_use]
    pub fn into_credentials(self, previous_refresh: Option<String>) -> JiraCredentials {
        let expires_at = self.expires_at();
        JiraCredentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at,
        }
    }
}

impl std::fmt::Debug for JiraToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

/// Raw token response from the Atlassian OAuth endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl From<TokenResponse> for JiraToken {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_in: response.expires_in,
            obtained_at: Utc::now().timestamp(),
        }
    }
}

/// The Atlassian account behind an access token (`GET /me`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraAccount {
    pub account_id: String,
    pub email: Option<String>,
    pub name: String,
    pub picture: Option<String>,
}

/// A Jira site the token grants access to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraSite {
    /// Cloud ID used in `/ex/jira/{cloud_id}` paths.
    pub id: String,
    /// Site URL, e.g. `https://team.atlassian.net`.
    pub url: String,
    pub name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Issues and worklogs
// ─────────────────────────────────────────────────────────────────────────────

/// An issue as shown in the issue picker.
#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    pub id: String,
    pub key: String,
    pub summary: String,
    pub status: Option<String>,
}

/// A worklog entry on an issue.
#[derive(Debug, Clone, Serialize)]
pub struct Worklog {
    pub id: String,
    pub issue_key: String,
    /// Filled in from the search results when listing.
    pub issue_summary: Option<String>,
    pub author_account_id: Option<String>,
    pub author_name: Option<String>,
    pub started: DateTime<Utc>,
    pub time_spent_seconds: i64,
    pub comment: Option<String>,
}

/// A worklog to be added to an issue.
#[derive(Debug, Clone)]
pub struct NewWorklog {
    pub started: DateTime<Utc>,
    pub time_spent_seconds: i64,
    pub comment: Option<String>,
}

/// `POST /search/jql` response page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawIssue {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: RawIssueFields,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct RawIssueFields {
    pub summary: Option<String>,
    pub status: Option<RawStatus>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RawStatus {
    pub name: String,
}

impl From<RawIssue> for IssueSummary {
    fn from(issue: RawIssue) -> Self {
        Self {
            id: issue.id,
            key: issue.key,
            summary: issue.fields.summary.unwrap_or_default(),
            status: issue.fields.status.map(|s| s.name),
        }
    }
}

/// `GET /issue/{key}/worklog` response page.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct WorklogPage {
    pub start_at: i64,
    pub max_results: i64,
    pub total: i64,
    #[serde(default)]
    pub worklogs: Vec<RawWorklog>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawWorklog {
    pub id: String,
    pub author: Option<RawAuthor>,
    pub started: String,
    pub time_spent_seconds: i64,
    pub comment: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct RawAuthor {
    pub account_id: Option<String>,
    pub display_name: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_expired_with_buffer() {
        let now = Utc::now().timestamp();
        let token = JiraToken {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            obtained_at: now - 3590,
        };
        assert!(token.is_expired());

        let fresh = JiraToken {
            obtained_at: now,
            ..token.clone()
        };
        assert!(!fresh.is_expired());

        let no_expiry = JiraToken {
            expires_in: None,
            ..token
        };
        assert!(!no_expiry.is_expired());
        assert!(no_expiry.expires_at().is_none());
    }

    #[test]
    fn test_extreme_lifetimes_do_not_overflow() {
        let now = Utc::now().timestamp();
        let forever = JiraToken {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_in: Some(i64::MAX),
            obtained_at: now,
        };
        assert!(!forever.is_expired());
        assert!(forever.expires_at().is_none());

        let negative = JiraToken {
            expires_in: Some(i64::MIN),
            ..forever
        };
        assert!(negative.is_expired());
        assert!(negative.expires_at().is_none());
    }

    #[test]
    fn test_into_credentials_keeps_previous_refresh_token() {
        let token = JiraToken {
            access_token: "new-access".to_string(),
            refresh_token: None,
            expires_in: Some(3600),
            obtained_at: 1_700_000_000,
        };
        let creds = token.into_credentials(Some("old-refresh".to_string()));
        assert_eq!(creds.access_token, "new-access");
        assert_eq!(creds.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(creds.expires_at.unwrap().timestamp(), 1_700_003_600);
    }

    #[test]
    fn test_search_response_deserializes() {
        let json = r#"{
            "issues": [
                {"id": "10001", "key": "OPS-12",
                 "fields": {"summary": "Rotate certificates", "status": {"name": "In Progress"}}},
                {"id": "10002", "key": "OPS-13", "fields": {}}
            ],
            "nextPageToken": "abc"
        }"#;
        let page: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));

        let issues: Vec<IssueSummary> = page.issues.into_iter().map(Into::into).collect();
        assert_eq!(issues[0].key, "OPS-12");
        assert_eq!(issues[0].status.as_deref(), Some("In Progress"));
        assert_eq!(issues[1].summary, "");
        assert!(issues[1].status.is_none());
    }

    #[test]
    fn test_worklog_page_deserializes() {
        let json = r#"{
            "startAt": 0, "maxResults": 5000, "total": 1,
            "worklogs": [{
                "id": "30001",
                "author": {"accountId": "acc-1", "displayName": "Ada"},
                "started": "2026-03-02T09:30:00.000+0100",
                "timeSpentSeconds": 5400
            }]
        }"#;
        let page: WorklogPage = serde_json::from_str(json).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.worklogs[0].time_spent_seconds, 5400);
        assert!(page.worklogs[0].comment.is_none());
    }

    #[test]
    fn test_token_debug_redacts() {
        let token = JiraToken {
            access_token: "secret-access-token".to_string(),
            refresh_token: Some("secret-refresh-token".to_string()),
            expires_in: None,
            obtained_at: 0,
        };
        assert!(!format!("{token:?}").contains("secret-"));
    }
}
