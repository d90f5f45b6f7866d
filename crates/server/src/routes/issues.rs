//! Issue picker.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;

use super::{jira_access_token, load_organization};
use crate::error::Result;
use crate::jira::IssueSummary;
use crate::middleware::RequireUser;
use crate::services::WorklogError;
use crate::state::AppState;

/// Longest accepted search text.
const MAX_QUERY_LENGTH: usize = 200;

/// Build the issue router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/issues", get(search))
}

/// Query parameters for the issue picker.
#[derive(Debug, Deserialize)]
pub struct IssueQuery {
    pub q: Option<String>,
}

/// Search issues on the organization's Jira site.
///
/// Without `q`, lists issues assigned to the user.
///
/// # Route
///
/// `GET /api/issues?q=…`
///
/// # Errors
///
/// Returns 409 if no Jira site is linked and 502 if Jira fails.
pub async fn search(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<IssueQuery>,
) -> Result<Json<Vec<IssueSummary>>> {
    let organization = load_organization(&state, &user).await?;
    let cloud_id = organization
        .jira_cloud_id
        .as_deref()
        .ok_or(WorklogError::NoJiraSite)?;

    let text: String = query
        .q
        .unwrap_or_default()
        .trim()
        .chars()
        .take(MAX_QUERY_LENGTH)
        .collect();

    let token = jira_access_token(&state, &user).await?;
    let issues = state.jira().search_issues(&token, cloud_id, &text).await?;

    Ok(Json(issues))
}
