//! Jira worklogs of the logged-in user.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{jira_access_token, load_organization};
use crate::error::Result;
use crate::jira::Worklog;
use crate::middleware::RequireUser;
use crate::services::WorklogService;
use crate::services::checkin::OrganizationClock;
use crate::services::worklog::{WorklogError, WorklogSummary, summarize};
use crate::state::AppState;

/// Days shown when no range is given, including `to`.
const DEFAULT_RANGE_DAYS: i64 = 7;

/// Build the worklog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/worklogs", get(list).post(create))
        .route("/api/worklogs/{issue_key}/{worklog_id}", delete(remove))
}

/// Query parameters for listing worklogs (organization local dates).
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Response for listing worklogs.
#[derive(Debug, Serialize)]
pub struct WorklogListResponse {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub worklogs: Vec<Worklog>,
    pub summary: WorklogSummary,
}

/// Request for adding a worklog.
#[derive(Debug, Deserialize)]
pub struct CreateWorklogRequest {
    pub issue_key: String,
    pub started: DateTime<Utc>,
    pub time_spent_seconds: i64,
    pub comment: Option<String>,
}

/// Fill in a missing range: `to` defaults to today and `from` to a week before it.
fn resolve_range(
    query: &RangeQuery,
    today: NaiveDate,
) -> std::result::Result<(NaiveDate, NaiveDate), WorklogError> {
    let to = query.to.unwrap_or(today);
    let from = match query.from {
        Some(from) => from,
        None => to
            .checked_sub_signed(Duration::days(DEFAULT_RANGE_DAYS - 1))
            .ok_or_else(|| WorklogError::InvalidRange("date is out of range".to_string()))?,
    };
    Ok((from, to))
}

/// List the user's worklogs with daily totals.
///
/// # Route
///
/// `GET /api/worklogs?from=YYYY-MM-DD&to=YYYY-MM-DD`
///
/// # Errors
///
/// Returns 400 for an invalid range, 409 without a linked site and 502 if Jira fails.
pub async fn list(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<WorklogListResponse>> {
    let organization = load_organization(&state, &user).await?;
    let clock = OrganizationClock::for_organization(&organization)?;
    let (from, to) = resolve_range(&query, clock.local_date(Utc::now()))?;

    let token = jira_access_token(&state, &user).await?;
    let worklogs = WorklogService::new(state.jira())
        .list(&token, &organization, &user, from, to)
        .await?;
    let summary = summarize(&worklogs, clock.offset());

    Ok(Json(WorklogListResponse {
        from,
        to,
        worklogs,
        summary,
    }))
}

/// Log work on an issue.
///
/// # Route
///
/// `POST /api/worklogs`
///
/// # Errors
///
/// Returns 400 for invalid input, 409 without a linked site and 502 if Jira fails.
pub async fn create(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Json(body): Json<CreateWorklogRequest>,
) -> Result<(StatusCode, Json<Worklog>)> {
    let organization = load_organization(&state, &user).await?;
    let comment = body
        .comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let token = jira_access_token(&state, &user).await?;
    let worklog = WorklogService::new(state.jira())
        .create(
            &token,
            &organization,
            &body.issue_key,
            body.started,
            body.time_spent_seconds,
            comment,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(worklog)))
}

/// Delete a worklog.
///
/// # Route
///
/// `DELETE /api/worklogs/{issue_key}/{worklog_id}`
///
/// # Errors
///
/// Returns 400 for an invalid key, 404 if Jira does not know the worklog.
pub async fn remove(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
    Path((issue_key, worklog_id)): Path<(String, String)>,
) -> Result<StatusCode> {
    let organization = load_organization(&state, &user).await?;

    let token = jira_access_token(&state, &user).await?;
    WorklogService::new(state.jira())
        .delete(&token, &organization, &issue_key, &worklog_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
