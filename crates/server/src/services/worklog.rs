//! Worklogs stored in Jira.
//!
//! Nothing is persisted locally: listing searches for issues the user logged
//! work on and then reads each issue's worklogs.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::instrument;

use crate::jira::{JiraClient, JiraError, NewWorklog, Worklog, is_issue_key};
use crate::models::{Organization, User};
use crate::services::checkin::{CheckInError, OrganizationClock};

/// Longest range `list` accepts, in days (inclusive).
pub const MAX_RANGE_DAYS: i64 = 62;

/// Shortest worklog accepted, in seconds.
pub const MIN_WORKLOG_SECONDS: i64 = 60;

/// Errors that can occur during worklog operations.
#[derive(Debug, Error)]
pub enum WorklogError {
    /// `from` after `to`, or the range is too long.
    #[error("{0}")]
    InvalidRange(String),

    /// Not a Jira issue key.
    #[error("invalid issue key: {0}")]
    InvalidIssueKey(String),

    /// Duration below the minimum.
    #[error("time spent must be at least {MIN_WORKLOG_SECONDS} seconds")]
    InvalidDuration,

    /// The organization has not linked a Jira site yet.
    #[error("organization has no linked Jira site")]
    NoJiraSite,

    /// Stored organization settings are invalid.
    #[error(transparent)]
    Clock(#[from] CheckInError),

    /// Jira API error.
    #[error("Jira error: {0}")]
    Jira(#[from] JiraError),
}

/// Seconds logged on one local date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayTotal {
    pub date: NaiveDate,
    pub seconds: i64,
}

/// Totals over a list of worklogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorklogSummary {
    pub total_seconds: i64,
    /// Days with logged time, ascending.
    pub days: Vec<DayTotal>,
}

/// Sum worklogs per local date.
#[must_use]
pub fn summarize(entries: &[Worklog], offset: FixedOffset) -> WorklogSummary {
    let mut days: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for entry in entries {
        let date = entry.started.with_timezone(&offset).date_naive();
        *days.entry(date).or_default() += entry.time_spent_seconds;
    }

    WorklogSummary {
        total_seconds: days.values().sum(),
        days: days
            .into_iter()
            .map(|(date, seconds)| DayTotal { date, seconds })
            .collect(),
    }
}

/// Check a `[from, to]` date range.
///
/// # Errors
///
/// Returns `WorklogError::InvalidRange` if `from > to` or the range exceeds
/// [`MAX_RANGE_DAYS`].
pub fn validate_range(from: NaiveDate, to: NaiveDate) -> Result<(), WorklogError> {
    if from > to {
        return Err(WorklogError::InvalidRange(
            "from must not be after to".to_string(),
        ));
    }
    if (to - from).num_days() + 1 > MAX_RANGE_DAYS {
        return Err(WorklogError::InvalidRange(format!(
            "range must not exceed {MAX_RANGE_DAYS} days"
        )));
    }
    Ok(())
}

/// UTC instants and Jira search dates covering a local `[from, to]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeBounds {
    /// Start of `from` in local time.
    pub start: DateTime<Utc>,
    /// Start of the day after `to` in local time.
    pub end: DateTime<Utc>,
    /// `worklogDate` is evaluated in the Jira user's own timezone, so the
    /// search is widened by a day on each side.
    pub search_from: NaiveDate,
    pub search_to: NaiveDate,
}

/// Resolve a local date range against an organization clock.
///
/// # Errors
///
/// Returns `WorklogError::InvalidRange` if a bound falls outside the
/// representable calendar.
pub fn range_bounds(
    clock: &OrganizationClock,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<RangeBounds, WorklogError> {
    let out_of_range = || WorklogError::InvalidRange("date is out of range".to_string());

    let (start, _) = clock.day_bounds(from).ok_or_else(out_of_range)?;
    let (_, end) = clock.day_bounds(to).ok_or_else(out_of_range)?;
    let search_from = from
        .checked_sub_signed(Duration::days(1))
        .ok_or_else(out_of_range)?;
    let search_to = to
        .checked_add_signed(Duration::days(1))
        .ok_or_else(out_of_range)?;

    Ok(RangeBounds {
        start,
        end,
        search_from,
        search_to,
    })
}

/// Normalize and check an issue key.
///
/// # Errors
///
/// Returns `WorklogError::InvalidIssueKey` if the key is malformed.
pub fn normalize_issue_key(key: &str) -> Result<String, WorklogError> {
    let key = key.trim().to_ascii_uppercase();
    if is_issue_key(&key) {
        Ok(key)
    } else {
        Err(WorklogError::InvalidIssueKey(key))
    }
}

fn cloud_id(organization: &Organization) -> Result<&str, WorklogError> {
    organization
        .jira_cloud_id
        .as_deref()
        .ok_or(WorklogError::NoJiraSite)
}

/// Worklog service.
pub struct WorklogService<'a> {
    jira: &'a JiraClient,
}

impl<'a> WorklogService<'a> {
    /// Create a new worklog service.
    #[must_use]
    pub const fn new(jira: &'a JiraClient) -> Self {
        Self { jira }
    }

    /// List the user's worklogs started within `[from, to]` in the
    /// organization's local time, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the range is invalid, no site is linked or Jira fails.
    #[instrument(skip(self, access_token, organization, user), fields(user_id = %user.id))]
    pub async fn list(
        &self,
        access_token: &str,
        organization: &Organization,
        user: &User,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Worklog>, WorklogError> {
        validate_range(from, to)?;
        let cloud_id = cloud_id(organization)?;
        let clock = OrganizationClock::for_organization(organization)?;
        let bounds = range_bounds(&clock, from, to)?;
        let (start, end) = (bounds.start, bounds.end);

        let issues = self
            .jira
            .issues_with_worklogs(access_token, cloud_id, bounds.search_from, bounds.search_to)
            .await?;

        let mut entries = Vec::new();
        for issue in issues {
            let worklogs = self
                .jira
                .issue_worklogs(access_token, cloud_id, &issue.key, start, end)
                .await?;

            entries.extend(
                worklogs
                    .into_iter()
                    .filter(|w| {
                        w.author_account_id.is_some()
                            && w.author_account_id == user.jira_account_id
                    })
                    .filter(|w| w.started >= start && w.started < end)
                    .map(|mut w| {
                        w.issue_summary = Some(issue.summary.clone());
                        w
                    }),
            );
        }

        entries.sort_by(|a, b| a.started.cmp(&b.started).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    /// Log work on an issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is invalid, no site is linked or Jira fails.
    #[instrument(skip(self, access_token, organization, comment))]
    pub async fn create(
        &self,
        access_token: &str,
        organization: &Organization,
        issue_key: &str,
        started: DateTime<Utc>,
        time_spent_seconds: i64,
        comment: Option<String>,
    ) -> Result<Worklog, WorklogError> {
        let issue_key = normalize_issue_key(issue_key)?;
        if time_spent_seconds < MIN_WORKLOG_SECONDS {
            return Err(WorklogError::InvalidDuration);
        }
        let cloud_id = cloud_id(organization)?;

        let worklog = self
            .jira
            .add_worklog(
                access_token,
                cloud_id,
                &issue_key,
                &NewWorklog {
                    started,
                    time_spent_seconds,
                    comment,
                },
            )
            .await?;

        tracing::info!(issue_key = %issue_key, worklog_id = %worklog.id, "Worklog added");
        Ok(worklog)
    }

    /// Delete a worklog.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid, no site is linked or Jira fails.
    #[instrument(skip(self, access_token, organization))]
    pub async fn delete(
        &self,
        access_token: &str,
        organization: &Organization,
        issue_key: &str,
        worklog_id: &str,
    ) -> Result<(), WorklogError> {
        let issue_key = normalize_issue_key(issue_key)?;
        let cloud_id = cloud_id(organization)?;

        self.jira
            .delete_worklog(access_token, cloud_id, &issue_key, worklog_id)
            .await?;

        tracing::info!(issue_key = %issue_key, worklog_id = %worklog_id, "Worklog deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn worklog(started: &str, seconds: i64) -> Worklog {
        Worklog {
            id: "1".to_string(),
            issue_key: "OPS-1".to_string(),
            issue_summary: None,
            author_account_id: Some("acc".to_string()),
            author_name: None,
            started: DateTime::parse_from_rfc3339(started)
                .unwrap()
                .with_timezone(&Utc),
            time_spent_seconds: seconds,
            comment: None,
        }
    }

    #[test]
    fn test_summarize_groups_by_local_date() {
        let entries = vec![
            worklog("2026-03-02T08:00:00Z", 3600),
            worklog("2026-03-02T13:00:00Z", 1800),
            worklog("2026-03-02T23:30:00Z", 600),
        ];

        let utc = summarize(&entries, FixedOffset::east_opt(0).unwrap());
        assert_eq!(utc.total_seconds, 6000);
        assert_eq!(
            utc.days,
            vec![
                DayTotal { date: date(2026, 3, 2), seconds: 6000 },
            ]
        );

        // At UTC+02:00 the last entry falls on the next day.
        let cest = summarize(&entries, FixedOffset::east_opt(7200).unwrap());
        assert_eq!(cest.total_seconds, 6000);
        assert_eq!(cest.days.len(), 2);
        assert_eq!(cest.days[0].seconds, 5400);
        assert_eq!(cest.days[1].date, date(2026, 3, 3));
    }

    #[test]
    fn test_summarize_empty() {
        let summary = summarize(&[], FixedOffset::east_opt(0).unwrap());
        assert_eq!(summary, WorklogSummary::default());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(date(2026, 3, 1), date(2026, 3, 1)).is_ok());
        assert!(validate_range(date(2026, 3, 1), date(2026, 5, 1)).is_ok());
        assert!(matches!(
            validate_range(date(2026, 3, 2), date(2026, 3, 1)),
            Err(WorklogError::InvalidRange(_))
        ));
        assert!(matches!(
            validate_range(date(2026, 3, 1), date(2026, 5, 2)),
            Err(WorklogError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_range_bounds_widens_search_by_a_day() {
        let clock = OrganizationClock::new(
            chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            chrono::NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            60,
        )
        .unwrap();
        let bounds = range_bounds(&clock, date(2026, 3, 2), date(2026, 3, 4)).unwrap();

        assert_eq!(bounds.start.to_rfc3339(), "2026-03-01T23:00:00+00:00");
        assert_eq!(bounds.end.to_rfc3339(), "2026-03-04T23:00:00+00:00");
        assert_eq!(bounds.search_from, date(2026, 3, 1));
        assert_eq!(bounds.search_to, date(2026, 3, 5));
    }

    #[test]
    fn test_range_bounds_rejects_calendar_edges() {
        let clock = OrganizationClock::new(
            chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            chrono::NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            0,
        )
        .unwrap();

        assert!(matches!(
            range_bounds(&clock, NaiveDate::MIN, NaiveDate::MIN),
            Err(WorklogError::InvalidRange(_))
        ));
        assert!(matches!(
            range_bounds(&clock, NaiveDate::MAX, NaiveDate::MAX),
            Err(WorklogError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_normalize_issue_key() {
        assert_eq!(normalize_issue_key(" ops-42 ").unwrap(), "OPS-42");
        assert!(matches!(
            normalize_issue_key("not a key"),
            Err(WorklogError::InvalidIssueKey(_))
        ));
    }
}
