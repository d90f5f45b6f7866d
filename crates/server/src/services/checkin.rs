//! Daily check-ins: punctuality buckets, streaks and summaries.
//!
//! All dates are in the organization's local time, derived from its fixed
//! UTC offset. Weekends (Saturday and Sunday) are not workdays.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use worktally_core::{PresenceStatus, Punctuality};

use crate::db::{CheckInRepository, PresenceRepository, RepositoryError};
use crate::models::{CheckIn, Organization, User};

/// Smallest allowed UTC offset (UTC-12:00), in minutes.
pub const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
/// Largest allowed UTC offset (UTC+14:00), in minutes.
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

/// How far back check-ins are loaded to compute streaks.
pub const STREAK_LOOKBACK_DAYS: i64 = 366;

/// Errors that can occur during check-in operations.
#[derive(Debug, Error)]
pub enum CheckInError {
    /// The user already checked in on this local date.
    #[error("already checked in today")]
    AlreadyCheckedIn,

    /// Window start is not before window end.
    #[error("check-in window start must be before its end")]
    InvalidWindow,

    /// UTC offset outside -12:00..=+14:00.
    #[error("UTC offset must be between -720 and 840 minutes (got {0})")]
    InvalidOffset(i32),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Validate a check-in window and UTC offset.
///
/// # Errors
///
/// Returns `CheckInError::InvalidWindow` or `CheckInError::InvalidOffset`.
pub fn validate_window(
    checkin_start: NaiveTime,
    checkin_end: NaiveTime,
    utc_offset_minutes: i32,
) -> Result<(), CheckInError> {
    if checkin_start >= checkin_end {
        return Err(CheckInError::InvalidWindow);
    }
    if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&utc_offset_minutes) {
        return Err(CheckInError::InvalidOffset(utc_offset_minutes));
    }
    Ok(())
}

/// An organization's local clock and check-in window.
#[derive(Debug, Clone, Copy)]
pub struct OrganizationClock {
    checkin_start: NaiveTime,
    checkin_end: NaiveTime,
    utc_offset: FixedOffset,
}

impl OrganizationClock {
    /// Build a clock from a window and UTC offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the window or offset is invalid.
    pub fn new(
        checkin_start: NaiveTime,
        checkin_end: NaiveTime,
        utc_offset_minutes: i32,
    ) -> Result<Self, CheckInError> {
        validate_window(checkin_start, checkin_end, utc_offset_minutes)?;
        let utc_offset = FixedOffset::east_opt(utc_offset_minutes * 60)
            .ok_or(CheckInError::InvalidOffset(utc_offset_minutes))?;

        Ok(Self {
            checkin_start,
            checkin_end,
            utc_offset,
        })
    }

    /// Build the clock of an organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored settings are invalid.
    pub fn for_organization(organization: &Organization) -> Result<Self, CheckInError> {
        Self::new(
            organization.checkin_start,
            organization.checkin_end,
            organization.utc_offset_minutes,
        )
    }

    /// The organization's UTC offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.utc_offset
    }

    /// Convert an instant to the organization's local time.
    #[must_use]
    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.utc_offset)
    }

    /// The local calendar date of an instant.
    #[must_use]
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Bucket an instant against the check-in window.
    ///
    /// Times are compared at minute precision, so a window ending at 09:15
    /// accepts check-ins through 09:15:59.
    #[must_use]
    pub fn classify(&self, instant: DateTime<Utc>) -> Punctuality {
        let local = self.local(instant).time();
        let minute = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0).unwrap_or(local);

        if minute < self.checkin_start {
            Punctuality::Early
        } else if minute <= self.checkin_end {
            Punctuality::OnTime
        } else {
            Punctuality::Late
        }
    }

    /// UTC instants bounding a local date: `[start of day, start of next day)`.
    ///
    /// `None` for dates at the edge of the representable range.
    #[must_use]
    pub fn day_bounds(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let offset = Duration::seconds(i64::from(self.utc_offset.local_minus_utc()));
        let start = date
            .and_time(NaiveTime::MIN)
            .checked_sub_signed(offset)?
            .and_utc();
        let end = start.checked_add_signed(Duration::days(1))?;
        Some((start, end))
    }
}

/// Returns true for Monday through Friday.
#[must_use]
pub fn is_workday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The closest workday strictly before `date`.
#[must_use]
pub fn previous_workday(date: NaiveDate) -> NaiveDate {
    let mut day = date - Duration::days(1);
    while !is_workday(day) {
        day -= Duration::days(1);
    }
    day
}

/// Count consecutive workdays with a check-in.
///
/// Starts from `today` if the user checked in today, otherwise from the
/// previous workday, and walks back until a workday without a check-in.
/// Weekend days neither extend nor break a streak.
#[must_use]
pub fn streak(dates: &[NaiveDate], today: NaiveDate) -> u32 {
    let checked: HashSet<NaiveDate> = dates.iter().copied().collect();
    if checked.is_empty() {
        return 0;
    }

    let mut day = if is_workday(today) && checked.contains(&today) {
        today
    } else {
        previous_workday(today)
    };

    let mut count = 0;
    while checked.contains(&day) {
        count += 1;
        day = previous_workday(day);
    }
    count
}

/// Punctuality counts over a date range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PunctualitySummary {
    pub early: u32,
    pub on_time: u32,
    pub late: u32,
    pub total: u32,
    /// Early plus on-time over total, in percent (one decimal).
    pub punctual_rate: f64,
    /// Workdays that have elapsed in the range.
    pub elapsed_workdays: u32,
    /// Elapsed workdays without a check-in.
    pub missed_workdays: u32,
}

impl PunctualitySummary {
    /// Summarize the check-ins dated within `[from, today]`.
    ///
    /// Today counts as an elapsed workday only once the user has checked
    /// in, so an ongoing morning is never reported as missed.
    #[must_use]
    pub fn from_records(
        records: &[CheckIn],
        from: NaiveDate,
        today: NaiveDate,
        checked_in_today: bool,
    ) -> Self {
        let mut summary = Self::default();
        let mut checked_workdays = HashSet::new();

        for record in records
            .iter()
            .filter(|r| r.local_date >= from && r.local_date <= today)
        {
            match record.punctuality {
                Punctuality::Early => summary.early += 1,
                Punctuality::OnTime => summary.on_time += 1,
                Punctuality::Late => summary.late += 1,
            }
            summary.total += 1;
            if is_workday(record.local_date) {
                checked_workdays.insert(record.local_date);
            }
        }

        let mut day = from;
        while day <= today {
            let elapsed = day < today || checked_in_today;
            if elapsed && is_workday(day) {
                summary.elapsed_workdays += 1;
                if !checked_workdays.contains(&day) {
                    summary.missed_workdays += 1;
                }
            }
            day += Duration::days(1);
        }

        if summary.total > 0 {
            let punctual = f64::from(summary.early + summary.on_time);
            let rate = punctual / f64::from(summary.total) * 100.0;
            summary.punctual_rate = (rate * 10.0).round() / 10.0;
        }

        summary
    }
}

/// A user's check-in overview.
#[derive(Debug, Clone, Serialize)]
pub struct CheckInOverview {
    pub today: Option<CheckIn>,
    pub streak: u32,
    pub summary: PunctualitySummary,
    /// Check-ins within the requested window, newest first.
    pub history: Vec<CheckIn>,
}

/// Check-in service.
pub struct CheckInService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckInService<'a> {
    /// Create a new check-in service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Record the user's check-in for the current local date.
    ///
    /// Also marks the user online.
    ///
    /// # Errors
    ///
    /// Returns `CheckInError::AlreadyCheckedIn` on a second check-in the same day.
    pub async fn check_in(
        &self,
        user: &User,
        organization: &Organization,
        now: DateTime<Utc>,
    ) -> Result<CheckIn, CheckInError> {
        let clock = OrganizationClock::for_organization(organization)?;
        let local_date = clock.local_date(now);
        let punctuality = clock.classify(now);

        let checkin = CheckInRepository::new(self.pool)
            .create(user.id, organization.id, local_date, now, punctuality)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => CheckInError::AlreadyCheckedIn,
                other => CheckInError::Repository(other),
            })?;

        PresenceRepository::new(self.pool)
            .upsert(user.id, PresenceStatus::Online, now)
            .await?;

        tracing::info!(
            user_id = %user.id,
            date = %local_date,
            punctuality = %punctuality,
            "Check-in recorded"
        );

        Ok(checkin)
    }

    /// Build the user's overview for the last `days` days (including today).
    ///
    /// # Errors
    ///
    /// Returns an error if the organization settings are invalid or the query fails.
    pub async fn overview(
        &self,
        user: &User,
        organization: &Organization,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<CheckInOverview, CheckInError> {
        let clock = OrganizationClock::for_organization(organization)?;
        let today = clock.local_date(now);
        let window_from = today - Duration::days(days - 1);
        let lookback = today - Duration::days(STREAK_LOOKBACK_DAYS.max(days));
        // Days before the member joined are not misses.
        let from = window_from.max(clock.local_date(user.created_at));

        let records = CheckInRepository::new(self.pool)
            .list_for_user_since(user.id, lookback)
            .await?;

        Ok(build_overview(records, from, today))
    }
}

/// Assemble an overview from a user's check-ins (any order).
#[must_use]
pub fn build_overview(records: Vec<CheckIn>, from: NaiveDate, today: NaiveDate) -> CheckInOverview {
    let today_checkin = records.iter().find(|r| r.local_date == today).cloned();
    let dates: Vec<NaiveDate> = records.iter().map(|r| r.local_date).collect();
    let summary = PunctualitySummary::from_records(&records, from, today, today_checkin.is_some());

    let mut history: Vec<CheckIn> = records
        .into_iter()
        .filter(|r| r.local_date >= from && r.local_date <= today)
        .collect();
    history.sort_by(|a, b| b.local_date.cmp(&a.local_date));

    CheckInOverview {
        streak: streak(&dates, today),
        today: today_checkin,
        summary,
        history,
    }
}
