//! Admin dashboard statistics.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;

use worktally_core::{Email, PresenceStatus, Punctuality, UserId, UserRole};

use crate::db::{CheckInRepository, PresenceRepository, UserRepository};
use crate::models::{CheckIn, OnlineStatus, Organization, User};
use crate::services::checkin::{
    CheckInError, OrganizationClock, PunctualitySummary, STREAK_LOOKBACK_DAYS, streak,
};
use crate::services::presence::effective_status;

/// Default dashboard window, in days.
pub const DEFAULT_STATS_DAYS: i64 = 30;
/// Longest dashboard window, in days.
pub const MAX_STATS_DAYS: i64 = 90;

/// Member counts by status and role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberCounts {
    pub active: u32,
    pub pending: u32,
    pub admins: u32,
}

/// A member reference in dashboard lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberRef {
    pub id: UserId,
    pub name: String,
}

/// Today's check-ins by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TodayCounts {
    pub early: u32,
    pub on_time: u32,
    pub late: u32,
    /// Active members without a check-in today.
    pub not_checked_in: Vec<MemberRef>,
}

/// Presence of active members.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PresenceCounts {
    pub online: u32,
    pub away: u32,
    pub offline: u32,
}

/// Per-member dashboard row.
#[derive(Debug, Clone, Serialize)]
pub struct MemberStats {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub role: UserRole,
    pub presence: PresenceStatus,
    pub today: Option<Punctuality>,
    pub streak: u32,
    pub summary: PunctualitySummary,
}

/// Dashboard statistics for one organization.
#[derive(Debug, Clone, Serialize)]
pub struct OrganizationStats {
    pub days: i64,
    pub from: NaiveDate,
    pub today: NaiveDate,
    pub members: MemberCounts,
    pub checkins_today: TodayCounts,
    pub presence: PresenceCounts,
    /// Active members, sorted by name.
    pub member_stats: Vec<MemberStats>,
}

/// Clamp a requested window to `1..=MAX_STATS_DAYS`, defaulting when absent.
#[must_use]
pub fn clamp_days(days: Option<i64>) -> i64 {
    days.unwrap_or(DEFAULT_STATS_DAYS).clamp(1, MAX_STATS_DAYS)
}

/// Compute dashboard statistics from loaded rows.
///
/// `checkins` must cover at least the streak lookback; order does not matter.
/// Members who joined inside the window are summarized from their join date.
#[must_use]
pub fn compute(
    users: &[User],
    checkins: &[CheckIn],
    presence: &[OnlineStatus],
    days: i64,
    today: NaiveDate,
    now: DateTime<Utc>,
    offset: FixedOffset,
) -> OrganizationStats {
    let from = today - Duration::days(days - 1);

    let mut by_user: HashMap<UserId, Vec<CheckIn>> = HashMap::new();
    for checkin in checkins {
        by_user.entry(checkin.user_id).or_default().push(checkin.clone());
    }
    let presence_by_user: HashMap<UserId, &OnlineStatus> =
        presence.iter().map(|p| (p.user_id, p)).collect();

    let mut members = MemberCounts::default();
    let mut checkins_today = TodayCounts::default();
    let mut presence_counts = PresenceCounts::default();
    let mut member_stats = Vec::new();

    for user in users {
        if user.is_admin() {
            members.admins += 1;
        }
        if user.is_pending() {
            members.pending += 1;
            continue;
        }
        members.active += 1;

        let records = by_user.get(&user.id).map(Vec::as_slice).unwrap_or_default();
        let today_record = records.iter().find(|r| r.local_date == today);
        match today_record.map(|r| r.punctuality) {
            Some(Punctuality::Early) => checkins_today.early += 1,
            Some(Punctuality::OnTime) => checkins_today.on_time += 1,
            Some(Punctuality::Late) => checkins_today.late += 1,
            None => checkins_today.not_checked_in.push(MemberRef {
                id: user.id,
                name: user.name.clone(),
            }),
        }

        let status = effective_status(presence_by_user.get(&user.id).copied(), now);
        match status {
            PresenceStatus::Online => presence_counts.online += 1,
            PresenceStatus::Away => presence_counts.away += 1,
            PresenceStatus::Offline => presence_counts.offline += 1,
        }

        let dates: Vec<NaiveDate> = records.iter().map(|r| r.local_date).collect();
        let joined = user.created_at.with_timezone(&offset).date_naive();
        let summary_from = from.max(joined);
        member_stats.push(MemberStats {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            presence: status,
            today: today_record.map(|r| r.punctuality),
            streak: streak(&dates, today),
            summary: PunctualitySummary::from_records(
                records,
                summary_from,
                today,
                today_record.is_some(),
            ),
        });
    }

    member_stats.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then(a.id.as_i32().cmp(&b.id.as_i32()))
    });
    checkins_today
        .not_checked_in
        .sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));

    OrganizationStats {
        days,
        from,
        today,
        members,
        checkins_today,
        presence: presence_counts,
        member_stats,
    }
}

/// Dashboard statistics service.
pub struct StatsService<'a> {
    pool: &'a PgPool,
}

impl<'a> StatsService<'a> {
    /// Create a new stats service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Load and compute statistics for the last `days` days.
    ///
    /// # Errors
    ///
    /// Returns an error if the organization settings are invalid or a query fails.
    pub async fn organization_stats(
        &self,
        organization: &Organization,
        days: i64,
        now: DateTime<Utc>,
    ) -> Result<OrganizationStats, CheckInError> {
        let clock = OrganizationClock::for_organization(organization)?;
        let today = clock.local_date(now);
        let since = today - Duration::days(STREAK_LOOKBACK_DAYS.max(days));

        let users = UserRepository::new(self.pool)
            .list_by_organization(organization.id)
            .await?;
        let checkins = CheckInRepository::new(self.pool)
            .list_for_organization_since(organization.id, since)
            .await?;
        let presence = PresenceRepository::new(self.pool)
            .list_for_organization(organization.id)
            .await?;

        Ok(compute(
            &users,
            &checkins,
            &presence,
            days,
            today,
            now,
            clock.offset(),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveTime;
    use worktally_core::{CheckInId, OrganizationId, UserStatus};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc_offset() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn user(id: i32, name: &str, role: UserRole, status: UserStatus) -> User {
        let now = date(2025, 1, 6).and_time(NaiveTime::MIN).and_utc();
        User {
            id: UserId::new(id),
            organization_id: OrganizationId::new(1),
            email: Email::parse(&format!("user{id}@example.com")).unwrap(),
            name: name.to_string(),
            role,
            status,
            invitation_expires_at: None,
            jira_account_id: None,
            jira: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn checkin(user_id: i32, local_date: NaiveDate, punctuality: Punctuality) -> CheckIn {
        CheckIn {
            id: CheckInId::new(1),
            user_id: UserId::new(user_id),
            organization_id: OrganizationId::new(1),
            local_date,
            checked_in_at: local_date
                .and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
                .and_utc(),
            punctuality,
        }
    }

    #[test]
    fn test_clamp_days() {
        assert_eq!(clamp_days(None), 30);
        assert_eq!(clamp_days(Some(0)), 1);
        assert_eq!(clamp_days(Some(7)), 7);
        assert_eq!(clamp_days(Some(365)), 90);
    }

    #[test]
    fn test_compute_counts() {
        // Wednesday 2026-03-04.
        let today = date(2026, 3, 4);
        let now = today.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap()).and_utc();

        let users = vec![
            user(1, "zoe", UserRole::Admin, UserStatus::Active),
            user(2, "Ada", UserRole::Member, UserStatus::Active),
            user(3, "Bob", UserRole::Member, UserStatus::Active),
            user(4, "Cy", UserRole::Member, UserStatus::Pending),
        ];
        let checkins = vec![
            checkin(1, date(2026, 3, 3), Punctuality::OnTime),
            checkin(1, today, Punctuality::Late),
            checkin(2, today, Punctuality::Early),
        ];
        let presence = vec![
            OnlineStatus {
                user_id: UserId::new(1),
                status: PresenceStatus::Online,
                last_seen_at: now - Duration::minutes(1),
            },
            OnlineStatus {
                user_id: UserId::new(2),
                status: PresenceStatus::Away,
                last_seen_at: now - Duration::hours(2),
            },
        ];

        let stats = compute(&users, &checkins, &presence, 7, today, now, utc_offset());

        assert_eq!(stats.from, date(2026, 2, 26));
        assert_eq!(
            stats.members,
            MemberCounts {
                active: 3,
                pending: 1,
                admins: 1
            }
        );
        assert_eq!(stats.checkins_today.early, 1);
        assert_eq!(stats.checkins_today.late, 1);
        assert_eq!(stats.checkins_today.on_time, 0);
        assert_eq!(stats.checkins_today.not_checked_in.len(), 1);
        assert_eq!(stats.checkins_today.not_checked_in[0].name, "Bob");

        // Ada's away status is stale.
        assert_eq!(
            stats.presence,
            PresenceCounts {
                online: 1,
                away: 0,
                offline: 2
            }
        );

        let names: Vec<&str> = stats.member_stats.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Ada", "Bob", "zoe"]);

        let zoe = &stats.member_stats[2];
        assert_eq!(zoe.streak, 2);
        assert_eq!(zoe.today, Some(Punctuality::Late));
        assert_eq!(zoe.summary.total, 2);
        assert!((zoe.summary.punctual_rate - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_member_who_joined_mid_window_has_no_earlier_misses() {
        // Window Thu 26 Feb through Wed 4 Mar; Ada joined Tue 3 Mar.
        let today = date(2026, 3, 4);
        let now = today.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap()).and_utc();

        let mut ada = user(2, "Ada", UserRole::Member, UserStatus::Active);
        ada.created_at = date(2026, 3, 3).and_time(NaiveTime::from_hms_opt(15, 0, 0).unwrap()).and_utc();
        let veteran = user(3, "Bob", UserRole::Member, UserStatus::Active);
        let checkins = vec![checkin(2, today, Punctuality::OnTime)];

        let stats = compute(&[ada, veteran], &checkins, &[], 7, today, now, utc_offset());

        let ada = &stats.member_stats[0];
        // Tue 3 Mar missed, today checked in.
        assert_eq!(ada.summary.elapsed_workdays, 2);
        assert_eq!(ada.summary.missed_workdays, 1);

        // Thu, Fri, Mon, Tue elapsed without a check-in; today still open.
        let bob = &stats.member_stats[1];
        assert_eq!(bob.summary.elapsed_workdays, 4);
        assert_eq!(bob.summary.missed_workdays, 4);
    }

    #[test]
    fn test_joined_date_uses_organization_offset() {
        // 23:30 UTC on Mon 2 Mar is already Tue 3 Mar at UTC+02:00.
        let today = date(2026, 3, 4);
        let now = today.and_time(NaiveTime::from_hms_opt(10, 0, 0).unwrap()).and_utc();
        let mut ada = user(2, "Ada", UserRole::Member, UserStatus::Active);
        ada.created_at = date(2026, 3, 2).and_time(NaiveTime::from_hms_opt(23, 30, 0).unwrap()).and_utc();

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let stats = compute(&[ada.clone()], &[], &[], 7, today, now, plus_two);
        assert_eq!(stats.member_stats[0].summary.missed_workdays, 1);

        let stats = compute(&[ada], &[], &[], 7, today, now, utc_offset());
        assert_eq!(stats.member_stats[0].summary.missed_workdays, 2);
    }

    #[test]
    fn test_compute_empty_organization() {
        let today = date(2026, 3, 4);
        let stats = compute(&[], &[], &[], 30, today, Utc::now(), utc_offset());
        assert_eq!(stats.members, MemberCounts::default());
        assert!(stats.member_stats.is_empty());
        assert!(stats.checkins_today.not_checked_in.is_empty());
    }
}
