//! Team overview for members.

use std::collections::HashMap;

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use worktally_core::{PresenceStatus, UserId, UserRole};

use super::load_organization;
use crate::db::{CheckInRepository, PresenceRepository, UserRepository};
use crate::error::Result;
use crate::middleware::RequireUser;
use crate::models::{CheckIn, OnlineStatus, User};
use crate::services::checkin::OrganizationClock;
use crate::services::presence::effective_status;
use crate::state::AppState;

/// Build the team router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/team", get(team))
}

/// One active member on the team page.
#[derive(Debug, Serialize)]
pub struct TeamMember {
    pub id: UserId,
    pub name: String,
    pub role: UserRole,
    pub presence: PresenceStatus,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub checkin: Option<CheckIn>,
}

/// Response for the team page.
#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub date: NaiveDate,
    pub members: Vec<TeamMember>,
}

/// Combine active members with their presence and today's check-in.
///
/// Members are sorted by name.
fn team_members(
    users: Vec<User>,
    presence: &[OnlineStatus],
    mut checkins: Vec<CheckIn>,
    now: DateTime<Utc>,
) -> Vec<TeamMember> {
    let presence: HashMap<UserId, &OnlineStatus> =
        presence.iter().map(|p| (p.user_id, p)).collect();

    let mut members: Vec<TeamMember> = users
        .into_iter()
        .filter(User::is_active)
        .map(|user| {
            let stored = presence.get(&user.id).copied();
            let checkin = checkins
                .iter()
                .position(|c| c.user_id == user.id)
                .map(|index| checkins.swap_remove(index));

            TeamMember {
                id: user.id,
                presence: effective_status(stored, now),
                last_seen_at: stored.map(|p| p.last_seen_at),
                name: user.name,
                role: user.role,
                checkin,
            }
        })
        .collect();

    members.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
    members
}

/// List the organization's active members with presence and today's check-in.
///
/// # Route
///
/// `GET /api/team`
///
/// # Errors
///
/// Returns an error if a query fails or the organization settings are invalid.
pub async fn team(
    RequireUser(user): RequireUser,
    State(state): State<AppState>,
) -> Result<Json<TeamResponse>> {
    let organization = load_organization(&state, &user).await?;
    let now = Utc::now();
    let today = OrganizationClock::for_organization(&organization)?.local_date(now);

    let users = UserRepository::new(state.pool())
        .list_by_organization(organization.id)
        .await?;
    let presence = PresenceRepository::new(state.pool())
        .list_for_organization(organization.id)
        .await?;
    let checkins = CheckInRepository::new(state.pool())
        .list_for_organization_on(organization.id, today)
        .await?;

    Ok(Json(TeamResponse {
        date: today,
        members: team_members(users, &presence, checkins, now),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use worktally_core::{CheckInId, Email, OrganizationId, Punctuality, UserStatus};

    use super::*;

    fn user(id: i32, name: &str, status: UserStatus) -> User {
        let now = Utc::now();
        User {
            id: UserId::new(id),
            organization_id: OrganizationId::new(1),
            email: Email::parse(&format!("user{id}@example.com")).unwrap(),
            name: name.to_string(),
            role: UserRole::Member,
            status,
            invitation_expires_at: None,
            jira_account_id: None,
            jira: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_team_members_merges_presence_and_checkins() {
        let now = Utc::now();
        let users = vec![
            user(1, "zoe", UserStatus::Active),
            user(2, "Ada", UserStatus::Active),
            user(3, "Pending", UserStatus::Pending),
        ];
        let presence = vec![
            OnlineStatus {
                user_id: UserId::new(1),
                status: PresenceStatus::Online,
                last_seen_at: now - Duration::seconds(10),
            },
            OnlineStatus {
                user_id: UserId::new(2),
                status: PresenceStatus::Online,
                last_seen_at: now - Duration::hours(2),
            },
        ];
        let checkins = vec![CheckIn {
            id: CheckInId::new(7),
            user_id: UserId::new(1),
            organization_id: OrganizationId::new(1),
            local_date: now.date_naive(),
            checked_in_at: now,
            punctuality: Punctuality::Late,
        }];

        let members = team_members(users, &presence, checkins, now);

        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "Ada");
        assert_eq!(members[0].presence, PresenceStatus::Offline);
        assert!(members[0].checkin.is_none());
        assert_eq!(members[1].name, "zoe");
        assert_eq!(members[1].presence, PresenceStatus::Online);
        assert_eq!(
            members[1].checkin.as_ref().map(|c| c.punctuality),
            Some(Punctuality::Late)
        );
    }
}
