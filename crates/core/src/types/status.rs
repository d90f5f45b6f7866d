//! Role and status enums for various entities.
//!
//! All enums serialize as `snake_case` strings and, with the `postgres`
//! feature, map onto the matching enum types in the `worktally` schema.

use serde::{Deserialize, Serialize};

/// Role of a user within their organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "worktally.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Manages members, organization settings and dashboards.
    Admin,
    /// Tracks their own worklogs and check-ins.
    #[default]
    Member,
}

impl UserRole {
    /// Returns true if this role grants access to the admin API.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Member => write!(f, "member"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

/// Account lifecycle status.
///
/// A `Pending` user holds an invitation token and has not linked a Jira
/// account yet; completing the OAuth flow makes the user `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "worktally.user_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Pending,
    Active,
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Active => write!(f, "active"),
        }
    }
}

impl std::str::FromStr for UserStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            _ => Err(format!("invalid user status: {s}")),
        }
    }
}

/// Team presence status reported by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "worktally.presence_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Away,
    #[default]
    Offline,
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Away => write!(f, "away"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(Self::Online),
            "away" => Ok(Self::Away),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("invalid presence status: {s}")),
        }
    }
}

/// Punctuality bucket of a check-in relative to the organization's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "worktally.punctuality", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Punctuality {
    /// Checked in before the window opened.
    Early,
    /// Checked in while the window was open (bounds inclusive).
    OnTime,
    /// Checked in after the window closed.
    Late,
}

impl Punctuality {
    /// Early and on-time check-ins both count as punctual.
    #[must_use]
    pub const fn is_punctual(self) -> bool {
        !matches!(self, Self::Late)
    }
}

impl std::fmt::Display for Punctuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Early => write!(f, "early"),
            Self::OnTime => write!(f, "on_time"),
            Self::Late => write!(f, "late"),
        }
    }
}

impl std::str::FromStr for Punctuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "early" => Ok(Self::Early),
            "on_time" => Ok(Self::OnTime),
            "late" => Ok(Self::Late),
            _ => Err(format!("invalid punctuality: {s}")),
        }
    }
}
