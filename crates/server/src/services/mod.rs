//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Signup, invitations and Jira OAuth account linking
//! - `checkin` - Punctuality buckets, streaks and summaries
//! - `presence` - Heartbeats and presence expiry
//! - `worklog` - Worklogs read from and written to Jira
//! - `stats` - Admin dashboard statistics
//! - `email` - Invitation emails over SMTP

pub mod auth;
pub mod checkin;
pub mod email;
pub mod presence;
pub mod stats;
pub mod worklog;

pub use auth::{AuthError, AuthService};
pub use checkin::{CheckInError, CheckInService};
pub use email::{EmailError, EmailService};
pub use presence::PresenceService;
pub use stats::StatsService;
pub use worklog::{WorklogError, WorklogService};
