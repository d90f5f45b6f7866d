//! Domain models for Worktally.
//!
//! These are validated domain objects, separate from the row types the
//! repositories decode from `PostgreSQL`.

pub mod checkin;
pub mod organization;
pub mod presence;
pub mod session;
pub mod user;

pub use checkin::CheckIn;
pub use organization::Organization;
pub use presence::OnlineStatus;
pub use session::{CurrentUser, keys as session_keys};
pub use user::{JiraCredentials, User};
