//! Admin dashboard API.
//!
//! Every handler requires [`RequireAdmin`](crate::middleware::RequireAdmin)
//! and only sees the admin's own organization.

pub mod organization;
pub mod stats;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(users::router())
        .merge(organization::router())
        .merge(stats::router())
}
