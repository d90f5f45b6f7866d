//! Session middleware configuration.
//!
//! Sets up `PostgreSQL`-backed sessions using tower-sessions. The session
//! cookie is signed with a key derived from the configured session secret.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ServerConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "wt_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Session layer type used by the router.
pub type AppSessionLayer = SessionManagerLayer<PostgresStore, SignedCookie>;

/// Derive the 64-byte cookie signing key from the session secret.
fn signing_key(config: &ServerConfig) -> Key {
    let digest = Sha512::digest(config.session_secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer with `PostgreSQL` store.
///
/// # Arguments
///
/// * `pool` - `PostgreSQL` connection pool
/// * `config` - Server configuration (session secret, and the cookie
///   `Secure` flag follows the base URL)
#[must_use]
pub fn create_session_layer(pool: &PgPool, config: &ServerConfig) -> AppSessionLayer {
    // The session table is created by `wt-cli migrate`
    let store = PostgresStore::new(pool.clone());
    let is_secure = config.is_secure();

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(is_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config))
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_signing_key_is_deterministic() {
        let config = test_config();
        assert_eq!(signing_key(&config).signing(), signing_key(&config).signing());

        let mut other = test_config();
        other.session_secret = SecretString::from("y".repeat(40));
        assert_ne!(signing_key(&config).signing(), signing_key(&other).signing());
    }
}
