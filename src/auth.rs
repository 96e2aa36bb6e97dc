// 🔐 Admin authentication - stored credentials and explicit session tokens
//
// Credentials are never compiled in. Admin accounts are created through the
// CLI and stored as Argon2id PHC strings. A successful login issues a
// `Session` that callers carry explicitly (bearer token) until it expires.

use crate::db;
use anyhow::Result;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const MIN_PASSWORD_LENGTH: usize = 8;

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("unknown session token")]
    UnknownToken,

    #[error("session expired")]
    Expired,

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    WeakPassword,

    #[error("admin {0:?} already exists")]
    AdminExists(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Checks a username/password pair.
pub trait CredentialVerifier {
    fn verify(&self, username: &str, password: &str) -> Result<bool>;
}

/// Verifies against the `admins` table.
pub struct SqliteCredentials<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCredentials<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteCredentials { conn }
    }
}

impl CredentialVerifier for SqliteCredentials<'_> {
    fn verify(&self, username: &str, password: &str) -> Result<bool> {
        let Some(stored_hash) = db::get_admin_password_hash(self.conn, username)? else {
            return Ok(false);
        };

        Ok(verify_password(password, &stored_hash))
    }
}

/// Hash a password with Argon2id and a fresh random salt (PHC string).
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hashing(e.to_string()))?;

    Ok(hash.to_string())
}

/// A malformed stored hash never matches.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        warn!("stored admin password hash is not a valid PHC string");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Create an admin account. The username is stored trimmed.
pub fn create_admin(conn: &Connection, username: &str, password: &str) -> Result<(), AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::EmptyUsername);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword);
    }

    let hash = hash_password(password)?;

    if !db::insert_admin(conn, username, &hash)? {
        return Err(AuthError::AdminExists(username.to_string()));
    }

    info!(username, "created admin account");
    Ok(())
}

// ============================================================================
// AUTHENTICATOR
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct Authenticator {
    pub session_ttl: Duration,
}

impl Authenticator {
    pub fn new(session_ttl_hours: i64) -> Self {
        Authenticator {
            session_ttl: Duration::hours(session_ttl_hours),
        }
    }

    /// Verify credentials and issue a new session.
    pub fn login(
        &self,
        conn: &Connection,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        self.login_with(&SqliteCredentials::new(conn), conn, username, password, now)
    }

    pub fn login_with<V: CredentialVerifier>(
        &self,
        verifier: &V,
        conn: &Connection,
        username: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        // Same normalization as create_admin
        let username = username.trim();

        if !verifier.verify(username, password)? {
            warn!(username, "rejected admin login");
            return Err(AuthError::InvalidCredentials);
        }

        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            issued_at: now,
            expires_at: now + self.session_ttl,
        };
        db::insert_session(conn, &session)?;

        info!(username, expires_at = %session.expires_at, "admin logged in");
        Ok(session)
    }

    /// Resolve a bearer token to a live session.
    pub fn validate(&self, conn: &Connection, token: &str, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let session = db::get_session(conn, token)?.ok_or(AuthError::UnknownToken)?;

        if session.is_expired_at(now) {
            db::delete_session(conn, token)?;
            warn!(username = %session.username, "expired session rejected");
            return Err(AuthError::Expired);
        }

        Ok(session)
    }

    pub fn logout(&self, conn: &Connection, token: &str) -> Result<bool, AuthError> {
        Ok(db::delete_session(conn, token)?)
    }

    pub fn purge_expired(&self, conn: &Connection, now: DateTime<Utc>) -> Result<usize, AuthError> {
        Ok(db::delete_expired_sessions(conn, now)?)
    }
}

impl Default for Authenticator {
    fn default() -> Self {
        Self::new(24)
    }
}
