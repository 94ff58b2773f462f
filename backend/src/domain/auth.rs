//! Authentication primitives: opaque tokens, session rows and principals.
//!
//! Tokens are 32 random bytes rendered as lowercase hex. Only their SHA-256
//! digests are persisted, so a leaked database cannot be replayed against the
//! API.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;
use zeroize::Zeroize;

use super::user::{Role, UserId};

const TOKEN_BYTES: usize = 32;

/// Generate a random opaque token.
pub fn generate_token() -> String {
    let mut bytes = [0_u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    bytes.zeroize();
    token
}

/// SHA-256 fingerprint of a token, hex encoded.
///
/// # Examples
/// ```
/// use hera_backend::domain::hash_token;
///
/// let digest = hash_token("abc");
/// assert_eq!(digest.len(), 64);
/// assert_eq!(digest, hash_token("abc"));
/// ```
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Lifetimes and lockout policy for the auth service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthPolicy {
    /// Access token lifetime.
    pub access_ttl: Duration,
    /// Refresh token lifetime.
    pub refresh_ttl: Duration,
    /// Failed logins that trigger a lock.
    pub max_failed_logins: i32,
    /// Length of an automatic lock.
    pub lockout: Duration,
    /// Lifetime of an email verification token.
    pub verification_ttl: Duration,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            access_ttl: Duration::minutes(15),
            refresh_ttl: Duration::days(7),
            max_failed_logins: 5,
            lockout: Duration::minutes(15),
            verification_ttl: Duration::hours(24),
        }
    }
}

/// Persisted login session holding token fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    /// Identifier.
    pub id: Uuid,
    /// Owner.
    pub user_id: UserId,
    /// SHA-256 of the current access token.
    pub access_token_hash: String,
    /// SHA-256 of the current refresh token.
    pub refresh_token_hash: String,
    /// Access token expiry.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiry.
    pub refresh_expires_at: DateTime<Utc>,
    /// Revocation instant, once logged out.
    pub revoked_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl AuthSession {
    /// Whether the access token is usable at `now`.
    pub fn access_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.access_expires_at > now
    }

    /// Whether the refresh token is usable at `now`.
    pub fn refresh_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.refresh_expires_at > now
    }
}

/// Raw tokens handed to the client once, together with their expiries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Bearer token for API calls.
    pub access_token: String,
    /// When the access token lapses.
    pub access_expires_at: DateTime<Utc>,
    /// Token used to rotate the pair.
    pub refresh_token: String,
    /// When the refresh token lapses.
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenPair {
    /// Mint a fresh pair starting at `now`.
    pub fn issue(now: DateTime<Utc>, policy: &AuthPolicy) -> Self {
        Self {
            access_token: generate_token(),
            access_expires_at: now + policy.access_ttl,
            refresh_token: generate_token(),
            refresh_expires_at: now + policy.refresh_ttl,
        }
    }
}

/// Authenticated caller resolved from an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    /// Caller.
    pub user_id: UserId,
    /// Caller's role at authentication time.
    pub role: Role,
    /// Session the access token belongs to.
    pub session_id: Uuid,
}

impl Principal {
    /// Whether the caller is staff or admin.
    pub const fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Whether the caller is an admin.
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}
