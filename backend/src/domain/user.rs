//! User identity, role and account state.
//!
//! Identifiers wrap UUIDs so they cannot be confused with other entity ids.
//! Email addresses are validated and lower-cased on construction.

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Validation errors raised by user value constructors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserValidationError {
    /// The identifier was not a valid UUID.
    #[error("user id must be a valid UUID")]
    InvalidId,
    /// The email address was malformed.
    #[error("email must be a valid address")]
    InvalidEmail,
    /// The full name was empty after trimming.
    #[error("full name must not be empty")]
    EmptyFullName,
    /// The full name exceeded the maximum length.
    #[error("full name must be at most {max} characters")]
    FullNameTooLong {
        /// Upper bound in characters.
        max: usize,
    },
    /// The password length was outside the accepted range.
    #[error("password must be between {min} and {max} characters")]
    PasswordLength {
        /// Lower bound in characters.
        min: usize,
        /// Upper bound in characters.
        max: usize,
    },
    /// The role name was not recognised.
    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Minimum accepted password length.
pub const PASSWORD_MIN: usize = 8;
/// Maximum accepted password length.
pub const PASSWORD_MAX: usize = 128;
/// Maximum accepted full name length.
pub const FULL_NAME_MAX: usize = 120;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

/// Stable user identifier.
///
/// # Examples
/// ```
/// use hera_backend::domain::UserId;
///
/// let id = UserId::new("3fa85f64-5717-4562-b3fc-2c963f66afa6").expect("valid id");
/// assert_eq!(id.to_string(), "3fa85f64-5717-4562-b3fc-2c963f66afa6");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Parse an identifier from its string form.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, UserValidationError> {
        Uuid::parse_str(raw.as_ref().trim())
            .map(Self)
            .map_err(|_| UserValidationError::InvalidId)
    }

    /// Generate a fresh random identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying UUID.
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Access level of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Storefront shopper.
    Customer,
    /// Back-office operator.
    Staff,
    /// Back-office operator who also manages accounts.
    Admin,
}

impl Role {
    /// Database and wire representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Staff => "staff",
            Self::Admin => "admin",
        }
    }

    /// Whether the role may use back-office operations.
    pub const fn is_staff(self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = UserValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Self::Customer),
            "staff" => Ok(Self::Staff),
            "admin" => Ok(Self::Admin),
            other => Err(UserValidationError::UnknownRole(other.to_owned())),
        }
    }
}

/// Validated, lower-cased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and normalise an address.
    ///
    /// # Examples
    /// ```
    /// use hera_backend::domain::EmailAddress;
    ///
    /// let email = EmailAddress::parse("  Wanjiru@Example.COM ").expect("valid");
    /// assert_eq!(email.as_str(), "wanjiru@example.com");
    /// assert!(EmailAddress::parse("not-an-email").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, UserValidationError> {
        let normalised = raw.trim().to_lowercase();
        if normalised.len() > 254 || !email_regex().is_match(&normalised) {
            return Err(UserValidationError::InvalidEmail);
        }
        Ok(Self(normalised))
    }

    /// Borrow the address.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim a full name and enforce its bounds.
pub fn normalise_full_name(raw: &str) -> Result<String, UserValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(UserValidationError::EmptyFullName);
    }
    if trimmed.chars().count() > FULL_NAME_MAX {
        return Err(UserValidationError::FullNameTooLong { max: FULL_NAME_MAX });
    }
    Ok(trimmed.to_owned())
}

/// Enforce password length bounds.
pub fn validate_password(password: &str) -> Result<(), UserValidationError> {
    let len = password.chars().count();
    if (PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        Ok(())
    } else {
        Err(UserValidationError::PasswordLength {
            min: PASSWORD_MIN,
            max: PASSWORD_MAX,
        })
    }
}

/// Persisted account, including credential and lockout state.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Identifier.
    pub id: UserId,
    /// Login address, unique across accounts.
    pub email: EmailAddress,
    /// Display name.
    pub full_name: String,
    /// Optional contact phone.
    pub phone: Option<String>,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Access level.
    pub role: Role,
    /// Whether the email address has been confirmed.
    pub is_verified: bool,
    /// SHA-256 of the outstanding verification token.
    pub verification_token_hash: Option<String>,
    /// When the outstanding verification token lapses.
    pub verification_expires_at: Option<DateTime<Utc>>,
    /// Consecutive failed logins since the last success.
    pub failed_login_attempts: i32,
    /// Login is refused until this instant.
    pub locked_until: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is locked at `now`.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// Public projection without credential material.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email.as_str().to_owned(),
            full_name: self.full_name.clone(),
            phone: self.phone.clone(),
            role: self.role,
            is_verified: self.is_verified,
            locked_until: self.locked_until,
            created_at: self.created_at,
        }
    }
}

/// Account view returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Identifier.
    pub id: UserId,
    /// Login address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Contact phone.
    pub phone: Option<String>,
    /// Access level.
    pub role: Role,
    /// Whether the email has been confirmed.
    pub is_verified: bool,
    /// Lock expiry, when locked.
    pub locked_until: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
