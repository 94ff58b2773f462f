//! Account registration, credential checks and token lifecycle.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{PasswordHasher, SessionRepository, UserRepository};
use crate::domain::{
    AuthPolicy, AuthSession, EmailAddress, Error, Principal, Role, TokenPair, User, UserId,
    UserProfile, UserValidationError, generate_token, hash_token, user,
};

/// Result of a successful registration.
#[derive(Debug, Clone)]
pub struct Registration {
    /// The new, unverified account.
    pub user: UserProfile,
    /// Raw verification token; only its hash is stored.
    pub verification_token: String,
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Fresh token pair.
    pub tokens: TokenPair,
    /// The authenticated account.
    pub user: UserProfile,
}

/// Map account validation failures onto field-tagged request errors.
pub(crate) fn user_validation_error(err: UserValidationError) -> Error {
    let (field, code) = match &err {
        UserValidationError::InvalidId => ("id", "invalid_id"),
        UserValidationError::InvalidEmail => ("email", "invalid_email"),
        UserValidationError::EmptyFullName => ("fullName", "empty_full_name"),
        UserValidationError::FullNameTooLong { .. } => ("fullName", "full_name_too_long"),
        UserValidationError::PasswordLength { .. } => ("password", "password_length"),
        UserValidationError::UnknownRole(_) => ("role", "unknown_role"),
    };
    Error::invalid_field(field, code, err.to_string())
}

fn invalid_credentials() -> Error {
    Error::unauthorized("invalid credentials")
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
    policy: AuthPolicy,
}

impl AuthService {
    /// Create the service.
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            users,
            sessions,
            hasher,
            clock,
            policy,
        }
    }

    /// Token lifetimes and lockout settings in force.
    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    async fn hash_password(&self, password: &str) -> Result<String, Error> {
        self.hasher
            .hash(password)
            .await
            .map_err(|err| Error::internal(err.to_string()))
    }

    /// Create an unverified customer account.
    pub async fn register(
        &self,
        email: &str,
        full_name: &str,
        phone: Option<&str>,
        password: &str,
    ) -> Result<Registration, Error> {
        let email = EmailAddress::parse(email).map_err(user_validation_error)?;
        let full_name = user::normalise_full_name(full_name).map_err(user_validation_error)?;
        user::validate_password(password).map_err(user_validation_error)?;
        let phone = phone.map(str::trim).filter(|p| !p.is_empty()).map(str::to_owned);

        let password_hash = self.hash_password(password).await?;
        let token = generate_token();
        let now = self.clock.utc();
        let account = User {
            id: UserId::random(),
            email,
            full_name,
            phone,
            password_hash,
            role: Role::Customer,
            is_verified: false,
            verification_token_hash: Some(hash_token(&token)),
            verification_expires_at: Some(now + self.policy.verification_ttl),
            failed_login_attempts: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        self.users.create(&account).await?;
        info!(
            user_id = %account.id,
            email = %account.email,
            verification_token = %token,
            "account registered; verification token issued"
        );
        Ok(Registration {
            user: account.profile(),
            verification_token: token,
        })
    }

    /// Confirm an email address with the token issued at registration.
    pub async fn verify_email(&self, token: &str) -> Result<UserProfile, Error> {
        let invalid = || {
            Error::invalid_field("token", "invalid_verification_token", "invalid verification token")
        };
        let mut account = self
            .users
            .find_by_verification_hash(&hash_token(token.trim()))
            .await?
            .ok_or_else(invalid)?;
        let now = self.clock.utc();
        if account.verification_expires_at.is_none_or(|at| at <= now) {
            return Err(Error::invalid_field(
                "token",
                "verification_token_expired",
                "verification token has expired",
            ));
        }
        account.is_verified = true;
        account.verification_token_hash = None;
        account.verification_expires_at = None;
        account.updated_at = now;
        self.users.update(&account).await?;
        info!(user_id = %account.id, "email verified");
        Ok(account.profile())
    }

    /// Check credentials and open a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, Error> {
        let email = EmailAddress::parse(email).map_err(|_| invalid_credentials())?;
        let mut account = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or_else(invalid_credentials)?;
        let now = self.clock.utc();
        if let Some(until) = account.locked_until.filter(|until| *until > now) {
            return Err(locked_error(until));
        }

        let matches = self
            .hasher
            .verify(password, &account.password_hash)
            .await
            .map_err(|err| Error::internal(err.to_string()))?;
        if !matches {
            return Err(self.record_failed_login(account).await);
        }
        if !account.is_verified {
            return Err(Error::forbidden("email address has not been verified")
                .with_reason("email_unverified"));
        }

        if account.failed_login_attempts != 0 || account.locked_until.is_some() {
            account.failed_login_attempts = 0;
            account.locked_until = None;
            account.updated_at = now;
            self.users.update(&account).await?;
        }

        let tokens = TokenPair::issue(now, &self.policy);
        let session = AuthSession {
            id: Uuid::new_v4(),
            user_id: account.id,
            access_token_hash: hash_token(&tokens.access_token),
            refresh_token_hash: hash_token(&tokens.refresh_token),
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
            revoked_at: None,
            created_at: now,
        };
        self.sessions.create(&session).await?;
        info!(user_id = %account.id, session_id = %session.id, "login succeeded");
        Ok(LoginOutcome {
            tokens,
            user: account.profile(),
        })
    }

    async fn record_failed_login(&self, mut account: User) -> Error {
        let now = self.clock.utc();
        account.failed_login_attempts += 1;
        account.updated_at = now;
        let lock = account.failed_login_attempts >= self.policy.max_failed_logins;
        if lock {
            account.failed_login_attempts = 0;
            account.locked_until = Some(now + self.policy.lockout);
        }
        if let Err(error) = self.users.update(&account).await {
            return error.into();
        }
        match account.locked_until.filter(|_| lock) {
            Some(until) => {
                warn!(user_id = %account.id, %until, "account locked after failed logins");
                locked_error(until)
            }
            None => invalid_credentials(),
        }
    }

    /// Resolve an access token to its principal.
    pub async fn authenticate(&self, access_token: &str) -> Result<Principal, Error> {
        let now = self.clock.utc();
        let session = self
            .sessions
            .find_by_access_hash(&hash_token(access_token))
            .await?
            .filter(|session| session.access_valid_at(now))
            .ok_or_else(|| Error::unauthorized("invalid or expired access token"))?;
        let account = self
            .users
            .find_by_id(&session.user_id)
            .await?
            .ok_or_else(|| Error::unauthorized("invalid or expired access token"))?;
        Ok(Principal {
            user_id: account.id,
            role: account.role,
            session_id: session.id,
        })
    }

    /// Rotate both tokens of the session owning `refresh_token`.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, Error> {
        let now = self.clock.utc();
        let previous_hash = hash_token(refresh_token);
        let mut session = self
            .sessions
            .find_by_refresh_hash(&previous_hash)
            .await?
            .filter(|session| session.refresh_valid_at(now))
            .ok_or_else(|| Error::unauthorized("invalid or expired refresh token"))?;
        let tokens = TokenPair::issue(now, &self.policy);
        session.access_token_hash = hash_token(&tokens.access_token);
        session.refresh_token_hash = hash_token(&tokens.refresh_token);
        session.access_expires_at = tokens.access_expires_at;
        session.refresh_expires_at = tokens.refresh_expires_at;
        if !self.sessions.rotate(&session, &previous_hash).await? {
            return Err(Error::unauthorized("refresh token has already been used"));
        }
        Ok(tokens)
    }

    /// Revoke the session owning `access_token`. Unknown or already revoked
    /// tokens are ignored.
    pub async fn logout(&self, access_token: &str) -> Result<(), Error> {
        let session = self
            .sessions
            .find_by_access_hash(&hash_token(access_token))
            .await?;
        if let Some(session) = session.filter(|s| s.revoked_at.is_none()) {
            self.sessions.revoke(session.id, self.clock.utc()).await?;
            info!(user_id = %session.user_id, session_id = %session.id, "logged out");
        }
        Ok(())
    }

    /// Replace the caller's password and end their other sessions.
    pub async fn change_password(
        &self,
        principal: &Principal,
        current: &str,
        new: &str,
    ) -> Result<(), Error> {
        user::validate_password(new).map_err(|err| {
            Error::invalid_field("newPassword", "password_length", err.to_string())
        })?;
        let mut account = self
            .users
            .find_by_id(&principal.user_id)
            .await?
            .ok_or_else(|| Error::not_found("user not found"))?;
        let matches = self
            .hasher
            .verify(current, &account.password_hash)
            .await
            .map_err(|err| Error::internal(err.to_string()))?;
        if !matches {
            return Err(Error::invalid_field(
                "currentPassword",
                "wrong_password",
                "current password is incorrect",
            ));
        }
        let now = self.clock.utc();
        account.password_hash = self.hash_password(new).await?;
        account.updated_at = now;
        self.users.update(&account).await?;
        let revoked = self
            .sessions
            .revoke_others(&account.id, principal.session_id, now)
            .await?;
        info!(user_id = %account.id, revoked, "password changed");
        Ok(())
    }
}

fn locked_error(until: chrono::DateTime<chrono::Utc>) -> Error {
    Error::locked("account is temporarily locked").with_details(json!({
        "code": "account_locked",
        "lockedUntil": until,
    }))
}

#[cfg(test)]
#[path = "auth_service_tests.rs"]
mod tests;
