//! Profile self-service and account administration.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use pagination::{Page, PageRequest};
use tracing::info;
use uuid::Uuid;

use crate::domain::auth_service::user_validation_error;
use crate::domain::ports::{SessionRepository, UserRepository};
use crate::domain::{Error, Principal, Role, User, UserId, UserProfile, user};

/// Partial profile update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    /// New display name.
    pub full_name: Option<String>,
    /// New phone; `Some(None)` clears it.
    pub phone: Option<Option<String>>,
}

/// Account service.
#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    /// Create the service.
    pub fn new(
        users: Arc<dyn UserRepository>,
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            sessions,
            clock,
        }
    }

    async fn load(&self, id: &UserId) -> Result<User, Error> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("user {id} not found")))
    }

    /// The caller's profile.
    pub async fn me(&self, principal: &Principal) -> Result<UserProfile, Error> {
        Ok(self.load(&principal.user_id).await?.profile())
    }

    /// Update the caller's display name or phone.
    pub async fn update_profile(
        &self,
        principal: &Principal,
        update: ProfileUpdate,
    ) -> Result<UserProfile, Error> {
        let mut account = self.load(&principal.user_id).await?;
        if let Some(name) = update.full_name.as_deref() {
            account.full_name = user::normalise_full_name(name).map_err(user_validation_error)?;
        }
        if let Some(phone) = update.phone {
            account.phone = phone
                .map(|p| p.trim().to_owned())
                .filter(|p| !p.is_empty());
        }
        account.updated_at = self.clock.utc();
        self.users.update(&account).await?;
        Ok(account.profile())
    }

    /// Page through accounts, optionally restricted to one role.
    pub async fn list_users(
        &self,
        role: Option<Role>,
        page: PageRequest,
    ) -> Result<Page<UserProfile>, Error> {
        let (users, total) = self.users.list(role, page).await?;
        Ok(Page::new(users, page, total).map(|u| u.profile()))
    }

    fn refuse_self(actor: &Principal, target: &UserId, action: &str) -> Result<(), Error> {
        if actor.user_id == *target {
            return Err(Error::conflict(format!("admins cannot {action} themselves"))
                .with_reason("self_administration"));
        }
        Ok(())
    }

    /// Assign a role to another account.
    pub async fn change_role(
        &self,
        actor: &Principal,
        target: &UserId,
        role: Role,
    ) -> Result<UserProfile, Error> {
        Self::refuse_self(actor, target, "change the role of")?;
        let mut account = self.load(target).await?;
        account.role = role;
        account.updated_at = self.clock.utc();
        self.users.update(&account).await?;
        info!(actor = %actor.user_id, target = %target, role = role.as_str(), "role changed");
        Ok(account.profile())
    }

    /// Lock another account until `until` and end its sessions.
    pub async fn lock(
        &self,
        actor: &Principal,
        target: &UserId,
        until: DateTime<Utc>,
    ) -> Result<UserProfile, Error> {
        Self::refuse_self(actor, target, "lock")?;
        let now = self.clock.utc();
        if until <= now {
            return Err(Error::invalid_field(
                "until",
                "lock_in_past",
                "lock expiry must be in the future",
            ));
        }
        let mut account = self.load(target).await?;
        account.locked_until = Some(until);
        account.updated_at = now;
        self.users.update(&account).await?;
        let revoked = self.sessions.revoke_others(target, Uuid::nil(), now).await?;
        info!(actor = %actor.user_id, target = %target, %until, revoked, "account locked");
        Ok(account.profile())
    }

    /// Lift a lock and reset the failed-login counter.
    pub async fn unlock(&self, target: &UserId) -> Result<UserProfile, Error> {
        let mut account = self.load(target).await?;
        account.locked_until = None;
        account.failed_login_attempts = 0;
        account.updated_at = self.clock.utc();
        self.users.update(&account).await?;
        info!(target = %target, "account unlocked");
        Ok(account.profile())
    }

    /// Remove another account.
    pub async fn delete(&self, actor: &Principal, target: &UserId) -> Result<(), Error> {
        Self::refuse_self(actor, target, "delete")?;
        if !self.users.delete(target).await? {
            return Err(Error::not_found(format!("user {target} not found")));
        }
        info!(actor = %actor.user_id, target = %target, "account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{MockSessionRepository, MockUserRepository};
    use crate::domain::EmailAddress;
    use chrono::Duration;
    use mockable::DefaultClock;
    use rstest::rstest;

    fn admin() -> Principal {
        Principal {
            user_id: UserId::random(),
            role: Role::Admin,
            session_id: Uuid::new_v4(),
        }
    }

    fn account(id: UserId) -> User {
        let now = Utc::now();
        User {
            id,
            email: EmailAddress::parse("staff@example.com").expect("email"),
            full_name: "Staff Member".into(),
            phone: Some("0712345678".into()),
            password_hash: "hash".into(),
            role: Role::Staff,
            is_verified: true,
            verification_token_hash: None,
            verification_expires_at: None,
            failed_login_attempts: 3,
            locked_until: Some(now + Duration::minutes(5)),
            created_at: now,
            updated_at: now,
        }
    }

    fn service(users: MockUserRepository, sessions: MockSessionRepository) -> UserService {
        UserService::new(Arc::new(users), Arc::new(sessions), Arc::new(DefaultClock))
    }

    #[rstest]
    #[case::role("role")]
    #[case::lock("lock")]
    #[case::delete("delete")]
    #[tokio::test]
    async fn admins_cannot_target_themselves(#[case] action: &str) {
        let actor = admin();
        let svc = service(MockUserRepository::new(), MockSessionRepository::new());
        let result = match action {
            "role" => svc
                .change_role(&actor, &actor.user_id, Role::Customer)
                .await
                .map(|_| ()),
            "lock" => svc
                .lock(&actor, &actor.user_id, Utc::now() + Duration::hours(1))
                .await
                .map(|_| ()),
            _ => svc.delete(&actor, &actor.user_id).await,
        };
        assert_eq!(result.expect_err("self").code(), ErrorCode::Conflict);
    }

    #[rstest]
    #[tokio::test]
    async fn unlock_clears_the_counter() {
        let target = UserId::random();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .return_once(move |id| Ok(Some(account(*id))));
        users
            .expect_update()
            .withf(|u| u.locked_until.is_none() && u.failed_login_attempts == 0)
            .times(1)
            .return_once(|_| Ok(()));

        let profile = service(users, MockSessionRepository::new())
            .unlock(&target)
            .await
            .expect("unlocked");
        assert!(profile.locked_until.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn locking_ends_every_session() {
        let target = UserId::random();
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .return_once(move |id| Ok(Some(account(*id))));
        users.expect_update().return_once(|_| Ok(()));
        let mut sessions = MockSessionRepository::new();
        sessions
            .expect_revoke_others()
            .withf(move |user, keep, _| *user == target && keep.is_nil())
            .times(1)
            .return_once(|_, _, _| Ok(2));

        service(users, sessions)
            .lock(&admin(), &target, Utc::now() + Duration::hours(2))
            .await
            .expect("locked");
    }

    #[rstest]
    #[tokio::test]
    async fn profile_updates_clear_blank_phones() {
        let caller = Principal {
            role: Role::Customer,
            ..admin()
        };
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .return_once(move |id| Ok(Some(account(*id))));
        users
            .expect_update()
            .withf(|u| u.phone.is_none() && u.full_name == "New Name")
            .return_once(|_| Ok(()));

        let profile = service(users, MockSessionRepository::new())
            .update_profile(
                &caller,
                ProfileUpdate {
                    full_name: Some("  New Name ".into()),
                    phone: Some(Some("  ".into())),
                },
            )
            .await
            .expect("updated");
        assert_eq!(profile.full_name, "New Name");
    }
}
