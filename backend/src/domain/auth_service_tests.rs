//! Tests for the authentication service.

use super::*;
use crate::domain::ErrorCode;
use crate::domain::ports::{MockPasswordHasher, MockSessionRepository, MockUserRepository};
use chrono::{DateTime, Duration, TimeZone, Utc};
use mockable::MockClock;
use rstest::{fixture, rstest};

#[fixture]
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn clock_at(now: DateTime<Utc>) -> Arc<MockClock> {
    let mut clock = MockClock::new();
    clock.expect_utc().return_const(now);
    Arc::new(clock)
}

fn account(now: DateTime<Utc>) -> User {
    User {
        id: UserId::random(),
        email: EmailAddress::parse("amina@example.com").expect("email"),
        full_name: "Amina Njeri".into(),
        phone: None,
        password_hash: "$argon2id$stub".into(),
        role: Role::Customer,
        is_verified: true,
        verification_token_hash: None,
        verification_expires_at: None,
        failed_login_attempts: 0,
        locked_until: None,
        created_at: now,
        updated_at: now,
    }
}

fn service(
    users: MockUserRepository,
    sessions: MockSessionRepository,
    hasher: MockPasswordHasher,
    now: DateTime<Utc>,
) -> AuthService {
    AuthService::new(
        Arc::new(users),
        Arc::new(sessions),
        Arc::new(hasher),
        clock_at(now),
        AuthPolicy::default(),
    )
}

fn hasher_answering(matches: bool) -> MockPasswordHasher {
    let mut hasher = MockPasswordHasher::new();
    hasher.expect_verify().return_once(move |_, _| Ok(matches));
    hasher
}

#[rstest]
#[tokio::test]
async fn short_passwords_are_rejected_before_hashing(now: DateTime<Utc>) {
    let mut hasher = MockPasswordHasher::new();
    hasher.expect_hash().times(0);
    let mut users = MockUserRepository::new();
    users.expect_create().times(0);

    let error = service(users, MockSessionRepository::new(), hasher, now)
        .register("amina@example.com", "Amina", None, "short")
        .await
        .expect_err("too short");

    assert_eq!(error.code(), ErrorCode::InvalidRequest);
    assert_eq!(
        error.details().and_then(|d| d.get("field")),
        Some(&serde_json::json!("password"))
    );
}

#[rstest]
#[tokio::test]
async fn registration_stores_only_the_token_hash(now: DateTime<Utc>) {
    let mut hasher = MockPasswordHasher::new();
    hasher
        .expect_hash()
        .return_once(|_| Ok("$argon2id$hashed".into()));
    let mut users = MockUserRepository::new();
    let stored = Arc::new(std::sync::Mutex::new(None));
    let sink = Arc::clone(&stored);
    users.expect_create().times(1).returning(move |user| {
        *sink.lock().expect("lock") = Some(user.clone());
        Ok(())
    });

    let registration = service(users, MockSessionRepository::new(), hasher, now)
        .register(" Amina@Example.com ", " Amina Njeri ", Some(" "), "correct horse")
        .await
        .expect("registered");

    let user = stored.lock().expect("lock").clone().expect("stored user");
    assert_eq!(user.email.as_str(), "amina@example.com");
    assert_eq!(user.full_name, "Amina Njeri");
    assert_eq!(user.phone, None);
    assert_eq!(user.role, Role::Customer);
    assert!(!user.is_verified);
    assert_eq!(
        user.verification_token_hash,
        Some(hash_token(&registration.verification_token))
    );
    assert_eq!(user.verification_expires_at, Some(now + Duration::hours(24)));
}

#[rstest]
#[tokio::test]
async fn fifth_failure_locks_the_account(now: DateTime<Utc>) {
    let mut user = account(now);
    user.failed_login_attempts = 4;
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(user)));
    users
        .expect_update()
        .withf(move |u| u.failed_login_attempts == 0 && u.locked_until == Some(now + Duration::minutes(15)))
        .times(1)
        .return_once(|_| Ok(()));

    let error = service(users, MockSessionRepository::new(), hasher_answering(false), now)
        .login("amina@example.com", "wrong password")
        .await
        .expect_err("locked");

    assert_eq!(error.code(), ErrorCode::Locked);
    assert!(error.details().and_then(|d| d.get("lockedUntil")).is_some());
}

#[rstest]
#[tokio::test]
async fn earlier_failures_only_count(now: DateTime<Utc>) {
    let user = account(now);
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(user)));
    users
        .expect_update()
        .withf(|u| u.failed_login_attempts == 1 && u.locked_until.is_none())
        .times(1)
        .return_once(|_| Ok(()));

    let error = service(users, MockSessionRepository::new(), hasher_answering(false), now)
        .login("amina@example.com", "wrong password")
        .await
        .expect_err("bad password");
    assert_eq!(error.code(), ErrorCode::Unauthorized);
}

#[rstest]
#[tokio::test]
async fn locked_accounts_skip_password_checks(now: DateTime<Utc>) {
    let mut user = account(now);
    user.locked_until = Some(now + Duration::minutes(3));
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(user)));
    let mut hasher = MockPasswordHasher::new();
    hasher.expect_verify().times(0);

    let error = service(users, MockSessionRepository::new(), hasher, now)
        .login("amina@example.com", "correct horse")
        .await
        .expect_err("locked");
    assert_eq!(error.code(), ErrorCode::Locked);
}

#[rstest]
#[tokio::test]
async fn unverified_accounts_cannot_log_in(now: DateTime<Utc>) {
    let mut user = account(now);
    user.is_verified = false;
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(user)));
    let mut sessions = MockSessionRepository::new();
    sessions.expect_create().times(0);

    let error = service(users, sessions, hasher_answering(true), now)
        .login("amina@example.com", "correct horse")
        .await
        .expect_err("unverified");
    assert_eq!(error.code(), ErrorCode::Forbidden);
    assert_eq!(
        error.details().and_then(|d| d.get("code")),
        Some(&serde_json::json!("email_unverified"))
    );
}

#[rstest]
#[tokio::test]
async fn successful_login_opens_a_session(now: DateTime<Utc>) {
    let user = account(now);
    let user_id = user.id;
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_email()
        .return_once(move |_| Ok(Some(user)));
    users.expect_update().times(0);
    let mut sessions = MockSessionRepository::new();
    sessions
        .expect_create()
        .withf(move |s| s.user_id == user_id && s.revoked_at.is_none())
        .times(1)
        .return_once(|_| Ok(()));

    let outcome = service(users, sessions, hasher_answering(true), now)
        .login("amina@example.com", "correct horse")
        .await
        .expect("login");
    assert_eq!(outcome.user.id, user_id);
    assert_eq!(outcome.tokens.access_expires_at, now + Duration::minutes(15));
}

#[rstest]
#[tokio::test]
async fn losing_the_rotation_race_is_unauthorised(now: DateTime<Utc>) {
    let session = AuthSession {
        id: Uuid::new_v4(),
        user_id: UserId::random(),
        access_token_hash: hash_token("access"),
        refresh_token_hash: hash_token("refresh"),
        access_expires_at: now,
        refresh_expires_at: now + Duration::days(1),
        revoked_at: None,
        created_at: now,
    };
    let mut sessions = MockSessionRepository::new();
    sessions
        .expect_find_by_refresh_hash()
        .return_once(move |_| Ok(Some(session)));
    sessions
        .expect_rotate()
        .withf(|_, previous| *previous == hash_token("refresh"))
        .return_once(|_, _| Ok(false));

    let error = service(
        MockUserRepository::new(),
        sessions,
        MockPasswordHasher::new(),
        now,
    )
    .refresh("refresh")
    .await
    .expect_err("rotated elsewhere");
    assert_eq!(error.code(), ErrorCode::Unauthorized);
}

#[rstest]
#[tokio::test]
async fn expired_verification_tokens_are_rejected(now: DateTime<Utc>) {
    let mut user = account(now);
    user.is_verified = false;
    user.verification_token_hash = Some(hash_token("tok"));
    user.verification_expires_at = Some(now - Duration::minutes(1));
    let mut users = MockUserRepository::new();
    users
        .expect_find_by_verification_hash()
        .return_once(move |_| Ok(Some(user)));
    users.expect_update().times(0);

    let error = service(
        users,
        MockSessionRepository::new(),
        MockPasswordHasher::new(),
        now,
    )
    .verify_email("tok")
    .await
    .expect_err("expired");
    assert_eq!(
        error.details().and_then(|d| d.get("code")),
        Some(&serde_json::json!("verification_token_expired"))
    );
}

#[rstest]
#[tokio::test]
async fn logout_of_unknown_token_is_a_no_op(now: DateTime<Utc>) {
    let mut sessions = MockSessionRepository::new();
    sessions
        .expect_find_by_access_hash()
        .return_once(|_| Ok(None));
    sessions.expect_revoke().times(0);

    service(
        MockUserRepository::new(),
        sessions,
        MockPasswordHasher::new(),
        now,
    )
    .logout("gone")
    .await
    .expect("idempotent");
}
