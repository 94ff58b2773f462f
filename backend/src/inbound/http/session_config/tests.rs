//! Unit tests for session configuration parsing.

use std::collections::HashMap;
use std::io::Write;

use super::*;
use mockable::MockEnv;
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;

fn key_file(len: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create key file");
    file.write_all(&vec![b'k'; len]).expect("write key");
    file
}

#[fixture]
fn valid_key() -> NamedTempFile {
    key_file(SESSION_KEY_MIN_LEN)
}

fn mock_env(vars: HashMap<&'static str, String>) -> MockEnv {
    let mut env = MockEnv::new();
    env.expect_string()
        .times(0..)
        .returning(move |key| vars.get(key).cloned());
    env
}

fn release_vars(key: &NamedTempFile) -> HashMap<&'static str, String> {
    HashMap::from([
        (KEY_FILE_ENV, key.path().to_string_lossy().into_owned()),
        (COOKIE_SECURE_ENV, "1".to_owned()),
        (SAMESITE_ENV, "Strict".to_owned()),
        (ALLOW_EPHEMERAL_ENV, "0".to_owned()),
    ])
}

fn release_error(vars: HashMap<&'static str, String>) -> SessionConfigError {
    match session_settings_from_env(&mock_env(vars), BuildMode::Release) {
        Ok(_) => panic!("release settings should be rejected"),
        Err(error) => error,
    }
}

#[rstest]
#[case(COOKIE_SECURE_ENV)]
#[case(SAMESITE_ENV)]
#[case(ALLOW_EPHEMERAL_ENV)]
fn release_requires_every_toggle(valid_key: NamedTempFile, #[case] missing: &'static str) {
    let mut vars = release_vars(&valid_key);
    vars.remove(missing);

    let err = release_error(vars);

    assert!(matches!(err, SessionConfigError::MissingEnv { name } if name == missing));
}

#[rstest]
#[case(COOKIE_SECURE_ENV, "maybe")]
#[case(COOKIE_SECURE_ENV, "")]
#[case(SAMESITE_ENV, "sometimes")]
#[case(TTL_DAYS_ENV, "0")]
#[case(TTL_DAYS_ENV, "365")]
#[case(TTL_DAYS_ENV, "a week")]
fn release_rejects_invalid_values(
    valid_key: NamedTempFile,
    #[case] name: &'static str,
    #[case] value: &str,
) {
    let mut vars = release_vars(&valid_key);
    vars.insert(name, value.to_owned());

    let err = release_error(vars);

    assert!(matches!(err, SessionConfigError::InvalidEnv { name: got, .. } if got == name));
}

#[rstest]
fn release_rejects_ephemeral_keys(valid_key: NamedTempFile) {
    let mut vars = release_vars(&valid_key);
    vars.insert(ALLOW_EPHEMERAL_ENV, "yes".to_owned());

    assert!(matches!(
        release_error(vars),
        SessionConfigError::EphemeralNotAllowed
    ));
}

#[rstest]
fn release_rejects_missing_key_file(valid_key: NamedTempFile) {
    let mut vars = release_vars(&valid_key);
    vars.insert(KEY_FILE_ENV, "/nonexistent/hera/session_key".to_owned());

    assert!(matches!(
        release_error(vars),
        SessionConfigError::KeyRead { .. }
    ));
}

#[rstest]
fn release_rejects_short_keys() {
    let short = key_file(32);

    let err = release_error(release_vars(&short));

    assert!(matches!(
        err,
        SessionConfigError::KeyTooShort { length: 32, .. }
    ));
}

#[rstest]
fn release_rejects_insecure_same_site_none(valid_key: NamedTempFile) {
    let mut vars = release_vars(&valid_key);
    vars.insert(COOKIE_SECURE_ENV, "0".to_owned());
    vars.insert(SAMESITE_ENV, "None".to_owned());

    assert!(matches!(
        release_error(vars),
        SessionConfigError::InsecureSameSiteNone
    ));
}

#[rstest]
fn release_accepts_complete_settings(valid_key: NamedTempFile) {
    let mut vars = release_vars(&valid_key);
    vars.insert(TTL_DAYS_ENV, "14".to_owned());

    let settings = session_settings_from_env(&mock_env(vars), BuildMode::Release)
        .expect("valid settings");

    assert!(settings.cookie_secure);
    assert_eq!(settings.same_site, SameSite::Strict);
    assert_eq!(settings.ttl, days(14));
}

#[rstest]
fn debug_defaults_use_an_ephemeral_key() {
    let settings = session_settings_from_env(&mock_env(HashMap::new()), BuildMode::Debug)
        .expect("debug defaults");

    assert!(settings.cookie_secure);
    assert_eq!(settings.same_site, SameSite::Lax);
    assert_eq!(settings.ttl, days(DEFAULT_TTL_DAYS));
}

#[rstest]
#[case(SAMESITE_ENV, "unexpected")]
#[case(COOKIE_SECURE_ENV, "perhaps")]
#[case(TTL_DAYS_ENV, "-3")]
fn debug_falls_back_on_invalid_values(
    valid_key: NamedTempFile,
    #[case] name: &'static str,
    #[case] value: &str,
) {
    let mut vars = release_vars(&valid_key);
    vars.insert(name, value.to_owned());

    let settings =
        session_settings_from_env(&mock_env(vars), BuildMode::Debug).expect("debug fallback");

    assert!(settings.cookie_secure);
    assert_eq!(settings.ttl, days(DEFAULT_TTL_DAYS));
}

#[rstest]
fn same_key_file_gives_a_stable_fingerprint(valid_key: NamedTempFile) {
    let first = session_settings_from_env(&mock_env(release_vars(&valid_key)), BuildMode::Release)
        .expect("first load");
    let second = session_settings_from_env(&mock_env(release_vars(&valid_key)), BuildMode::Release)
        .expect("second load");

    assert_eq!(first.key_fingerprint(), second.key_fingerprint());
    assert_ne!(
        first.key_fingerprint(),
        key_fingerprint(&Key::derive_from(&[b'z'; 64]))
    );
}
