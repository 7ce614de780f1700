//! `AppError` display format and variant behavior.

use fleet_relay::AppError;

#[test]
fn config_error_display_starts_with_config_prefix() {
    let err = AppError::Config("bad value".into());
    assert_eq!(err.to_string(), "config: bad value");
}

#[test]
fn login_error_display_includes_message() {
    let err = AppError::Login("no session cookie".into());
    assert_eq!(err.to_string(), "login: no session cookie");
}

#[test]
fn auth_rejected_display_carries_the_status_code() {
    let err = AppError::AuthRejected(403);
    assert_eq!(err.to_string(), "auth rejected: upstream status 403");
}

#[test]
fn upstream_error_is_distinct_from_login_error() {
    let upstream = AppError::Upstream("timed out".into());
    let login = AppError::Login("timed out".into());
    assert_ne!(upstream.to_string(), login.to_string());
    assert!(upstream.to_string().starts_with("upstream:"));
    assert!(login.to_string().starts_with("login:"));
}

#[test]
fn error_messages_have_no_trailing_period() {
    let err = AppError::Server("bind failed".into());
    let s = err.to_string();
    assert!(
        !s.ends_with('.'),
        "error message must not end with a period: {s}"
    );
}

#[test]
fn implements_std_error_trait() {
    fn assert_error<E: std::error::Error>(_err: &E) {}
    assert_error(&AppError::Upstream("boom".into()));
}

#[test]
fn invalid_toml_converts_into_a_config_error() {
    let parse_err = toml::from_str::<toml::Value>("a = ").expect_err("malformed toml");
    let err = AppError::from(parse_err);
    assert!(matches!(err, AppError::Config(_)));
    assert!(err.to_string().starts_with("config: invalid config:"));
}
