use std::collections::HashMap;
use std::env::VarError;

use super::*;

fn lookup_from_map<'a>(
    map: &'a HashMap<&'a str, &'a str>,
) -> impl Fn(&str) -> Result<String, VarError> + 'a {
    move |key| {
        map.get(key)
            .map(|v| (*v).to_string())
            .ok_or(VarError::NotPresent)
    }
}

/// Returns a map with all required env vars populated with valid defaults.
fn full_env<'a>() -> HashMap<&'a str, &'a str> {
    let mut m = HashMap::new();
    m.insert("AIVIS_BACKEND_URL", "https://backend.example.com");
    m
}

#[test]
fn parse_environment_known_values() {
    assert_eq!(
        parse_environment("development").unwrap(),
        Environment::Development
    );
    assert_eq!(parse_environment("test").unwrap(), Environment::Test);
    assert_eq!(
        parse_environment("production").unwrap(),
        Environment::Production
    );
}

#[test]
fn parse_environment_unknown_fails() {
    let err = parse_environment("staging").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEnvVar { ref var, .. } if var == "AIVIS_ENV"));
}

#[test]
fn build_app_config_fails_without_backend_url() {
    let map: HashMap<&str, &str> = HashMap::new();
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::MissingEnvVar(ref v)) if v == "AIVIS_BACKEND_URL"),
        "expected MissingEnvVar(AIVIS_BACKEND_URL), got: {result:?}"
    );
}

#[test]
fn build_app_config_treats_blank_backend_url_as_missing() {
    let mut map = HashMap::new();
    map.insert("AIVIS_BACKEND_URL", "   ");
    let result = build_app_config(lookup_from_map(&map));
    assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
}

#[test]
fn build_app_config_rejects_non_http_backend_url() {
    let mut map = HashMap::new();
    map.insert("AIVIS_BACKEND_URL", "ftp://backend.example.com");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "AIVIS_BACKEND_URL"),
        "got: {result:?}"
    );
}

#[test]
fn build_app_config_fails_with_invalid_bind_addr() {
    let mut map = full_env();
    map.insert("AIVIS_BIND_ADDR", "not-a-socket-addr");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "AIVIS_BIND_ADDR"),
        "expected InvalidEnvVar(AIVIS_BIND_ADDR), got: {result:?}"
    );
}

#[test]
fn build_app_config_succeeds_with_all_required_vars() {
    let map = full_env();
    let result = build_app_config(lookup_from_map(&map));
    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let cfg = result.unwrap();
    assert_eq!(cfg.env, Environment::Development);
    assert_eq!(cfg.backend_url, "https://backend.example.com");
    assert!(cfg.backend_token.is_none());
    assert_eq!(cfg.bind_addr.to_string(), "0.0.0.0:3000");
    assert_eq!(cfg.log_level, "info");
    assert_eq!(cfg.backend_timeout_secs, 60);
    assert_eq!(cfg.user_agent, "aivis/0.1 (visibility-engine)");
    assert_eq!(cfg.scheduler_cron, "0 * * * * *");
    assert_eq!(cfg.scheduler_max_concurrent, 4);
}

#[test]
fn backend_timeout_override() {
    let mut map = full_env();
    map.insert("AIVIS_BACKEND_TIMEOUT_SECS", "120");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.backend_timeout_secs, 120);
}

#[test]
fn backend_timeout_invalid() {
    let mut map = full_env();
    map.insert("AIVIS_BACKEND_TIMEOUT_SECS", "soon");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "AIVIS_BACKEND_TIMEOUT_SECS"),
        "got: {result:?}"
    );
}

#[test]
fn backend_timeout_zero_rejected() {
    let mut map = full_env();
    map.insert("AIVIS_BACKEND_TIMEOUT_SECS", "0");
    let result = build_app_config(lookup_from_map(&map));
    assert!(matches!(result, Err(ConfigError::InvalidEnvVar { .. })));
}

#[test]
fn scheduler_max_concurrent_floor_is_one() {
    let mut map = full_env();
    map.insert("AIVIS_SCHEDULER_MAX_CONCURRENT", "0");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.scheduler_max_concurrent, 1);
}

#[test]
fn scheduler_max_concurrent_invalid() {
    let mut map = full_env();
    map.insert("AIVIS_SCHEDULER_MAX_CONCURRENT", "-2");
    let result = build_app_config(lookup_from_map(&map));
    assert!(
        matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "AIVIS_SCHEDULER_MAX_CONCURRENT"),
        "got: {result:?}"
    );
}

#[test]
fn backend_token_is_redacted_in_debug() {
    let mut map = full_env();
    map.insert("AIVIS_BACKEND_TOKEN", "super-secret");
    let cfg = build_app_config(lookup_from_map(&map)).unwrap();
    assert_eq!(cfg.backend_token.as_deref(), Some("super-secret"));
    let debug = format!("{cfg:?}");
    assert!(!debug.contains("super-secret"));
    assert!(debug.contains("[redacted]"));
}
