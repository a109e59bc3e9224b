use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let backend_url = require("AIVIS_BACKEND_URL")?;
    if !(backend_url.starts_with("http://") || backend_url.starts_with("https://")) {
        return Err(invalid(
            "AIVIS_BACKEND_URL",
            format!("expected an http(s) URL, got '{backend_url}'"),
        ));
    }
    let backend_token = lookup("AIVIS_BACKEND_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());

    let env = parse_environment(&or_default("AIVIS_ENV", "development"))?;

    let bind_addr = or_default("AIVIS_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("AIVIS_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("AIVIS_LOG_LEVEL", "info");

    let backend_timeout_secs = parse_u64("AIVIS_BACKEND_TIMEOUT_SECS", "60")?;
    if backend_timeout_secs == 0 {
        return Err(invalid(
            "AIVIS_BACKEND_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let user_agent = or_default("AIVIS_USER_AGENT", "aivis/0.1 (visibility-engine)");

    let scheduler_cron = or_default("AIVIS_SCHEDULER_CRON", "0 * * * * *");
    let scheduler_max_concurrent = parse_usize("AIVIS_SCHEDULER_MAX_CONCURRENT", "4")?.max(1);

    Ok(AppConfig {
        backend_url,
        backend_token,
        env,
        bind_addr,
        log_level,
        backend_timeout_secs,
        user_agent,
        scheduler_cron,
        scheduler_max_concurrent,
    })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "AIVIS_ENV".to_string(),
            reason: format!("expected development, test, or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
