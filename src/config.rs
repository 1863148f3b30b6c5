use std::{env, str::FromStr};

use anyhow::{Context, anyhow};
use dotenvy::dotenv;

const MEMORY_URL: &str = "memory://";

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub database_url: String,
    pub jwt_access_secret: String,
    pub jwt_refresh_secret: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,
    pub api_prefix: String,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    // Connection pool
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_idle_timeout_secs: u64,
    pub db_max_lifetime_secs: u64,

    pub log_dir: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; missing optional keys fall back
    /// to their defaults, unparsable values are errors naming the key.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} must be set"))
        };
        let or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            server_addr: or("SERVER_ADDR", "0.0.0.0:8082"),
            database_url: required("DATABASE_URL")?,
            jwt_access_secret: required("JWT_ACCESS_SECRET")?,
            jwt_refresh_secret: required("JWT_REFRESH_SECRET")?,
            access_token_ttl: parse(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min
            refresh_token_ttl: parse(&lookup, "REFRESH_TOKEN_TTL", 604_800)?, // 7 days
            api_prefix: or("API_PREFIX", "/api/v1"),

            rate_limit_enabled: parse(&lookup, "RATE_LIMIT_ENABLED", true)?,
            rate_login_per_min: parse(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_register_per_min: parse(&lookup, "RATE_REGISTER_PER_MIN", 30)?,
            rate_refresh_per_min: parse(&lookup, "RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: parse(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            db_max_connections: parse(&lookup, "DB_MAX_CONNECTIONS", 50)?,
            db_min_connections: parse(&lookup, "DB_MIN_CONNECTIONS", 10)?,
            db_idle_timeout_secs: parse(&lookup, "DB_IDLE_TIMEOUT_SECS", 300)?,
            db_max_lifetime_secs: parse(&lookup, "DB_MAX_LIFETIME_SECS", 1800)?,

            log_dir: or("LOG_DIR", "logs"),
            log_level: or("LOG_LEVEL", "debug"),
        })
    }

    /// `DATABASE_URL=memory://` runs without MySQL.
    pub fn is_memory_store(&self) -> bool {
        self.database_url == MEMORY_URL
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DATABASE_URL" => Some(MEMORY_URL.to_string()),
        "JWT_ACCESS_SECRET" => Some("test-access-secret".to_string()),
        "JWT_REFRESH_SECRET" => Some("test-refresh-secret".to_string()),
        "RATE_LIMIT_ENABLED" => Some("false".to_string()),
        _ => None,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "mysql://root@localhost/hrms"),
            ("JWT_ACCESS_SECRET", "a"),
            ("JWT_REFRESH_SECRET", "r"),
        ]))
        .unwrap();

        assert_eq!(config.server_addr, "0.0.0.0:8082");
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.access_token_ttl, 900);
        assert_eq!(config.refresh_token_ttl, 604_800);
        assert!(config.rate_limit_enabled);
        assert_eq!(config.db_max_connections, 50);
        assert!(!config.is_memory_store());
    }

    #[test]
    fn missing_secret_is_reported_by_name() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_ACCESS_SECRET", "a"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_REFRESH_SECRET"));
    }

    #[test]
    fn unparsable_number_is_an_error() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "memory://"),
            ("JWT_ACCESS_SECRET", "a"),
            ("JWT_REFRESH_SECRET", "r"),
            ("RATE_LOGIN_PER_MIN", "lots"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("RATE_LOGIN_PER_MIN"));
    }

    #[test]
    fn test_config_uses_memory_store() {
        let config = test_config();
        assert!(config.is_memory_store());
        assert!(!config.rate_limit_enabled);
    }
}
