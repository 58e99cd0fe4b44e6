//! Environment-driven configuration, loaded once at startup.

use once_cell::sync::Lazy;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub sqlite_max_connections: u32,

    // ── Git import
    pub git_log_timeout_secs: u64,
    pub git_diff_timeout_secs: u64,
    pub import_max_commits: usize,

    // ── Broadcast
    pub broadcast_capacity: usize,

    // ── Logging
    pub log_level: String,
}

/// Parse a raw env value, tolerating trailing comments and whitespace.
fn parse_env_value<T: FromStr>(raw: &str) -> Option<T> {
    raw.split('#').next().unwrap_or("").trim().parse::<T>().ok()
}

fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(val) => parse_env_value(&val).unwrap_or(default),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        // A missing .env file is fine; plain environment variables still apply.
        let _ = dotenvy::dotenv();

        Self {
            database_url: env_var_or("DEVBOARD_DATABASE_URL", "sqlite:devboard.db".to_string()),
            sqlite_max_connections: env_var_or("DEVBOARD_SQLITE_MAX_CONNECTIONS", 5),
            git_log_timeout_secs: env_var_or("DEVBOARD_GIT_LOG_TIMEOUT", 30),
            git_diff_timeout_secs: env_var_or("DEVBOARD_GIT_DIFF_TIMEOUT", 10),
            import_max_commits: env_var_or("DEVBOARD_IMPORT_MAX_COMMITS", 500),
            broadcast_capacity: env_var_or("DEVBOARD_BROADCAST_CAPACITY", 256),
            log_level: env_var_or("DEVBOARD_LOG_LEVEL", "info".to_string()),
        }
    }
}

// Global config instance - loaded once at startup
pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_comments_and_whitespace() {
        assert_eq!(parse_env_value::<u64>("30 # seconds"), Some(30));
        assert_eq!(parse_env_value::<u64>("  15  "), Some(15));
        assert_eq!(parse_env_value::<u64>("not a number"), None);
        assert_eq!(
            parse_env_value::<String>("sqlite:dev.db"),
            Some("sqlite:dev.db".to_string())
        );
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::from_env();
        assert!(config.sqlite_max_connections > 0);
        assert!(config.git_log_timeout_secs >= config.git_diff_timeout_secs);
        assert!(config.import_max_commits > 0);
    }
}
