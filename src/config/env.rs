//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `FERRYMAN_TELEGRAM_TOKEN` - Telegram bot token
//! - `FERRYMAN_MAX_TOKEN` - MAX bot token
//! - `FERRYMAN_DB_PATH` - SQLite database path

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "FERRYMAN";

/// Apply environment variable overrides to a config.
///
/// This allows sensitive values like tokens to be provided via
/// environment variables instead of the config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(token) = env::var(format!("{}_TELEGRAM_TOKEN", ENV_PREFIX)) {
        config.telegram.token = token;
    }
    if let Ok(token) = env::var(format!("{}_MAX_TOKEN", ENV_PREFIX)) {
        config.max.token = token;
    }
    if let Ok(path) = env::var(format!("{}_DB_PATH", ENV_PREFIX)) {
        config.storage.path = path;
    }

    config
}

/// Get the config file path from environment or use default.
///
/// Checks `FERRYMAN_CONFIG`, otherwise returns "ferryman.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "ferryman.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            telegram: TelegramConfig {
                token: "original_tg".to_string(),
                api_url: None,
                bot_url: None,
            },
            max: MaxConfig {
                token: "original_max".to_string(),
                api_url: None,
                bot_url: None,
            },
            storage: StorageConfig {
                path: "bridge.db".to_string(),
            },
            bridge: None,
        }
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("FERRYMAN_CONFIG");
        assert_eq!(get_config_path(), "ferryman.conf");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("FERRYMAN_TELEGRAM_TOKEN");
        env::remove_var("FERRYMAN_MAX_TOKEN");
        env::remove_var("FERRYMAN_DB_PATH");

        let result = apply_env_overrides(make_test_config());

        assert_eq!(result.telegram.token, "original_tg");
        assert_eq!(result.max.token, "original_max");
        assert_eq!(result.storage.path, "bridge.db");
    }
}
