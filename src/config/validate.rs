//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.telegram.token.is_empty() {
        errors.push("telegram.token is required".to_string());
    }
    if config.telegram.token == "YOUR_TELEGRAM_TOKEN_HERE" {
        errors.push("telegram.token has not been configured (still using placeholder)".to_string());
    }

    if config.max.token.is_empty() {
        errors.push("max.token is required".to_string());
    }
    if config.max.token == "YOUR_MAX_TOKEN_HERE" {
        errors.push("max.token has not been configured (still using placeholder)".to_string());
    }

    if config.storage.path.is_empty() {
        errors.push("storage.path is required".to_string());
    }

    if let Some(ref bridge) = config.bridge {
        if let Some(timeout) = bridge.poll_timeout_secs {
            if timeout == 0 || timeout > 90 {
                errors.push(format!(
                    "bridge.poll_timeout_secs must be 1-90 (got {})",
                    timeout
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}
