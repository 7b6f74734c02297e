//! Configuration type definitions.

use serde::Deserialize;

/// Default Telegram Bot API base URL.
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Default MAX Bot API base URL.
pub const DEFAULT_MAX_API_URL: &str = "https://platform-api.max.ru";

/// Default long-poll timeout in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub max: MaxConfig,
    pub storage: StorageConfig,
    pub bridge: Option<BridgeConfig>,
}

/// Telegram bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    /// Bot API base URL override (for local API servers).
    pub api_url: Option<String>,
    /// Public t.me link shown in /help.
    pub bot_url: Option<String>,
}

/// MAX bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MaxConfig {
    pub token: String,
    /// Bot API base URL override.
    pub api_url: Option<String>,
    /// Public max.ru link shown in /help.
    pub bot_url: Option<String>,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path.
    pub path: String,
}

/// Bridge tuning knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Long-poll timeout in seconds for both platforms.
    pub poll_timeout_secs: Option<u64>,
}

impl Config {
    pub fn telegram_api_url(&self) -> &str {
        self.telegram
            .api_url
            .as_deref()
            .unwrap_or(DEFAULT_TELEGRAM_API_URL)
    }

    pub fn max_api_url(&self) -> &str {
        self.max.api_url.as_deref().unwrap_or(DEFAULT_MAX_API_URL)
    }

    pub fn telegram_bot_url(&self) -> &str {
        self.telegram.bot_url.as_deref().unwrap_or("https://t.me")
    }

    pub fn max_bot_url(&self) -> &str {
        self.max.bot_url.as_deref().unwrap_or("https://max.ru")
    }

    pub fn poll_timeout_secs(&self) -> u64 {
        self.bridge
            .as_ref()
            .and_then(|b| b.poll_timeout_secs)
            .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS)
    }
}
