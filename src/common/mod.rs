//! Common utilities and types shared across the application.

pub mod error;
pub mod types;

pub use error::{ConfigError, PlatformError, PlatformResult, StoreError, StoreResult};
pub use types::{has_loop_marker, ChatKind, CrosspostLink, Direction, MediaKind, Platform};
