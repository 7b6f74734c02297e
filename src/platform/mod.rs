//! Platform clients and the capability interface the bridge core uses.
//!
//! Each platform module is a thin long-polling HTTP client that
//! normalizes its wire shapes into [`InboundEvent`] and implements
//! [`ChatPlatform`] for outbound calls. All bridging logic lives above
//! this layer, in `bridge::listener`.

pub mod max;
pub mod telegram;
pub mod upload;

use async_trait::async_trait;

use crate::common::error::PlatformResult;
use crate::common::{ChatKind, MediaKind, Platform};
use crate::markup::{Span, TextMode};

pub use max::MaxClient;
pub use telegram::TelegramClient;
pub use upload::Uploader;

/// A message sender, where the platform identifies one (channels do not).
#[derive(Debug, Clone)]
pub struct MsgSender {
    pub user_id: i64,
    pub name: String,
    pub is_bot: bool,
}

/// A media attachment as referenced by the source platform.
#[derive(Debug, Clone)]
pub struct InboundMedia {
    pub kind: MediaKind,
    /// Platform file handle: a Telegram `file_id`, a MAX download URL.
    pub file: String,
    pub file_name: Option<String>,
}

/// Media resolved to a fetchable URL, ready for the destination client.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    pub kind: MediaKind,
    pub url: String,
    pub file_name: String,
}

/// A normalized inbound message (new or edited).
#[derive(Debug, Clone)]
pub struct Incoming {
    pub chat_id: i64,
    pub msg_id: String,
    pub chat_kind: ChatKind,
    pub sender: Option<MsgSender>,
    /// Message text, or the media caption when there is no text.
    pub text: String,
    pub spans: Vec<Span>,
    pub media: Option<InboundMedia>,
    /// Source-platform id of the replied-to message.
    pub reply_to: Option<String>,
}

impl Incoming {
    /// Display name of the sender, empty for channel posts.
    pub fn sender_name(&self) -> &str {
        self.sender.as_ref().map(|s| s.name.as_str()).unwrap_or("")
    }

    /// True when the platform marked the sender as a bot.
    pub fn from_bot(&self) -> bool {
        self.sender.as_ref().map(|s| s.is_bot).unwrap_or(false)
    }
}

/// One normalized platform update.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(Incoming),
    Edited(Incoming),
    Removed {
        /// Chat the message was removed from, when the platform says.
        chat_id: Option<i64>,
        msg_id: String,
    },
}

/// An outbound message for the destination platform.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub text: String,
    pub mode: TextMode,
    pub reply_to: Option<String>,
    pub media: Option<ResolvedMedia>,
}

impl Outbound {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: TextMode::Plain,
            reply_to: None,
            media: None,
        }
    }
}

/// Capability interface each platform client implements. The bridge
/// listener is generic over this, so the forwarding logic exists once.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Which platform this client talks to.
    fn platform(&self) -> Platform;

    /// Block on the platform's long poll and return the next batch of
    /// normalized events. An empty batch after a quiet poll is normal.
    async fn next_batch(&self) -> PlatformResult<Vec<InboundEvent>>;

    /// Send a message; returns the new platform message id. Media
    /// delivery failures degrade to caption-plus-tag inside the client
    /// rather than dropping the message.
    async fn send(&self, chat_id: i64, out: &Outbound) -> PlatformResult<String>;

    /// Edit a previously forwarded message. Best-effort, never retried.
    async fn edit(&self, chat_id: i64, msg_id: &str, out: &Outbound) -> PlatformResult<()>;

    /// Delete a previously forwarded message.
    async fn delete(&self, chat_id: i64, msg_id: &str) -> PlatformResult<()>;

    /// Whether the user holds admin rights in the chat. Transport errors
    /// report false (commands stay locked down).
    async fn is_admin(&self, chat_id: i64, user_id: i64) -> bool;

    /// Resolve an inbound media reference to a fetchable URL.
    async fn resolve_media(&self, media: &InboundMedia) -> PlatformResult<ResolvedMedia>;
}
