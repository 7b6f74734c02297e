//! Shared types used across the application.

use std::fmt;

/// One of the two bridged platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    Max,
}

impl Platform {
    /// Short key used in the `pending.platform` column and log fields.
    pub fn key(&self) -> &'static str {
        match self {
            Platform::Telegram => "tg",
            Platform::Max => "max",
        }
    }

    /// Attribution marker prepended to forwarded messages. Also the
    /// anti-loop marker: text starting with either marker is never
    /// forwarded again.
    pub fn marker(&self) -> &'static str {
        match self {
            Platform::Telegram => "[TG]",
            Platform::Max => "[MAX]",
        }
    }

    /// The platform on the other side of the bridge.
    pub fn peer(&self) -> Platform {
        match self {
            Platform::Telegram => Platform::Max,
            Platform::Max => Platform::Telegram,
        }
    }

    /// Parse the short key stored in the database.
    pub fn from_key(key: &str) -> Option<Platform> {
        match key {
            "tg" => Some(Platform::Telegram),
            "max" => Some(Platform::Max),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Returns true if the text carries either platform's attribution marker,
/// meaning it was already forwarded once and must not cross the bridge again.
pub fn has_loop_marker(text: &str) -> bool {
    text.starts_with(Platform::Telegram.marker()) || text.starts_with(Platform::Max.marker())
}

/// Crosspost message flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Telegram to MAX only.
    TgToMax,
    /// MAX to Telegram only.
    MaxToTg,
    /// Bidirectional.
    Both,
}

impl Direction {
    /// Parse the wire/database representation. Returns None for anything
    /// outside the three known values so callers can reject bad input.
    pub fn parse(s: &str) -> Option<Direction> {
        match s {
            "tg>max" => Some(Direction::TgToMax),
            "max>tg" => Some(Direction::MaxToTg),
            "both" => Some(Direction::Both),
            _ => None,
        }
    }

    /// Database/wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::TgToMax => "tg>max",
            Direction::MaxToTg => "max>tg",
            Direction::Both => "both",
        }
    }

    /// Check if this direction allows messages originating on `from`.
    pub fn allows_from(&self, from: Platform) -> bool {
        match self {
            Direction::Both => true,
            Direction::TgToMax => from == Platform::Telegram,
            Direction::MaxToTg => from == Platform::Max,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of chat an inbound event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    /// One-on-one chat with the bot.
    Private,
    /// Group chat; state-changing commands require admin rights here.
    Group,
    /// Broadcast channel; no per-message sender, admin check is skipped.
    Channel,
}

/// Kind of media attachment, shared by both platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    File,
    Voice,
    Audio,
    Sticker,
    VideoNote,
}

impl MediaKind {
    /// Bracketed tag appended to the caption when the media itself could
    /// not be delivered.
    pub fn tag(&self) -> &'static str {
        match self {
            MediaKind::Photo => "[Photo]",
            MediaKind::Video => "[Video]",
            MediaKind::File => "[File]",
            MediaKind::Voice => "[Voice]",
            MediaKind::Audio => "[Audio]",
            MediaKind::Sticker => "[Sticker]",
            MediaKind::VideoNote => "[Video note]",
        }
    }

    /// Media type string on the MAX side, used both for the `/uploads`
    /// endpoint and for attachment payloads in sends.
    pub fn max_media_type(&self) -> &'static str {
        match self {
            MediaKind::Photo => "image",
            MediaKind::Video => "video",
            MediaKind::Voice => "audio",
            MediaKind::Audio | MediaKind::File | MediaKind::Sticker | MediaKind::VideoNote => {
                "file"
            }
        }
    }
}

/// One crosspost link row, as listed by `/crosspost` in a private chat.
#[derive(Debug, Clone)]
pub struct CrosspostLink {
    pub tg_chat_id: i64,
    pub max_chat_id: i64,
    pub direction: Direction,
}
