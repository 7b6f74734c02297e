//! Text command grammar, shared by both platforms.

use crate::common::Direction;

/// A recognized bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    /// `/bridge` (empty key) or `/bridge <key>`.
    Bridge { key: String },
    /// `/bridge prefix on|off`.
    BridgePrefix { on: bool },
    Unbridge,
    /// `/crosspost` (empty key) or `/crosspost <key>`.
    Crosspost { key: String },
    /// `/crosspost direction <dir>`; None when the argument is malformed.
    CrosspostDirection { direction: Option<Direction> },
    Uncrosspost,
}

/// Parse a message text as a command. Unknown slash-text returns None
/// and flows through the normal forwarding path.
pub fn parse(text: &str) -> Option<Command> {
    let text = text.trim();

    match text {
        "/start" | "/help" => return Some(Command::Help),
        "/bridge prefix on" => return Some(Command::BridgePrefix { on: true }),
        "/bridge prefix off" => return Some(Command::BridgePrefix { on: false }),
        "/unbridge" => return Some(Command::Unbridge),
        "/uncrosspost" => return Some(Command::Uncrosspost),
        "/bridge" => {
            return Some(Command::Bridge { key: String::new() });
        }
        "/crosspost" => {
            return Some(Command::Crosspost { key: String::new() });
        }
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("/crosspost direction") {
        return Some(Command::CrosspostDirection {
            direction: Direction::parse(rest.trim()),
        });
    }
    if let Some(rest) = text.strip_prefix("/bridge ") {
        return Some(Command::Bridge {
            key: rest.trim().to_string(),
        });
    }
    if let Some(rest) = text.strip_prefix("/crosspost ") {
        return Some(Command::Crosspost {
            key: rest.trim().to_string(),
        });
    }

    None
}

/// Bot invite links shown in the help text.
#[derive(Debug, Clone)]
pub struct HelpLinks {
    pub telegram_url: String,
    pub max_url: String,
}

/// Help text for `/start` and `/help`.
pub fn help_text(links: &HelpLinks) -> String {
    format!(
        "Ferryman relays messages between Telegram and MAX.\n\
         \n\
         Group commands:\n\
         /bridge - create a pairing key\n\
         /bridge <key> - link this chat using a key from the other platform\n\
         /bridge prefix on|off - toggle the [TG]/[MAX] attribution prefix\n\
         /unbridge - remove the link\n\
         \n\
         Channel crossposting:\n\
         /crosspost - create a crosspost key (in a private chat: list links)\n\
         /crosspost <key> - link this channel using a key\n\
         /crosspost direction tg>max|max>tg|both - restrict the flow\n\
         /uncrosspost - remove the crosspost link\n\
         \n\
         How to link two chats:\n\
         1. Add the bot to both chats\n\
         \x20  Telegram: {}\n\
         \x20  MAX: {}\n\
         2. Send /bridge in one of them; the bot replies with a key\n\
         3. Send /bridge <key> in the other chat\n\
         4. Done - messages now flow both ways",
        links.telegram_url, links.max_url
    )
}
