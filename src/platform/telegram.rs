//! Telegram Bot API client.
//!
//! Long-polls `getUpdates` with an offset cursor and normalizes the
//! update shapes (message, edited_message, channel_post,
//! edited_channel_post) into [`InboundEvent`]s. Telegram does not emit
//! deletion updates, so this client never produces `Removed`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::common::error::{PlatformError, PlatformResult};
use crate::common::{ChatKind, MediaKind, Platform};
use crate::markup::spans::parse_telegram_kind;
use crate::markup::{Span, TextMode};

use super::{ChatPlatform, InboundEvent, InboundMedia, Incoming, MsgSender, Outbound, ResolvedMedia};

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
    edited_message: Option<Message>,
    channel_post: Option<Message>,
    edited_channel_post: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    from: Option<User>,
    chat: Chat,
    text: Option<String>,
    caption: Option<String>,
    entities: Option<Vec<Entity>>,
    caption_entities: Option<Vec<Entity>>,
    reply_to_message: Option<Box<Message>>,
    photo: Option<Vec<PhotoSize>>,
    video: Option<FileRef>,
    document: Option<Document>,
    voice: Option<FileRef>,
    audio: Option<Document>,
    sticker: Option<FileRef>,
    video_note: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
    first_name: String,
    last_name: Option<String>,
    username: Option<String>,
    #[serde(default)]
    is_bot: bool,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Entity {
    #[serde(rename = "type")]
    kind: String,
    offset: usize,
    length: usize,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct Document {
    file_id: String,
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct File {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}

/// Telegram Bot API client.
pub struct TelegramClient {
    http: reqwest::Client,
    /// `{api_url}/bot{token}` - method calls are appended to this.
    base: String,
    /// `{api_url}/file/bot{token}` - file downloads.
    file_base: String,
    offset: AtomicI64,
    poll_timeout_secs: u64,
}

impl TelegramClient {
    pub fn new(
        http: reqwest::Client,
        api_url: &str,
        token: &str,
        poll_timeout_secs: u64,
    ) -> Self {
        Self {
            http,
            base: format!("{}/bot{}", api_url, token),
            file_base: format!("{}/file/bot{}", api_url, token),
            offset: AtomicI64::new(0),
            poll_timeout_secs,
        }
    }

    /// Identity probe; fails fast on a bad token.
    pub async fn get_me(&self) -> PlatformResult<String> {
        let me: User = self.call("getMe", &json!({})).await?;
        Ok(me.username.unwrap_or(me.first_name))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> PlatformResult<T> {
        let url = format!("{}/{}", self.base, method);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .timeout(Duration::from_secs(60))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let parsed: ApiResponse<T> =
            serde_json::from_str(&text).map_err(|e| PlatformError::BadResponse {
                message: format!("decode {}: {}", method, e),
            })?;
        if !parsed.ok {
            return Err(PlatformError::Api {
                status,
                body: parsed.description.unwrap_or(text),
            });
        }
        parsed.result.ok_or_else(|| PlatformError::BadResponse {
            message: format!("{}: ok without result", method),
        })
    }

    fn convert_message(&self, msg: Message, chat_kind_hint: Option<ChatKind>) -> Incoming {
        let chat_kind = chat_kind_hint.unwrap_or(match msg.chat.kind.as_str() {
            "private" => ChatKind::Private,
            "channel" => ChatKind::Channel,
            _ => ChatKind::Group,
        });

        let sender = msg.from.map(|u| {
            let mut name = u.first_name;
            if let Some(last) = u.last_name {
                name.push(' ');
                name.push_str(&last);
            }
            MsgSender {
                user_id: u.id,
                name,
                is_bot: u.is_bot,
            }
        });

        let text = msg
            .text
            .clone()
            .or_else(|| msg.caption.clone())
            .unwrap_or_default();

        let entities = msg.entities.or(msg.caption_entities).unwrap_or_default();
        let spans: Vec<Span> = entities
            .iter()
            .filter_map(|e| {
                parse_telegram_kind(&e.kind, e.url.as_deref())
                    .map(|kind| Span::new(e.offset, e.offset + e.length, kind))
            })
            .collect();

        // Largest photo size comes last in the list
        let media = if let Some(photo) = msg.photo.as_ref().and_then(|sizes| sizes.last()) {
            Some(InboundMedia {
                kind: MediaKind::Photo,
                file: photo.file_id.clone(),
                file_name: None,
            })
        } else if let Some(video) = &msg.video {
            Some(InboundMedia {
                kind: MediaKind::Video,
                file: video.file_id.clone(),
                file_name: None,
            })
        } else if let Some(doc) = &msg.document {
            Some(InboundMedia {
                kind: MediaKind::File,
                file: doc.file_id.clone(),
                file_name: doc.file_name.clone(),
            })
        } else if let Some(voice) = &msg.voice {
            Some(InboundMedia {
                kind: MediaKind::Voice,
                file: voice.file_id.clone(),
                file_name: None,
            })
        } else if let Some(audio) = &msg.audio {
            Some(InboundMedia {
                kind: MediaKind::Audio,
                file: audio.file_id.clone(),
                file_name: audio.file_name.clone(),
            })
        } else if let Some(sticker) = &msg.sticker {
            Some(InboundMedia {
                kind: MediaKind::Sticker,
                file: sticker.file_id.clone(),
                file_name: None,
            })
        } else if let Some(note) = &msg.video_note {
            Some(InboundMedia {
                kind: MediaKind::VideoNote,
                file: note.file_id.clone(),
                file_name: None,
            })
        } else {
            None
        };

        Incoming {
            chat_id: msg.chat.id,
            msg_id: msg.message_id.to_string(),
            chat_kind,
            sender,
            text,
            spans,
            media,
            reply_to: msg
                .reply_to_message
                .as_ref()
                .map(|r| r.message_id.to_string()),
        }
    }
}

#[async_trait]
impl ChatPlatform for TelegramClient {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    async fn next_batch(&self) -> PlatformResult<Vec<InboundEvent>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let mut body = json!({ "timeout": self.poll_timeout_secs });
        if offset > 0 {
            body["offset"] = json!(offset);
        }

        let url = format!("{}/getUpdates", self.base);
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(self.poll_timeout_secs + 10))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        let parsed: ApiResponse<Vec<Update>> =
            serde_json::from_str(&text).map_err(|e| PlatformError::BadResponse {
                message: format!("decode getUpdates: {}", e),
            })?;
        if !parsed.ok {
            return Err(PlatformError::Api {
                status,
                body: parsed.description.unwrap_or(text),
            });
        }
        let updates = parsed.result.unwrap_or_default();

        if let Some(max_id) = updates.iter().map(|u| u.update_id).max() {
            self.offset.store(max_id + 1, Ordering::SeqCst);
        }

        let events = updates
            .into_iter()
            .filter_map(|upd| {
                if let Some(msg) = upd.message {
                    Some(InboundEvent::Message(self.convert_message(msg, None)))
                } else if let Some(msg) = upd.edited_message {
                    Some(InboundEvent::Edited(self.convert_message(msg, None)))
                } else if let Some(msg) = upd.channel_post {
                    Some(InboundEvent::Message(
                        self.convert_message(msg, Some(ChatKind::Channel)),
                    ))
                } else if let Some(msg) = upd.edited_channel_post {
                    Some(InboundEvent::Edited(
                        self.convert_message(msg, Some(ChatKind::Channel)),
                    ))
                } else {
                    None
                }
            })
            .collect();
        Ok(events)
    }

    async fn send(&self, chat_id: i64, out: &Outbound) -> PlatformResult<String> {
        if let Some(media) = &out.media {
            match self.send_media(chat_id, media, out).await {
                Ok(id) => return Ok(id),
                Err(e) => {
                    // Degrade to caption + media tag instead of losing
                    // the message
                    warn!(err = %e, kind = ?media.kind, "TG media send failed");
                    let text = if out.text.is_empty() {
                        media.kind.tag().to_string()
                    } else {
                        format!("{} {}", out.text, media.kind.tag())
                    };
                    let fallback = Outbound {
                        text,
                        mode: TextMode::Plain,
                        reply_to: out.reply_to.clone(),
                        media: None,
                    };
                    return self.send_text(chat_id, &fallback).await;
                }
            }
        }

        if out.text.is_empty() {
            return Err(PlatformError::BadResponse {
                message: "refusing to send an empty message".to_string(),
            });
        }
        self.send_text(chat_id, out).await
    }

    async fn edit(&self, chat_id: i64, msg_id: &str, out: &Outbound) -> PlatformResult<()> {
        let mut body = json!({
            "chat_id": chat_id,
            "message_id": parse_msg_id(msg_id)?,
            "text": out.text,
        });
        if out.mode == TextMode::Html {
            body["parse_mode"] = json!("HTML");
        }
        let _: serde_json::Value = self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn delete(&self, chat_id: i64, msg_id: &str) -> PlatformResult<()> {
        let body = json!({ "chat_id": chat_id, "message_id": parse_msg_id(msg_id)? });
        let _: serde_json::Value = self.call("deleteMessage", &body).await?;
        Ok(())
    }

    async fn is_admin(&self, chat_id: i64, user_id: i64) -> bool {
        let body = json!({ "chat_id": chat_id, "user_id": user_id });
        match self.call::<ChatMember>("getChatMember", &body).await {
            Ok(member) => member.status == "creator" || member.status == "administrator",
            Err(e) => {
                debug!(err = %e, chat = chat_id, "getChatMember failed");
                false
            }
        }
    }

    /// Resolve a `file_id` to a direct download URL via `getFile`.
    async fn resolve_media(&self, media: &InboundMedia) -> PlatformResult<ResolvedMedia> {
        let file: File = self
            .call("getFile", &json!({ "file_id": media.file }))
            .await?;
        let path = file.file_path.ok_or_else(|| PlatformError::BadResponse {
            message: "getFile returned no file_path".to_string(),
        })?;
        Ok(ResolvedMedia {
            kind: media.kind,
            url: format!("{}/{}", self.file_base, path),
            file_name: media
                .file_name
                .clone()
                .unwrap_or_else(|| super::max::default_file_name(media.kind).to_string()),
        })
    }
}

impl TelegramClient {
    async fn send_text(&self, chat_id: i64, out: &Outbound) -> PlatformResult<String> {
        let mut body = json!({ "chat_id": chat_id, "text": out.text });
        if out.mode == TextMode::Html {
            body["parse_mode"] = json!("HTML");
        }
        if let Some(reply) = &out.reply_to {
            body["reply_to_message_id"] = json!(parse_msg_id(reply)?);
            body["allow_sending_without_reply"] = json!(true);
        }
        let sent: Message = self.call("sendMessage", &body).await?;
        Ok(sent.message_id.to_string())
    }

    /// One attempt at a media send; the caller degrades on failure.
    async fn send_media(
        &self,
        chat_id: i64,
        media: &ResolvedMedia,
        out: &Outbound,
    ) -> PlatformResult<String> {
        let (method, field) = match media.kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Video | MediaKind::VideoNote => ("sendVideo", "video"),
            MediaKind::Voice => ("sendVoice", "voice"),
            MediaKind::Audio => ("sendAudio", "audio"),
            MediaKind::File | MediaKind::Sticker => ("sendDocument", "document"),
        };
        let mut body = json!({ "chat_id": chat_id });
        body[field] = json!(media.url);
        if !out.text.is_empty() {
            body["caption"] = json!(out.text);
            if out.mode == TextMode::Html {
                body["parse_mode"] = json!("HTML");
            }
        }
        if let Some(reply) = &out.reply_to {
            body["reply_to_message_id"] = json!(parse_msg_id(reply)?);
            body["allow_sending_without_reply"] = json!(true);
        }
        let sent: Message = self.call(method, &body).await?;
        Ok(sent.message_id.to_string())
    }
}

fn parse_msg_id(msg_id: &str) -> PlatformResult<i64> {
    msg_id.parse().map_err(|_| PlatformError::BadResponse {
        message: format!("non-numeric Telegram message id '{}'", msg_id),
    })
}
