//! MAX Bot API client.
//!
//! Long-polls `GET /updates` with a marker cursor and normalizes the
//! tagged update stream into [`InboundEvent`]s. Outbound sends go
//! through [`Uploader`] so media delivery inherits the readiness retry.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::common::error::{PlatformError, PlatformResult};
use crate::common::{ChatKind, MediaKind, Platform};
use crate::markup::spans::parse_max_kind;
use crate::markup::{Span, TextMode};

use super::upload::{Uploader, MAX_API_VERSION};
use super::{ChatPlatform, InboundEvent, InboundMedia, Incoming, MsgSender, Outbound, ResolvedMedia};

#[derive(Debug, Deserialize)]
struct UpdateList {
    updates: Vec<MaxUpdate>,
    marker: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "update_type")]
enum MaxUpdate {
    #[serde(rename = "message_created")]
    MessageCreated { message: MaxMessage },
    #[serde(rename = "message_edited")]
    MessageEdited { message: MaxMessage },
    #[serde(rename = "message_removed")]
    MessageRemoved {
        message_id: String,
        chat_id: Option<i64>,
    },
    /// Subscription churn, chat membership, and other kinds the bridge
    /// does not consume.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MaxMessage {
    sender: Option<MaxUser>,
    recipient: MaxRecipient,
    body: MaxBody,
    link: Option<MaxLink>,
}

#[derive(Debug, Deserialize)]
struct MaxUser {
    user_id: i64,
    name: Option<String>,
    username: Option<String>,
    #[serde(default)]
    is_bot: bool,
}

#[derive(Debug, Deserialize)]
struct MaxRecipient {
    chat_id: i64,
    chat_type: String,
}

#[derive(Debug, Deserialize)]
struct MaxBody {
    mid: String,
    text: Option<String>,
    markup: Option<Vec<MaxMarkup>>,
    attachments: Option<Vec<MaxAttachment>>,
    reply_to: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaxMarkup {
    #[serde(rename = "type")]
    kind: String,
    from: usize,
    length: usize,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaxAttachment {
    #[serde(rename = "type")]
    kind: String,
    payload: Option<MaxAttachmentPayload>,
    filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaxAttachmentPayload {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MaxLink {
    #[serde(rename = "type")]
    kind: String,
    message: Option<MaxLinkMessage>,
}

#[derive(Debug, Deserialize)]
struct MaxLinkMessage {
    mid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotInfo {
    name: Option<String>,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdminList {
    members: Vec<AdminMember>,
}

#[derive(Debug, Deserialize)]
struct AdminMember {
    user_id: i64,
}

/// MAX Bot API client.
pub struct MaxClient {
    http: reqwest::Client,
    base: String,
    token: String,
    marker: AtomicI64,
    poll_timeout_secs: u64,
    uploader: Uploader,
}

impl MaxClient {
    pub fn new(
        http: reqwest::Client,
        base: impl Into<String>,
        token: impl Into<String>,
        poll_timeout_secs: u64,
        uploader: Uploader,
    ) -> Self {
        Self {
            http,
            base: base.into(),
            token: token.into(),
            marker: AtomicI64::new(0),
            poll_timeout_secs,
            uploader,
        }
    }

    /// Identity probe; fails fast on a bad token.
    pub async fn get_me(&self) -> PlatformResult<String> {
        let url = format!("{}/me?v={}", self.base, MAX_API_VERSION);
        let resp = self
            .http
            .get(&url)
            .header("Authorization", &self.token)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if status != 200 {
            return Err(PlatformError::Api { status, body });
        }
        let info: BotInfo = serde_json::from_str(&body).map_err(|e| PlatformError::BadResponse {
            message: format!("decode /me: {}", e),
        })?;
        Ok(info
            .name
            .or(info.username)
            .unwrap_or_else(|| "unknown".to_string()))
    }

    fn convert_message(&self, msg: MaxMessage) -> Incoming {
        let chat_kind = match msg.recipient.chat_type.as_str() {
            "dialog" => ChatKind::Private,
            "channel" => ChatKind::Channel,
            _ => ChatKind::Group,
        };

        let sender = msg.sender.map(|u| MsgSender {
            user_id: u.user_id,
            name: u
                .name
                .filter(|n| !n.is_empty())
                .or(u.username)
                .unwrap_or_default(),
            is_bot: u.is_bot,
        });

        let spans: Vec<Span> = msg
            .body
            .markup
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|m| {
                parse_max_kind(&m.kind, m.url.as_deref())
                    .map(|kind| Span::new(m.from, m.from + m.length, kind))
            })
            .collect();

        let media = msg
            .body
            .attachments
            .as_deref()
            .unwrap_or_default()
            .iter()
            .find_map(|att| {
                let url = att.payload.as_ref()?.url.clone()?;
                let kind = match att.kind.as_str() {
                    "image" => MediaKind::Photo,
                    "video" => MediaKind::Video,
                    "audio" => MediaKind::Audio,
                    "file" => MediaKind::File,
                    "sticker" => MediaKind::Sticker,
                    _ => return None,
                };
                Some(InboundMedia {
                    kind,
                    file: url,
                    file_name: att.filename.clone(),
                })
            });

        // A reply arrives either as the body's reply mid or as a reply
        // link; forwards carry a link of a different type
        let reply_to = msg.body.reply_to.clone().or_else(|| {
            msg.link
                .as_ref()
                .filter(|l| l.kind == "reply")
                .and_then(|l| l.message.as_ref())
                .and_then(|m| m.mid.clone())
        });

        Incoming {
            chat_id: msg.recipient.chat_id,
            msg_id: msg.body.mid.clone(),
            chat_kind,
            sender,
            text: msg.body.text.clone().unwrap_or_default(),
            spans,
            media,
            reply_to,
        }
    }
}

#[async_trait]
impl ChatPlatform for MaxClient {
    fn platform(&self) -> Platform {
        Platform::Max
    }

    async fn next_batch(&self) -> PlatformResult<Vec<InboundEvent>> {
        let mut url = format!(
            "{}/updates?timeout={}&v={}",
            self.base, self.poll_timeout_secs, MAX_API_VERSION
        );
        let marker = self.marker.load(Ordering::SeqCst);
        if marker > 0 {
            url.push_str(&format!("&marker={}", marker));
        }

        let resp = self
            .http
            .get(&url)
            .header("Authorization", &self.token)
            .timeout(Duration::from_secs(self.poll_timeout_secs + 10))
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        if status != 200 {
            return Err(PlatformError::Api { status, body });
        }
        let list: UpdateList =
            serde_json::from_str(&body).map_err(|e| PlatformError::BadResponse {
                message: format!("decode updates: {}", e),
            })?;

        if let Some(marker) = list.marker {
            self.marker.store(marker, Ordering::SeqCst);
        }

        let events = list
            .updates
            .into_iter()
            .filter_map(|upd| match upd {
                MaxUpdate::MessageCreated { message } => {
                    Some(InboundEvent::Message(self.convert_message(message)))
                }
                MaxUpdate::MessageEdited { message } => {
                    Some(InboundEvent::Edited(self.convert_message(message)))
                }
                MaxUpdate::MessageRemoved {
                    message_id,
                    chat_id,
                } => Some(InboundEvent::Removed {
                    chat_id,
                    msg_id: message_id,
                }),
                MaxUpdate::Other => None,
            })
            .collect();
        Ok(events)
    }

    async fn send(&self, chat_id: i64, out: &Outbound) -> PlatformResult<String> {
        let markdown = out.mode == TextMode::Markdown;

        if let Some(media) = &out.media {
            match self.deliver_media(media).await {
                Ok(token) => {
                    return self
                        .uploader
                        .send_message(
                            chat_id,
                            &out.text,
                            Some((media.kind.max_media_type(), token.as_str())),
                            out.reply_to.as_deref(),
                            markdown,
                        )
                        .await;
                }
                Err(e) => {
                    // Degrade to caption + media tag instead of losing
                    // the message
                    warn!(err = %e, kind = ?media.kind, "MAX media upload failed");
                    let text = caption_with_tag(&out.text, media.kind);
                    return self
                        .uploader
                        .send_message(chat_id, &text, None, out.reply_to.as_deref(), markdown)
                        .await;
                }
            }
        }

        if out.text.is_empty() {
            return Err(PlatformError::BadResponse {
                message: "refusing to send an empty message".to_string(),
            });
        }
        self.uploader
            .send_message(chat_id, &out.text, None, out.reply_to.as_deref(), markdown)
            .await
    }

    async fn edit(&self, _chat_id: i64, msg_id: &str, out: &Outbound) -> PlatformResult<()> {
        let url = format!(
            "{}/messages?message_id={}&v={}",
            self.base, msg_id, MAX_API_VERSION
        );
        let mut body = json!({ "text": out.text });
        if out.mode == TextMode::Markdown {
            body["format"] = json!("markdown");
        }
        let resp = self
            .http
            .put(&url)
            .header("Authorization", &self.token)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Api { status, body });
        }
        Ok(())
    }

    async fn delete(&self, _chat_id: i64, msg_id: &str) -> PlatformResult<()> {
        let url = format!(
            "{}/messages?message_id={}&v={}",
            self.base, msg_id, MAX_API_VERSION
        );
        let resp = self
            .http
            .delete(&url)
            .header("Authorization", &self.token)
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status != 200 {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Api { status, body });
        }
        Ok(())
    }

    async fn is_admin(&self, chat_id: i64, user_id: i64) -> bool {
        let url = format!(
            "{}/chats/{}/members/admins?v={}",
            self.base, chat_id, MAX_API_VERSION
        );
        let resp = match self
            .http
            .get(&url)
            .header("Authorization", &self.token)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!(err = %e, chat = chat_id, "admin list fetch failed");
                return false;
            }
        };
        if resp.status().as_u16() != 200 {
            return false;
        }
        match resp.json::<AdminList>().await {
            Ok(admins) => admins.members.iter().any(|m| m.user_id == user_id),
            Err(e) => {
                debug!(err = %e, "admin list decode failed");
                false
            }
        }
    }

    /// MAX attachments already expose a download URL.
    async fn resolve_media(&self, media: &InboundMedia) -> PlatformResult<ResolvedMedia> {
        Ok(ResolvedMedia {
            kind: media.kind,
            url: media.file.clone(),
            file_name: media
                .file_name
                .clone()
                .unwrap_or_else(|| default_file_name(media.kind).to_string()),
        })
    }
}

impl MaxClient {
    /// Fetch from the source CDN and push to MAX; returns the attachment
    /// token. One attempt only.
    async fn deliver_media(&self, media: &ResolvedMedia) -> PlatformResult<String> {
        let bytes = self.uploader.fetch(&media.url).await?;
        self.uploader
            .upload(media.kind, bytes, &media.file_name)
            .await
    }
}

fn caption_with_tag(caption: &str, kind: MediaKind) -> String {
    if caption.is_empty() {
        kind.tag().to_string()
    } else {
        format!("{} {}", caption, kind.tag())
    }
}

pub(crate) fn default_file_name(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Photo => "photo.jpg",
        MediaKind::Video => "video.mp4",
        MediaKind::File => "document",
        MediaKind::Voice => "voice.ogg",
        MediaKind::Audio => "audio.mp3",
        MediaKind::Sticker => "sticker.webp",
        MediaKind::VideoNote => "video_note.mp4",
    }
}
