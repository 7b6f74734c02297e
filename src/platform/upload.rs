//! MAX media upload and the attachment-readiness retry.
//!
//! MAX ingests media in two steps: `POST /uploads` hands back a CDN URL
//! (and sometimes a token), then a multipart push to that URL returns
//! the attachment token. A message referencing a fresh token can be
//! rejected with `attachment.not.ready` while the file is transcoded;
//! only that rejection is retried, with linearly increasing delay.

use reqwest::multipart;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::common::error::{PlatformError, PlatformResult};
use crate::common::MediaKind;

/// Upper bound on send attempts while the attachment is processing.
const MAX_SEND_ATTEMPTS: u32 = 10;

/// MAX API version pinned by the original bot client.
pub(crate) const MAX_API_VERSION: &str = "1.2.5";

#[derive(Debug, Deserialize)]
struct UploadEndpoint {
    url: String,
    token: Option<String>,
}

/// CDN response; `fileId` is camelCase on the wire.
#[derive(Debug, Deserialize)]
struct CdnResult {
    #[serde(rename = "fileId")]
    #[allow(dead_code)]
    file_id: Option<i64>,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message: SentMessageInner,
}

#[derive(Debug, Deserialize)]
struct SentMessageInner {
    body: SentMessageBody,
}

#[derive(Debug, Deserialize)]
struct SentMessageBody {
    mid: String,
}

/// Moves media into MAX and performs direct message sends with the
/// readiness retry.
pub struct Uploader {
    http: reqwest::Client,
    base: String,
    token: String,
    shutdown: watch::Receiver<bool>,
}

impl Uploader {
    pub fn new(
        http: reqwest::Client,
        base: impl Into<String>,
        token: impl Into<String>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            http,
            base: base.into(),
            token: token.into(),
            shutdown,
        }
    }

    /// Fetch media bytes from the source platform's CDN.
    pub async fn fetch(&self, url: &str) -> PlatformResult<Vec<u8>> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PlatformError::Upload {
                message: format!("media download status {}", status.as_u16()),
            });
        }
        let bytes = resp.bytes().await?;
        debug!(size = bytes.len(), "media downloaded");
        Ok(bytes.to_vec())
    }

    /// Two-step upload to MAX. Returns the attachment token.
    pub async fn upload(
        &self,
        kind: MediaKind,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> PlatformResult<String> {
        let endpoint_url = format!(
            "{}/uploads?type={}&v={}",
            self.base,
            kind.max_media_type(),
            MAX_API_VERSION
        );
        let resp = self
            .http
            .post(&endpoint_url)
            .header("Authorization", &self.token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PlatformError::Upload {
                message: format!("upload endpoint status {}", status.as_u16()),
            });
        }
        let endpoint: UploadEndpoint = resp.json().await.map_err(|e| PlatformError::Upload {
            message: format!("decode upload endpoint: {}", e),
        })?;
        debug!(url = %endpoint.url, "MAX upload endpoint");

        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = multipart::Form::new().part("data", part);
        let cdn_resp = self.http.post(&endpoint.url).multipart(form).send().await?;
        let cdn_status = cdn_resp.status();
        let cdn_body = cdn_resp.text().await.unwrap_or_default();
        debug!(status = cdn_status.as_u16(), "MAX CDN response");

        // The CDN answers JSON on success, XML on some error paths; fall
        // back to the endpoint token when the body does not parse
        if let Ok(cdn) = serde_json::from_str::<CdnResult>(&cdn_body) {
            if let Some(token) = cdn.token.filter(|t| !t.is_empty()) {
                return Ok(token);
            }
        }
        if let Some(token) = endpoint.token.filter(|t| !t.is_empty()) {
            debug!("MAX upload ok (endpoint token)");
            return Ok(token);
        }
        Err(PlatformError::Upload {
            message: "no token: endpoint and CDN both empty".to_string(),
        })
    }

    /// Direct message send against the MAX REST endpoint.
    ///
    /// A 400 response containing `attachment.not.ready` is retried up to
    /// 10 times with `attempt * 1s + 1s` delay, aborting promptly on
    /// shutdown. Every other failure is fatal and surfaced.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        attachment: Option<(&str, &str)>,
        reply_to: Option<&str>,
        markdown: bool,
    ) -> PlatformResult<String> {
        let mut body = json!({});
        if !text.is_empty() {
            body["text"] = json!(text);
        }
        if let Some((att_type, token)) = attachment {
            body["attachments"] = json!([{ "type": att_type, "payload": { "token": token } }]);
        }
        if markdown {
            body["format"] = json!("markdown");
        }
        if let Some(mid) = reply_to {
            body["link"] = json!({ "type": "reply", "mid": mid });
        }

        let url = format!(
            "{}/messages?chat_id={}&v={}",
            self.base, chat_id, MAX_API_VERSION
        );

        let mut shutdown = self.shutdown.clone();
        for attempt in 0..MAX_SEND_ATTEMPTS {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs(u64::from(attempt) + 1);
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    changed = shutdown.changed() => {
                        // A dropped sender also means the bridge is gone
                        if changed.is_err() || *shutdown.borrow() {
                            return Err(PlatformError::Cancelled);
                        }
                    }
                }
                warn!(attempt = attempt + 1, max = MAX_SEND_ATTEMPTS, "MAX send retry");
            }

            let resp = self
                .http
                .post(&url)
                .header("Authorization", &self.token)
                .header("Content-Type", "application/json")
                .body(body.to_string())
                .send()
                .await?;
            let status = resp.status().as_u16();
            let resp_body = resp.text().await.unwrap_or_default();

            if status == 200 {
                let sent: SentMessage =
                    serde_json::from_str(&resp_body).map_err(|e| PlatformError::BadResponse {
                        message: format!("decode send response: {}", e),
                    })?;
                return Ok(sent.message.body.mid);
            }

            let err = PlatformError::Api {
                status,
                body: resp_body,
            };
            if err.is_attachment_not_ready() {
                warn!("MAX attachment not ready, waiting");
                continue;
            }
            return Err(err);
        }

        Err(PlatformError::AttachmentNotReady {
            attempts: MAX_SEND_ATTEMPTS,
        })
    }
}
