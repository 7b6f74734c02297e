//! The bridge core: one listener, generic over the platform pair.
//!
//! A listener consumes the source platform's event stream and forwards
//! to the destination. Two instantiations run concurrently (Telegram to
//! MAX and MAX to Telegram); everything here is written once against the
//! [`ChatPlatform`] capability interface.
//!
//! Delivery is at-most-once: any outbound failure is logged and the
//! event dropped. The only retry in the system is the destination
//! client's attachment-readiness retry.

use std::sync::Arc;
use std::time::Duration;

use backon::BackoffBuilder;
use tracing::{debug, error, info, warn};

use crate::common::{has_loop_marker, ChatKind, Platform};
use crate::markup::{render_for, TextMode};
use crate::platform::{ChatPlatform, InboundEvent, Incoming, Outbound};
use crate::store::{LinkKind, Store};

use super::commands::{self, Command, HelpLinks};

/// Exponential backoff for long-poll failures. 1s initial, 60s max,
/// jittered, unlimited retries; reset after any successful poll.
fn poll_backoff() -> impl Iterator<Item = Duration> {
    backon::ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(60))
        .with_jitter()
        .without_max_times()
        .build()
}

/// One direction of the bridge.
pub struct Listener<S: ChatPlatform, D: ChatPlatform> {
    src: Arc<S>,
    dst: Arc<D>,
    store: Arc<Store>,
    help: HelpLinks,
    shutdown: tokio::sync::watch::Receiver<bool>,
}

impl<S: ChatPlatform, D: ChatPlatform> Listener<S, D> {
    pub fn new(
        src: Arc<S>,
        dst: Arc<D>,
        store: Arc<Store>,
        help: HelpLinks,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> Self {
        Self {
            src,
            dst,
            store,
            help,
            shutdown,
        }
    }

    /// Poll the source platform until shutdown. Events in a batch are
    /// processed to completion, in order, before the next poll.
    pub async fn run(mut self) {
        let platform = self.src.platform();
        info!(%platform, "listener started");
        let mut backoff = poll_backoff();

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                batch = self.src.next_batch() => batch,
            };

            match batch {
                Ok(events) => {
                    backoff = poll_backoff();
                    for event in events {
                        self.handle_event(event).await;
                    }
                }
                Err(e) => {
                    let delay = backoff.next().unwrap_or(Duration::from_secs(60));
                    warn!(%platform, err = %e, "poll failed, retrying in {:.1}s", delay.as_secs_f64());
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        changed = self.shutdown.changed() => {
                            if changed.is_err() || *self.shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        info!(%platform, "listener stopped");
    }

    /// Dispatch one normalized event.
    pub async fn handle_event(&self, event: InboundEvent) {
        match event {
            InboundEvent::Message(inc) => match commands::parse(&inc.text) {
                Some(cmd) => self.handle_command(&inc, cmd).await,
                None => self.handle_message(&inc).await,
            },
            InboundEvent::Edited(inc) => self.handle_edited(&inc).await,
            InboundEvent::Removed { chat_id, msg_id } => {
                self.handle_removed(chat_id.unwrap_or(0), &msg_id).await;
            }
        }
    }

    // --- Forwarding ---

    async fn handle_message(&self, inc: &Incoming) {
        let from = self.src.platform();

        // Regular bridge pair takes precedence over a crosspost link
        if let Some(dst_chat) = self.store.counterpart_chat(from, inc.chat_id) {
            if inc.from_bot() || has_loop_marker(&inc.text) {
                return;
            }
            let prefix = self.store.has_prefix(from, inc.chat_id);
            let caption = format_caption(from, inc.sender_name(), &inc.text, prefix);
            self.forward(inc, dst_chat, caption, TextMode::Plain).await;
            return;
        }

        if let Some((dst_chat, direction)) = self.store.crosspost_counterpart(from, inc.chat_id) {
            // Channel configuration happens through commands; other
            // slash-text in a channel is never crossposted
            if inc.text.starts_with('/') {
                return;
            }
            if !direction.allows_from(from) {
                debug!(chat = inc.chat_id, %direction, "crosspost direction blocks this flow");
                return;
            }
            if inc.from_bot() || has_loop_marker(&inc.text) {
                return;
            }
            // Crossposts carry the original formatting, no attribution
            let (text, mode) = render_for(self.dst.platform(), &inc.text, &inc.spans);
            self.forward(inc, dst_chat, text, mode).await;
            return;
        }

        debug!(chat = inc.chat_id, "message in an unlinked chat, dropped");
    }

    async fn forward(&self, inc: &Incoming, dst_chat: i64, mut text: String, mode: TextMode) {
        let from = self.src.platform();

        let reply_to = match &inc.reply_to {
            Some(reply_id) => self
                .store
                .counterpart_msg(from, inc.chat_id, reply_id)
                .map(|(_, dst_msg)| dst_msg),
            None => None,
        };

        let media = match &inc.media {
            Some(media) => match self.src.resolve_media(media).await {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    // Degrade to caption + tag; the message still crosses
                    warn!(err = %e, kind = ?media.kind, "media resolution failed");
                    if text.is_empty() {
                        text = media.kind.tag().to_string();
                    } else {
                        text = format!("{} {}", text, media.kind.tag());
                    }
                    None
                }
            },
            None => None,
        };

        if text.is_empty() && media.is_none() {
            return;
        }

        let out = Outbound {
            text,
            mode,
            reply_to,
            media,
        };

        match self.dst.send(dst_chat, &out).await {
            Ok(dst_msg) => {
                info!(from = %from, chat = inc.chat_id, mid = %dst_msg, "forwarded");
                self.store
                    .save_msg(from, inc.chat_id, &inc.msg_id, dst_chat, &dst_msg);
            }
            Err(e) => {
                error!(from = %from, chat = inc.chat_id, err = %e, "forward failed");
            }
        }
    }

    // --- Edits ---

    async fn handle_edited(&self, inc: &Incoming) {
        let from = self.src.platform();

        if inc.from_bot() {
            return;
        }
        let Some((dst_chat, dst_msg)) = self.store.counterpart_msg(from, inc.chat_id, &inc.msg_id)
        else {
            return;
        };
        if inc.text.is_empty() || has_loop_marker(&inc.text) {
            return;
        }

        // Same formatting rules as the original forward
        let out = if self.store.counterpart_chat(from, inc.chat_id).is_some() {
            let prefix = self.store.has_prefix(from, inc.chat_id);
            Outbound::plain(format_caption(from, inc.sender_name(), &inc.text, prefix))
        } else if let Some((_, direction)) = self.store.crosspost_counterpart(from, inc.chat_id) {
            if !direction.allows_from(from) {
                return;
            }
            let (text, mode) = render_for(self.dst.platform(), &inc.text, &inc.spans);
            Outbound {
                text,
                mode,
                reply_to: None,
                media: None,
            }
        } else {
            return;
        };

        // Best-effort, single attempt
        match self.dst.edit(dst_chat, &dst_msg, &out).await {
            Ok(()) => info!(from = %from, mid = %dst_msg, "edit forwarded"),
            Err(e) => error!(from = %from, mid = %dst_msg, err = %e, "edit failed"),
        }
    }

    // --- Deletions ---

    async fn handle_removed(&self, chat_id: i64, msg_id: &str) {
        let from = self.src.platform();

        // No correlation row means the message was never forwarded
        let Some((dst_chat, dst_msg)) = self.store.counterpart_msg(from, chat_id, msg_id) else {
            return;
        };
        match self.dst.delete(dst_chat, &dst_msg).await {
            Ok(()) => info!(from = %from, mid = %dst_msg, "delete forwarded"),
            Err(e) => error!(from = %from, mid = %dst_msg, err = %e, "delete failed"),
        }
    }

    // --- Commands ---

    async fn handle_command(&self, inc: &Incoming, cmd: Command) {
        let from = self.src.platform();

        if cmd == Command::Help {
            self.reply(inc.chat_id, commands::help_text(&self.help)).await;
            return;
        }

        // Group chats gate state changes on admin rights; channels have
        // no per-message sender and skip the check
        if inc.chat_kind == ChatKind::Group {
            let is_admin = match &inc.sender {
                Some(sender) => self.src.is_admin(inc.chat_id, sender.user_id).await,
                None => false,
            };
            if !is_admin {
                self.reply(inc.chat_id, "Only group admins can use this command.".to_string())
                    .await;
                return;
            }
        }

        match cmd {
            Command::Help => unreachable!("handled above"),

            Command::Bridge { key } => {
                self.handle_register(inc, &key, LinkKind::Bridge).await;
            }

            Command::BridgePrefix { on } => {
                let text = if self.store.set_prefix(from, inc.chat_id, on) {
                    if on {
                        "Attribution prefix [TG]/[MAX] enabled."
                    } else {
                        "Attribution prefix [TG]/[MAX] disabled."
                    }
                } else {
                    "This chat is not linked yet. Run /bridge first."
                };
                self.reply(inc.chat_id, text.to_string()).await;
            }

            Command::Unbridge => {
                let text = if self.store.unpair(from, inc.chat_id) {
                    "Link removed."
                } else {
                    "This chat is not linked."
                };
                self.reply(inc.chat_id, text.to_string()).await;
            }

            Command::Crosspost { key } => {
                if key.is_empty() && inc.chat_kind == ChatKind::Private {
                    self.reply(inc.chat_id, self.crosspost_listing()).await;
                    return;
                }
                self.handle_register(inc, &key, LinkKind::Crosspost).await;
            }

            Command::CrosspostDirection { direction } => {
                let Some(direction) = direction else {
                    self.reply(
                        inc.chat_id,
                        "Usage: /crosspost direction tg>max|max>tg|both".to_string(),
                    )
                    .await;
                    return;
                };
                let text = if self
                    .store
                    .set_crosspost_direction(from, inc.chat_id, direction)
                {
                    format!("Crosspost direction set to {}.", direction)
                } else {
                    "This chat has no crosspost link.".to_string()
                };
                self.reply(inc.chat_id, text).await;
            }

            Command::Uncrosspost => {
                let text = if self.store.unpair_crosspost(from, inc.chat_id) {
                    "Crosspost link removed."
                } else {
                    "This chat has no crosspost link."
                };
                self.reply(inc.chat_id, text.to_string()).await;
            }
        }
    }

    async fn handle_register(&self, inc: &Incoming, key: &str, kind: LinkKind) {
        let from = self.src.platform();
        let command = match kind {
            LinkKind::Bridge => "/bridge",
            LinkKind::Crosspost => "/crosspost",
        };

        match self.store.register(key, from, inc.chat_id, kind) {
            Err(e) => {
                error!(err = %e, chat = inc.chat_id, "register failed");
                self.reply(inc.chat_id, "Storage error, please try again.".to_string())
                    .await;
            }
            Ok(outcome) if outcome.paired => {
                info!(platform = %from, chat = inc.chat_id, key, "paired");
                self.reply(
                    inc.chat_id,
                    "Linked! Messages will now be forwarded.".to_string(),
                )
                .await;
            }
            Ok(outcome) if !outcome.key.is_empty() => {
                info!(platform = %from, chat = inc.chat_id, key = %outcome.key, "pending");
                self.reply(
                    inc.chat_id,
                    format!(
                        "Pairing key: {}\n\nSend this in the {} chat:\n{} {}",
                        outcome.key,
                        peer_name(from),
                        command,
                        outcome.key
                    ),
                )
                .await;
            }
            Ok(_) => {
                self.reply(
                    inc.chat_id,
                    "Key not found, or it was created on this platform.".to_string(),
                )
                .await;
            }
        }
    }

    fn crosspost_listing(&self) -> String {
        let links = self.store.list_crossposts();
        if links.is_empty() {
            return "No active crosspost links.\n\n\
                    Setup: send /crosspost in one channel, then \
                    /crosspost <key> in the channel on the other platform."
                .to_string();
        }
        let mut lines = vec!["Active crosspost links:".to_string()];
        for link in links {
            lines.push(format!(
                "TG {} <-> MAX {} ({})",
                link.tg_chat_id, link.max_chat_id, link.direction
            ));
        }
        lines.join("\n")
    }

    async fn reply(&self, chat_id: i64, text: String) {
        if let Err(e) = self.src.send(chat_id, &Outbound::plain(text)).await {
            error!(chat = chat_id, err = %e, "command reply failed");
        }
    }
}

/// Human-readable name of the other platform, for command replies.
fn peer_name(from: Platform) -> &'static str {
    match from.peer() {
        Platform::Telegram => "Telegram",
        Platform::Max => "MAX",
    }
}

/// Caption for regular bridge forwards: `[TG] Name: text` with the
/// prefix on, `Name: text` with it off.
fn format_caption(from: Platform, name: &str, text: &str, prefix: bool) -> String {
    if prefix {
        format!("{} {}: {}", from.marker(), name, text)
    } else {
        format!("{}: {}", name, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::{PlatformError, PlatformResult};
    use crate::common::{Direction, MediaKind};
    use crate::markup::{Span, SpanKind};
    use crate::platform::{InboundMedia, MsgSender, ResolvedMedia};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Records outbound calls instead of talking to a real API.
    struct MockPlatform {
        platform: Platform,
        admin: bool,
        next_id: AtomicU64,
        sent: Mutex<Vec<(i64, Outbound)>>,
        edited: Mutex<Vec<(i64, String, Outbound)>>,
        deleted: Mutex<Vec<(i64, String)>>,
    }

    impl MockPlatform {
        fn new(platform: Platform) -> Self {
            Self {
                platform,
                admin: true,
                next_id: AtomicU64::new(900),
                sent: Mutex::new(Vec::new()),
                edited: Mutex::new(Vec::new()),
                deleted: Mutex::new(Vec::new()),
            }
        }

        fn without_admin(mut self) -> Self {
            self.admin = false;
            self
        }

        fn sent(&self) -> Vec<(i64, Outbound)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatPlatform for MockPlatform {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn next_batch(&self) -> PlatformResult<Vec<InboundEvent>> {
            Ok(Vec::new())
        }

        async fn send(&self, chat_id: i64, out: &Outbound) -> PlatformResult<String> {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push((chat_id, out.clone()));
            // Telegram ids are numeric, MAX mids are strings
            Ok(match self.platform {
                Platform::Telegram => n.to_string(),
                Platform::Max => format!("mid.{}", n),
            })
        }

        async fn edit(&self, chat_id: i64, msg_id: &str, out: &Outbound) -> PlatformResult<()> {
            self.edited
                .lock()
                .unwrap()
                .push((chat_id, msg_id.to_string(), out.clone()));
            Ok(())
        }

        async fn delete(&self, chat_id: i64, msg_id: &str) -> PlatformResult<()> {
            self.deleted
                .lock()
                .unwrap()
                .push((chat_id, msg_id.to_string()));
            Ok(())
        }

        async fn is_admin(&self, _chat_id: i64, _user_id: i64) -> bool {
            self.admin
        }

        async fn resolve_media(&self, media: &InboundMedia) -> PlatformResult<ResolvedMedia> {
            if media.file == "broken" {
                return Err(PlatformError::Upload {
                    message: "no such file".to_string(),
                });
            }
            Ok(ResolvedMedia {
                kind: media.kind,
                url: format!("https://cdn.example/{}", media.file),
                file_name: "file".to_string(),
            })
        }
    }

    struct Fixture {
        listener: Listener<MockPlatform, MockPlatform>,
        src: Arc<MockPlatform>,
        dst: Arc<MockPlatform>,
        store: Arc<Store>,
        _shutdown: tokio::sync::watch::Sender<bool>,
    }

    fn fixture(from: Platform) -> Fixture {
        fixture_with(MockPlatform::new(from), MockPlatform::new(from.peer()))
    }

    fn fixture_with(src: MockPlatform, dst: MockPlatform) -> Fixture {
        fixture_on_store(src, dst, Arc::new(Store::open_in_memory().unwrap()))
    }

    fn fixture_on_store(src: MockPlatform, dst: MockPlatform, store: Arc<Store>) -> Fixture {
        let src = Arc::new(src);
        let dst = Arc::new(dst);
        let (tx, rx) = tokio::sync::watch::channel(false);
        let listener = Listener::new(
            src.clone(),
            dst.clone(),
            store.clone(),
            HelpLinks {
                telegram_url: "https://t.me/test_bot".to_string(),
                max_url: "https://max.ru/test_bot".to_string(),
            },
            rx,
        );
        Fixture {
            listener,
            src,
            dst,
            store,
            _shutdown: tx,
        }
    }

    fn pair(store: &Store, tg_chat: i64, max_chat: i64) {
        let pending = store
            .register("", Platform::Telegram, tg_chat, LinkKind::Bridge)
            .unwrap();
        let done = store
            .register(&pending.key, Platform::Max, max_chat, LinkKind::Bridge)
            .unwrap();
        assert!(done.paired);
    }

    fn group_message(chat_id: i64, msg_id: &str, text: &str) -> Incoming {
        Incoming {
            chat_id,
            msg_id: msg_id.to_string(),
            chat_kind: ChatKind::Group,
            sender: Some(MsgSender {
                user_id: 7,
                name: "Ivan".to_string(),
                is_bot: false,
            }),
            text: text.to_string(),
            spans: Vec::new(),
            media: None,
            reply_to: None,
        }
    }

    fn channel_post(chat_id: i64, msg_id: &str, text: &str) -> Incoming {
        Incoming {
            chat_id,
            msg_id: msg_id.to_string(),
            chat_kind: ChatKind::Channel,
            sender: None,
            text: text.to_string(),
            spans: Vec::new(),
            media: None,
            reply_to: None,
        }
    }

    #[tokio::test]
    async fn test_forward_with_prefix_and_correlation() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);

        f.listener
            .handle_event(InboundEvent::Message(group_message(10, "100", "hello")))
            .await;

        let sent = f.dst.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 20);
        assert_eq!(sent[0].1.text, "[TG] Ivan: hello");
        assert_eq!(sent[0].1.mode, TextMode::Plain);

        // The correlation row makes the forward addressable for edits
        let (dst_chat, dst_msg) = f
            .store
            .counterpart_msg(Platform::Telegram, 10, "100")
            .unwrap();
        assert_eq!(dst_chat, 20);
        assert_eq!(dst_msg, "mid.900");
    }

    #[tokio::test]
    async fn test_forward_without_prefix() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);
        f.store.set_prefix(Platform::Telegram, 10, false);

        f.listener
            .handle_event(InboundEvent::Message(group_message(10, "100", "hello")))
            .await;

        assert_eq!(f.dst.sent()[0].1.text, "Ivan: hello");
    }

    #[tokio::test]
    async fn test_unlinked_chat_is_dropped() {
        let f = fixture(Platform::Telegram);

        f.listener
            .handle_event(InboundEvent::Message(group_message(10, "100", "hello")))
            .await;

        assert!(f.dst.sent().is_empty());
    }

    #[tokio::test]
    async fn test_anti_loop_marker_never_forwards() {
        // Both markers, in every link state
        for text in ["[TG] Ivan: hi", "[MAX] Anna: hi"] {
            let unlinked = fixture(Platform::Telegram);
            unlinked
                .listener
                .handle_event(InboundEvent::Message(group_message(10, "100", text)))
                .await;
            assert!(unlinked.dst.sent().is_empty());

            let bridged = fixture(Platform::Telegram);
            pair(&bridged.store, 10, 20);
            bridged
                .listener
                .handle_event(InboundEvent::Message(group_message(10, "100", text)))
                .await;
            assert!(bridged.dst.sent().is_empty());

            let crossposted = fixture(Platform::Telegram);
            crossposted.store.pair_crosspost(10, 20).unwrap();
            crossposted
                .listener
                .handle_event(InboundEvent::Message(channel_post(10, "100", text)))
                .await;
            assert!(crossposted.dst.sent().is_empty());
        }
    }

    #[tokio::test]
    async fn test_bot_sender_is_dropped() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);

        let mut inc = group_message(10, "100", "from the bridge itself");
        inc.sender.as_mut().unwrap().is_bot = true;
        f.listener.handle_event(InboundEvent::Message(inc)).await;

        assert!(f.dst.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reply_resolution() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);
        f.store.save_msg(Platform::Telegram, 10, "90", 20, "mid.5");

        let mut inc = group_message(10, "100", "a reply");
        inc.reply_to = Some("90".to_string());
        f.listener.handle_event(InboundEvent::Message(inc)).await;

        assert_eq!(f.dst.sent()[0].1.reply_to.as_deref(), Some("mid.5"));
    }

    #[tokio::test]
    async fn test_reply_to_unknown_message_sends_without_reply() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);

        let mut inc = group_message(10, "100", "a reply");
        inc.reply_to = Some("404".to_string());
        f.listener.handle_event(InboundEvent::Message(inc)).await;

        let sent = f.dst.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.reply_to, None);
    }

    #[tokio::test]
    async fn test_media_forward_and_degrade() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);

        let mut inc = group_message(10, "100", "look");
        inc.media = Some(InboundMedia {
            kind: MediaKind::Photo,
            file: "f1".to_string(),
            file_name: None,
        });
        f.listener.handle_event(InboundEvent::Message(inc)).await;

        let sent = f.dst.sent();
        assert_eq!(sent[0].1.media.as_ref().unwrap().url, "https://cdn.example/f1");

        // Unresolvable media degrades to a caption with the media tag
        let mut broken = group_message(10, "101", "");
        broken.media = Some(InboundMedia {
            kind: MediaKind::Video,
            file: "broken".to_string(),
            file_name: None,
        });
        f.listener.handle_event(InboundEvent::Message(broken)).await;

        let sent = f.dst.sent();
        assert_eq!(sent[1].1.text, "[TG] Ivan:  [Video]");
        assert!(sent[1].1.media.is_none());
    }

    #[tokio::test]
    async fn test_crosspost_forwards_formatting_without_attribution() {
        let f = fixture(Platform::Telegram);
        f.store.pair_crosspost(100, 200).unwrap();

        let mut post = channel_post(100, "50", "big news");
        post.spans = vec![Span::new(0, 3, SpanKind::Bold)];
        f.listener.handle_event(InboundEvent::Message(post)).await;

        let sent = f.dst.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 200);
        assert_eq!(sent[0].1.text, "**big** news");
        assert_eq!(sent[0].1.mode, TextMode::Markdown);
    }

    #[tokio::test]
    async fn test_crosspost_direction_blocks_flow() {
        let f = fixture(Platform::Max);
        f.store.pair_crosspost(100, 200).unwrap();
        f.store
            .set_crosspost_direction(Platform::Max, 200, Direction::TgToMax);

        f.listener
            .handle_event(InboundEvent::Message(channel_post(200, "m1", "blocked")))
            .await;
        assert!(f.dst.sent().is_empty());

        f.store
            .set_crosspost_direction(Platform::Max, 200, Direction::Both);
        f.listener
            .handle_event(InboundEvent::Message(channel_post(200, "m1", "flows")))
            .await;
        assert_eq!(f.dst.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_max_to_telegram_crosspost_renders_html() {
        let f = fixture(Platform::Max);
        f.store.pair_crosspost(100, 200).unwrap();

        let mut post = channel_post(200, "mid.1", "big news");
        post.spans = vec![Span::new(0, 3, SpanKind::Bold)];
        f.listener.handle_event(InboundEvent::Message(post)).await;

        let sent = f.dst.sent();
        assert_eq!(sent[0].1.text, "<b>big</b> news");
        assert_eq!(sent[0].1.mode, TextMode::Html);
    }

    #[tokio::test]
    async fn test_edit_forwarded_with_bridge_formatting() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);
        f.store.save_msg(Platform::Telegram, 10, "100", 20, "mid.5");

        f.listener
            .handle_event(InboundEvent::Edited(group_message(10, "100", "fixed")))
            .await;

        let edited = f.dst.edited.lock().unwrap().clone();
        assert_eq!(edited.len(), 1);
        assert_eq!(edited[0].0, 20);
        assert_eq!(edited[0].1, "mid.5");
        assert_eq!(edited[0].2.text, "[TG] Ivan: fixed");
    }

    #[tokio::test]
    async fn test_edit_of_unforwarded_message_is_noop() {
        let f = fixture(Platform::Telegram);
        pair(&f.store, 10, 20);

        f.listener
            .handle_event(InboundEvent::Edited(group_message(10, "100", "fixed")))
            .await;

        assert!(f.dst.edited.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_forwarded() {
        let f = fixture(Platform::Max);
        f.store.save_msg(Platform::Max, 20, "mid.5", 10, "100");

        f.listener
            .handle_event(InboundEvent::Removed {
                chat_id: Some(20),
                msg_id: "mid.5".to_string(),
            })
            .await;

        let deleted = f.dst.deleted.lock().unwrap().clone();
        assert_eq!(deleted, vec![(10, "100".to_string())]);
    }

    #[tokio::test]
    async fn test_delete_without_correlation_is_noop() {
        let f = fixture(Platform::Max);

        f.listener
            .handle_event(InboundEvent::Removed {
                chat_id: Some(20),
                msg_id: "mid.404".to_string(),
            })
            .await;

        assert!(f.dst.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_command_handshake_over_events() {
        let tg = fixture(Platform::Telegram);

        tg.listener
            .handle_event(InboundEvent::Message(group_message(10, "1", "/bridge")))
            .await;
        let replies = tg.src.sent();
        assert_eq!(replies.len(), 1);
        let key = replies[0]
            .1
            .text
            .lines()
            .next()
            .unwrap()
            .rsplit(' ')
            .next()
            .unwrap()
            .to_string();
        assert_eq!(key.len(), 8);

        // Complete from the MAX side against the same store
        let max = fixture_on_store(
            MockPlatform::new(Platform::Max),
            MockPlatform::new(Platform::Telegram),
            tg.store.clone(),
        );

        max.listener
            .handle_event(InboundEvent::Message(group_message(
                20,
                "1",
                &format!("/bridge {}", key),
            )))
            .await;

        let replies = max.src.sent();
        assert!(replies[0].1.text.contains("Linked"));
        assert_eq!(max.store.counterpart_chat(Platform::Telegram, 10), Some(20));
        assert_eq!(max.store.counterpart_chat(Platform::Max, 20), Some(10));
    }

    #[tokio::test]
    async fn test_group_commands_require_admin() {
        let f = fixture_with(
            MockPlatform::new(Platform::Telegram).without_admin(),
            MockPlatform::new(Platform::Max),
        );

        f.listener
            .handle_event(InboundEvent::Message(group_message(10, "1", "/bridge")))
            .await;

        let replies = f.src.sent();
        assert!(replies[0].1.text.contains("admins"));
        // No pending row was created
        assert!(f
            .store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap()
            .key
            .len()
            == 8);
    }

    #[tokio::test]
    async fn test_channel_commands_skip_admin_check() {
        let f = fixture_with(
            MockPlatform::new(Platform::Telegram).without_admin(),
            MockPlatform::new(Platform::Max),
        );

        f.listener
            .handle_event(InboundEvent::Message(channel_post(
                100,
                "1",
                "/crosspost",
            )))
            .await;

        let replies = f.src.sent();
        assert!(replies[0].1.text.contains("Pairing key"));
    }

    #[tokio::test]
    async fn test_help_command() {
        let f = fixture(Platform::Telegram);
        f.listener
            .handle_event(InboundEvent::Message(group_message(10, "1", "/help")))
            .await;
        assert!(f.src.sent()[0].1.text.contains("https://t.me/test_bot"));
    }

    #[tokio::test]
    async fn test_crosspost_direction_command() {
        let f = fixture(Platform::Max);
        f.store.pair_crosspost(100, 200).unwrap();

        f.listener
            .handle_event(InboundEvent::Message(channel_post(
                200,
                "1",
                "/crosspost direction max>tg",
            )))
            .await;
        assert!(f.src.sent()[0].1.text.contains("max>tg"));
        let (_, dir) = f.store.crosspost_counterpart(Platform::Max, 200).unwrap();
        assert_eq!(dir, Direction::MaxToTg);

        // Malformed argument mutates nothing
        f.listener
            .handle_event(InboundEvent::Message(channel_post(
                200,
                "2",
                "/crosspost direction sideways",
            )))
            .await;
        assert!(f.src.sent()[1].1.text.contains("Usage"));
        let (_, dir) = f.store.crosspost_counterpart(Platform::Max, 200).unwrap();
        assert_eq!(dir, Direction::MaxToTg);
    }

    #[tokio::test]
    async fn test_crosspost_listing_in_private_chat() {
        let f = fixture(Platform::Max);
        f.store.pair_crosspost(100, 200).unwrap();

        let mut inc = group_message(5, "1", "/crosspost");
        inc.chat_kind = ChatKind::Private;
        f.listener.handle_event(InboundEvent::Message(inc)).await;

        let text = &f.src.sent()[0].1.text;
        assert!(text.contains("100"));
        assert!(text.contains("200"));
        assert!(text.contains("both"));
    }

    #[tokio::test]
    async fn test_slash_text_is_not_crossposted() {
        let f = fixture(Platform::Telegram);
        f.store.pair_crosspost(100, 200).unwrap();

        f.listener
            .handle_event(InboundEvent::Message(channel_post(
                100,
                "1",
                "/some_other_bot_command",
            )))
            .await;

        assert!(f.dst.sent().is_empty());
    }

    #[test]
    fn test_format_caption() {
        assert_eq!(
            format_caption(Platform::Telegram, "Ivan", "hi", true),
            "[TG] Ivan: hi"
        );
        assert_eq!(
            format_caption(Platform::Max, "Anna", "hi", true),
            "[MAX] Anna: hi"
        );
        assert_eq!(
            format_caption(Platform::Telegram, "Ivan", "hi", false),
            "Ivan: hi"
        );
    }
}
