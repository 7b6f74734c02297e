//! SQLite-backed bridge state.
//!
//! Owns all persisted state: chat pairs, pending link keys, crosspost
//! links, and message correlations. All access is serialized behind one
//! connection mutex, which also closes the register/register race (two
//! concurrent registrations with the same key cannot both observe the
//! pending row).
//!
//! Error policy: read paths log and report "not found"; the pairing
//! write path surfaces errors so the command handler can tell the user
//! to retry.

use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::error;

use crate::common::error::{StoreError, StoreResult};
use crate::common::{CrosspostLink, Direction, Platform};

/// Retention for message correlations.
const MESSAGE_TTL_SECS: i64 = 48 * 3600;
/// Retention for unconsumed pending link keys.
const PENDING_TTL_SECS: i64 = 3600;

const SCHEMA: &str = r#"
PRAGMA journal_mode=WAL;

CREATE TABLE IF NOT EXISTS pairs (
    tg_chat_id  INTEGER NOT NULL,
    max_chat_id INTEGER NOT NULL,
    prefix      INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (tg_chat_id, max_chat_id)
);

CREATE TABLE IF NOT EXISTS pending (
    key        TEXT PRIMARY KEY,
    platform   TEXT NOT NULL,
    chat_id    INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    command    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    tg_chat_id  INTEGER NOT NULL,
    tg_msg_id   INTEGER NOT NULL,
    max_chat_id INTEGER NOT NULL,
    max_msg_id  TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    PRIMARY KEY (tg_chat_id, tg_msg_id)
);
CREATE INDEX IF NOT EXISTS idx_messages_max_msg_id ON messages (max_msg_id);

CREATE TABLE IF NOT EXISTS crossposts (
    tg_chat_id  INTEGER NOT NULL,
    max_chat_id INTEGER NOT NULL,
    direction   TEXT NOT NULL DEFAULT 'both',
    created_at  INTEGER NOT NULL,
    PRIMARY KEY (tg_chat_id, max_chat_id)
);
"#;

/// Which link namespace a pending key belongs to. Regular bridges and
/// crossposts are disjoint: a key created for one never completes the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Bridge,
    Crosspost,
}

impl LinkKind {
    fn command(&self) -> &'static str {
        match self {
            LinkKind::Bridge => "bridge",
            LinkKind::Crosspost => "crosspost",
        }
    }
}

/// Result of a `register` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// True when the key completed a pairing.
    pub paired: bool,
    /// The pending key to show the user (empty when paired or rejected).
    pub key: String,
}

impl RegisterOutcome {
    fn paired() -> Self {
        Self {
            paired: true,
            key: String::new(),
        }
    }

    fn pending(key: String) -> Self {
        Self { paired: false, key }
    }

    fn rejected() -> Self {
        Self {
            paired: false,
            key: String::new(),
        }
    }
}

/// The bridge state store.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open(path: &str) -> StoreResult<Store> {
        let conn = Connection::open(path).map_err(|e| StoreError::OpenFailed {
            path: path.to_string(),
            source: e,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database. Used by tests.
    pub fn open_in_memory() -> StoreResult<Store> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::OpenFailed {
            path: ":memory:".to_string(),
            source: e,
        })?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> StoreResult<Store> {
        conn.execute_batch(SCHEMA).map_err(StoreError::Schema)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    // --- Pairing handshake ---

    /// Handle a `/bridge` or `/crosspost` registration.
    ///
    /// With an empty `key`, returns the chat's existing pending key for
    /// this kind verbatim (repeat calls create no duplicates) or creates
    /// a fresh one. With a key, completes the pairing unless the key is
    /// unknown or was created on the caller's own platform.
    pub fn register(
        &self,
        key: &str,
        platform: Platform,
        chat_id: i64,
        kind: LinkKind,
    ) -> StoreResult<RegisterOutcome> {
        let conn = self.lock();

        if key.is_empty() {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT key FROM pending WHERE platform = ?1 AND chat_id = ?2 AND command = ?3",
                    params![platform.key(), chat_id, kind.command()],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(existing) = existing {
                return Ok(RegisterOutcome::pending(existing));
            }

            let generated = gen_key();
            conn.execute(
                "INSERT INTO pending (key, platform, chat_id, created_at, command) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![generated, platform.key(), chat_id, now(), kind.command()],
            )?;
            return Ok(RegisterOutcome::pending(generated));
        }

        let peer: Option<(String, i64)> = conn
            .query_row(
                "SELECT platform, chat_id FROM pending WHERE key = ?1 AND command = ?2",
                params![key, kind.command()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (peer_platform, peer_chat_id) = match peer {
            Some(p) => p,
            None => return Ok(RegisterOutcome::rejected()),
        };
        // Self-pairing is forbidden: the key must come from the other side
        if Platform::from_key(&peer_platform) == Some(platform) {
            return Ok(RegisterOutcome::rejected());
        }

        conn.execute("DELETE FROM pending WHERE key = ?1", params![key])?;

        let (tg_id, max_id) = match platform {
            Platform::Telegram => (chat_id, peer_chat_id),
            Platform::Max => (peer_chat_id, chat_id),
        };

        match kind {
            LinkKind::Bridge => {
                conn.execute(
                    "INSERT OR REPLACE INTO pairs (tg_chat_id, max_chat_id) VALUES (?1, ?2)",
                    params![tg_id, max_id],
                )?;
            }
            LinkKind::Crosspost => {
                conn.execute(
                    "INSERT OR REPLACE INTO crossposts (tg_chat_id, max_chat_id, created_at) \
                     VALUES (?1, ?2, ?3)",
                    params![tg_id, max_id, now()],
                )?;
            }
        }

        Ok(RegisterOutcome::paired())
    }

    /// The paired chat on the other platform, if any.
    pub fn counterpart_chat(&self, from: Platform, chat_id: i64) -> Option<i64> {
        let conn = self.lock();
        let sql = match from {
            Platform::Telegram => "SELECT max_chat_id FROM pairs WHERE tg_chat_id = ?1",
            Platform::Max => "SELECT tg_chat_id FROM pairs WHERE max_chat_id = ?1",
        };
        conn.query_row(sql, params![chat_id], |row| row.get(0))
            .optional()
            .unwrap_or_else(|e| {
                error!(err = %e, chat = chat_id, "counterpart_chat query failed");
                None
            })
    }

    /// Remove the chat's pairing. Returns false when it was not linked.
    pub fn unpair(&self, platform: Platform, chat_id: i64) -> bool {
        let conn = self.lock();
        let sql = match platform {
            Platform::Telegram => "DELETE FROM pairs WHERE tg_chat_id = ?1",
            Platform::Max => "DELETE FROM pairs WHERE max_chat_id = ?1",
        };
        match conn.execute(sql, params![chat_id]) {
            Ok(n) => n > 0,
            Err(e) => {
                error!(err = %e, chat = chat_id, "unpair failed");
                false
            }
        }
    }

    // --- Per-chat display settings ---

    /// Whether forwarded messages from this chat carry the attribution
    /// prefix. Defaults to true when the chat is not linked.
    pub fn has_prefix(&self, platform: Platform, chat_id: i64) -> bool {
        let conn = self.lock();
        let sql = match platform {
            Platform::Telegram => "SELECT prefix FROM pairs WHERE tg_chat_id = ?1",
            Platform::Max => "SELECT prefix FROM pairs WHERE max_chat_id = ?1",
        };
        let prefix: Option<i64> = conn
            .query_row(sql, params![chat_id], |row| row.get(0))
            .optional()
            .unwrap_or_else(|e| {
                error!(err = %e, chat = chat_id, "has_prefix query failed");
                None
            });
        prefix.map(|v| v == 1).unwrap_or(true)
    }

    /// Toggle the attribution prefix. Returns false when the chat is not
    /// linked.
    pub fn set_prefix(&self, platform: Platform, chat_id: i64, on: bool) -> bool {
        let conn = self.lock();
        let sql = match platform {
            Platform::Telegram => "UPDATE pairs SET prefix = ?1 WHERE tg_chat_id = ?2",
            Platform::Max => "UPDATE pairs SET prefix = ?1 WHERE max_chat_id = ?2",
        };
        match conn.execute(sql, params![if on { 1 } else { 0 }, chat_id]) {
            Ok(n) => n > 0,
            Err(e) => {
                error!(err = %e, chat = chat_id, "set_prefix failed");
                false
            }
        }
    }

    // --- Message correlation ---

    /// Record that a forwarded message has a counterpart, upserting on
    /// the Telegram-side key. `origin` names the platform the source
    /// identifiers belong to.
    pub fn save_msg(
        &self,
        origin: Platform,
        src_chat_id: i64,
        src_msg_id: &str,
        dst_chat_id: i64,
        dst_msg_id: &str,
    ) {
        let (tg_chat, tg_msg, max_chat, max_msg) = match origin {
            Platform::Telegram => (src_chat_id, src_msg_id, dst_chat_id, dst_msg_id),
            Platform::Max => (dst_chat_id, dst_msg_id, src_chat_id, src_msg_id),
        };
        let tg_msg: i64 = match tg_msg.parse() {
            Ok(id) => id,
            Err(_) => {
                error!(msg_id = tg_msg, "non-numeric Telegram message id");
                return;
            }
        };

        let conn = self.lock();
        if let Err(e) = conn.execute(
            "INSERT OR REPLACE INTO messages \
             (tg_chat_id, tg_msg_id, max_chat_id, max_msg_id, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![tg_chat, tg_msg, max_chat, max_msg, now()],
        ) {
            error!(err = %e, "save_msg failed");
        }
    }

    /// Look up the counterpart (chat id, message id) of a message seen on
    /// `from`. Telegram-side lookups key on (chat, message); MAX message
    /// ids are globally unique, so that direction keys on the id alone.
    pub fn counterpart_msg(
        &self,
        from: Platform,
        chat_id: i64,
        msg_id: &str,
    ) -> Option<(i64, String)> {
        let conn = self.lock();
        let result = match from {
            Platform::Telegram => {
                let tg_msg: i64 = msg_id.parse().ok()?;
                conn.query_row(
                    "SELECT max_chat_id, max_msg_id FROM messages \
                     WHERE tg_chat_id = ?1 AND tg_msg_id = ?2",
                    params![chat_id, tg_msg],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()
            }
            Platform::Max => conn
                .query_row(
                    "SELECT tg_chat_id, tg_msg_id FROM messages WHERE max_msg_id = ?1",
                    params![msg_id],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?.to_string())),
                )
                .optional(),
        };
        result.unwrap_or_else(|e| {
            error!(err = %e, "counterpart_msg query failed");
            None
        })
    }

    /// Retention GC: drop correlations older than 48 hours and pending
    /// keys older than 1 hour. Called periodically by the orchestrator.
    pub fn clean_old_messages(&self) {
        let conn = self.lock();
        let now = now();
        if let Err(e) = conn.execute(
            "DELETE FROM messages WHERE created_at < ?1",
            params![now - MESSAGE_TTL_SECS],
        ) {
            error!(err = %e, "message retention cleanup failed");
        }
        if let Err(e) = conn.execute(
            "DELETE FROM pending WHERE created_at < ?1",
            params![now - PENDING_TTL_SECS],
        ) {
            error!(err = %e, "pending retention cleanup failed");
        }
    }

    // --- Crossposts ---

    /// Directly link two channels for crossposting (direction `both`).
    pub fn pair_crosspost(&self, tg_chat_id: i64, max_chat_id: i64) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO crossposts (tg_chat_id, max_chat_id, created_at) \
             VALUES (?1, ?2, ?3)",
            params![tg_chat_id, max_chat_id, now()],
        )?;
        Ok(())
    }

    /// The crosspost-linked channel on the other platform with the link's
    /// direction, if any.
    pub fn crosspost_counterpart(&self, from: Platform, chat_id: i64) -> Option<(i64, Direction)> {
        let conn = self.lock();
        let sql = match from {
            Platform::Telegram => {
                "SELECT max_chat_id, direction FROM crossposts WHERE tg_chat_id = ?1"
            }
            Platform::Max => "SELECT tg_chat_id, direction FROM crossposts WHERE max_chat_id = ?1",
        };
        let row: Option<(i64, String)> = conn
            .query_row(sql, params![chat_id], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .optional()
            .unwrap_or_else(|e| {
                error!(err = %e, chat = chat_id, "crosspost_counterpart query failed");
                None
            });
        row.map(|(peer, dir)| (peer, Direction::parse(&dir).unwrap_or(Direction::Both)))
    }

    /// All crosspost links, for the `/crosspost` listing.
    pub fn list_crossposts(&self) -> Vec<CrosspostLink> {
        let conn = self.lock();
        let mut stmt = match conn
            .prepare("SELECT tg_chat_id, max_chat_id, direction FROM crossposts ORDER BY created_at")
        {
            Ok(stmt) => stmt,
            Err(e) => {
                error!(err = %e, "list_crossposts prepare failed");
                return Vec::new();
            }
        };
        let rows = stmt.query_map([], |row| {
            Ok(CrosspostLink {
                tg_chat_id: row.get(0)?,
                max_chat_id: row.get(1)?,
                direction: Direction::parse(&row.get::<_, String>(2)?)
                    .unwrap_or(Direction::Both),
            })
        });
        match rows {
            Ok(rows) => rows.filter_map(|r| r.ok()).collect(),
            Err(e) => {
                error!(err = %e, "list_crossposts query failed");
                Vec::new()
            }
        }
    }

    /// Change a crosspost link's direction. Returns false when the chat
    /// has no crosspost link.
    pub fn set_crosspost_direction(
        &self,
        platform: Platform,
        chat_id: i64,
        direction: Direction,
    ) -> bool {
        let conn = self.lock();
        let sql = match platform {
            Platform::Telegram => "UPDATE crossposts SET direction = ?1 WHERE tg_chat_id = ?2",
            Platform::Max => "UPDATE crossposts SET direction = ?1 WHERE max_chat_id = ?2",
        };
        match conn.execute(sql, params![direction.as_str(), chat_id]) {
            Ok(n) => n > 0,
            Err(e) => {
                error!(err = %e, chat = chat_id, "set_crosspost_direction failed");
                false
            }
        }
    }

    /// Remove the chat's crosspost link. Returns false when not linked.
    pub fn unpair_crosspost(&self, platform: Platform, chat_id: i64) -> bool {
        let conn = self.lock();
        let sql = match platform {
            Platform::Telegram => "DELETE FROM crossposts WHERE tg_chat_id = ?1",
            Platform::Max => "DELETE FROM crossposts WHERE max_chat_id = ?1",
        };
        match conn.execute(sql, params![chat_id]) {
            Ok(n) => n > 0,
            Err(e) => {
                error!(err = %e, chat = chat_id, "unpair_crosspost failed");
                false
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // A poisoned mutex means another thread panicked mid-query; the
        // connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Short random hex token for the pairing handshake.
fn gen_key() -> String {
    format!("{:08x}", rand::random::<u32>())
}

fn now() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::open_in_memory().expect("in-memory store")
    }

    #[test]
    fn test_register_empty_key_is_idempotent() {
        let store = store();

        let first = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        assert!(!first.paired);
        assert_eq!(first.key.len(), 8);

        let second = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        assert_eq!(second, first);
    }

    #[test]
    fn test_register_completes_pairing() {
        let store = store();

        let pending = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        let done = store
            .register(&pending.key, Platform::Max, 20, LinkKind::Bridge)
            .unwrap();

        assert!(done.paired);
        assert!(done.key.is_empty());
        assert_eq!(store.counterpart_chat(Platform::Telegram, 10), Some(20));
        assert_eq!(store.counterpart_chat(Platform::Max, 20), Some(10));

        // The pending row was consumed
        let reuse = store
            .register(&pending.key, Platform::Max, 30, LinkKind::Bridge)
            .unwrap();
        assert!(!reuse.paired);
    }

    #[test]
    fn test_register_rejects_same_platform_key() {
        let store = store();

        let pending = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        let outcome = store
            .register(&pending.key, Platform::Telegram, 99, LinkKind::Bridge)
            .unwrap();

        assert!(!outcome.paired);
        assert!(outcome.key.is_empty());
        // The pending row survives a rejected attempt
        let retry = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        assert_eq!(retry.key, pending.key);
    }

    #[test]
    fn test_register_unknown_key() {
        let store = store();
        let outcome = store
            .register("deadbeef", Platform::Max, 20, LinkKind::Bridge)
            .unwrap();
        assert!(!outcome.paired);
        assert!(outcome.key.is_empty());
    }

    #[test]
    fn test_bridge_and_crosspost_namespaces_are_disjoint() {
        let store = store();

        let pending = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        // A bridge key cannot complete a crosspost
        let outcome = store
            .register(&pending.key, Platform::Max, 20, LinkKind::Crosspost)
            .unwrap();
        assert!(!outcome.paired);

        // Each kind keeps its own pending row for the same chat
        let cp = store
            .register("", Platform::Telegram, 10, LinkKind::Crosspost)
            .unwrap();
        assert_ne!(cp.key, pending.key);
    }

    #[test]
    fn test_crosspost_register_links_channels() {
        let store = store();

        let pending = store
            .register("", Platform::Max, 200, LinkKind::Crosspost)
            .unwrap();
        let done = store
            .register(&pending.key, Platform::Telegram, 100, LinkKind::Crosspost)
            .unwrap();
        assert!(done.paired);

        let (peer, dir) = store
            .crosspost_counterpart(Platform::Telegram, 100)
            .unwrap();
        assert_eq!(peer, 200);
        assert_eq!(dir, Direction::Both);
        let (peer, _) = store.crosspost_counterpart(Platform::Max, 200).unwrap();
        assert_eq!(peer, 100);

        // Crosspost links never touch the regular pair table
        assert_eq!(store.counterpart_chat(Platform::Telegram, 100), None);
    }

    #[test]
    fn test_unpair() {
        let store = store();
        let pending = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        store
            .register(&pending.key, Platform::Max, 20, LinkKind::Bridge)
            .unwrap();

        assert!(store.unpair(Platform::Max, 20));
        assert_eq!(store.counterpart_chat(Platform::Telegram, 10), None);
        assert!(!store.unpair(Platform::Max, 20));
    }

    #[test]
    fn test_prefix_defaults_on_and_requires_link() {
        let store = store();

        // Unlinked chats report the prefix as on
        assert!(store.has_prefix(Platform::Telegram, 10));
        // ...but cannot change it
        assert!(!store.set_prefix(Platform::Telegram, 10, false));

        let pending = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        store
            .register(&pending.key, Platform::Max, 20, LinkKind::Bridge)
            .unwrap();

        assert!(store.has_prefix(Platform::Telegram, 10));
        assert!(store.set_prefix(Platform::Max, 20, false));
        assert!(!store.has_prefix(Platform::Telegram, 10));
        assert!(!store.has_prefix(Platform::Max, 20));
        assert!(store.set_prefix(Platform::Telegram, 10, true));
        assert!(store.has_prefix(Platform::Max, 20));
    }

    #[test]
    fn test_message_correlation_both_directions() {
        let store = store();

        store.save_msg(Platform::Telegram, 1, "100", 2, "m1");

        assert_eq!(
            store.counterpart_msg(Platform::Telegram, 1, "100"),
            Some((2, "m1".to_string()))
        );
        assert_eq!(
            store.counterpart_msg(Platform::Max, 2, "m1"),
            Some((1, "100".to_string()))
        );
        assert_eq!(store.counterpart_msg(Platform::Telegram, 1, "101"), None);
    }

    #[test]
    fn test_save_msg_from_max_origin() {
        let store = store();

        store.save_msg(Platform::Max, 2, "m7", 1, "700");

        assert_eq!(
            store.counterpart_msg(Platform::Max, 2, "m7"),
            Some((1, "700".to_string()))
        );
        assert_eq!(
            store.counterpart_msg(Platform::Telegram, 1, "700"),
            Some((2, "m7".to_string()))
        );
    }

    #[test]
    fn test_save_msg_upserts_on_telegram_key() {
        let store = store();

        store.save_msg(Platform::Telegram, 1, "100", 2, "m1");
        store.save_msg(Platform::Telegram, 1, "100", 2, "m2");

        assert_eq!(
            store.counterpart_msg(Platform::Telegram, 1, "100"),
            Some((2, "m2".to_string()))
        );
    }

    #[test]
    fn test_retention_cleanup() {
        let store = store();

        store.save_msg(Platform::Telegram, 1, "100", 2, "m1");
        store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();

        // Rewind both rows past their TTLs
        {
            let conn = store.lock();
            conn.execute(
                "UPDATE messages SET created_at = created_at - ?1",
                params![MESSAGE_TTL_SECS + 60],
            )
            .unwrap();
            conn.execute(
                "UPDATE pending SET created_at = created_at - ?1",
                params![PENDING_TTL_SECS + 60],
            )
            .unwrap();
        }

        store.clean_old_messages();

        assert_eq!(store.counterpart_msg(Platform::Max, 2, "m1"), None);
        // The expired pending row is gone, so a new registration mints a
        // fresh key
        let fresh = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        assert!(!fresh.key.is_empty());
    }

    #[test]
    fn test_retention_keeps_recent_rows() {
        let store = store();

        store.save_msg(Platform::Telegram, 1, "100", 2, "m1");
        store.clean_old_messages();

        assert!(store.counterpart_msg(Platform::Telegram, 1, "100").is_some());
    }

    #[test]
    fn test_crosspost_direction_and_unpair() {
        let store = store();
        store.pair_crosspost(100, 200).unwrap();

        assert!(store.set_crosspost_direction(Platform::Max, 200, Direction::MaxToTg));
        let (_, dir) = store
            .crosspost_counterpart(Platform::Telegram, 100)
            .unwrap();
        assert_eq!(dir, Direction::MaxToTg);

        assert!(!store.set_crosspost_direction(Platform::Max, 999, Direction::Both));

        assert!(store.unpair_crosspost(Platform::Telegram, 100));
        assert!(store.crosspost_counterpart(Platform::Max, 200).is_none());
        assert!(!store.unpair_crosspost(Platform::Telegram, 100));
    }

    #[test]
    fn test_list_crossposts() {
        let store = store();
        assert!(store.list_crossposts().is_empty());

        store.pair_crosspost(100, 200).unwrap();
        store.pair_crosspost(101, 201).unwrap();
        store.set_crosspost_direction(Platform::Telegram, 101, Direction::TgToMax);

        let links = store.list_crossposts();
        assert_eq!(links.len(), 2);
        assert!(links
            .iter()
            .any(|l| l.tg_chat_id == 100 && l.max_chat_id == 200 && l.direction == Direction::Both));
        assert!(links.iter().any(|l| l.tg_chat_id == 101
            && l.max_chat_id == 201
            && l.direction == Direction::TgToMax));
    }

    #[test]
    fn test_repairing_same_chats_does_not_duplicate() {
        let store = store();

        let p1 = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        store
            .register(&p1.key, Platform::Max, 20, LinkKind::Bridge)
            .unwrap();

        // A second full handshake between the same chats replaces the row
        let p2 = store
            .register("", Platform::Telegram, 10, LinkKind::Bridge)
            .unwrap();
        let done = store
            .register(&p2.key, Platform::Max, 20, LinkKind::Bridge)
            .unwrap();
        assert!(done.paired);
        assert_eq!(store.counterpart_chat(Platform::Telegram, 10), Some(20));
    }
}
