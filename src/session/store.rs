//! Session State Store
//!
//! SQLite-backed per-thread conversation state: the append-only
//! message history and the active-agent marker. The store owns all
//! session state; the orchestration loop holds only a transient
//! buffered view during a single turn.
//!
//! Thread ids double as serialization keys: `begin_turn` hands out at
//! most one guard per thread, so turns on one thread never interleave
//! while distinct threads proceed in parallel.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::SessionBusyError;
use crate::types::{AgentKind, MessageKind, SessionMessage, ToolInvocation};

use super::schema::{CREATE_TABLES, SCHEMA_VERSION};

pub struct SessionStore {
    conn: Mutex<Connection>,
    busy: Mutex<HashSet<String>>,
}

impl SessionStore {
    /// Open (or create) the store at `db_path` and apply the schema.
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create db directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open session database: {db_path}"))?;

        // WAL keeps concurrent readers cheap
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            busy: Mutex::new(HashSet::new()),
        })
    }

    /// Open an in-memory store (used by tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            busy: Mutex::new(HashSet::new()),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(CREATE_TABLES)
            .context("failed to create session tables")?;
        conn.execute(
            "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, datetime('now'))",
            params![SCHEMA_VERSION],
        )?;
        Ok(())
    }

    // ─── Turn Serialization ──────────────────────────────────────

    /// Claim the thread for one turn. Fails with `SessionBusyError`
    /// when a turn is already in flight; the guard releases the claim
    /// on drop.
    pub fn begin_turn(&self, thread_id: &str) -> Result<TurnGuard<'_>, SessionBusyError> {
        let mut busy = self.busy.lock().unwrap();
        if !busy.insert(thread_id.to_string()) {
            return Err(SessionBusyError {
                thread_id: thread_id.to_string(),
            });
        }
        Ok(TurnGuard {
            store: self,
            thread_id: thread_id.to_string(),
        })
    }

    fn release_turn(&self, thread_id: &str) {
        self.busy.lock().unwrap().remove(thread_id);
    }

    // ─── Reads ───────────────────────────────────────────────────

    /// Read the full ordered history of a thread. Empty for unknown
    /// thread ids.
    pub fn read(&self, thread_id: &str) -> Result<Vec<SessionMessage>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, kind, content, tool_calls, tool_call_id, created_at
             FROM messages WHERE thread_id = ?1 ORDER BY seq ASC",
        )?;
        let messages = stmt
            .query_map(params![thread_id], |row| {
                let kind_str: String = row.get(1)?;
                let tool_calls_json: String = row.get(3)?;
                Ok(SessionMessage {
                    id: row.get(0)?,
                    kind: MessageKind::from_str(&kind_str).unwrap_or(MessageKind::User),
                    content: row.get(2)?,
                    tool_calls: serde_json::from_str::<Vec<ToolInvocation>>(&tool_calls_json)
                        .unwrap_or_default(),
                    tool_call_id: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(messages)
    }

    pub fn get_active_agent(&self, thread_id: &str) -> Result<Option<AgentKind>> {
        let conn = self.conn.lock().unwrap();
        let marker: Option<String> = conn
            .query_row(
                "SELECT active_agent FROM threads WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
        Ok(marker.and_then(|m| AgentKind::from_str(&m).ok()))
    }

    // ─── Writes ──────────────────────────────────────────────────

    /// Append a single message to a thread, creating the thread row on
    /// first use.
    pub fn append(&self, thread_id: &str, message: &SessionMessage) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        Self::ensure_thread(&tx, thread_id)?;
        Self::insert_message(&tx, thread_id, message)?;
        tx.commit()?;
        Ok(())
    }

    pub fn set_active_agent(&self, thread_id: &str, agent: AgentKind) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        Self::ensure_thread(&tx, thread_id)?;
        tx.execute(
            "UPDATE threads SET active_agent = ?2 WHERE thread_id = ?1",
            params![thread_id, agent.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Commit a whole turn atomically: every buffered message plus the
    /// active-agent marker, in one transaction. A turn cancelled
    /// before this point leaves no trace in the store.
    pub fn commit_turn(
        &self,
        thread_id: &str,
        messages: &[SessionMessage],
        active_agent: AgentKind,
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        Self::ensure_thread(&tx, thread_id)?;
        for message in messages {
            Self::insert_message(&tx, thread_id, message)?;
        }
        tx.execute(
            "UPDATE threads SET active_agent = ?2 WHERE thread_id = ?1",
            params![thread_id, active_agent.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn ensure_thread(tx: &rusqlite::Transaction<'_>, thread_id: &str) -> Result<()> {
        tx.execute(
            "INSERT OR IGNORE INTO threads (thread_id, active_agent, created_at)
             VALUES (?1, NULL, ?2)",
            params![thread_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn insert_message(
        tx: &rusqlite::Transaction<'_>,
        thread_id: &str,
        message: &SessionMessage,
    ) -> Result<()> {
        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        tx.execute(
            "INSERT INTO messages (id, thread_id, seq, kind, content, tool_calls, tool_call_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id,
                thread_id,
                next_seq,
                message.kind.as_str(),
                message.content,
                serde_json::to_string(&message.tool_calls)?,
                message.tool_call_id,
                message.created_at,
            ],
        )?;
        Ok(())
    }
}

/// Exclusive claim on a thread for the duration of one turn.
pub struct TurnGuard<'a> {
    store: &'a SessionStore,
    thread_id: String,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.store.release_turn(&self.thread_id);
    }
}

impl std::fmt::Debug for TurnGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnGuard")
            .field("thread_id", &self.thread_id)
            .finish()
    }
}
