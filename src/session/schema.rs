//! Session Store Schema
//!
//! DDL for the thread/message tables. Messages carry a per-thread
//! sequence number; conversational order is the sequence order.

pub const SCHEMA_VERSION: i64 = 1;

pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS threads (
    thread_id    TEXT PRIMARY KEY,
    active_agent TEXT,
    created_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id            TEXT PRIMARY KEY,
    thread_id     TEXT NOT NULL REFERENCES threads(thread_id),
    seq           INTEGER NOT NULL,
    kind          TEXT NOT NULL,
    content       TEXT NOT NULL,
    tool_calls    TEXT NOT NULL DEFAULT '[]',
    tool_call_id  TEXT,
    created_at    TEXT NOT NULL,
    UNIQUE (thread_id, seq)
);

CREATE INDEX IF NOT EXISTS idx_messages_thread_seq ON messages (thread_id, seq);
"#;
