//! Session State Module
//!
//! Thread-keyed persistent conversation state. The database IS the
//! session memory: history survives process restarts and threads are
//! resumable by id.

mod schema;
mod store;

pub use schema::{CREATE_TABLES, SCHEMA_VERSION};
pub use store::{SessionStore, TurnGuard};
