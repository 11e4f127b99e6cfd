//! Storebot -- Role-Aware Storefront Agent
//!
//! A single process routes user turns to a customer or admin agent
//! based on the authenticated role. Each agent is bound to a
//! capability set of read-only commerce tools; tool results feed back
//! into the agent until it produces a final answer, and per-thread
//! history is persisted in SQLite.

pub mod agent;
pub mod config;
pub mod error;
pub mod model;
pub mod session;
pub mod shopify;
pub mod tools;
pub mod types;
