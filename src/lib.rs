//! Streaming chat gateway between a chat client and a tool-calling model backend.
//!
//! A request becomes a [`session::Session`] (memory policy, optional system
//! prompt, prior turns, the tool catalog). The [`orchestrator::Orchestrator`]
//! streams it through a [`backend::ModelBackend`], translating raw chunks into
//! a stable event protocol and executing memory writes inline, capped per
//! stream. Memories persist in SQLite with exact-match dedup per user.
//!
//! # Event protocol
//!
//! | Event | Payload |
//! |-------|---------|
//! | `thinking` | `tokens` |
//! | `tool_call` | `tool`, `arguments`, `id` |
//! | `tool_result` | `tool`, `result` or `error` |
//! | `response_start` | none |
//! | `content` | `text` |
//! | `complete` | `content`, `citations`, `usage`, `tool_calls`, `server_side_tool_usage` |
//! | `error` | `error` |
//!
//! Every stream ends with exactly one `complete` or `error`.
//!
//! # Modules
//!
//! - [`config`]: TOML configuration and environment overrides
//! - [`db`]: SQLite initialization, schema and migrations
//! - [`memory`]: memory records and the deduplicating store
//! - [`tools`]: tool catalog, argument validation and the client-side executor
//! - [`integrations`]: biometric and time-series status collaborators
//! - [`backend`]: model backends (xAI streaming, scripted)
//! - [`session`]: session assembly
//! - [`stream`]: the event union and the chunk translator
//! - [`orchestrator`]: the per-request streaming loop
//! - [`server`]: axum HTTP surface

pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod integrations;
pub mod memory;
pub mod orchestrator;
pub mod server;
pub mod session;
pub mod stream;
pub mod tools;
