//! coursebot - Telegram bot that keeps a catalogue of course bundles
//!
//! Admins build courses through a guided conversation (forwarded files or
//! channel message links); users find them through inline search and receive
//! every file through a deep link.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and small text helpers
//! - `storage`: SQLite pool, migrations, users, courses and access tokens
//! - `course`: the ingestion state machine and its collaborators
//! - `telegram`: bot setup, handlers, delivery, broadcast and inline search

#![allow(clippy::too_many_arguments)]

pub mod cli;
pub mod core;
pub mod course;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult, BotError};
pub use course::{IngestionMachine, Outcome};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
