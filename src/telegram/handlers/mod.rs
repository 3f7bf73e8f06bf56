//! Telegram bot handler tree configuration
//!
//! The dispatcher schema plus the command, ingestion and callback endpoints.
//! Parsing and rendering are plain functions so they can be unit tested.

mod callbacks;
mod commands;
mod ingest;
mod schema;
mod types;

pub use callbacks::CallbackAction;
pub use commands::{parse_ingest_mode, parse_page, parse_premium_days, parse_token_args, parse_user_arg};
pub use ingest::{render, Reply};
pub use schema::schema;
pub use types::{ensure_user_exists, HandlerDeps, HandlerError, UserCreationResult};
