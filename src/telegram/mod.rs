//! Telegram bot integration and handlers

pub mod announce;
pub mod bot;
pub mod broadcast;
pub mod delivery;
pub mod fetcher;
pub mod gates;
pub mod handlers;
pub mod inline;
pub mod keyboards;
pub mod media;
pub mod notifications;
pub mod shortener;
pub mod texts;

pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
