//! Core utilities, configuration, and error types

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

// Re-exports for convenience
pub use error::{AppError, AppResult, BotError};
pub use logging::{init_logger, log_startup_configuration};
