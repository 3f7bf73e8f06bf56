//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - A configuration summary logged once at startup

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    // hyper and reqwest are chatty at Info
    let config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            config.clone(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs which optional features are switched on.
///
/// Missing admin ids are the usual cause of "the bot ignores /addcourse", so
/// that case is logged as an error.
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("📚 coursebot configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::admin::ADMIN_IDS.is_empty() {
        log::error!("❌ ADMIN_IDS is empty - nobody can add courses");
    } else {
        log::info!("✅ Admins: {}", config::admin::ADMIN_IDS.len());
    }

    match config::channels::PUBLIC_CHANNEL.as_deref() {
        Some(channel) => log::info!("✅ Announcements go to {}", channel),
        None => log::warn!("⚠️  PUBLIC_CHANNEL not set - new courses will not be announced"),
    }

    log::info!("   Force subscribe: {}", *config::access::FORCE_SUB);
    log::info!("   Token verification: {}", *config::access::TOKEN_VERIFICATION_ENABLED);
    log::info!("   Premium only: {}", *config::access::PREMIUM_ONLY);
    log::info!("   Protect content: {}", *config::delivery::PROTECT_CONTENT);
    log::info!("   URL shortener: {}", *config::shortener::ENABLED);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::NamedTempFile;

    #[test]
    fn test_init_logger_with_temp_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        // A second init in the same process fails, so either outcome is fine here
        let result = init_logger(path);
        assert!(result.is_ok() || result.is_err());
        assert!(temp_file.path().exists());
    }

    #[test]
    fn test_init_logger_bad_path() {
        let result = init_logger("/nonexistent-dir/for/sure/coursebot.log");
        assert!(result.is_err());
    }
}
