use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::time::{interval, sleep};

use coursebot::cli::{Cli, Commands};
use coursebot::core::{config, init_logger, log_startup_configuration};
use coursebot::course::publish::sqlite_store;
use coursebot::course::IngestionMachine;
use coursebot::storage::db::{expire_premium_users, DbPool};
use coursebot::storage::{create_pool, get_connection};
use coursebot::telegram::announce::ChannelAnnouncer;
use coursebot::telegram::fetcher::ForwardingFetcher;
use coursebot::telegram::notifications::{log_to_channel, notify_admins};
use coursebot::telegram::shortener::Shortener;
use coursebot::telegram::{create_bot, schema, setup_bot_commands, Bot, HandlerDeps, HandlerError};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Log panics in handler tasks instead of losing them on stderr
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    // .env must be loaded before any Lazy config value is read
    let _ = dotenv();

    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run { webhook }) => run_bot(webhook).await,
        Some(Commands::Migrate) => {
            open_database()?;
            log::info!("Database at {} is up to date", config::DATABASE_PATH.as_str());
            Ok(())
        }
        Some(Commands::ExpirePremium) => {
            let pool = open_database()?;
            let conn = get_connection(&pool)?;
            let count = expire_premium_users(&conn)?;
            log::info!("Demoted {} expired premium user(s)", count);
            Ok(())
        }
        None => {
            log::info!("No command specified, running bot in default mode");
            run_bot(false).await
        }
    }
}

/// Opens the pool; migrations run on the first connection.
fn open_database() -> Result<Arc<DbPool>> {
    let pool = create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;
    Ok(Arc::new(pool))
}

/// Resolves the bot's own username, retrying while the Bot API is unreachable.
async fn fetch_bot_username(bot: &Bot) -> Result<String> {
    const STARTUP_MAX_RETRIES: u32 = 12;
    let mut attempt = 0;
    loop {
        match bot.get_me().await {
            Ok(me) => {
                return me
                    .username
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("Bot account has no username"));
            }
            Err(e) => {
                attempt += 1;
                if attempt >= STARTUP_MAX_RETRIES {
                    return Err(anyhow::anyhow!(
                        "Failed to connect to Bot API after {} retries: {}",
                        attempt,
                        e
                    ));
                }
                log::warn!(
                    "Bot API not ready (attempt {}/{}): {}. Retrying in {:?}...",
                    attempt,
                    STARTUP_MAX_RETRIES,
                    e,
                    config::retry::dispatcher_delay()
                );
                sleep(config::retry::dispatcher_delay()).await;
            }
        }
    }
}

/// Hourly demotion of users whose premium ran out.
fn spawn_premium_expiry(pool: Arc<DbPool>) {
    tokio::spawn(async move {
        let mut interval = interval(config::premium::expiry_check_interval());
        loop {
            interval.tick().await;
            match get_connection(&pool) {
                Ok(conn) => match expire_premium_users(&conn) {
                    Ok(count) if count > 0 => log::info!("Expired premium for {} user(s) automatically", count),
                    Ok(_) => {}
                    Err(e) => log::error!("Failed to expire premium users: {}", e),
                },
                Err(e) => log::error!("Failed to get DB connection for expiry check: {}", e),
            }
        }
    });
}

async fn run_bot(use_webhook: bool) -> Result<()> {
    let started = std::time::Instant::now();
    log::info!("Starting bot...");
    log_startup_configuration();

    let bot = create_bot()?;
    let bot_username = fetch_bot_username(&bot).await?;
    log::info!("Bot username: @{}", bot_username);

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let db_pool = open_database()?;
    spawn_premium_expiry(Arc::clone(&db_pool));

    let machine = Arc::new(IngestionMachine::new(
        sqlite_store(Arc::clone(&db_pool)),
        Arc::new(ForwardingFetcher::new(bot.clone())),
        Arc::new(ChannelAnnouncer::new(bot.clone())),
        bot_username.clone(),
        config::captions::CUSTOM_FILE_CAPTION.as_str(),
    ));
    let shortener = Shortener::from_config().map(Arc::new);

    let handler_deps = HandlerDeps::new(Arc::clone(&db_pool), machine, shortener, bot_username.clone());
    let handler = schema(handler_deps);

    let startup_line = format!("#Restart\n@{} is up ({:.1}s)", bot_username, started.elapsed().as_secs_f64());
    log_to_channel(&bot, &startup_line).await;
    notify_admins(&bot, &format!("✅ @{} started", bot_username)).await;

    let webhook_url = if use_webhook { config::WEBHOOK_URL.clone() } else { None };
    if use_webhook && webhook_url.is_none() {
        log::warn!("--webhook given but WEBHOOK_URL is not set, falling back to long polling");
    }

    if let Some(url) = webhook_url {
        let url = url::Url::parse(&url)?;
        let address = SocketAddr::from(([0, 0, 0, 0], *config::WEBHOOK_PORT));
        log::info!("Starting bot in webhook mode at {} (listening on {})", url, address);

        let listener = webhooks::axum(bot.clone(), webhooks::Options::new(address, url)).await?;
        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;
        return Ok(());
    }

    log::info!("Starting bot in long polling mode");
    run_polling(bot, handler).await;
    Ok(())
}

/// Polling dispatcher, restarted after a panic up to the configured retry limit.
async fn run_polling(bot: Bot, handler: teloxide::dispatching::UpdateHandler<HandlerError>) {
    let mut retry_count = 0;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Separate task so a panic surfaces through the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();
            Dispatcher::builder(bot_clone, handler_clone)
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) if join_err.is_panic() => {
                log::error!("Dispatcher panicked: {}", join_err);
                if retry_count >= config::retry::MAX_DISPATCHER_RETRIES {
                    log::error!("Max retries reached after panic. Exiting...");
                    break;
                }
                retry_count += 1;
                log::info!(
                    "Restarting dispatcher (attempt {}/{})...",
                    retry_count,
                    config::retry::MAX_DISPATCHER_RETRIES
                );
                sleep(config::retry::dispatcher_delay() * retry_count).await;
            }
            Err(join_err) => {
                log::warn!("Dispatcher task was cancelled: {}", join_err);
                break;
            }
        }
    }
}
