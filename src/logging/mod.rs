/*!
 * Logging Module
 * Centralized logging configuration and request logging middleware
 */
pub mod config;
pub mod middleware;

use std::io;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use self::config::LogConfig;
use crate::config::Environment;

/// Initialize the logging system.
///
/// The returned guards flush the background writers when dropped, so the
/// caller keeps them alive for the lifetime of the process.
pub fn init(config: &LogConfig, environment: Environment) -> anyhow::Result<Vec<WorkerGuard>> {
    let is_production = environment == Environment::Production;

    std::fs::create_dir_all(&config.dir).ok();

    // File appender for all logs
    let file_appender = rolling::daily(&config.dir, "app.log");
    let (file_writer, file_guard) = non_blocking(file_appender);

    // File appender for errors only
    let error_appender = rolling::daily(&config.dir, "error.log");
    let (error_writer, error_guard) = non_blocking(error_appender);

    let (console_writer, console_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hotel_bookings={},tower_http=debug,axum=debug",
            config.level
        ))
    });

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if is_production {
        // JSON format for production
        let file_layer = fmt::layer()
            .json()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true);

        let error_layer = fmt::layer()
            .json()
            .with_writer(error_writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

        let console_layer = fmt::layer()
            .json()
            .with_writer(console_writer)
            .with_target(false);

        subscriber
            .with(file_layer)
            .with(error_layer)
            .with(console_layer)
            .try_init()?;
    } else {
        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false);

        let console_layer = fmt::layer()
            .with_writer(console_writer)
            .with_target(true)
            .pretty()
            .with_thread_ids(false)
            .with_thread_names(false);

        subscriber.with(file_layer).with(console_layer).try_init()?;
    }

    tracing::info!("Logging initialized for {} environment", environment);

    Ok(vec![file_guard, error_guard, console_guard])
}
