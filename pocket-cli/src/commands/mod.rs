//! CLI command implementations

pub mod chat;
pub mod config;
pub mod ledger;
pub mod logs;
pub mod users;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use pocket_core::services::{EntryPoint, LogEvent, LoggingService};
use pocket_core::PocketContext;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<Arc<LoggingService>> {
    let pocket_dir = get_pocket_dir().ok()?;
    LoggingService::new(&pocket_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
        .ok()
        .map(Arc::new)
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<Arc<LoggingService>>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the pocket directory from `POCKET_DIR` or `~/.pocket`
pub fn get_pocket_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("POCKET_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".pocket"))
        .context("Could not find home directory; set POCKET_DIR")
}

/// Open the pocket directory, creating it on first use
pub fn get_context(logger: Option<Arc<LoggingService>>) -> Result<PocketContext> {
    let pocket_dir = get_pocket_dir()?;

    std::fs::create_dir_all(&pocket_dir)
        .with_context(|| format!("Failed to create pocket directory: {:?}", pocket_dir))?;

    let ctx = match logger {
        Some(logger) => PocketContext::with_logger(&pocket_dir, logger),
        None => PocketContext::new(&pocket_dir),
    };
    ctx.context("Failed to initialize pocket context")
}

/// Context plus logger for a command, recording that the command ran
pub fn start_command(command: &str) -> Result<(PocketContext, Option<Arc<LoggingService>>)> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_executed").with_command(command));
    let ctx = get_context(logger.clone())?;
    Ok((ctx, logger))
}
