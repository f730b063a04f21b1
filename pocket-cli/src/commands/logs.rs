//! Logs command - inspect the event log
//!
//! The log holds event names, user ids and error text only, so it is safe to
//! share when reporting a problem.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::{ColoredString, Colorize};
use dialoguer::Confirm;
use pocket_core::services::{EntryPoint, LogEntry, LoggingService};
use pocket_core::UserId;

use super::get_pocket_dir;
use crate::output;

/// Events worth a second look when troubleshooting a ledger
const PROBLEM_EVENTS: &[&str] = &[
    "decryption_fault",
    "transaction_failed",
    "clear_failed",
    "delivery_failed",
];

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent events
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Only entries with an error message
        #[arg(long, conflicts_with_all = ["user", "event"])]
        errors: bool,
        /// Only events of one user
        #[arg(long, allow_negative_numbers = true, conflicts_with = "event")]
        user: Option<UserId>,
        /// Only one event, e.g. decryption_fault
        #[arg(long)]
        event: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old entries
    Clear {
        /// Delete entries older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Copy the log database to a file
    Export {
        /// Destination file
        output: PathBuf,
    },
    /// Count events by name and flag ledger problems
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: LogsCommands) -> Result<()> {
    let service = LoggingService::new(&get_pocket_dir()?, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))?;

    match command {
        LogsCommands::List {
            limit,
            errors,
            user,
            event,
            json,
        } => list(&service, limit, errors, user, event, json),
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => clear(&service, older_than_days, force, json),
        LogsCommands::Export { output } => {
            let path = service.export(&output)?;
            output::success(&format!("Logs exported to {}", path.display()));
            Ok(())
        }
        LogsCommands::Stats { json } => stats(&service, json),
    }
}

fn list(
    service: &LoggingService,
    limit: usize,
    errors: bool,
    user: Option<UserId>,
    event: Option<String>,
    json: bool,
) -> Result<()> {
    let entries = match (errors, user, event) {
        (true, _, _) => service.get_errors(limit)?,
        (false, Some(user), _) => service.get_for_user(user, limit)?,
        (false, None, Some(event)) => service.get_by_event(&event, limit)?,
        (false, None, None) => service.get_recent(limit)?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        output::info("No log entries found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Time", "Event", "User", "Command", "Error"]);
    for entry in &entries {
        table.add_row(vec![
            format_timestamp(entry.timestamp),
            styled_event(&entry.event).to_string(),
            entry.user_id.map(|id| id.to_string()).unwrap_or_default(),
            entry.command.clone().unwrap_or_default(),
            error_summary(entry),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn clear(service: &LoggingService, older_than_days: u64, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete log entries older than {} days?", older_than_days))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let deleted = service.delete_before(cutoff_ms(older_than_days))?;
    if json {
        println!("{}", serde_json::json!({ "deleted": deleted }));
    } else {
        output::success(&format!("Deleted {} log entries", deleted));
    }
    Ok(())
}

fn stats(service: &LoggingService, json: bool) -> Result<()> {
    let counts = service.event_counts()?;
    let total: u64 = counts.iter().map(|(_, n)| n).sum();
    let problems: u64 = counts
        .iter()
        .filter(|(event, _)| is_problem(event))
        .map(|(_, n)| n)
        .sum();

    if json {
        let by_event: serde_json::Map<String, serde_json::Value> = counts
            .iter()
            .map(|(event, n)| (event.clone(), (*n).into()))
            .collect();
        println!(
            "{}",
            serde_json::json!({
                "total_entries": total,
                "problem_entries": problems,
                "events": by_event,
                "database_path": service.db_path().to_string_lossy(),
            })
        );
        return Ok(());
    }

    println!("{}", "Event Log".bold());
    let mut table = output::create_table();
    table.set_header(vec!["Event", "Count"]);
    for (event, n) in &counts {
        table.add_row(vec![styled_event(event).to_string(), n.to_string()]);
    }
    println!("{}", table);
    println!("  Total entries: {}", total);
    println!("  Database: {}", service.db_path().display());

    if problems > 0 {
        output::warning(&format!(
            "{} problem events recorded. Inspect them with `pocket logs list --errors`.",
            problems
        ));
    }
    if counts.iter().any(|(event, _)| event == "default_salt_in_use") {
        output::warning("The built-in key derivation salt has been in use.");
    }
    Ok(())
}

fn is_problem(event: &str) -> bool {
    PROBLEM_EVENTS.contains(&event)
}

fn styled_event(event: &str) -> ColoredString {
    match event {
        e if is_problem(e) => e.red(),
        "expense_rejected" | "amount_out_of_range" | "default_salt_in_use" => event.yellow(),
        "transaction_committed" => event.green(),
        _ => event.normal(),
    }
}

fn error_summary(entry: &LogEntry) -> String {
    match (&entry.error_message, &entry.error_details) {
        (Some(message), Some(details)) => format!("{} ({})", message, details),
        (Some(message), None) => message.clone(),
        _ => String::new(),
    }
}

fn cutoff_ms(older_than_days: u64) -> i64 {
    (Utc::now() - Duration::days(older_than_days as i64)).timestamp_millis()
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(event: &str, error: Option<&str>, details: Option<&str>) -> LogEntry {
        LogEntry {
            id: 1,
            timestamp: 0,
            entry_point: "cli".to_string(),
            app_version: "test".to_string(),
            platform: "linux".to_string(),
            event: event.to_string(),
            user_id: Some(7),
            command: None,
            error_message: error.map(str::to_string),
            error_details: details.map(str::to_string),
        }
    }

    #[test]
    fn test_problem_events() {
        assert!(is_problem("decryption_fault"));
        assert!(is_problem("delivery_failed"));
        assert!(!is_problem("expense_rejected"));
        assert!(!is_problem("transaction_committed"));
    }

    #[test]
    fn test_error_summary() {
        assert_eq!(error_summary(&entry("transaction_committed", None, None)), "");
        assert_eq!(
            error_summary(&entry("decryption_fault", Some("bad tag"), Some("transaction 3"))),
            "bad tag (transaction 3)"
        );
        assert_eq!(
            error_summary(&entry("delivery_failed", Some("offline"), None)),
            "offline"
        );
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_cutoff_moves_back_by_days() {
        let now = Utc::now().timestamp_millis();
        let cutoff = cutoff_ms(1);
        assert!(now - cutoff >= 86_400_000);
        assert!(now - cutoff < 86_400_000 + 60_000);
    }
}
