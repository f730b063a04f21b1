//! Ledger commands - balance, history, clear and export for one user

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Confirm;
use pocket_core::adapters::csv_export::CsvChartExporter;
use pocket_core::services::LogEvent;
use pocket_core::{BalanceSnapshot, HistoryEntry, OperationResult, TransactionKind, UserId};

use super::{log_event, start_command};
use crate::output;

pub async fn balance(user: UserId, json: bool) -> Result<()> {
    let (ctx, _logger) = start_command("balance")?;
    let result = ctx.ledger_service.balance(user).await;

    if json {
        let output = OperationResult::from(result);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_balance(&result?);
    Ok(())
}

pub async fn history(user: UserId, limit: usize, json: bool) -> Result<()> {
    let (ctx, _logger) = start_command("history")?;
    let mut entries = ctx.ledger_service.history(user).await?;
    let total = entries.len();
    entries.truncate(limit);

    if json {
        let context = HashMap::from([
            ("user_id".to_string(), serde_json::json!(user)),
            ("total".to_string(), serde_json::json!(total)),
        ]);
        let output = OperationResult::ok_with_context(entries, context);
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_history(&entries);
    Ok(())
}

pub async fn clear(user: UserId, force: bool, json: bool) -> Result<()> {
    let (ctx, logger) = start_command("clear")?;

    if !force && !json {
        let count = ctx.ledger_service.transaction_count(user).await?;
        if !Confirm::new()
            .with_prompt(format!(
                "Delete all {} transactions of user {}? This cannot be undone",
                count, user
            ))
            .default(false)
            .interact()?
        {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let removed = match ctx.ledger_service.clear(user).await {
        Ok(removed) => removed,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("clear_failed")
                    .with_user(user)
                    .with_command("clear")
                    .with_error(e.to_string()),
            );
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::json!({ "user_id": user, "deleted": removed }));
    } else {
        output::success(&format!("Deleted {} transactions", removed));
    }
    Ok(())
}

pub async fn export(user: UserId, output_path: Option<PathBuf>) -> Result<()> {
    let (ctx, _logger) = start_command("export")?;
    let artifact = ctx
        .ledger_service
        .export_chart(user, &CsvChartExporter::new())
        .await?;

    match output_path {
        Some(path) => {
            std::fs::write(&path, &artifact.bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::success(&format!("Balance series written to {}", path.display()));
        }
        None => print!("{}", String::from_utf8_lossy(&artifact.bytes)),
    }
    Ok(())
}

pub fn print_balance(snapshot: &BalanceSnapshot) {
    let mut table = output::create_table();
    table.add_row(vec!["Income".to_string(), snapshot.total_income.to_string()]);
    table.add_row(vec!["Expenses".to_string(), snapshot.total_expense.to_string()]);
    table.add_row(vec!["Balance".to_string(), snapshot.balance.to_string()]);
    println!("{}", table);
}

pub fn print_history(entries: &[HistoryEntry]) {
    if entries.is_empty() {
        output::info("No transactions yet.");
        return;
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Date", "Kind", "Amount", "Description"]);
    for entry in entries {
        let amount = match entry.kind {
            TransactionKind::Income => format!("+{}", entry.amount).green().to_string(),
            TransactionKind::Expense => format!("-{}", entry.amount).red().to_string(),
        };
        table.add_row(vec![
            entry.id.to_string(),
            entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
            entry.kind.to_string(),
            amount,
            entry.description.clone(),
        ]);
    }
    println!("{}", table);
}
