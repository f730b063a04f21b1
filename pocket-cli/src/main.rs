//! Pocket CLI - encrypted personal ledger in your terminal

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;
mod transport;

use commands::{chat, config, ledger, logs, users};
use pocket_core::UserId;

/// Pocket - encrypted personal ledger in your terminal
#[derive(Parser)]
#[command(name = "pocket", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record income and expenses through a chat dialogue
    Chat {
        /// Chat user id
        #[arg(long, allow_negative_numbers = true)]
        user: UserId,
        /// Display name to register (defaults to the login name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show a user's totals and balance
    Balance {
        #[arg(long, allow_negative_numbers = true)]
        user: UserId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List a user's transactions, newest first
    History {
        #[arg(long, allow_negative_numbers = true)]
        user: UserId,
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete every transaction of a user
    Clear {
        #[arg(long, allow_negative_numbers = true)]
        user: UserId,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a user's balance series as CSV
    Export {
        #[arg(long, allow_negative_numbers = true)]
        user: UserId,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List registered users
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage event logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },

    /// Show or change settings
    Config {
        #[command(subcommand)]
        command: config::ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli).await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chat { user, name } => chat::run(user, name).await,
        Commands::Balance { user, json } => ledger::balance(user, json).await,
        Commands::History { user, limit, json } => ledger::history(user, limit, json).await,
        Commands::Clear { user, force, json } => ledger::clear(user, force, json).await,
        Commands::Export { user, output } => ledger::export(user, output).await,
        Commands::Users { json } => users::run(json),
        Commands::Logs { command } => logs::run(command),
        Commands::Config { command } => config::run(command),
    }
}
