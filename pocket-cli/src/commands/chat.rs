//! Chat command - local dialogue over the terminal
//!
//! Menu words drive the dialogue the way chat buttons would:
//! `income`, `expense`, `cancel`, `balance`, `history`, `chart`, `clear`,
//! `quit`. Anything else is a message for the current dialogue step.

use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;

use anyhow::Result;
use dialoguer::{Confirm, Input as Prompt};
use pocket_core::adapters::csv_export::CsvChartExporter;
use pocket_core::ports::{
    deliver_with_retry, ChatTransport, RetryPolicy, TransportError, UserDirectory,
};
use pocket_core::services::{LogEvent, LoggingService};
use pocket_core::{Input, PocketContext, TransactionKind, UserId};

use super::{log_event, start_command};
use crate::output;
use crate::transport::TerminalTransport;

const HISTORY_LIMIT: usize = 10;

const MENU: &str = "income | expense | balance | history | chart | clear | cancel | quit";

struct ChatSession {
    ctx: PocketContext,
    transport: TerminalTransport,
    logger: Option<Arc<LoggingService>>,
    user: UserId,
}

pub async fn run(user: UserId, name: Option<String>) -> Result<()> {
    let (ctx, logger) = start_command("chat")?;

    let name = name
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| format!("user {}", user));
    let registered = ctx.directory.register(user, &name)?;

    let session = ChatSession {
        transport: TerminalTransport::new(ctx.pocket_dir.join("exports")),
        ctx,
        logger,
        user,
    };

    session
        .say(&format!("Hi {}! {}", registered.display_name, MENU))
        .await?;

    while let Some(line) = read_line().await? {
        let word = line.trim().to_lowercase();
        match word.as_str() {
            "quit" | "exit" => break,
            "income" => session.dialogue(Input::Select(TransactionKind::Income)).await?,
            "expense" => session.dialogue(Input::Select(TransactionKind::Expense)).await?,
            "cancel" => session.dialogue(Input::Cancel).await?,
            "balance" => session.balance().await?,
            "history" => session.history().await?,
            "chart" => session.chart().await?,
            "clear" => session.clear().await?,
            "help" => session.say(MENU).await?,
            _ => session.dialogue(Input::Text(&line)).await?,
        }
        session.ctx.close_idle_ledgers();
    }

    session.ctx.shutdown();
    Ok(())
}

/// Next line from the terminal, `None` at end of input
async fn read_line() -> Result<Option<String>> {
    let line = tokio::task::spawn_blocking(|| {
        Prompt::<String>::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
    })
    .await?;

    match line {
        Ok(line) => Ok(Some(line)),
        Err(dialoguer::Error::IO(e)) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn confirm(prompt: String) -> Result<bool> {
    let confirmed = tokio::task::spawn_blocking(move || {
        Confirm::new().with_prompt(prompt).default(false).interact()
    })
    .await??;
    Ok(confirmed)
}

/// Deliver with retries, logging a failure that outlasts them
async fn deliver<F, Fut>(
    policy: &RetryPolicy,
    logger: &Option<Arc<LoggingService>>,
    user: UserId,
    op: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), TransportError>>,
{
    if let Err(e) = deliver_with_retry(policy, op).await {
        log_event(
            logger,
            LogEvent::new("delivery_failed")
                .with_user(user)
                .with_error(e.to_string()),
        );
        return Err(e.into());
    }
    Ok(())
}

impl ChatSession {
    async fn say(&self, text: &str) -> Result<()> {
        deliver(&self.ctx.config.delivery, &self.logger, self.user, || {
            self.transport.send_text(self.user, text)
        })
        .await
    }

    /// Operation failures end the current step, not the chat
    async fn report(&self, err: pocket_core::Error) -> Result<()> {
        output::error(&format!("Error: {}", err));
        if err.is_decryption_fault() {
            self.say("Some entries could not be decrypted; the ledger may have been written with a different salt.")
                .await
        } else {
            self.say("Something went wrong, please try again.").await
        }
    }

    async fn dialogue(&self, input: Input<'_>) -> Result<()> {
        match self.ctx.ledger_service.handle_message(self.user, input).await {
            Ok(reply) => self.say(&reply.to_string()).await,
            Err(e) => self.report(e).await,
        }
    }

    async fn balance(&self) -> Result<()> {
        match self.ctx.ledger_service.balance(self.user).await {
            Ok(snapshot) => {
                self.say(&format!(
                    "Income: {}\nExpenses: {}\nBalance: {}",
                    snapshot.total_income, snapshot.total_expense, snapshot.balance
                ))
                .await
            }
            Err(e) => self.report(e).await,
        }
    }

    async fn history(&self) -> Result<()> {
        let entries = match self.ctx.ledger_service.history(self.user).await {
            Ok(entries) => entries,
            Err(e) => return self.report(e).await,
        };
        if entries.is_empty() {
            return self.say("No transactions yet.").await;
        }

        let lines: Vec<String> = entries
            .iter()
            .take(HISTORY_LIMIT)
            .map(|entry| {
                format!(
                    "{} {} {} - {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.kind,
                    entry.amount,
                    entry.description
                )
            })
            .collect();
        self.say(&lines.join("\n")).await
    }

    async fn chart(&self) -> Result<()> {
        let artifact = match self
            .ctx
            .ledger_service
            .export_chart(self.user, &CsvChartExporter::new())
            .await
        {
            Ok(artifact) => artifact,
            Err(e) => return self.report(e).await,
        };

        let sent = deliver(&self.ctx.config.delivery, &self.logger, self.user, || {
            self.transport
                .send_image(self.user, &artifact, "Balance over time")
        })
        .await;
        // A lost chart is not worth ending the chat over
        if let Err(e) = sent {
            output::error(&format!("Error: {}", e));
            return self.say("The chart could not be delivered, please try again.").await;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if !confirm("Delete all your transactions? This cannot be undone".to_string()).await? {
            return self.say("Cancelled.").await;
        }
        match self.ctx.ledger_service.clear(self.user).await {
            Ok(removed) => self.say(&format!("Deleted {} transactions.", removed)).await,
            Err(e) => self.report(e).await,
        }
    }
}
