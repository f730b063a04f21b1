//! Pocket Core - encrypted per-user ledgers driven by a chat dialogue
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (Transaction, BalanceSnapshot, ConversationState, etc.)
//! - **ports**: Trait definitions for storage and collaborators (LedgerStore, ChatTransport)
//! - **services**: Business logic orchestration (LedgerService, key derivation, caches)
//! - **adapters**: Concrete implementations (DuckDB, CSV)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbUserDirectory;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, OperationResult};
pub use domain::{
    BalancePoint, BalanceSnapshot, ConversationState, HistoryEntry, Input, Transaction,
    TransactionKind, User, UserId,
};
pub use services::Reply;

/// Main context for Pocket operations
///
/// Composes configuration, storage and services for one pocket directory.
pub struct PocketContext {
    pub config: Config,
    pub pocket_dir: PathBuf,
    pub registry: Arc<LedgerRegistry>,
    pub directory: Arc<DuckDbUserDirectory>,
    pub ledger_service: LedgerService,
}

impl PocketContext {
    /// Create a context without event logging
    pub fn new(pocket_dir: &Path) -> Result<Self> {
        Self::build(pocket_dir, Config::load(pocket_dir)?, None)
    }

    /// Create a context whose ledger service records events in `logger`
    pub fn with_logger(pocket_dir: &Path, logger: Arc<LoggingService>) -> Result<Self> {
        Self::build(pocket_dir, Config::load(pocket_dir)?, Some(logger))
    }

    /// Create a context from an already loaded config
    pub fn build(
        pocket_dir: &Path,
        config: Config,
        logger: Option<Arc<LoggingService>>,
    ) -> Result<Self> {
        let keys = KeyDerivation::new(config.kdf.clone())?;
        if config.uses_default_salt() {
            if let Some(logger) = &logger {
                let _ = logger.log_event("default_salt_in_use");
            }
        }

        let registry = Arc::new(LedgerRegistry::new(&pocket_dir.join("ledgers")));
        let directory = Arc::new(DuckDbUserDirectory::open(&pocket_dir.join("users.duckdb"))?);

        let mut ledger_service = LedgerService::new(
            Arc::clone(&registry),
            keys,
            Arc::new(Caches::new(config.cache_capacity)),
            Arc::new(SessionStore::new()),
            config.decrypt_fault_policy,
        );
        if let Some(logger) = logger {
            ledger_service = ledger_service.with_logger(logger);
        }

        Ok(Self {
            config,
            pocket_dir: pocket_dir.to_path_buf(),
            registry,
            directory,
            ledger_service,
        })
    }

    /// Close ledger handles idle longer than the configured timeout
    pub fn close_idle_ledgers(&self) -> usize {
        self.registry.close_idle(self.config.idle_timeout)
    }

    /// Release every open ledger file
    pub fn shutdown(&self) -> usize {
        self.registry.shutdown()
    }
}
