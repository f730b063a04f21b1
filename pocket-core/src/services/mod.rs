//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod cache;
pub mod cipher;
mod keys;
mod ledger;
pub mod logging;
pub mod migration;
mod registry;
mod session;

pub use cache::{BalanceCache, Caches, DecryptionCache, FifoCache, DEFAULT_CAPACITY};
pub use keys::{KeyDerivation, UserKey};
pub use ledger::{LedgerService, Reply};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use registry::{ledger_path, LedgerOpener, LedgerRegistry};
pub use session::SessionStore;
