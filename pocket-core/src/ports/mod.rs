//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for storage and for the collaborators the core
//! talks to (chat transport, chart exporter). The core depends only on these
//! traits, not on concrete implementations.

mod directory;
mod exporter;
mod ledger;
mod transport;

pub use directory::UserDirectory;
pub use exporter::{ChartArtifact, ChartExporter};
pub use ledger::LedgerStore;
pub use transport::{
    deliver_with_retry, ChatTransport, RetryPolicy, TransportError, DEFAULT_INITIAL_DELAY_MS,
    DEFAULT_MAX_ATTEMPTS,
};
