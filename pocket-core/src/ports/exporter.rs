//! Chart exporter port
//!
//! The core hands over the balance series; rendering is the exporter's job.

use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::{BalancePoint, UserId};

/// Rendered output of an exporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartArtifact {
    /// MIME type of `bytes`, e.g. "image/png" or "text/csv"
    pub media_type: String,
    pub bytes: Vec<u8>,
}

pub trait ChartExporter: Send + Sync {
    /// Render a chronological series of balance changes
    fn export(&self, user: UserId, points: &[BalancePoint]) -> Result<ChartArtifact>;
}
