//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - DuckDB for the LedgerStore and UserDirectory ports
//! - CSV for the ChartExporter port

pub mod csv_export;
pub mod duckdb;
