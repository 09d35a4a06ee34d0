//! Spreadsheet-friendly CSV reports of a ledger run.

use std::path::PathBuf;
use thiserror::Error;

pub mod csv_export;

pub use csv_export::{
    write_allocations, write_instrument_totals, write_open_lots, write_rejected, write_reports,
    write_sells, write_summary, ReportFiles,
};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
