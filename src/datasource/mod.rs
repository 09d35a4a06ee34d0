//! External collaborators: the statement loader and instrument metadata lookup.

use crate::domain::InstrumentMetadata;
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub mod ledger_file;
pub mod mock;
pub mod symbol_lookup;

pub use ledger_file::{LedgerFileLoader, LoadError, LoadedLedger, DEFAULT_EXCLUDED_NAMES};
pub use mock::MockMetadataSource;
pub use symbol_lookup::{is_lookup_candidate, SymbolLookupSource};

/// Source of instrument metadata (name, ISIN, sector).
///
/// Implementations must handle retry/backoff and rate limiting.
#[async_trait]
pub trait MetadataSource: Send + Sync + fmt::Debug {
    /// Look up metadata for an instrument code.
    ///
    /// # Returns
    /// `Ok(None)` when the service has no match for the code.
    async fn fetch_metadata(
        &self,
        code: &str,
    ) -> Result<Option<InstrumentMetadata>, DataSourceError>;
}

/// Why a metadata lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataSourceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("lookup service answered HTTP {status}")]
    Http { status: u16 },
    #[error("lookup service is rate limiting requests")]
    RateLimited,
    #[error("unexpected lookup response: {0}")]
    MalformedResponse(String),
}

impl DataSourceError {
    /// Worth retrying after a pause.
    pub fn is_transient(&self) -> bool {
        match self {
            DataSourceError::Network(_) | DataSourceError::RateLimited => true,
            DataSourceError::Http { status } => *status >= 500,
            DataSourceError::MalformedResponse(_) => false,
        }
    }
}
