//! Filling the metadata cache and assembling the directory used by reports.
//!
//! Lookups are paced and best-effort: a miss or a failed request leaves the
//! instrument reported under its statement name.

use crate::datasource::{is_lookup_candidate, MetadataSource};
use crate::db::Repository;
use crate::domain::{InstrumentDirectory, InstrumentId, InstrumentMetadata};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fills the metadata cache for the instruments of a ledger.
#[derive(Clone)]
pub struct MetadataEnricher {
    source: Arc<dyn MetadataSource>,
    repo: Arc<Repository>,
    delay: Duration,
}

impl MetadataEnricher {
    pub fn new(source: Arc<dyn MetadataSource>, repo: Arc<Repository>, delay: Duration) -> Self {
        Self {
            source,
            repo,
            delay,
        }
    }

    /// Look up every instrument that is not cached yet and store the answers.
    ///
    /// Lookups run one at a time with `delay` between requests. A failed
    /// lookup is logged and skipped.
    pub async fn ensure_metadata<'a, I>(
        &self,
        instruments: I,
    ) -> Result<EnrichmentResult, EnrichmentError>
    where
        I: IntoIterator<Item = &'a InstrumentId>,
    {
        let requested: BTreeSet<&InstrumentId> = instruments.into_iter().collect();
        let cached = self.repo.cached_codes().await?;

        let mut result = EnrichmentResult {
            requested: requested.len(),
            ..Default::default()
        };

        let mut first = true;
        for instrument in requested {
            let code = instrument.as_str();
            if cached.contains(code) {
                result.already_cached += 1;
                continue;
            }
            if !is_lookup_candidate(code) {
                debug!(code, "Not a lookup candidate");
                result.skipped += 1;
                continue;
            }

            if !first && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            first = false;

            match self.source.fetch_metadata(code).await {
                Ok(Some(metadata)) => {
                    self.repo.insert_metadata(&metadata).await?;
                    debug!(code, name = %metadata.name, isin = %metadata.isin, "Cached metadata");
                    result.fetched += 1;
                }
                Ok(None) => {
                    warn!(code, "No metadata found");
                    result.not_found += 1;
                }
                Err(e) => {
                    warn!(code, error = %e, "Metadata lookup failed");
                    result.failed += 1;
                }
            }
        }

        info!(
            requested = result.requested,
            cached = result.already_cached,
            fetched = result.fetched,
            not_found = result.not_found,
            failed = result.failed,
            skipped = result.skipped,
            "Metadata enrichment finished"
        );
        Ok(result)
    }

    /// See [`build_directory`].
    pub async fn directory(
        &self,
        statement_names: &BTreeMap<InstrumentId, String>,
        overrides: Vec<InstrumentMetadata>,
    ) -> Result<InstrumentDirectory, EnrichmentError> {
        build_directory(&self.repo, statement_names, overrides).await
    }
}

/// Directory from the cache, with statement names as fallback.
///
/// `overrides` replace cached entries for the same instrument.
pub async fn build_directory(
    repo: &Repository,
    statement_names: &BTreeMap<InstrumentId, String>,
    overrides: Vec<InstrumentMetadata>,
) -> Result<InstrumentDirectory, EnrichmentError> {
    let mut directory = repo.load_directory().await?;
    for (instrument, name) in statement_names {
        directory.insert_fallback_name(instrument.clone(), name.clone());
    }
    for metadata in overrides {
        directory.insert(metadata);
    }
    Ok(directory)
}

/// Read caller overrides: a JSON array of `{instrument, name, isin, sector?}`.
///
/// # Errors
/// Fails when the file is unreadable or not such an array.
pub async fn load_overrides(path: &Path) -> Result<Vec<InstrumentMetadata>, EnrichmentError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| EnrichmentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let overrides: Vec<InstrumentMetadata> =
        serde_json::from_str(&content).map_err(|source| EnrichmentError::Overrides {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), count = overrides.len(), "Loaded metadata overrides");
    Ok(overrides)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentResult {
    pub requested: usize,
    pub already_cached: usize,
    pub fetched: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Codes that are never sent to the lookup service.
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid overrides in {path}: {source}")]
    Overrides {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
