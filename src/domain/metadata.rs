//! Instrument metadata used only for presenting reports.

use crate::domain::InstrumentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// ISIN reported when an instrument has no known metadata.
pub const UNKNOWN_ISIN: &str = "UNKNOWN";

/// Descriptive details for an instrument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentMetadata {
    pub instrument: InstrumentId,
    pub name: String,
    pub isin: String,
    pub sector: Option<String>,
}

impl InstrumentMetadata {
    pub fn new(instrument: InstrumentId, name: String, isin: String) -> Self {
        Self {
            instrument,
            name,
            isin,
            sector: None,
        }
    }

    pub fn with_sector(mut self, sector: String) -> Self {
        self.sector = Some(sector);
        self
    }
}

/// Caller-supplied lookup table from instrument to metadata.
///
/// Lookups fall back to the name seen on the statement, then to the raw
/// instrument id. Missing ISINs resolve to [`UNKNOWN_ISIN`].
#[derive(Debug, Clone, Default)]
pub struct InstrumentDirectory {
    entries: HashMap<InstrumentId, InstrumentMetadata>,
    fallback_names: HashMap<InstrumentId, String>,
}

impl InstrumentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace metadata for an instrument.
    pub fn insert(&mut self, metadata: InstrumentMetadata) {
        self.entries.insert(metadata.instrument.clone(), metadata);
    }

    /// Record the name an instrument carried on the source statement.
    pub fn insert_fallback_name(&mut self, instrument: InstrumentId, name: String) {
        self.fallback_names.insert(instrument, name);
    }

    pub fn get(&self, instrument: &InstrumentId) -> Option<&InstrumentMetadata> {
        self.entries.get(instrument)
    }

    pub fn contains(&self, instrument: &InstrumentId) -> bool {
        self.entries.contains_key(instrument)
    }

    pub fn name_for(&self, instrument: &InstrumentId) -> String {
        self.entries
            .get(instrument)
            .map(|m| m.name.clone())
            .or_else(|| self.fallback_names.get(instrument).cloned())
            .unwrap_or_else(|| instrument.to_string())
    }

    pub fn isin_for(&self, instrument: &InstrumentId) -> String {
        self.entries
            .get(instrument)
            .map(|m| m.isin.clone())
            .unwrap_or_else(|| UNKNOWN_ISIN.to_string())
    }

    /// Number of instruments with full metadata.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<InstrumentMetadata> for InstrumentDirectory {
    fn from_iter<I: IntoIterator<Item = InstrumentMetadata>>(iter: I) -> Self {
        let mut directory = InstrumentDirectory::new();
        for metadata in iter {
            directory.insert(metadata);
        }
        directory
    }
}
