//! Mock metadata source for testing without network calls.

use super::{DataSourceError, MetadataSource};
use crate::domain::InstrumentMetadata;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock metadata source that returns predefined entries and records calls.
#[derive(Debug, Clone, Default)]
pub struct MockMetadataSource {
    entries: HashMap<String, InstrumentMetadata>,
    failing: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer lookups for the metadata's instrument.
    pub fn with_metadata(mut self, metadata: InstrumentMetadata) -> Self {
        self.entries
            .insert(metadata.instrument.as_str().to_string(), metadata);
        self
    }

    /// Make lookups for `code` fail with a network error.
    pub fn with_failure(mut self, code: &str) -> Self {
        self.failing.insert(code.to_string());
        self
    }

    /// Codes requested so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    async fn fetch_metadata(
        &self,
        code: &str,
    ) -> Result<Option<InstrumentMetadata>, DataSourceError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(code.to_string());
        }
        if self.failing.contains(code) {
            return Err(DataSourceError::Network(format!(
                "mock failure for {}",
                code
            )));
        }
        Ok(self.entries.get(code).cloned())
    }
}
