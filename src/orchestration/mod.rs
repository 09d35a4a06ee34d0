//! Coordination between the metadata source, the cache and reporting.

pub mod enrich;

pub use enrich::{EnrichmentError, EnrichmentResult, MetadataEnricher};
