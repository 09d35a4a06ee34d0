//! Domain types and determinism layer for the gains ledger.
//!
//! This module provides:
//! - Exact numeric handling via the Decimal wrapper
//! - Domain primitives: InstrumentId, Action, HoldingCategory
//! - Transaction records with validation and stable keys
//! - Gain allocation and per-sell outputs
//! - Instrument metadata and the caller-supplied directory
//! - Stable ordering helpers for deterministic replay

pub mod allocation;
pub mod decimal;
pub mod metadata;
pub mod ordering;
pub mod primitives;
pub mod transaction;

pub use allocation::{GainAllocation, SellResult};
pub use decimal::Decimal;
pub use metadata::{InstrumentDirectory, InstrumentMetadata, UNKNOWN_ISIN};
pub use ordering::{group_by_instrument, sort_sequenced, Sequenced, TransactionOrderingKey};
pub use primitives::{Action, HoldingCategory, InstrumentId};
pub use transaction::{RejectedRecord, Transaction, ValidationError};
