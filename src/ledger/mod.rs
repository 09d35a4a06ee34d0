//! Ledger compilation: validating, grouping and matching a full history.
//!
//! This module provides:
//! - Per-record validation with partial-failure isolation
//! - Per-instrument grouping and deterministic replay order
//! - Sequential and parallel matching with identical output
//! - The merged result of a run

use crate::domain::{Decimal, GainAllocation, InstrumentId, RejectedRecord, SellResult};
use crate::engine::{
    aggregate, aggregate_by_instrument, InstrumentOutcome, MatchError, OpenLot, PeriodTotals,
    ReportingWindow,
};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod compiler;

pub use compiler::Compiler;

/// An instrument whose replay stopped on an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInstrument {
    pub instrument: InstrumentId,
    pub error: MatchError,
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("matching worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Merged output of matching every instrument in a ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerRun {
    /// Allocations in instrument order, replay order within an instrument.
    pub allocations: Vec<GainAllocation>,
    pub sells: Vec<SellResult>,
    /// Lots still open once the whole history has been replayed.
    pub open_lots: Vec<OpenLot>,
    /// Records refused before matching.
    pub rejected: Vec<RejectedRecord>,
    pub failed_instruments: Vec<FailedInstrument>,
}

impl LedgerRun {
    /// Append one instrument's outcome.
    pub fn absorb(&mut self, outcome: InstrumentOutcome) {
        self.allocations.extend(outcome.allocations);
        self.sells.extend(outcome.sells);
        self.open_lots.extend(outcome.open_lots);
    }

    /// SELLs that ran out of open lots.
    pub fn under_matched(&self) -> impl Iterator<Item = &SellResult> {
        self.sells.iter().filter(|s| !s.is_fully_matched())
    }

    pub fn totals(&self, window: &ReportingWindow) -> PeriodTotals {
        aggregate(&self.allocations, window)
    }

    pub fn totals_by_instrument(
        &self,
        window: &ReportingWindow,
    ) -> BTreeMap<InstrumentId, PeriodTotals> {
        aggregate_by_instrument(&self.allocations, window)
    }

    /// Open quantity per instrument at the end of the history.
    pub fn holdings(&self) -> BTreeMap<InstrumentId, Decimal> {
        let mut holdings: BTreeMap<InstrumentId, Decimal> = BTreeMap::new();
        for lot in &self.open_lots {
            *holdings.entry(lot.instrument.clone()).or_default() += lot.remaining_quantity;
        }
        holdings
    }

    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
            && self.failed_instruments.is_empty()
            && self.under_matched().next().is_none()
    }
}
