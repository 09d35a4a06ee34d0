//! Pure computation engine for lot matching and gain aggregation.

use crate::domain::{Decimal, GainAllocation, InstrumentId, SellResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod holding;
pub mod matcher;
pub mod selector;

pub use aggregate::{
    aggregate, aggregate_by_instrument, sells_in_window, unmatched_in_window, PeriodTotals,
    ReportingWindow, WindowError,
};
pub use holding::{HoldingPolicy, DEFAULT_LONG_TERM_THRESHOLD_DAYS};
pub use matcher::{LotMatcher, MatchError};
pub use selector::{Fifo, LotSelector};

/// An unconsumed or partially consumed BUY.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLot {
    pub instrument: InstrumentId,
    pub buy_key: String,
    /// Input position of the BUY that opened the lot.
    pub buy_seq: usize,
    pub acquired: NaiveDate,
    pub original_quantity: Decimal,
    pub remaining_quantity: Decimal, // Only ever decreases
    pub unit_cost: Decimal,
}

impl OpenLot {
    /// Cost basis of the quantity still held.
    pub fn remaining_cost(&self) -> Decimal {
        self.remaining_quantity * self.unit_cost
    }
}

/// Everything one instrument's replay produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentOutcome {
    pub instrument: InstrumentId,
    pub allocations: Vec<GainAllocation>,
    pub sells: Vec<SellResult>,
    pub open_lots: Vec<OpenLot>,
}
