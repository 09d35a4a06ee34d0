//! Realized-gain outputs of lot matching.

use crate::domain::{Decimal, HoldingCategory, InstrumentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The part of one SELL that was matched against one open lot.
///
/// Carries copies of everything it needs, so it stays valid after the lot
/// it came from is consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GainAllocation {
    pub instrument: InstrumentId,
    /// Key of the SELL that realized this gain.
    pub sell_key: String,
    /// Input position of the SELL. Unique even when two SELLs share a key.
    pub sell_seq: usize,
    /// Key of the BUY whose lot was consumed.
    pub buy_key: String,
    pub buy_seq: usize,
    pub matched_quantity: Decimal,
    pub buy_date: NaiveDate,
    pub buy_unit_cost: Decimal,
    pub sell_date: NaiveDate,
    pub sell_unit_price: Decimal,
    /// Whole days between buy_date and sell_date.
    pub holding_days: i64,
    pub category: HoldingCategory,
    /// matched_quantity * (sell_unit_price - buy_unit_cost)
    pub gain: Decimal,
}

impl GainAllocation {
    /// Cost basis of the matched quantity.
    pub fn cost_basis(&self) -> Decimal {
        self.matched_quantity * self.buy_unit_cost
    }

    /// Sale proceeds of the matched quantity.
    pub fn proceeds(&self) -> Decimal {
        self.matched_quantity * self.sell_unit_price
    }
}

/// Outcome of matching a single SELL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellResult {
    pub instrument: InstrumentId,
    pub sell_key: String,
    /// Matches [`GainAllocation::sell_seq`] of this SELL's allocations.
    pub sell_seq: usize,
    pub sell_date: NaiveDate,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Quantity covered by open lots.
    pub matched_quantity: Decimal,
    /// Quantity left over when open lots ran out. Never treated as gain.
    pub unmatched_quantity: Decimal,
    pub long_term_gain: Decimal,
    pub short_term_gain: Decimal,
}

impl SellResult {
    pub fn total_gain(&self) -> Decimal {
        self.long_term_gain + self.short_term_gain
    }

    pub fn is_fully_matched(&self) -> bool {
        self.unmatched_quantity.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_allocation_cost_and_proceeds() {
        let allocation = GainAllocation {
            instrument: InstrumentId::new("500209"),
            sell_key: "txn:s".to_string(),
            sell_seq: 2,
            buy_key: "txn:b".to_string(),
            buy_seq: 1,
            matched_quantity: Decimal::from(20),
            buy_date: date(2023, 6, 1),
            buy_unit_cost: Decimal::from(12),
            sell_date: date(2024, 2, 1),
            sell_unit_price: Decimal::from(15),
            holding_days: 245,
            category: HoldingCategory::ShortTerm,
            gain: Decimal::from(60),
        };
        assert_eq!(allocation.cost_basis(), Decimal::from(240));
        assert_eq!(allocation.proceeds(), Decimal::from(300));
        assert_eq!(
            allocation.proceeds() - allocation.cost_basis(),
            allocation.gain
        );
    }

    #[test]
    fn test_sell_result_totals() {
        let result = SellResult {
            instrument: InstrumentId::new("500209"),
            sell_key: "txn:s".to_string(),
            sell_seq: 2,
            sell_date: date(2024, 2, 1),
            quantity: Decimal::from(120),
            price: Decimal::from(15),
            matched_quantity: Decimal::from(120),
            unmatched_quantity: Decimal::zero(),
            long_term_gain: Decimal::from(500),
            short_term_gain: Decimal::from(60),
        };
        assert_eq!(result.total_gain(), Decimal::from(560));
        assert!(result.is_fully_matched());
    }
}
