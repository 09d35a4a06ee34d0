//! Period aggregation of realized gains.
//!
//! Filtering happens after matching: a SELL inside the window may consume a
//! lot bought long before the window starts.

use crate::domain::{Decimal, GainAllocation, HoldingCategory, InstrumentId, SellResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    #[error("window start {start} is after end {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
    #[error("financial year {0} is out of range")]
    InvalidYear(i32),
}

/// Inclusive reporting window on the sell date. A missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportingWindow {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
}

impl ReportingWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<Self, WindowError> {
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Err(WindowError::Inverted { start, end });
            }
        }
        Ok(Self { start, end })
    }

    /// No filtering: every realized gain is reported.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// 1 April `start_year` through 31 March of the following year.
    pub fn financial_year(start_year: i32) -> Result<Self, WindowError> {
        let start = NaiveDate::from_ymd_opt(start_year, 4, 1)
            .ok_or(WindowError::InvalidYear(start_year))?;
        let end = start_year
            .checked_add(1)
            .and_then(|y| NaiveDate::from_ymd_opt(y, 3, 31))
            .ok_or(WindowError::InvalidYear(start_year))?;
        Self::new(Some(start), Some(end))
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.start
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.end
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |start| date >= start) && self.end.map_or(true, |end| date <= end)
    }
}

impl std::fmt::Display for ReportingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bound = |d: Option<NaiveDate>| d.map_or_else(|| "*".to_string(), |d| d.to_string());
        write!(f, "[{}, {}]", bound(self.start), bound(self.end))
    }
}

/// Realized gains summed by holding category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub long_term: Decimal,
    pub short_term: Decimal,
    /// Number of allocations that contributed.
    pub allocation_count: usize,
}

impl PeriodTotals {
    pub fn total(&self) -> Decimal {
        self.long_term + self.short_term
    }

    pub fn add(&mut self, allocation: &GainAllocation) {
        match allocation.category {
            HoldingCategory::LongTerm => self.long_term += allocation.gain,
            HoldingCategory::ShortTerm => self.short_term += allocation.gain,
        }
        self.allocation_count += 1;
    }
}

/// Sum gains of the allocations whose sell date falls inside `window`.
pub fn aggregate(allocations: &[GainAllocation], window: &ReportingWindow) -> PeriodTotals {
    let mut totals = PeriodTotals::default();
    for allocation in allocations
        .iter()
        .filter(|a| window.contains(a.sell_date))
    {
        totals.add(allocation);
    }
    totals
}

/// Same as [`aggregate`], broken down per instrument.
pub fn aggregate_by_instrument(
    allocations: &[GainAllocation],
    window: &ReportingWindow,
) -> BTreeMap<InstrumentId, PeriodTotals> {
    let mut by_instrument: BTreeMap<InstrumentId, PeriodTotals> = BTreeMap::new();
    for allocation in allocations
        .iter()
        .filter(|a| window.contains(a.sell_date))
    {
        by_instrument
            .entry(allocation.instrument.clone())
            .or_default()
            .add(allocation);
    }
    by_instrument
}

/// SELL results dated inside `window`.
pub fn sells_in_window<'a>(
    sells: &'a [SellResult],
    window: &'a ReportingWindow,
) -> impl Iterator<Item = &'a SellResult> + 'a {
    sells.iter().filter(move |s| window.contains(s.sell_date))
}

/// Under-matched SELLs inside `window`, with their total residual quantity.
pub fn unmatched_in_window<'a>(
    sells: &'a [SellResult],
    window: &'a ReportingWindow,
) -> (Vec<&'a SellResult>, Decimal) {
    let flagged: Vec<&SellResult> = sells_in_window(sells, window)
        .filter(|s| !s.is_fully_matched())
        .collect();
    let residual: Decimal = flagged.iter().map(|s| s.unmatched_quantity).sum();
    (flagged, residual)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn allocation(
        instrument: &str,
        sell_date: NaiveDate,
        category: HoldingCategory,
        gain: i64,
    ) -> GainAllocation {
        GainAllocation {
            instrument: InstrumentId::new(instrument),
            sell_key: "txn:s".to_string(),
            sell_seq: 1,
            buy_key: "txn:b".to_string(),
            buy_seq: 0,
            matched_quantity: Decimal::from(1),
            buy_date: date(2020, 1, 1),
            buy_unit_cost: Decimal::zero(),
            sell_date,
            sell_unit_price: Decimal::from(gain),
            holding_days: 1,
            category,
            gain: Decimal::from(gain),
        }
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let err = ReportingWindow::new(Some(date(2024, 5, 1)), Some(date(2024, 4, 1))).unwrap_err();
        assert!(matches!(err, WindowError::Inverted { .. }));
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = ReportingWindow::new(Some(date(2024, 4, 1)), Some(date(2025, 3, 31))).unwrap();
        assert!(window.contains(date(2024, 4, 1)));
        assert!(window.contains(date(2025, 3, 31)));
        assert!(!window.contains(date(2024, 3, 31)));
        assert!(!window.contains(date(2025, 4, 1)));
    }

    #[test]
    fn test_half_open_window() {
        let window = ReportingWindow::new(None, Some(date(2024, 1, 1))).unwrap();
        assert!(window.contains(date(1990, 1, 1)));
        assert!(!window.contains(date(2024, 1, 2)));
        assert!(!window.is_unbounded());
        assert_eq!(window.to_string(), "[*, 2024-01-01]");
    }

    #[test]
    fn test_financial_year() {
        let window = ReportingWindow::financial_year(2024).unwrap();
        assert_eq!(window.start(), Some(date(2024, 4, 1)));
        assert_eq!(window.end(), Some(date(2025, 3, 31)));
    }

    #[test]
    fn test_unbounded_window_keeps_everything() {
        let allocations = vec![
            allocation("A", date(2001, 1, 1), HoldingCategory::LongTerm, 10),
            allocation("A", date(2031, 1, 1), HoldingCategory::ShortTerm, -4),
        ];
        let totals = aggregate(&allocations, &ReportingWindow::unbounded());
        assert_eq!(totals.long_term, Decimal::from(10));
        assert_eq!(totals.short_term, Decimal::from(-4));
        assert_eq!(totals.total(), Decimal::from(6));
        assert_eq!(totals.allocation_count, 2);
    }

    #[test]
    fn test_aggregate_filters_by_sell_date() {
        let allocations = vec![
            allocation("A", date(2024, 3, 31), HoldingCategory::LongTerm, 100),
            allocation("A", date(2024, 4, 1), HoldingCategory::LongTerm, 7),
            allocation("B", date(2024, 12, 1), HoldingCategory::ShortTerm, 3),
            allocation("B", date(2025, 4, 1), HoldingCategory::ShortTerm, 1000),
        ];
        let window = ReportingWindow::financial_year(2024).unwrap();
        let totals = aggregate(&allocations, &window);
        assert_eq!(totals.long_term, Decimal::from(7));
        assert_eq!(totals.short_term, Decimal::from(3));
        assert_eq!(totals.allocation_count, 2);

        let by_instrument = aggregate_by_instrument(&allocations, &window);
        assert_eq!(by_instrument.len(), 2);
        assert_eq!(by_instrument[&InstrumentId::new("A")].total(), Decimal::from(7));
        assert_eq!(by_instrument[&InstrumentId::new("B")].total(), Decimal::from(3));
    }

    #[test]
    fn test_unmatched_in_window() {
        let sell = |on: NaiveDate, unmatched: i64| SellResult {
            instrument: InstrumentId::new("A"),
            sell_key: "txn:s".to_string(),
            sell_seq: 0,
            sell_date: on,
            quantity: Decimal::from(50),
            price: Decimal::from(1),
            matched_quantity: Decimal::from(50 - unmatched),
            unmatched_quantity: Decimal::from(unmatched),
            long_term_gain: Decimal::zero(),
            short_term_gain: Decimal::zero(),
        };
        let sells = vec![
            sell(date(2024, 5, 1), 50),
            sell(date(2024, 6, 1), 0),
            sell(date(2023, 6, 1), 20),
        ];
        let window = ReportingWindow::financial_year(2024).unwrap();
        let (flagged, residual) = unmatched_in_window(&sells, &window);
        assert_eq!(flagged.len(), 1);
        assert_eq!(residual, Decimal::from(50));
        assert_eq!(sells_in_window(&sells, &window).count(), 2);
    }
}
