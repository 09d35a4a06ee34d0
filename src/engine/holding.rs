use crate::domain::HoldingCategory;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default long-term threshold in days.
pub const DEFAULT_LONG_TERM_THRESHOLD_DAYS: i64 = 365;

/// Decides whether a holding period counts as long-term.
///
/// The comparison is a strict day count: a lot held exactly
/// `long_term_threshold_days` days is short-term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingPolicy {
    pub long_term_threshold_days: i64,
}

impl HoldingPolicy {
    pub fn new(long_term_threshold_days: i64) -> Self {
        Self {
            long_term_threshold_days,
        }
    }

    /// Whole days from acquisition to sale.
    pub fn holding_days(acquired: NaiveDate, sold: NaiveDate) -> i64 {
        (sold - acquired).num_days()
    }

    pub fn classify(&self, holding_days: i64) -> HoldingCategory {
        if holding_days > self.long_term_threshold_days {
            HoldingCategory::LongTerm
        } else {
            HoldingCategory::ShortTerm
        }
    }
}

impl Default for HoldingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_LONG_TERM_THRESHOLD_DAYS)
    }
}
