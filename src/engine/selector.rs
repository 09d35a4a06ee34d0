//! Policies for choosing which open lot a SELL consumes next.

use crate::domain::Transaction;
use std::collections::VecDeque;
use std::fmt;

use super::OpenLot;

/// Chooses the open lot the next match draws from.
///
/// Lots are held in acquisition order (oldest at index 0). Returning `None`
/// ends matching for the current SELL.
pub trait LotSelector: Send + Sync + fmt::Debug {
    /// Short policy name for logs and reports.
    fn name(&self) -> &'static str;

    /// Index into `lots` of the lot to consume next.
    fn select(&self, lots: &VecDeque<OpenLot>, sell: &Transaction) -> Option<usize>;
}

/// First in, first out: always the oldest open lot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fifo;

impl LotSelector for Fifo {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn select(&self, lots: &VecDeque<OpenLot>, _sell: &Transaction) -> Option<usize> {
        if lots.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}
