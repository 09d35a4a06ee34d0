use crate::domain::{
    Action, Decimal, GainAllocation, HoldingCategory, InstrumentId, SellResult, Transaction,
    ValidationError,
};
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::{Fifo, HoldingPolicy, InstrumentOutcome, LotSelector, OpenLot};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("transaction {txn_key} belongs to {found}, matcher is for {expected}")]
    InstrumentMismatch {
        txn_key: String,
        expected: InstrumentId,
        found: InstrumentId,
    },
    #[error("transaction {txn_key} dated {found} arrived after {previous}")]
    OutOfOrder {
        txn_key: String,
        previous: NaiveDate,
        found: NaiveDate,
    },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("amounts for transaction {txn_key} exceed the decimal range")]
    Overflow { txn_key: String },
}

/// Replays one instrument's ledger, matching SELLs against open lots.
pub struct LotMatcher {
    instrument: InstrumentId,
    policy: HoldingPolicy,
    selector: Arc<dyn LotSelector>,
    lots: VecDeque<OpenLot>,
    last_date: Option<NaiveDate>,
    next_seq: usize,

    // Outputs accumulated during processing.
    allocations: Vec<GainAllocation>,
    sells: Vec<SellResult>,
}

impl LotMatcher {
    pub fn new(
        instrument: InstrumentId,
        policy: HoldingPolicy,
        selector: Arc<dyn LotSelector>,
    ) -> Self {
        Self {
            instrument,
            policy,
            selector,
            lots: VecDeque::new(),
            last_date: None,
            next_seq: 0,
            allocations: Vec::new(),
            sells: Vec::new(),
        }
    }

    /// Matcher with the default holding policy and FIFO lot selection.
    pub fn fifo(instrument: InstrumentId) -> Self {
        Self::new(instrument, HoldingPolicy::default(), Arc::new(Fifo))
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Lots still open, oldest first.
    pub fn open_lots(&self) -> &VecDeque<OpenLot> {
        &self.lots
    }

    /// Quantity still held across all open lots.
    pub fn open_quantity(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.remaining_quantity).sum()
    }

    /// Process a single transaction, updating the lot queue and emitting outputs.
    ///
    /// Callers must feed transactions in replay order (date, then input
    /// position). Outputs are tagged with a running position; use
    /// [`LotMatcher::process_at`] to supply the caller's own.
    ///
    /// # Errors
    /// Refuses, without touching any state, a transaction for another
    /// instrument, one dated before the previous transaction, one that
    /// fails validation, or one whose amounts overflow.
    pub fn process(&mut self, txn: &Transaction) -> Result<(), MatchError> {
        self.process_at(self.next_seq, txn)
    }

    /// Process `txn`, which sits at position `seq` of the caller's input.
    pub fn process_at(&mut self, seq: usize, txn: &Transaction) -> Result<(), MatchError> {
        if txn.instrument != self.instrument {
            return Err(MatchError::InstrumentMismatch {
                txn_key: txn.txn_key.clone(),
                expected: self.instrument.clone(),
                found: txn.instrument.clone(),
            });
        }
        if let Some(previous) = self.last_date {
            if txn.date < previous {
                return Err(MatchError::OutOfOrder {
                    txn_key: txn.txn_key.clone(),
                    previous,
                    found: txn.date,
                });
            }
        }
        txn.validate()?;

        match txn.action {
            Action::Buy => self.handle_buy(seq, txn)?,
            Action::Sell => self.handle_sell(seq, txn)?,
        }
        self.last_date = Some(txn.date);
        self.next_seq = seq.saturating_add(1);
        Ok(())
    }

    /// Open a new lot at the back of the queue.
    fn handle_buy(&mut self, seq: usize, txn: &Transaction) -> Result<(), MatchError> {
        // Every cost basis later taken from this lot is bounded by this one
        if txn.quantity.checked_mul(txn.price).is_none() {
            return Err(overflow(txn));
        }
        self.lots.push_back(OpenLot {
            instrument: txn.instrument.clone(),
            buy_key: txn.txn_key.clone(),
            buy_seq: seq,
            acquired: txn.date,
            original_quantity: txn.quantity,
            remaining_quantity: txn.quantity,
            unit_cost: txn.price,
        });
        Ok(())
    }

    /// Consume open lots until the SELL is covered or the queue runs dry.
    ///
    /// Works on a copy of the queue so an overflow leaves the matcher as it was.
    fn handle_sell(&mut self, seq: usize, txn: &Transaction) -> Result<(), MatchError> {
        let mut lots = self.lots.clone();
        let mut allocations = Vec::new();
        let mut remaining = txn.quantity;
        let mut result = SellResult {
            instrument: txn.instrument.clone(),
            sell_key: txn.txn_key.clone(),
            sell_seq: seq,
            sell_date: txn.date,
            quantity: txn.quantity,
            price: txn.price,
            matched_quantity: Decimal::zero(),
            unmatched_quantity: Decimal::zero(),
            long_term_gain: Decimal::zero(),
            short_term_gain: Decimal::zero(),
        };

        while remaining.is_positive() {
            let Some(index) = self.selector.select(&lots, txn) else {
                break;
            };
            let open_lots = lots.len();
            let Some(lot) = lots.get_mut(index) else {
                warn!(
                    selector = self.selector.name(),
                    index,
                    open_lots,
                    "Lot selector returned an index outside the queue"
                );
                break;
            };

            let match_qty = remaining.min(lot.remaining_quantity);
            let holding_days = HoldingPolicy::holding_days(lot.acquired, txn.date);
            let category = self.policy.classify(holding_days);
            let gain = txn
                .price
                .checked_sub(lot.unit_cost)
                .and_then(|spread| match_qty.checked_mul(spread))
                .ok_or_else(|| overflow(txn))?;
            // Reports derive proceeds from the allocation
            if match_qty.checked_mul(txn.price).is_none() {
                return Err(overflow(txn));
            }

            let subtotal = match category {
                HoldingCategory::LongTerm => &mut result.long_term_gain,
                HoldingCategory::ShortTerm => &mut result.short_term_gain,
            };
            *subtotal = subtotal.checked_add(gain).ok_or_else(|| overflow(txn))?;

            allocations.push(GainAllocation {
                instrument: txn.instrument.clone(),
                sell_key: txn.txn_key.clone(),
                sell_seq: seq,
                buy_key: lot.buy_key.clone(),
                buy_seq: lot.buy_seq,
                matched_quantity: match_qty,
                buy_date: lot.acquired,
                buy_unit_cost: lot.unit_cost,
                sell_date: txn.date,
                sell_unit_price: txn.price,
                holding_days,
                category,
                gain,
            });

            result.matched_quantity += match_qty;
            lot.remaining_quantity -= match_qty;
            remaining -= match_qty;

            if lot.remaining_quantity.is_zero() {
                lots.remove(index);
            }
        }

        if result
            .long_term_gain
            .checked_add(result.short_term_gain)
            .is_none()
        {
            return Err(overflow(txn));
        }

        if remaining.is_positive() {
            warn!(
                instrument = %txn.instrument,
                sell_key = %txn.txn_key,
                unmatched = %remaining,
                "SELL exceeds open lots, residual left unmatched"
            );
        } else {
            debug!(
                instrument = %txn.instrument,
                sell_key = %txn.txn_key,
                gain = %result.total_gain(),
                "SELL fully matched"
            );
        }

        result.unmatched_quantity = remaining;
        self.lots = lots;
        self.allocations.extend(allocations);
        self.sells.push(result);
        Ok(())
    }

    /// Get the accumulated outputs, including the lots still open.
    pub fn into_outcome(self) -> InstrumentOutcome {
        InstrumentOutcome {
            instrument: self.instrument,
            allocations: self.allocations,
            sells: self.sells,
            open_lots: self.lots.into_iter().collect(),
        }
    }
}

fn overflow(txn: &Transaction) -> MatchError {
    MatchError::Overflow {
        txn_key: txn.txn_key.clone(),
    }
}
