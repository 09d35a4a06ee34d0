//! Compiles a transaction history into realized-gain outputs.

use crate::domain::{group_by_instrument, InstrumentId, RejectedRecord, Sequenced, Transaction};
use crate::engine::{Fifo, HoldingPolicy, InstrumentOutcome, LotMatcher, LotSelector};
use futures::future::try_join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{CompileError, FailedInstrument, LedgerRun};

/// Runs the lot matcher over every instrument in a ledger.
#[derive(Debug, Clone)]
pub struct Compiler {
    policy: HoldingPolicy,
    selector: Arc<dyn LotSelector>,
}

impl Compiler {
    pub fn new(policy: HoldingPolicy, selector: Arc<dyn LotSelector>) -> Self {
        Self { policy, selector }
    }

    /// FIFO compiler with the given holding policy.
    pub fn fifo(policy: HoldingPolicy) -> Self {
        Self::new(policy, Arc::new(Fifo))
    }

    pub fn policy(&self) -> HoldingPolicy {
        self.policy
    }

    /// Compile the full history on the calling thread.
    ///
    /// Invalid records are reported in [`LedgerRun::rejected`] and skipped;
    /// everything else is matched.
    pub fn compile(&self, transactions: &[Transaction]) -> LedgerRun {
        let (groups, rejected) = Self::prepare(transactions.iter().cloned());

        let mut run = LedgerRun {
            rejected,
            ..LedgerRun::default()
        };
        for (instrument, group) in groups {
            let outcome = Self::run_instrument(
                instrument,
                &group,
                self.policy,
                Arc::clone(&self.selector),
            );
            Self::merge(&mut run, outcome);
        }

        self.log_summary(&run);
        run
    }

    /// Compile the full history with one blocking worker per instrument.
    ///
    /// Produces exactly the same [`LedgerRun`] as [`Compiler::compile`].
    ///
    /// # Errors
    /// Returns an error if a worker task panics or is cancelled.
    pub async fn compile_parallel(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<LedgerRun, CompileError> {
        let (groups, rejected) = Self::prepare(transactions);

        let workers = groups.into_iter().map(|(instrument, group)| {
            let policy = self.policy;
            let selector = Arc::clone(&self.selector);
            tokio::task::spawn_blocking(move || {
                Self::run_instrument(instrument, &group, policy, selector)
            })
        });
        let outcomes = try_join_all(workers).await?;

        let mut run = LedgerRun {
            rejected,
            ..LedgerRun::default()
        };
        for outcome in outcomes {
            Self::merge(&mut run, outcome);
        }

        self.log_summary(&run);
        Ok(run)
    }

    /// Validate, sequence and group the input.
    fn prepare(
        transactions: impl IntoIterator<Item = Transaction>,
    ) -> (BTreeMap<InstrumentId, Vec<Sequenced>>, Vec<RejectedRecord>) {
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for (seq, txn) in transactions.into_iter().enumerate() {
            match txn.validate() {
                Ok(()) => accepted.push(Sequenced { seq, txn }),
                Err(error) => {
                    warn!(
                        index = seq,
                        txn_key = %txn.txn_key,
                        error = %error,
                        "Rejected transaction"
                    );
                    rejected.push(RejectedRecord::from_transaction(seq, &txn, error));
                }
            }
        }

        (group_by_instrument(accepted), rejected)
    }

    fn run_instrument(
        instrument: InstrumentId,
        group: &[Sequenced],
        policy: HoldingPolicy,
        selector: Arc<dyn LotSelector>,
    ) -> Result<InstrumentOutcome, FailedInstrument> {
        let mut matcher = LotMatcher::new(instrument.clone(), policy, selector);
        for entry in group {
            if let Err(error) = matcher.process_at(entry.seq, &entry.txn) {
                return Err(FailedInstrument { instrument, error });
            }
        }

        let outcome = matcher.into_outcome();
        debug!(
            instrument = %outcome.instrument,
            transactions = group.len(),
            allocations = outcome.allocations.len(),
            open_lots = outcome.open_lots.len(),
            "Instrument matched"
        );
        Ok(outcome)
    }

    fn merge(run: &mut LedgerRun, outcome: Result<InstrumentOutcome, FailedInstrument>) {
        match outcome {
            Ok(outcome) => run.absorb(outcome),
            Err(failed) => {
                warn!(
                    instrument = %failed.instrument,
                    error = %failed.error,
                    "Instrument skipped"
                );
                run.failed_instruments.push(failed);
            }
        }
    }

    fn log_summary(&self, run: &LedgerRun) {
        info!(
            selector = self.selector.name(),
            threshold_days = self.policy.long_term_threshold_days,
            allocations = run.allocations.len(),
            sells = run.sells.len(),
            under_matched = run.under_matched().count(),
            rejected = run.rejected.len(),
            failed_instruments = run.failed_instruments.len(),
            "Ledger compiled"
        );
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::fifo(HoldingPolicy::default())
    }
}
