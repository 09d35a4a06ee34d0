//! Loading broker statement exports into transactions.
//!
//! The statement is a JSON array of rows. Each row carries separate buy and
//! sell quantity/rate columns; exactly one side must be set.

use crate::domain::{
    Action, Decimal, InstrumentId, RejectedRecord, Transaction, ValidationError,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Statement rows that are charges or levies, not instruments.
pub const DEFAULT_EXCLUDED_NAMES: &[&str] = &[
    "STT",
    "STAMP DUTY",
    "SERVICE TAX",
    "TURNOVER CHARGE",
    "TOC BSE EXCHANG",
    "TOC NSE EXCHANG",
    "SEBITOC",
];

/// Placeholder code used by statements for non-instrument rows.
const CHARGE_ROW_CODE: &str = "0000";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("statement is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("statement must be a JSON array of rows")]
    NotAnArray,
}

/// Transactions parsed from a statement, plus what was left out.
#[derive(Debug, Clone, Default)]
pub struct LoadedLedger {
    /// Accepted rows, in file order.
    pub transactions: Vec<Transaction>,
    /// Rows that could not become transactions; `index` is the row number.
    pub rejected: Vec<RejectedRecord>,
    /// Charge rows that were dropped on purpose.
    pub skipped: usize,
    /// Name each instrument carried on the statement.
    pub statement_names: BTreeMap<InstrumentId, String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum CodeField {
    Text(String),
    Number(serde_json::Number),
}

impl CodeField {
    fn into_string(self) -> String {
        match self {
            CodeField::Text(s) => s.trim().to_string(),
            CodeField::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StatementRow {
    scrip_code: CodeField,
    #[serde(default)]
    scrip_name: Option<String>,
    transaction_date: String,
    #[serde(default)]
    buy_qty: Decimal,
    #[serde(default)]
    sell_qty: Decimal,
    #[serde(default)]
    net_qty: Option<Decimal>,
    #[serde(default)]
    buy_rate: Decimal,
    #[serde(default)]
    sell_rate: Decimal,
}

/// Parses statement exports, skipping charge rows by name.
#[derive(Debug, Clone)]
pub struct LedgerFileLoader {
    excluded_names: HashSet<String>,
}

impl LedgerFileLoader {
    pub fn new<I, S>(excluded_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            excluded_names: excluded_names
                .into_iter()
                .map(|name| normalize_name(name.as_ref()))
                .collect(),
        }
    }

    /// Read and parse a statement file.
    ///
    /// # Errors
    /// Fails only when the file is unreadable or not a JSON array; bad rows
    /// end up in [`LoadedLedger::rejected`].
    pub async fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadedLedger, LoadError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Io {
                path: path.display().to_string(),
                source,
            })?;
        let ledger = self.parse_str(&content)?;
        info!(
            path = %path.display(),
            transactions = ledger.transactions.len(),
            rejected = ledger.rejected.len(),
            skipped = ledger.skipped,
            "Loaded statement"
        );
        Ok(ledger)
    }

    /// Parse statement JSON held in memory.
    pub fn parse_str(&self, content: &str) -> Result<LoadedLedger, LoadError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let rows = match value {
            serde_json::Value::Array(rows) => rows,
            _ => return Err(LoadError::NotAnArray),
        };

        let mut ledger = LoadedLedger::default();
        for (index, raw) in rows.into_iter().enumerate() {
            let row: StatementRow = match serde_json::from_value(raw) {
                Ok(row) => row,
                Err(e) => {
                    warn!(index, error = %e, "Malformed statement row");
                    ledger.rejected.push(RejectedRecord::new(
                        index,
                        None,
                        ValidationError::Malformed(e.to_string()),
                    ));
                    continue;
                }
            };

            let code = row.scrip_code.clone().into_string();
            let name = row
                .scrip_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string);

            if self.is_charge_row(&code, name.as_deref()) {
                debug!(index, code = %code, "Skipping charge row");
                ledger.skipped += 1;
                continue;
            }

            let instrument = InstrumentId::new(code);
            match row_to_transaction(&instrument, &row) {
                Ok(txn) => {
                    if let Some(name) = name {
                        ledger
                            .statement_names
                            .entry(instrument.clone())
                            .or_insert(name);
                    }
                    ledger.transactions.push(txn);
                }
                Err(error) => {
                    warn!(index, instrument = %instrument, error = %error, "Rejected statement row");
                    ledger
                        .rejected
                        .push(RejectedRecord::new(index, Some(instrument), error));
                }
            }
        }

        Ok(ledger)
    }

    fn is_charge_row(&self, code: &str, name: Option<&str>) -> bool {
        code == CHARGE_ROW_CODE
            || name.map_or(false, |n| self.excluded_names.contains(&normalize_name(n)))
    }
}

impl Default for LedgerFileLoader {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_NAMES)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

fn row_to_transaction(
    instrument: &InstrumentId,
    row: &StatementRow,
) -> Result<Transaction, ValidationError> {
    let date = parse_statement_date(&row.transaction_date)?;

    let (action, side_qty, price) = match (row.buy_qty.is_positive(), row.sell_qty.is_positive()) {
        (true, false) => (Action::Buy, row.buy_qty, row.buy_rate),
        (false, true) => (Action::Sell, row.sell_qty, row.sell_rate),
        (true, true) => {
            return Err(ValidationError::UnknownAction(
                "both buy_qty and sell_qty are set".to_string(),
            ))
        }
        (false, false) => {
            return Err(ValidationError::UnknownAction(
                "neither buy_qty nor sell_qty is set".to_string(),
            ))
        }
    };

    let quantity = match row.net_qty {
        Some(net) if !net.is_zero() => net.abs(),
        _ => side_qty,
    };

    let txn = Transaction::new(instrument.clone(), date, action, quantity, price);
    txn.validate()?;
    Ok(txn)
}

/// Accepts `dd/mm/yyyy` (statement format) and ISO `yyyy-mm-dd`.
fn parse_statement_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}
