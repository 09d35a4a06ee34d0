//! Transaction type representing a single ledger BUY or SELL.

use crate::domain::{Action, Decimal, InstrumentId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single immutable ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Content-derived identifier for this record.
    pub txn_key: String,
    /// Instrument being traded.
    pub instrument: InstrumentId,
    /// Trade date.
    pub date: NaiveDate,
    pub action: Action,
    /// Units traded, always > 0 for a valid record.
    pub quantity: Decimal,
    /// Price per unit.
    pub price: Decimal,
}

impl Transaction {
    pub fn new(
        instrument: InstrumentId,
        date: NaiveDate,
        action: Action,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        let txn_key = Self::compute_txn_key(&instrument, date, action, &quantity, &price);
        Transaction {
            txn_key,
            instrument,
            date,
            action,
            quantity,
            price,
        }
    }

    pub fn buy(instrument: &str, date: NaiveDate, quantity: Decimal, price: Decimal) -> Self {
        Self::new(InstrumentId::new(instrument), date, Action::Buy, quantity, price)
    }

    pub fn sell(instrument: &str, date: NaiveDate, quantity: Decimal, price: Decimal) -> Self {
        Self::new(InstrumentId::new(instrument), date, Action::Sell, quantity, price)
    }

    /// Stable key derived from the record's fields.
    ///
    /// Records with identical fields share a key; ordering between them is
    /// decided by input position, never by the key.
    pub fn compute_txn_key(
        instrument: &InstrumentId,
        date: NaiveDate,
        action: Action,
        quantity: &Decimal,
        price: &Decimal,
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(instrument.as_str());
        hasher.update(date.format("%Y-%m-%d").to_string());
        hasher.update(if action == Action::Buy { b"B" } else { b"S" });
        hasher.update(quantity.to_canonical_string());
        hasher.update(price.to_canonical_string());
        let hash = hasher.finalize();
        format!("txn:{}", hex::encode(&hash[..12]))
    }

    /// Check the record can enter the matcher.
    ///
    /// # Errors
    /// Returns the first rule the record breaks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.instrument.as_str().trim().is_empty() {
            return Err(ValidationError::MissingInstrument);
        }
        if !self.quantity.is_positive() {
            return Err(ValidationError::NonPositiveQuantity(self.quantity));
        }
        if self.price.is_negative() {
            return Err(ValidationError::NegativePrice(self.price));
        }
        Ok(())
    }

    pub fn is_buy(&self) -> bool {
        self.action == Action::Buy
    }

    pub fn is_sell(&self) -> bool {
        self.action == Action::Sell
    }
}

/// Why a record was refused before matching.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("price must not be negative, got {0}")]
    NegativePrice(Decimal),
    #[error("instrument id is empty")]
    MissingInstrument,
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// A record refused before matching, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position of the record in its input sequence.
    pub index: usize,
    pub txn_key: Option<String>,
    pub instrument: Option<InstrumentId>,
    pub error: ValidationError,
}

impl RejectedRecord {
    pub fn new(index: usize, instrument: Option<InstrumentId>, error: ValidationError) -> Self {
        Self {
            index,
            txn_key: None,
            instrument,
            error,
        }
    }

    pub fn from_transaction(index: usize, txn: &Transaction, error: ValidationError) -> Self {
        Self {
            index,
            txn_key: Some(txn.txn_key.clone()),
            instrument: Some(txn.instrument.clone()),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_transaction_creation() {
        let txn = Transaction::buy("500209", date(2023, 1, 10), d("100"), d("10"));
        assert_eq!(txn.instrument.as_str(), "500209");
        assert_eq!(txn.action, Action::Buy);
        assert!(txn.is_buy());
        assert!(!txn.is_sell());
        assert!(txn.txn_key.starts_with("txn:"));
        assert_eq!(txn.txn_key.len(), 4 + 24);
    }

    #[test]
    fn test_txn_key_deterministic() {
        let a = Transaction::sell("INFY", date(2024, 2, 1), d("120"), d("15"));
        let b = Transaction::sell("INFY", date(2024, 2, 1), d("120.0"), d("15.00"));
        assert_eq!(a.txn_key, b.txn_key, "canonical decimals must hash equally");
    }

    #[test]
    fn test_txn_key_differs_by_action() {
        let a = Transaction::buy("INFY", date(2024, 2, 1), d("1"), d("15"));
        let b = Transaction::sell("INFY", date(2024, 2, 1), d("1"), d("15"));
        assert_ne!(a.txn_key, b.txn_key);
    }

    #[test]
    fn test_validate_accepts_zero_price() {
        let txn = Transaction::buy("BONUS", date(2023, 1, 1), d("5"), d("0"));
        assert!(txn.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_quantity() {
        let txn = Transaction::sell("INFY", date(2023, 1, 1), d("0"), d("10"));
        assert_eq!(
            txn.validate(),
            Err(ValidationError::NonPositiveQuantity(d("0")))
        );
    }

    #[test]
    fn test_validate_rejects_negative_quantity_and_price() {
        let neg_qty = Transaction::buy("INFY", date(2023, 1, 1), d("-1"), d("10"));
        assert!(matches!(
            neg_qty.validate(),
            Err(ValidationError::NonPositiveQuantity(_))
        ));

        let neg_px = Transaction::buy("INFY", date(2023, 1, 1), d("1"), d("-10"));
        assert!(matches!(
            neg_px.validate(),
            Err(ValidationError::NegativePrice(_))
        ));
    }

    #[test]
    fn test_validate_rejects_blank_instrument() {
        let txn = Transaction::buy("  ", date(2023, 1, 1), d("1"), d("10"));
        assert_eq!(txn.validate(), Err(ValidationError::MissingInstrument));
    }

    #[test]
    fn test_transaction_serialization() {
        let txn = Transaction::buy("500209", date(2023, 6, 1), d("50"), d("12"));
        let json = serde_json::to_string(&txn).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(txn, back);
    }
}
