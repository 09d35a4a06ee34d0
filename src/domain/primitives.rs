//! Domain primitives: InstrumentId, Action, HoldingCategory.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stable grouping key for an instrument (exchange scrip code, ISIN, ticker).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentId(pub String);

impl InstrumentId {
    pub fn new(id: impl Into<String>) -> Self {
        InstrumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of a ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" | "B" => Ok(Action::Buy),
            "SELL" | "S" => Ok(Action::Sell),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// Holding-period classification of a realized gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldingCategory {
    /// Held strictly longer than the long-term threshold (LTCG).
    LongTerm,
    /// Held for the threshold or less (STCG).
    ShortTerm,
}

impl HoldingCategory {
    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            HoldingCategory::LongTerm => "LTCG",
            HoldingCategory::ShortTerm => "STCG",
        }
    }
}

impl std::fmt::Display for HoldingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HoldingCategory::LongTerm => write!(f, "LONG_TERM"),
            HoldingCategory::ShortTerm => write!(f, "SHORT_TERM"),
        }
    }
}
