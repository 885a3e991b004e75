//! Rule-based intent classification
//!
//! A cheap, local, deterministic gate in front of the model: every user turn
//! is classified with keyword patterns so the pipeline pays at most one LLM
//! round trip. Patterns are evaluated in a fixed order and the first match
//! wins.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// What the user is trying to do with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentType {
    /// Record an income, expense, or transfer
    Transaction,
    /// Ask about balances, history, or totals
    Query,
    /// Ask for financial advice
    Advice,
    /// Plan a goal, budget, or saving target
    Planning,
    /// Ask for reports or trend analysis
    Analysis,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transaction => "transaction",
            Self::Query => "query",
            Self::Advice => "advice",
            Self::Planning => "planning",
            Self::Analysis => "analysis",
        }
    }
}

impl std::fmt::Display for IntentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for IntentType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "transaction" => Ok(Self::Transaction),
            "query" => Ok(Self::Query),
            "advice" => Ok(Self::Advice),
            "planning" => Ok(Self::Planning),
            "analysis" => Ok(Self::Analysis),
            other => Err(crate::error::Error::InvalidData(format!(
                "unknown intent type: {}",
                other
            ))),
        }
    }
}

/// Classification result for one user turn. Ephemeral, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "type")]
    pub kind: IntentType,
    /// In [0, 1]
    pub confidence: f64,
}

/// Classify a user message.
///
/// An attached image always means a receipt, so it short-circuits to
/// `Transaction` with full confidence. Otherwise the trigger-word groups are
/// tried in order; no match falls back to a low-confidence `Query`.
pub fn classify(text: &str, has_image: bool) -> Intent {
    if has_image {
        return Intent {
            kind: IntentType::Transaction,
            confidence: 1.0,
        };
    }

    let lower = text.to_lowercase();

    let rules: [(&str, IntentType, f64); 5] = [
        (
            r"catat|beli|bayar|transfer|pindah|belanja|byr|tf|jajan",
            IntentType::Transaction,
            0.9,
        ),
        (
            r"berapa|total|saldo|riwayat|transaksi|pengeluaran|pemasukan|sisa|habis",
            IntentType::Query,
            0.9,
        ),
        (
            r"saran|tips|gimana|bagus|sebaiknya|rekomendasi|hemat",
            IntentType::Advice,
            0.8,
        ),
        (
            r"rencana|target|nabung|investasi|budget",
            IntentType::Planning,
            0.8,
        ),
        (
            r"analisis|laporan|report|grafik|trend|pola",
            IntentType::Analysis,
            0.8,
        ),
    ];

    for (pattern, kind, confidence) in rules {
        let re = Regex::new(pattern).expect("valid regex");
        if re.is_match(&lower) {
            return Intent { kind, confidence };
        }
    }

    Intent {
        kind: IntentType::Query,
        confidence: 0.5,
    }
}
