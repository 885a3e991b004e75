//! Balance reconciliation
//!
//! Closes the gap between the ledger-computed balance and what the user
//! actually sees at the bank or e-wallet. The correction is an ordinary
//! income or expense transaction flagged `is_reconciliation`, so balance
//! recomputation needs no special case. Suggestion text is advisory and
//! fails open.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::warn;

use crate::ai::AIGateway;
use crate::config::RECONCILIATION_CATEGORY;
use crate::ledger::{balance_of, group_thousands};
use crate::models::{
    Account, NewTransaction, ReconciliationData, Transaction, TransactionType,
};
use crate::prompts::{PromptId, PromptLibrary};

/// Recorded vs observed balance for one account
pub fn gap(account: &Account, transactions: &[Transaction], actual_balance: i64) -> ReconciliationData {
    let recorded_balance = balance_of(account, transactions).current_balance;
    ReconciliationData {
        recorded_balance,
        actual_balance,
        difference: actual_balance - recorded_balance,
    }
}

/// The adjustment transaction that closes the gap, if there is one.
///
/// A positive difference means money the ledger missed, recorded as
/// income; a negative one is unrecorded spending. A zero difference
/// needs no adjustment.
pub fn build_adjustment(
    account: &Account,
    transactions: &[Transaction],
    actual_balance: i64,
    reason: Option<&str>,
    today: NaiveDate,
) -> Option<NewTransaction> {
    let data = gap(account, transactions, actual_balance);
    if data.difference == 0 {
        return None;
    }

    let kind = if data.difference > 0 {
        TransactionType::Income
    } else {
        TransactionType::Expense
    };
    let description = match reason {
        Some(reason) => format!("Penyesuaian Saldo {} - {}", account.name, reason),
        None => format!("Penyesuaian Saldo {}", account.name),
    };

    Some(NewTransaction {
        account_id: account.id.clone(),
        kind,
        amount: data.difference.abs(),
        category: RECONCILIATION_CATEGORY.to_string(),
        description,
        date: today,
        timestamp: Utc::now(),
        to_account_id: None,
        from_account_id: None,
        merchant: None,
        items: None,
        is_reconciliation: true,
        reconciliation: Some(data),
    })
}

/// Outcome of checking a reconciliation request before execution
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationValidation {
    pub is_valid: bool,
    pub error: Option<String>,
    /// Advisory only; a warning never blocks the reconciliation
    pub warning: Option<String>,
}

/// Validate a reconciliation request.
///
/// The account must exist and the observed balance must be non-negative.
/// Balances above 100 million rupiah pass with a double-check warning.
pub fn validate(
    account_id: &str,
    actual_balance: i64,
    accounts: &[Account],
) -> ReconciliationValidation {
    if !accounts.iter().any(|a| a.id == account_id) {
        return ReconciliationValidation {
            is_valid: false,
            error: Some("Akun tidak ditemukan".to_string()),
            warning: None,
        };
    }

    if actual_balance < 0 {
        return ReconciliationValidation {
            is_valid: false,
            error: Some("Saldo actual tidak boleh negatif".to_string()),
            warning: None,
        };
    }

    let warning = (actual_balance > 100_000_000)
        .then(|| "Saldo sangat besar. Pastikan input sudah benar.".to_string());

    ReconciliationValidation {
        is_valid: true,
        error: None,
        warning,
    }
}

/// Reconciliation pattern for one account
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationHistory {
    pub total_reconciliations: usize,
    /// Mean of absolute differences, rounded
    pub average_difference: i64,
    pub last_reconciliation: Option<NaiveDate>,
    /// Up to three most frequent correction reasons, most common first
    pub frequent_reasons: Vec<String>,
}

/// Summarize past reconciliations to surface drift patterns
pub fn history(account_id: &str, transactions: &[Transaction]) -> ReconciliationHistory {
    let recon: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| tx.account_id == account_id && tx.is_reconciliation)
        .collect();

    if recon.is_empty() {
        return ReconciliationHistory {
            total_reconciliations: 0,
            average_difference: 0,
            last_reconciliation: None,
            frequent_reasons: Vec::new(),
        };
    }

    let total_abs: i64 = recon
        .iter()
        .map(|tx| {
            tx.reconciliation
                .as_ref()
                .map(|data| data.difference.abs())
                .unwrap_or(0)
        })
        .sum();
    let average_difference = (total_abs as f64 / recon.len() as f64).round() as i64;

    let last_reconciliation = recon.iter().map(|tx| tx.date).max();

    // Reasons live after the first " - " in the adjustment description
    let mut counts: Vec<(String, usize)> = Vec::new();
    for reason in recon
        .iter()
        .filter_map(|tx| tx.description.split(" - ").nth(1))
    {
        match counts.iter_mut().find(|(r, _)| r == reason) {
            Some((_, n)) => *n += 1,
            None => counts.push((reason.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    ReconciliationHistory {
        total_reconciliations: recon.len(),
        average_difference,
        last_reconciliation,
        frequent_reasons: counts.into_iter().take(3).map(|(r, _)| r).collect(),
    }
}

/// How often an account is worth reconciling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReconcileInterval {
    Weekly,
    BiWeekly,
    Monthly,
}

impl ReconcileInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::BiWeekly => "bi-weekly",
            Self::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalAdvice {
    pub interval: ReconcileInterval,
    pub reason: String,
}

/// Recommend a reconciliation cadence from the account's activity level
pub fn recommended_interval(
    account: &Account,
    transactions: &[Transaction],
    now: DateTime<Utc>,
) -> IntervalAdvice {
    let account_txs: Vec<&Transaction> = transactions
        .iter()
        .filter(|tx| tx.account_id == account.id)
        .collect();

    let days_since_first = account_txs
        .iter()
        .map(|tx| tx.timestamp)
        .min()
        .map(|first| ((now - first).num_milliseconds() as f64 / 86_400_000.0).ceil())
        .unwrap_or(0.0);

    let txs_per_day = if days_since_first > 0.0 {
        account_txs.len() as f64 / days_since_first
    } else {
        0.0
    };

    if txs_per_day > 5.0 {
        IntervalAdvice {
            interval: ReconcileInterval::Weekly,
            reason: "Akun ini sangat aktif (>5 transaksi/hari). Rekonsiliasi mingguan direkomendasikan."
                .to_string(),
        }
    } else if txs_per_day > 1.0 {
        IntervalAdvice {
            interval: ReconcileInterval::BiWeekly,
            reason: "Akun cukup aktif (1-5 transaksi/hari). Rekonsiliasi 2 minggu sekali direkomendasikan."
                .to_string(),
        }
    } else {
        IntervalAdvice {
            interval: ReconcileInterval::Monthly,
            reason: "Akun tidak terlalu aktif (<1 transaksi/hari). Rekonsiliasi bulanan cukup."
                .to_string(),
        }
    }
}

/// Static tips for a balance gap, tiered by its size
pub fn static_suggestions(difference: i64) -> Vec<String> {
    let abs = difference.abs();
    let tips: &[&str] = if abs < 10_000 {
        &[
            "💡 Kemungkinan selisih kecil karena pembulatan atau biaya admin bank",
            "💡 Cek apakah ada transaksi kecil yang lupa dicatat (parkir, tip, dll)",
        ]
    } else if abs < 100_000 {
        &[
            "💡 Periksa transaksi e-commerce yang mungkin belum tercatat",
            "💡 Cek apakah ada biaya subscription/langganan yang auto-debit",
            "💡 Review transaksi non-tunai yang dilakukan keluarga (jika shared account)",
        ]
    } else {
        &[
            "⚠️ PENTING: Selisih besar terdeteksi! Segera cek mutasi bank",
            "⚠️ Kemungkinan ada transaksi besar yang tidak tercatat",
            "⚠️ Periksa apakah ada transaksi fraud/tidak sah di rekening",
            "📄 Download mutasi bank dan cocokkan satu per satu",
        ]
    };
    tips.iter().map(|s| s.to_string()).collect()
}

/// Reconciliation tips with an optional model-generated hint
pub struct ReconcileAdvisor<'a> {
    gateway: &'a AIGateway,
}

impl<'a> ReconcileAdvisor<'a> {
    pub fn new(gateway: &'a AIGateway) -> Self {
        Self { gateway }
    }

    /// Static tips for the gap, plus one contextual hint when recent
    /// transactions give the model something to work with. The hint is
    /// skipped on any failure.
    pub async fn suggestions(
        &self,
        library: &mut PromptLibrary,
        difference: i64,
        recent: &[Transaction],
    ) -> Vec<String> {
        let mut suggestions = static_suggestions(difference);

        if !recent.is_empty() {
            if let Some(hint) = self.model_hint(library, difference, recent).await {
                suggestions.push(format!("🤖 {}", hint));
            }
        }

        suggestions
    }

    async fn model_hint(
        &self,
        library: &mut PromptLibrary,
        difference: i64,
        recent: &[Transaction],
    ) -> Option<String> {
        let lines: Vec<String> = recent
            .iter()
            .take(10)
            .map(|tx| {
                format!(
                    "{}: {} ({}) Rp{}",
                    tx.date,
                    tx.description,
                    tx.category,
                    group_thousands(tx.amount)
                )
            })
            .collect();
        let recent_transactions = lines.join("\n");

        let abs = group_thousands(difference.abs());
        let direction = if difference > 0 {
            "kelebihan"
        } else {
            "kekurangan"
        };

        let template = match library.get(PromptId::ReconcileHint) {
            Ok(template) => template,
            Err(e) => {
                warn!(error = %e, "reconcile hint prompt failed");
                return None;
            }
        };
        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("difference", &abs);
        vars.insert("direction", direction);
        vars.insert("recent_transactions", &recent_transactions);
        let prompt = template.render(&vars);

        match self.gateway.complete_simple(&prompt).await {
            Ok(response) => {
                let hint: String = response.trim().chars().take(150).collect();
                (!hint.is_empty()).then_some(hint)
            }
            Err(e) => {
                warn!(error = %e, "reconcile hint call failed");
                None
            }
        }
    }
}
