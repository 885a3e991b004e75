//! Pure ledger arithmetic and analytics
//!
//! Everything in this module is a side-effect-free function over borrowed
//! account/transaction slices:
//! - Real-time balance computation (never cached, always re-derived)
//! - Transfer validation and double-entry pair construction
//! - Cash flow analysis over a date window
//! - Recurring-charge detection (merchant key + stable amount + regular interval)
//! - Spending-anomaly detection (per-category z-score)
//!
//! Balances are recomputed from the full transaction history on every call so
//! that deletions never desynchronize state.

use std::collections::HashMap;

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::TRANSFER_CATEGORY;
use crate::models::{
    Account, AccountBalance, NewTransaction, Transaction, TransactionType,
};

// =============================================================================
// Balances
// =============================================================================

/// Real-time balance for one account: initial + income - expense.
///
/// Transactions for other accounts are ignored; an account with no
/// transactions reports its initial balance unchanged.
pub fn balance_of(account: &Account, transactions: &[Transaction]) -> AccountBalance {
    let mut income: i64 = 0;
    let mut expense: i64 = 0;

    for tx in transactions.iter().filter(|t| t.account_id == account.id) {
        match tx.kind {
            TransactionType::Income => income += tx.amount,
            TransactionType::Expense => expense += tx.amount,
        }
    }

    AccountBalance {
        account_id: account.id.clone(),
        name: account.name.clone(),
        account_type: account.account_type,
        is_active: account.is_active,
        current_balance: account.initial_balance + income - expense,
        total_income: income,
        total_expense: expense,
    }
}

/// Balances for every account
pub fn all_balances(accounts: &[Account], transactions: &[Transaction]) -> Vec<AccountBalance> {
    accounts
        .iter()
        .map(|a| balance_of(a, transactions))
        .collect()
}

/// Total net worth across all accounts
pub fn net_worth(accounts: &[Account], transactions: &[Transaction]) -> i64 {
    accounts
        .iter()
        .map(|a| balance_of(a, transactions).current_balance)
        .sum()
}

// =============================================================================
// Transfer validation (double-entry)
// =============================================================================

/// Why a transfer request was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransferError {
    SourceNotFound,
    TargetNotFound,
    SameAccount,
    InsufficientFunds {
        account: String,
        balance: i64,
        required: i64,
    },
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceNotFound => write!(f, "Akun sumber tidak ditemukan"),
            Self::TargetNotFound => write!(f, "Akun tujuan tidak ditemukan"),
            Self::SameAccount => write!(f, "Tidak bisa transfer ke akun yang sama"),
            Self::InsufficientFunds {
                account,
                balance,
                required,
            } => write!(
                f,
                "Saldo {} tidak cukup. Saldo: {}, Dibutuhkan: {}",
                account,
                format_rupiah(*balance),
                format_rupiah(*required)
            ),
        }
    }
}

/// Outcome of checking a transfer before execution
#[derive(Debug, Clone, Serialize)]
pub struct TransferValidation {
    pub is_valid: bool,
    pub error: Option<TransferError>,
    /// Advisory only; a warning never blocks the transfer
    pub warning: Option<String>,
    pub source_balance: i64,
    pub required_amount: i64,
}

/// Validate a transfer between accounts before execution.
///
/// Checks, in order: both accounts exist, they differ, and the source's
/// real-time balance covers the amount. A transfer consuming more than half
/// the source balance passes with a warning.
pub fn validate_transfer(
    source_id: &str,
    target_id: &str,
    amount: i64,
    accounts: &[Account],
    transactions: &[Transaction],
) -> TransferValidation {
    let source = accounts.iter().find(|a| a.id == source_id);
    let target = accounts.iter().find(|a| a.id == target_id);

    let Some(source) = source else {
        return TransferValidation {
            is_valid: false,
            error: Some(TransferError::SourceNotFound),
            warning: None,
            source_balance: 0,
            required_amount: amount,
        };
    };

    if target.is_none() {
        return TransferValidation {
            is_valid: false,
            error: Some(TransferError::TargetNotFound),
            warning: None,
            source_balance: 0,
            required_amount: amount,
        };
    }

    if source_id == target_id {
        return TransferValidation {
            is_valid: false,
            error: Some(TransferError::SameAccount),
            warning: None,
            source_balance: 0,
            required_amount: amount,
        };
    }

    let balance = balance_of(source, transactions).current_balance;

    if balance < amount {
        return TransferValidation {
            is_valid: false,
            error: Some(TransferError::InsufficientFunds {
                account: source.name.clone(),
                balance,
                required: amount,
            }),
            warning: None,
            source_balance: balance,
            required_amount: amount,
        };
    }

    let warning = if amount.saturating_mul(2) > balance {
        let pct = ((amount as f64 / balance as f64) * 100.0).round() as i64;
        Some(format!(
            "Transfer ini akan menghabiskan {}% saldo {}",
            pct, source.name
        ))
    } else {
        None
    };

    TransferValidation {
        is_valid: true,
        error: None,
        warning,
        source_balance: balance,
        required_amount: amount,
    }
}

/// Build the double-entry pair for a validated transfer:
/// an expense leg on the source and an income leg on the destination,
/// cross-referenced through `to_account_id`/`from_account_id`.
pub fn transfer_pair(
    source: &Account,
    target: &Account,
    amount: i64,
    description: Option<&str>,
    date: NaiveDate,
) -> (NewTransaction, NewTransaction) {
    let timestamp = date.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc();

    let expense_leg = NewTransaction {
        account_id: source.id.clone(),
        kind: TransactionType::Expense,
        amount,
        category: TRANSFER_CATEGORY.to_string(),
        description: description
            .map(|d| d.to_string())
            .unwrap_or_else(|| format!("Transfer ke {}", target.name)),
        date,
        timestamp,
        to_account_id: Some(target.id.clone()),
        from_account_id: None,
        merchant: None,
        items: None,
        is_reconciliation: false,
        reconciliation: None,
    };

    let income_leg = NewTransaction {
        account_id: target.id.clone(),
        kind: TransactionType::Income,
        amount,
        category: TRANSFER_CATEGORY.to_string(),
        description: description
            .map(|d| d.to_string())
            .unwrap_or_else(|| format!("Transfer dari {}", source.name)),
        date,
        timestamp,
        to_account_id: None,
        from_account_id: Some(source.id.clone()),
        merchant: None,
        items: None,
        is_reconciliation: false,
        reconciliation: None,
    };

    (expense_leg, income_leg)
}

// =============================================================================
// Cash flow analysis
// =============================================================================

/// Per-category total within a cash flow window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryAmount {
    pub category: String,
    pub amount: i64,
}

/// The largest single transaction in a window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTransaction {
    pub description: String,
    pub amount: i64,
}

/// Income vs expense breakdown over a date window
#[derive(Debug, Clone, Serialize)]
pub struct CashFlowAnalysis {
    /// "YYYY-MM-DD - YYYY-MM-DD"
    pub period: String,
    pub total_inflow: i64,
    pub total_outflow: i64,
    pub net_cash_flow: i64,
    /// Sorted descending by amount; ties keep first-seen order
    pub income_sources: Vec<CategoryAmount>,
    /// Sorted descending by amount; ties keep first-seen order
    pub expense_categories: Vec<CategoryAmount>,
    pub biggest_income: Option<TopTransaction>,
    pub biggest_expense: Option<TopTransaction>,
}

/// Analyze cash flow for `[start, end]`, inclusive on both ends, by `date`.
pub fn analyze_cash_flow(
    transactions: &[Transaction],
    start: NaiveDate,
    end: NaiveDate,
) -> CashFlowAnalysis {
    let in_window: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.date >= start && t.date <= end)
        .collect();

    let mut total_inflow: i64 = 0;
    let mut total_outflow: i64 = 0;
    let mut income_by_category = CategoryTotals::new();
    let mut expense_by_category = CategoryTotals::new();
    let mut biggest_income: Option<TopTransaction> = None;
    let mut biggest_expense: Option<TopTransaction> = None;

    for tx in &in_window {
        match tx.kind {
            TransactionType::Income => {
                total_inflow += tx.amount;
                income_by_category.add(&tx.category, tx.amount);
                track_biggest(&mut biggest_income, tx);
            }
            TransactionType::Expense => {
                total_outflow += tx.amount;
                expense_by_category.add(&tx.category, tx.amount);
                track_biggest(&mut biggest_expense, tx);
            }
        }
    }

    CashFlowAnalysis {
        period: format!("{} - {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d")),
        total_inflow,
        total_outflow,
        net_cash_flow: total_inflow - total_outflow,
        income_sources: income_by_category.into_sorted(),
        expense_categories: expense_by_category.into_sorted(),
        biggest_income,
        biggest_expense,
    }
}

/// Cash flow for one calendar month
pub fn monthly_cash_flow(transactions: &[Transaction], year: i32, month: u32) -> CashFlowAnalysis {
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default();
    analyze_cash_flow(transactions, start, last_day_of_month(year, month))
}

/// Last calendar day of a month
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .unwrap_or_default()
}

/// Category totals preserving first-seen insertion order
struct CategoryTotals {
    order: Vec<String>,
    totals: HashMap<String, i64>,
}

impl CategoryTotals {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            totals: HashMap::new(),
        }
    }

    fn add(&mut self, category: &str, amount: i64) {
        if !self.totals.contains_key(category) {
            self.order.push(category.to_string());
        }
        *self.totals.entry(category.to_string()).or_insert(0) += amount;
    }

    fn into_sorted(self) -> Vec<CategoryAmount> {
        let mut out: Vec<CategoryAmount> = self
            .order
            .into_iter()
            .map(|category| {
                let amount = self.totals.get(&category).copied().unwrap_or(0);
                CategoryAmount { category, amount }
            })
            .collect();
        // Stable sort: equal amounts keep first-seen order
        out.sort_by(|a, b| b.amount.cmp(&a.amount));
        out
    }
}

fn track_biggest(slot: &mut Option<TopTransaction>, tx: &Transaction) {
    let bigger = match slot {
        Some(current) => tx.amount > current.amount,
        None => true,
    };
    if bigger {
        *slot = Some(TopTransaction {
            description: tx.description.clone(),
            amount: tx.amount,
        });
    }
}

// =============================================================================
// Recurring transaction detection
// =============================================================================

/// Thresholds for recurring-charge detection
#[derive(Debug, Clone)]
pub struct RecurringConfig {
    /// Minimum occurrences of a key before a group is considered
    pub min_occurrences: usize,
    /// Reject groups whose amount spread (max - min) exceeds this fraction
    /// of the average amount
    pub amount_spread_ratio: f64,
    /// Average day-gap ceilings for each frequency bucket
    pub daily_max_gap: f64,
    pub weekly_max_gap: f64,
    pub monthly_max_gap: f64,
    /// Confidence floor reported for any accepted group
    pub min_confidence: f64,
}

impl Default for RecurringConfig {
    fn default() -> Self {
        Self {
            min_occurrences: 3,
            amount_spread_ratio: 0.2,
            daily_max_gap: 2.0,
            weekly_max_gap: 9.0,
            monthly_max_gap: 35.0,
            min_confidence: 0.5,
        }
    }
}

/// How often a recurring charge lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A detected recurring charge (subscription or bill)
#[derive(Debug, Clone, Serialize)]
pub struct RecurringTransaction {
    pub merchant: String,
    pub category: String,
    pub average_amount: i64,
    pub frequency: Frequency,
    pub last_occurrence: NaiveDate,
    pub next_expected: NaiveDate,
    /// In [0.5, 1.0]; higher when intervals are more regular
    pub confidence: f64,
}

/// Normalized grouping key: lowercased trimmed merchant (or description).
/// Keys shorter than 3 characters are noise and yield `None`.
pub fn recurring_key(tx: &Transaction) -> Option<String> {
    let raw = tx.merchant.as_deref().unwrap_or(&tx.description);
    let key = raw.to_lowercase().trim().to_string();
    if key.chars().count() < 3 {
        None
    } else {
        Some(key)
    }
}

/// Detect recurring transactions by grouping on the normalized key, then
/// checking amount stability and interval regularity.
pub fn detect_recurring(
    transactions: &[Transaction],
    config: &RecurringConfig,
) -> Vec<RecurringTransaction> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Transaction>> = HashMap::new();

    for tx in transactions {
        let Some(key) = recurring_key(tx) else {
            continue;
        };
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(tx);
    }

    let mut recurring: Vec<RecurringTransaction> = Vec::new();

    for key in order {
        let Some(mut txs) = groups.remove(&key) else {
            continue;
        };
        if txs.len() < config.min_occurrences {
            continue;
        }

        txs.sort_by_key(|t| t.date);

        let amounts: Vec<i64> = txs.iter().map(|t| t.amount).collect();
        let avg_amount = mean(&amounts);
        let spread = (amounts.iter().max().copied().unwrap_or(0)
            - amounts.iter().min().copied().unwrap_or(0)) as f64;

        // Amount too unstable to be a subscription or bill
        if spread > avg_amount * config.amount_spread_ratio {
            continue;
        }

        let intervals: Vec<i64> = txs
            .windows(2)
            .map(|pair| (pair[1].date - pair[0].date).num_days())
            .collect();
        let avg_interval = mean(&intervals);

        let frequency = if avg_interval <= config.daily_max_gap {
            Frequency::Daily
        } else if avg_interval <= config.weekly_max_gap {
            Frequency::Weekly
        } else if avg_interval <= config.monthly_max_gap {
            Frequency::Monthly
        } else {
            Frequency::Yearly
        };

        let last = txs[txs.len() - 1];
        let next_expected = match frequency {
            Frequency::Daily => last.date + Duration::days(1),
            Frequency::Weekly => last.date + Duration::days(7),
            Frequency::Monthly => last.date + Months::new(1),
            Frequency::Yearly => last.date + Months::new(12),
        };

        let interval_spread = (intervals.iter().max().copied().unwrap_or(0)
            - intervals.iter().min().copied().unwrap_or(0)) as f64;
        let confidence = if avg_interval > 0.0 {
            (1.0 - interval_spread / avg_interval).max(config.min_confidence)
        } else {
            config.min_confidence
        };

        recurring.push(RecurringTransaction {
            merchant: txs[0]
                .merchant
                .clone()
                .unwrap_or_else(|| txs[0].description.clone()),
            category: txs[0].category.clone(),
            average_amount: avg_amount.round() as i64,
            frequency,
            last_occurrence: last.date,
            next_expected,
            confidence: (confidence * 100.0).round() / 100.0,
        });
    }

    recurring.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    recurring
}

// =============================================================================
// Anomaly detection
// =============================================================================

/// Thresholds for spending-anomaly detection
#[derive(Debug, Clone)]
pub struct AnomalyConfig {
    /// How far back from today to look
    pub lookback_days: i64,
    /// Minimum recent expense count before any flag is raised
    pub min_transactions: usize,
    /// Flag transactions whose z-score exceeds this
    pub z_score_threshold: f64,
    /// Above this z-score the severity becomes high
    pub high_severity_z: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            min_transactions: 10,
            z_score_threshold: 2.0,
            high_severity_z: 3.0,
        }
    }
}

/// How far outside the category's normal range an anomaly sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// An expense statistically unusual for its category
#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub transaction: Transaction,
    pub reason: String,
    /// Rounded to two decimals
    pub z_score: f64,
    pub severity: Severity,
}

/// Detect unusual expenses within the lookback window ending `today`.
///
/// Needs at least `min_transactions` recent expenses overall; below that the
/// sample is too small and nothing is flagged. A category whose amounts never
/// vary (stddev 0) is never flagged.
pub fn detect_anomalies(
    transactions: &[Transaction],
    today: NaiveDate,
    config: &AnomalyConfig,
) -> Vec<Anomaly> {
    let cutoff = today - Duration::days(config.lookback_days);

    let recent: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.kind == TransactionType::Expense && t.date >= cutoff)
        .collect();

    if recent.len() < config.min_transactions {
        return Vec::new();
    }

    let mut by_category: HashMap<&str, Vec<i64>> = HashMap::new();
    for tx in &recent {
        by_category.entry(&tx.category).or_default().push(tx.amount);
    }

    let stats: HashMap<&str, (f64, f64)> = by_category
        .iter()
        .map(|(cat, amounts)| (*cat, (mean(amounts), population_std_dev(amounts))))
        .collect();

    let mut anomalies: Vec<Anomaly> = Vec::new();

    for tx in &recent {
        let Some((cat_mean, std_dev)) = stats.get(tx.category.as_str()).copied() else {
            continue;
        };
        if std_dev == 0.0 {
            continue;
        }

        let z = ((tx.amount as f64 - cat_mean) / std_dev).abs();
        if z > config.z_score_threshold {
            let severity = if z > config.high_severity_z {
                Severity::High
            } else {
                Severity::Medium
            };
            anomalies.push(Anomaly {
                transaction: (*tx).clone(),
                reason: format!(
                    "Jumlah {} jauh lebih tinggi dari rata-rata kategori {} ({})",
                    format_rupiah(tx.amount),
                    tx.category,
                    format_rupiah(cat_mean.round() as i64)
                ),
                z_score: (z * 100.0).round() / 100.0,
                severity,
            });
        }
    }

    anomalies.sort_by(|a, b| {
        b.z_score
            .partial_cmp(&a.z_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    anomalies
}

// =============================================================================
// Statistics helpers
// =============================================================================

/// Arithmetic mean; 0.0 for an empty slice
pub fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

/// Population standard deviation; 0.0 for an empty slice
pub fn population_std_dev(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values
        .iter()
        .map(|v| {
            let d = *v as f64 - m;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

// =============================================================================
// Currency formatting
// =============================================================================

/// Group an amount's digits with dots, no currency prefix,
/// e.g. 1234567 -> "1.234.567"
pub fn group_thousands(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let lead = digits.len() % 3;

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - lead) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    if amount < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Format an amount in the smallest currency unit as a grouped rupiah string,
/// e.g. 1234567 -> "Rp1.234.567"
pub fn format_rupiah(amount: i64) -> String {
    if amount < 0 {
        format!("-Rp{}", group_thousands(amount.saturating_abs()))
    } else {
        format!("Rp{}", group_thousands(amount))
    }
}
