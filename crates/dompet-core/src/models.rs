//! Domain models for dompet
//!
//! All monetary values are integers in the smallest currency unit. A
//! transaction's direction is carried by [`TransactionType`], never by the
//! sign of `amount`, which is always positive.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A money account (bank, e-wallet, cash, or credit card)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub account_type: AccountType,
    /// Issuer label (bank or e-wallet brand), free text
    pub provider: Option<String>,
    /// Opening balance in the smallest currency unit (may be negative for credit)
    pub initial_balance: i64,
    /// Inactive accounts are kept for history but hidden from default listings
    pub is_active: bool,
}

/// Account types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountType {
    Bank,
    EWallet,
    Cash,
    CreditCard,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::EWallet => "e-wallet",
            Self::Cash => "cash",
            Self::CreditCard => "credit-card",
        }
    }
}

impl std::str::FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bank" => Ok(Self::Bank),
            "e-wallet" | "ewallet" | "e_wallet" => Ok(Self::EWallet),
            "cash" => Ok(Self::Cash),
            "credit-card" | "creditcard" | "credit_card" => Ok(Self::CreditCard),
            _ => Err(format!("Unknown account type: {}", s)),
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transaction direction
///
/// There is no stored transfer type. A transfer is a linked pair of one
/// expense and one income transaction (see [`Transaction::to_account_id`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    /// The owning account; every transaction belongs to exactly one account
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Always positive, smallest currency unit
    pub amount: i64,
    pub category: String,
    pub description: String,
    /// Calendar day, used for period and window filtering
    pub date: NaiveDate,
    /// Instant, used for ordering and "balance as of"
    pub timestamp: DateTime<Utc>,
    /// Destination account, set only on the expense leg of a transfer
    pub to_account_id: Option<String>,
    /// Source account, set only on the income leg of a transfer
    pub from_account_id: Option<String>,
    pub merchant: Option<String>,
    /// Receipt line items, when extracted from a photo
    pub items: Option<Vec<ReceiptItem>>,
    /// Set when this transaction exists solely to correct balance drift
    #[serde(default)]
    pub is_reconciliation: bool,
    pub reconciliation: Option<ReconciliationData>,
}

/// A transaction produced by the pipeline, before the store assigns an id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub account_id: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub amount: i64,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub to_account_id: Option<String>,
    pub from_account_id: Option<String>,
    pub merchant: Option<String>,
    pub items: Option<Vec<ReceiptItem>>,
    #[serde(default)]
    pub is_reconciliation: bool,
    pub reconciliation: Option<ReconciliationData>,
}

impl NewTransaction {
    /// Materialize with a store-assigned id
    pub fn into_transaction(self, id: impl Into<String>) -> Transaction {
        Transaction {
            id: id.into(),
            account_id: self.account_id,
            kind: self.kind,
            amount: self.amount,
            category: self.category,
            description: self.description,
            date: self.date,
            timestamp: self.timestamp,
            to_account_id: self.to_account_id,
            from_account_id: self.from_account_id,
            merchant: self.merchant,
            items: self.items,
            is_reconciliation: self.is_reconciliation,
            reconciliation: self.reconciliation,
        }
    }
}

/// One receipt line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptItem {
    pub name: String,
    pub qty: u32,
    /// Unit price, smallest currency unit
    pub price: i64,
}

/// Balance correction detail attached to a reconciliation transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationData {
    /// Balance the ledger computed at reconciliation time
    pub recorded_balance: i64,
    /// Balance the user observed in the real world
    pub actual_balance: i64,
    /// actual - recorded; the adjustment amount carries its absolute value
    pub difference: i64,
}

/// Derived per-account balance; recomputed from the full ledger on every query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_active: bool,
    pub current_balance: i64,
    pub total_income: i64,
    pub total_expense: i64,
}

/// A spending ceiling for one category over a recurring period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: String,
    pub category: String,
    /// Ceiling, positive, smallest currency unit
    pub amount: i64,
    pub period: BudgetPeriod,
}

/// Budget period kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(format!("Unknown budget period: {}", s)),
        }
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
