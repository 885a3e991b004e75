//! JSON ledger persistence
//!
//! The whole ledger lives in one pretty-printed JSON document: accounts,
//! transactions, budgets, plus optional custom categories and a profile
//! blurb for chat personalization. The file is meant to be hand-editable;
//! every collection field defaults to empty so partial documents load.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dompet_core::models::{BudgetPeriod, NewTransaction};
use dompet_core::{Account, AccountType, Budget, CategorySet, Transaction};

/// On-disk ledger document
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerFile {
    pub accounts: Vec<Account>,
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
    /// Custom category list; empty means "use the configured defaults"
    pub categories: Vec<String>,
    /// Short self-description injected into chat context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl LedgerFile {
    /// Load a ledger from disk.
    ///
    /// A missing file is an error with a pointer to `dompet init`; a present
    /// but malformed file fails with the parse error.
    pub fn load(path: &Path) -> Result<LedgerFile> {
        if !path.exists() {
            anyhow::bail!(
                "Ledger tidak ditemukan di '{}'. Jalankan 'dompet init' dulu.",
                path.display()
            );
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ledger file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse ledger file: {}", path.display()))
    }

    /// Write the ledger back to disk as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize ledger")?;
        fs::write(path, raw)
            .with_context(|| format!("Failed to write ledger file: {}", path.display()))?;
        Ok(())
    }

    /// A fresh ledger with a single cash account.
    ///
    /// Real balances come later through `dompet reconcile`; the starter
    /// account opens at zero.
    pub fn starter() -> LedgerFile {
        LedgerFile {
            accounts: vec![Account {
                id: "acc-1".to_string(),
                name: "Kas".to_string(),
                account_type: AccountType::Cash,
                provider: None,
                initial_balance: 0,
                is_active: true,
            }],
            ..LedgerFile::default()
        }
    }

    /// The category set in effect: the file's own list when present,
    /// otherwise the configured fallback
    pub fn category_set(&self, fallback: &CategorySet) -> CategorySet {
        if self.categories.is_empty() {
            fallback.clone()
        } else {
            CategorySet::new(self.categories.clone())
        }
    }

    /// Find an account by exact id, then by case-insensitive name
    pub fn find_account(&self, needle: &str) -> Option<&Account> {
        self.accounts
            .iter()
            .find(|a| a.id == needle)
            .or_else(|| {
                self.accounts
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(needle))
            })
    }

    /// Append drafts as stored transactions, returning the assigned ids
    pub fn append(&mut self, drafts: Vec<NewTransaction>) -> Vec<String> {
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let id = next_id("tx", self.transactions.iter().map(|t| t.id.as_str()));
            self.transactions.push(draft.into_transaction(id.clone()));
            ids.push(id);
        }
        ids
    }

    /// Set or replace the budget for a category. Returns true when an
    /// existing budget was replaced.
    pub fn upsert_budget(&mut self, category: &str, amount: i64, period: BudgetPeriod) -> bool {
        if let Some(existing) = self
            .budgets
            .iter_mut()
            .find(|b| b.category.eq_ignore_ascii_case(category))
        {
            existing.amount = amount;
            existing.period = period;
            return true;
        }
        let id = next_id("bud", self.budgets.iter().map(|b| b.id.as_str()));
        self.budgets.push(Budget {
            id,
            category: category.to_string(),
            amount,
            period,
        });
        false
    }

    /// Remove a category's budget. Returns true when one was removed.
    pub fn remove_budget(&mut self, category: &str) -> bool {
        let before = self.budgets.len();
        self.budgets
            .retain(|b| !b.category.eq_ignore_ascii_case(category));
        self.budgets.len() < before
    }
}

/// Allocate the next `{prefix}-N` id above every existing numeric suffix.
///
/// Hand-assigned ids that do not match the pattern are ignored, so a file
/// with "my-salary-account" style ids still gets fresh ids for new rows.
fn next_id<'a>(prefix: &str, existing: impl Iterator<Item = &'a str>) -> String {
    let marker = format!("{prefix}-");
    let max = existing
        .filter_map(|id| id.strip_prefix(&marker))
        .filter_map(|n| n.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}-{}", prefix, max + 1)
}
