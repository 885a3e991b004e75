//! Validation of extraction replies into ledger transactions
//!
//! The model's output is untrusted. Everything monetary is re-checked
//! against the ledger before a transaction is materialized; a reply that
//! cannot be validated produces a short user-displayable failure, never a
//! stored transaction. Clarification beats guessing for transfers: when
//! the model flags account ambiguity we ask, we do not pick.

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::ai::parsing::{parse_transaction, ExtractedTransaction};
use crate::config::{CategorySet, FALLBACK_CATEGORY};
use crate::ledger::{format_rupiah, transfer_pair, validate_transfer};
use crate::models::{Account, NewTransaction, ReceiptItem, Transaction, TransactionType};

/// Result of validating one extraction reply
#[derive(Debug, Clone)]
pub enum TransactionOutcome {
    /// Transactions ready for the store (two legs for a transfer), with a
    /// confirmation message for the user
    Created {
        transactions: Vec<NewTransaction>,
        message: String,
        /// Advisory only, shown alongside the confirmation
        warning: Option<String>,
    },
    /// The model could not pin down the accounts; ask the user instead
    NeedsClarification { message: String },
    /// Nothing was stored; message explains why in user terms
    Failed { message: String },
}

/// Validates raw model output against the current ledger state
pub struct ResponseValidator<'a> {
    accounts: &'a [Account],
    transactions: &'a [Transaction],
    categories: &'a CategorySet,
}

impl<'a> ResponseValidator<'a> {
    pub fn new(
        accounts: &'a [Account],
        transactions: &'a [Transaction],
        categories: &'a CategorySet,
    ) -> Self {
        Self {
            accounts,
            transactions,
            categories,
        }
    }

    /// Turn a raw extraction reply into a validated outcome
    ///
    /// Never panics on malformed output; every failure path ends in a
    /// user-displayable message.
    pub fn handle(&self, response: &str, today: NaiveDate) -> TransactionOutcome {
        let extracted = match parse_transaction(response) {
            Ok(Some(extracted)) => extracted,
            Ok(None) => {
                debug!("no JSON payload in extraction reply");
                return TransactionOutcome::Failed {
                    message: "Maaf, saya tidak bisa mengenali data transaksi. \
                              Coba ulangi dengan format yang lebih jelas."
                        .to_string(),
                };
            }
            Err(e) => {
                return TransactionOutcome::Failed {
                    message: format!("Gagal memproses transaksi: {}", e),
                };
            }
        };

        if extracted.is_error() {
            let message = extracted
                .error_message
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Gagal memproses input".to_string());
            return TransactionOutcome::Failed { message };
        }

        let kind = extracted.kind.as_deref().unwrap_or("").to_string();
        // Amount of zero counts as missing, same as an absent field
        let amount = extracted.amount.unwrap_or(0.0);
        if kind.is_empty() || amount == 0.0 {
            return TransactionOutcome::Failed {
                message: "Gagal memproses transaksi: Data transaksi tidak lengkap \
                          (tipe atau jumlah hilang)"
                    .to_string(),
            };
        }
        let amount = amount.round() as i64;

        match kind.as_str() {
            "transfer" => self.handle_transfer(extracted, amount, today),
            "expense" => self.handle_simple(extracted, TransactionType::Expense, amount, today),
            "income" => self.handle_simple(extracted, TransactionType::Income, amount, today),
            _ => TransactionOutcome::Failed {
                message: "Gagal memproses transaksi: Tipe transaksi tidak valid".to_string(),
            },
        }
    }

    /// Transfer path: both legs or nothing
    fn handle_transfer(
        &self,
        extracted: ExtractedTransaction,
        amount: i64,
        today: NaiveDate,
    ) -> TransactionOutcome {
        let source_id = extracted.account_id.as_deref().filter(|s| !s.is_empty());
        let target_id = extracted.to_account_id.as_deref().filter(|s| !s.is_empty());

        let (Some(source_id), Some(target_id)) = (source_id, target_id) else {
            if extracted.needs_clarification() {
                return TransactionOutcome::NeedsClarification {
                    message: "Transfer ini dari akun mana ke akun mana? \
                              Tolong sebutkan akun sumber dan tujuannya."
                        .to_string(),
                };
            }
            return TransactionOutcome::Failed {
                message: "Gagal memproses transaksi: Transfer harus punya akun asal dan tujuan"
                    .to_string(),
            };
        };

        let validation =
            validate_transfer(source_id, target_id, amount, self.accounts, self.transactions);
        if !validation.is_valid {
            let reason = validation
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Transfer tidak valid".to_string());
            return TransactionOutcome::Failed {
                message: format!("Gagal memproses transaksi: {}", reason),
            };
        }

        // Both lookups succeed once validation passed
        let source = self.accounts.iter().find(|a| a.id == source_id);
        let target = self.accounts.iter().find(|a| a.id == target_id);
        let (Some(source), Some(target)) = (source, target) else {
            return TransactionOutcome::Failed {
                message: "Gagal memproses transaksi: Akun sumber tidak ditemukan".to_string(),
            };
        };

        let date = parse_date(extracted.date.as_deref(), today);
        let description = extracted.description.as_deref().filter(|d| !d.is_empty());
        let (expense_leg, income_leg) = transfer_pair(source, target, amount, description, date);

        TransactionOutcome::Created {
            message: format!(
                "Berhasil transfer {} dari {} ke {}.",
                format_rupiah(amount),
                source.name,
                target.name
            ),
            transactions: vec![expense_leg, income_leg],
            warning: validation.warning,
        }
    }

    /// Income/expense path: a single transaction on one account
    fn handle_simple(
        &self,
        extracted: ExtractedTransaction,
        kind: TransactionType,
        amount: i64,
        today: NaiveDate,
    ) -> TransactionOutcome {
        let resolved = extracted
            .account_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|id| self.accounts.iter().find(|a| a.id == id));

        // Unknown or absent account falls back to the first active one
        let account = match resolved.or_else(|| self.accounts.iter().find(|a| a.is_active)) {
            Some(account) => account,
            None => {
                return TransactionOutcome::Failed {
                    message: "Gagal memproses transaksi: Tidak ada akun aktif. \
                              Tambahkan akun dulu ya."
                        .to_string(),
                }
            }
        };

        let category = extracted
            .category
            .as_deref()
            .and_then(|c| self.categories.resolve(c))
            .unwrap_or(FALLBACK_CATEGORY)
            .to_string();

        let date = parse_date(extracted.date.as_deref(), today);
        let date_info = if date == today {
            "hari ini".to_string()
        } else {
            format!("tanggal {}", date)
        };

        let items: Option<Vec<ReceiptItem>> = extracted
            .items
            .map(|items| {
                items
                    .into_iter()
                    .map(|item| item.into_receipt_item())
                    .collect::<Vec<_>>()
            })
            .filter(|items: &Vec<ReceiptItem>| !items.is_empty());
        let item_note = items
            .as_ref()
            .map(|items| format!(" ({} item)", items.len()))
            .unwrap_or_default();

        let merchant = extracted.merchant.filter(|m| !m.is_empty());
        let description = extracted
            .description
            .filter(|d| !d.is_empty())
            .or_else(|| merchant.clone())
            .unwrap_or_else(|| "Transaksi".to_string());

        let message = format!(
            "Siap! {} {} berhasil dicatat ({}){}.",
            description,
            format_rupiah(amount),
            date_info,
            item_note
        );

        let transaction = NewTransaction {
            account_id: account.id.clone(),
            kind,
            amount,
            category,
            description,
            date,
            timestamp: Utc::now(),
            to_account_id: None,
            from_account_id: None,
            merchant,
            items,
            is_reconciliation: false,
            reconciliation: None,
        };

        TransactionOutcome::Created {
            transactions: vec![transaction],
            message,
            warning: None,
        }
    }
}

/// Parse the model's date string, falling back to today
fn parse_date(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    raw.and_then(|s| s.parse::<NaiveDate>().ok()).unwrap_or(today)
}
