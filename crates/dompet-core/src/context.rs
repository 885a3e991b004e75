//! System-prompt assembly
//!
//! Renders the per-intent template with the user's live financial state:
//! the account list, real-time balances, the category enum, and (for
//! conversational intents) a window of recent transactions. Balances are
//! recomputed from the full ledger on every build, never cached.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};

use crate::ai::TaskKind;
use crate::config::CategorySet;
use crate::error::Result;
use crate::intent::IntentType;
use crate::ledger::{balance_of, format_rupiah};
use crate::models::{Account, Transaction};
use crate::prompts::{PromptId, PromptLibrary};

const WEEKDAYS_ID: [&str; 7] = [
    "Senin", "Selasa", "Rabu", "Kamis", "Jumat", "Sabtu", "Minggu",
];

const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

/// Long-form Indonesian date, e.g. "Rabu, 1 Mei 2024"
pub fn format_date_id(date: NaiveDate) -> String {
    let weekday = WEEKDAYS_ID[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS_ID[date.month0() as usize];
    format!("{}, {} {} {}", weekday, date.day(), month, date.year())
}

/// Builds the system prompt for one completion call
pub struct ContextBuilder<'a> {
    accounts: &'a [Account],
    transactions: &'a [Transaction],
    categories: &'a CategorySet,
    profile: Option<&'a str>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(
        accounts: &'a [Account],
        transactions: &'a [Transaction],
        categories: &'a CategorySet,
    ) -> Self {
        Self {
            accounts,
            transactions,
            categories,
            profile: None,
        }
    }

    /// Attach a free-text user profile, embedded in advice prompts
    pub fn with_profile(mut self, profile: &'a str) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Render the system prompt for this intent
    ///
    /// Also returns the task kind the template declares, which the
    /// gateway uses for model routing.
    pub fn system_prompt(
        &self,
        library: &mut PromptLibrary,
        intent: IntentType,
        today: NaiveDate,
    ) -> Result<(String, TaskKind)> {
        let id = match intent {
            IntentType::Transaction => PromptId::ExtractTransaction,
            IntentType::Query => PromptId::AnswerQuery,
            IntentType::Advice => PromptId::GiveAdvice,
            IntentType::Planning => PromptId::PlanFinance,
            IntentType::Analysis => PromptId::AnalyzeFinance,
        };

        let prompt = library.get(id)?;
        let task: TaskKind = prompt.metadata.task_type.parse().unwrap_or_default();

        let date_human = format_date_id(today);
        let today_iso = today.to_string();
        let accounts = self.account_lines();

        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("date_human", &date_human);
        vars.insert("today", &today_iso);
        vars.insert("accounts", &accounts);

        let rendered = match intent {
            IntentType::Transaction => {
                let yesterday = (today - Duration::days(1)).to_string();
                let day_after_tomorrow = (today + Duration::days(2)).to_string();
                let last_week = (today - Duration::days(7)).to_string();
                let balances = self.balance_lines();
                let categories = self.categories.as_prompt_list();

                vars.insert("yesterday", &yesterday);
                vars.insert("day_after_tomorrow", &day_after_tomorrow);
                vars.insert("last_week", &last_week);
                vars.insert("balances", &balances);
                vars.insert("categories", &categories);
                prompt.render(&vars)
            }
            _ => {
                let recent = self.recent_transaction_lines(recent_count(intent));
                vars.insert("recent_transactions", &recent);
                if let Some(profile) = self.profile {
                    vars.insert("profile", profile);
                }
                prompt.render(&vars)
            }
        };

        Ok((rendered, task))
    }

    /// One line per active account, with its live balance
    fn account_lines(&self) -> String {
        self.accounts
            .iter()
            .filter(|a| a.is_active)
            .map(|a| {
                let balance = balance_of(a, self.transactions).current_balance;
                format!(
                    "- {} (Saldo: {}, ID: {}, Tipe: {})",
                    a.name,
                    format_rupiah(balance),
                    a.id,
                    a.account_type
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Compact balance list for the extraction prompt
    fn balance_lines(&self) -> String {
        self.accounts
            .iter()
            .filter(|a| a.is_active)
            .map(|a| {
                let balance = balance_of(a, self.transactions).current_balance;
                format!("- {}: {} (ID: {})", a.name, format_rupiah(balance), a.id)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Newest transactions first, one summary line each
    fn recent_transaction_lines(&self, count: usize) -> String {
        let mut txs: Vec<&Transaction> = self.transactions.iter().collect();
        txs.sort_by(|a, b| b.date.cmp(&a.date).then(b.timestamp.cmp(&a.timestamp)));
        txs.into_iter()
            .take(count)
            .map(|tx| {
                format!(
                    "- {}: {} {} ({}) - {}",
                    tx.date,
                    tx.kind,
                    format_rupiah(tx.amount),
                    tx.category,
                    tx.description
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Recent-transaction window per intent: analysis-heavy intents see more
fn recent_count(intent: IntentType) -> usize {
    match intent {
        IntentType::Advice | IntentType::Analysis => 50,
        _ => 20,
    }
}
