//! Narrative financial insights
//!
//! Pure aggregation over the ledger feeds template variables; the model
//! only writes the prose. Every narrative path degrades to a static
//! fallback line when the gateway fails, so these calls never block or
//! break a flow. Fail-open.

use std::collections::HashMap;

use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::ai::parsing::parse_category_reply;
use crate::ai::{AIGateway, TaskKind};
use crate::config::{CategorySet, FALLBACK_CATEGORY};
use crate::error::Result;
use crate::ledger::{
    all_balances, analyze_cash_flow, detect_anomalies, detect_recurring, group_thousands,
    net_worth, AnomalyConfig, RecurringConfig,
};
use crate::models::{Account, Transaction};
use crate::prompts::{PromptId, PromptLibrary};

/// Saving rate in percent: net / inflow, rounded. Zero when nothing
/// came in, never a division error.
pub fn saving_rate(total_inflow: i64, net: i64) -> i64 {
    if total_inflow > 0 {
        (net as f64 / total_inflow as f64 * 100.0).round() as i64
    } else {
        0
    }
}

/// Model-written narratives over ledger aggregates
pub struct InsightEngine<'a> {
    gateway: &'a AIGateway,
}

impl<'a> InsightEngine<'a> {
    pub fn new(gateway: &'a AIGateway) -> Self {
        Self { gateway }
    }

    /// Full financial health report as markdown narrative.
    ///
    /// Aggregates balances, net worth, current-month cash flow, recurring
    /// charges and anomalies into the report template.
    pub async fn health_report(
        &self,
        library: &mut PromptLibrary,
        accounts: &[Account],
        transactions: &[Transaction],
        today: NaiveDate,
    ) -> String {
        const FALLBACK: &str = "Gagal menganalisis kesehatan keuangan. Silakan coba lagi nanti.";

        let balances = all_balances(accounts, transactions);
        let worth = net_worth(accounts, transactions);

        let month_start = today.with_day(1).unwrap_or(today);
        let flow = analyze_cash_flow(transactions, month_start, today);
        let rate = saving_rate(flow.total_inflow, flow.net_cash_flow);

        let recurring = detect_recurring(transactions, &RecurringConfig::default());
        let anomalies = detect_anomalies(transactions, today, &AnomalyConfig::default());

        let net_worth_s = group_thousands(worth);
        let account_count = accounts.len().to_string();
        let account_lines = balances
            .iter()
            .map(|b| format!("- {}: Rp{}", b.name, group_thousands(b.current_balance)))
            .collect::<Vec<_>>()
            .join("\n");
        let total_inflow = group_thousands(flow.total_inflow);
        let total_outflow = group_thousands(flow.total_outflow);
        let net_cash_flow = group_thousands(flow.net_cash_flow);
        let rate_s = rate.to_string();
        let top_expense_lines = flow
            .expense_categories
            .iter()
            .take(5)
            .map(|c| format!("- {}: Rp{}", c.category, group_thousands(c.amount)))
            .collect::<Vec<_>>()
            .join("\n");
        let recurring_count = recurring.len().to_string();
        let recurring_lines = recurring
            .iter()
            .take(5)
            .map(|r| {
                format!(
                    "- {}: Rp{}/{} (next: {})",
                    r.merchant,
                    group_thousands(r.average_amount),
                    r.frequency,
                    r.next_expected
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        let anomaly_count = anomalies.len().to_string();
        let anomaly_lines = anomalies
            .iter()
            .take(3)
            .map(|a| format!("- {}: {}", a.transaction.description, a.reason))
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("net_worth", &net_worth_s);
        vars.insert("account_count", &account_count);
        vars.insert("account_lines", &account_lines);
        vars.insert("total_inflow", &total_inflow);
        vars.insert("total_outflow", &total_outflow);
        vars.insert("net_cash_flow", &net_cash_flow);
        vars.insert("saving_rate", &rate_s);
        vars.insert("top_expense_lines", &top_expense_lines);
        vars.insert("recurring_count", &recurring_count);
        vars.insert("recurring_lines", &recurring_lines);
        vars.insert("anomaly_count", &anomaly_count);
        vars.insert("anomaly_lines", &anomaly_lines);

        self.narrate(library, PromptId::HealthReport, &vars, FALLBACK)
            .await
    }

    /// Insight narrative for one month of transactions.
    ///
    /// `period` is the month label shown to the model ("2024-05"); the
    /// transaction slice is expected to already be scoped to it.
    pub async fn monthly_insight(
        &self,
        library: &mut PromptLibrary,
        transactions: &[Transaction],
        period: &str,
    ) -> String {
        const FALLBACK: &str = "Maaf, gagal menganalisis data keuangan Anda saat ini.";

        if transactions.is_empty() {
            return "Belum ada data transaksi untuk bulan ini.".to_string();
        }

        let flow = analyze_cash_flow(transactions, NaiveDate::MIN, NaiveDate::MAX);
        let rate = saving_rate(flow.total_inflow, flow.net_cash_flow);

        let top_categories = flow
            .expense_categories
            .iter()
            .take(3)
            .map(|c| format!("{} (Rp{})", c.category, group_thousands(c.amount)))
            .collect::<Vec<_>>()
            .join(", ");

        // Digest capped at the 50 largest so huge months stay in budget
        let mut by_amount: Vec<&Transaction> = transactions.iter().collect();
        by_amount.sort_by(|a, b| b.amount.cmp(&a.amount));
        let transaction_lines = by_amount
            .iter()
            .take(50)
            .map(|tx| {
                format!(
                    "- {}: {} ({}) Rp{} [{}]",
                    tx.date,
                    tx.description,
                    tx.kind.as_str(),
                    group_thousands(tx.amount),
                    tx.category
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let total_income = group_thousands(flow.total_inflow);
        let total_expense = group_thousands(flow.total_outflow);
        let net_savings = group_thousands(flow.net_cash_flow);
        let rate_s = rate.to_string();

        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("period", period);
        vars.insert("total_income", &total_income);
        vars.insert("total_expense", &total_expense);
        vars.insert("net_savings", &net_savings);
        vars.insert("saving_rate", &rate_s);
        vars.insert("top_categories", &top_categories);
        vars.insert("transaction_lines", &transaction_lines);

        self.narrate(library, PromptId::MonthlyInsight, &vars, FALLBACK)
            .await
    }

    /// Classify a free-text description into one configured category.
    ///
    /// Descriptions under two characters never reach the model. An
    /// unknown or failed reply resolves to the fallback category.
    pub async fn suggest_category(
        &self,
        library: &mut PromptLibrary,
        description: &str,
        categories: &CategorySet,
    ) -> String {
        if description.trim().chars().count() < 2 {
            return FALLBACK_CATEGORY.to_string();
        }

        let list = categories.as_prompt_list();
        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("categories", &list);
        vars.insert("description", description);

        let (task, prompt) = match render(library, PromptId::SuggestCategory, &vars) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "category prompt failed");
                return FALLBACK_CATEGORY.to_string();
            }
        };

        match self.gateway.complete_task(task, &prompt).await {
            Ok(response) => parse_category_reply(&response, categories),
            Err(e) => {
                warn!(error = %e, "category suggestion failed");
                FALLBACK_CATEGORY.to_string()
            }
        }
    }

    async fn narrate(
        &self,
        library: &mut PromptLibrary,
        id: PromptId,
        vars: &HashMap<&str, &str>,
        fallback: &str,
    ) -> String {
        let (task, prompt) = match render(library, id, vars) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(prompt_id = id.as_str(), error = %e, "narrative prompt failed");
                return fallback.to_string();
            }
        };

        match self.gateway.complete_task(task, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(prompt_id = id.as_str(), error = %e, "narrative call failed");
                fallback.to_string()
            }
        }
    }
}

/// Render a template and pick up its task-kind route
fn render(
    library: &mut PromptLibrary,
    id: PromptId,
    vars: &HashMap<&str, &str>,
) -> Result<(TaskKind, String)> {
    let template = library.get(id)?;
    let task: TaskKind = template.metadata.task_type.parse().unwrap_or_default();
    Ok((task, template.render(vars)))
}

/// Feasibility check for a savings target
#[derive(Debug, Clone, Serialize)]
pub struct SavingsPlan {
    /// Net worth today
    pub current_savings: i64,
    pub required_monthly: i64,
    /// Average monthly net of the last three months; can be negative
    pub current_monthly: i64,
    /// required - current; positive means saving must increase
    pub gap: i64,
    pub is_feasible: bool,
    pub recommendation: String,
}

/// Check whether a savings goal is reachable from recent saving behavior.
///
/// The benchmark is the average monthly net cash flow over the last three
/// calendar months. The goal counts as feasible when the required increase
/// stays within 30% of average monthly income.
pub fn analyze_savings_goal(
    goal_amount: i64,
    target_months: u32,
    accounts: &[Account],
    transactions: &[Transaction],
    today: NaiveDate,
) -> SavingsPlan {
    let worth = net_worth(accounts, transactions);

    let window_start = today
        .checked_sub_months(Months::new(3))
        .unwrap_or(today);
    let flow = analyze_cash_flow(transactions, window_start, today);

    let avg_monthly = flow.net_cash_flow as f64 / 3.0;
    let required = goal_amount as f64 / target_months.max(1) as f64;
    let gap = required - avg_monthly;
    let avg_monthly_income = flow.total_inflow as f64 / 3.0;
    let is_feasible = gap <= avg_monthly_income * 0.3;

    let recommendation = if is_feasible {
        format!(
            "Goal bisa dicapai! Kamu perlu menabung Rp{}/bulan. Saat ini rata-rata Rp{}/bulan. Tambah Rp{}/bulan dengan mengurangi pengeluaran non-esensial.",
            group_thousands(required.round() as i64),
            group_thousands(avg_monthly.round() as i64),
            group_thousands(gap.round() as i64)
        )
    } else if avg_monthly > 0.0 {
        let realistic_months = (goal_amount as f64 / avg_monthly).ceil() as i64;
        format!(
            "Goal cukup sulit dengan pola saving saat ini. Pertimbangkan extend target jadi {} bulan, atau tingkatkan saving rate dengan mengurangi pengeluaran hingga Rp{}/bulan.",
            realistic_months,
            group_thousands(gap.round() as i64)
        )
    } else {
        "Goal cukup sulit karena saving 3 bulan terakhir belum positif. Perbaiki cash flow dulu dengan mengurangi pengeluaran rutin atau mencari pemasukan tambahan.".to_string()
    };

    SavingsPlan {
        current_savings: worth,
        required_monthly: required.round() as i64,
        current_monthly: avg_monthly.round() as i64,
        gap: gap.round() as i64,
        is_feasible,
        recommendation,
    }
}
