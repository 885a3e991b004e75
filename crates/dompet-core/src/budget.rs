//! Budget evaluation and alerts
//!
//! Thresholds are crisp: 75% warning, 90% critical, 100% over, all
//! inclusive. Evaluation is pure and always derived from the ledger;
//! only the saving suggestions go through the model, and a gateway
//! failure degrades to static suggestions instead of blocking.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::ai::parsing::parse_suggestion_list;
use crate::ai::AIGateway;
use crate::ledger::{format_rupiah, group_thousands, last_day_of_month};
use crate::models::{Budget, BudgetPeriod, Transaction, TransactionType};
use crate::prompts::{PromptId, PromptLibrary};

/// Alert tiers, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Safe,
    Warning,
    Critical,
    Over,
}

impl BudgetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Warning => "warning",
            Self::Critical => "critical",
            Self::Over => "over",
        }
    }
}

impl std::fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Evaluation of a single budget in its current window
#[derive(Debug, Clone, Serialize)]
pub struct BudgetAlert {
    pub category: String,
    pub spent: i64,
    pub budget: i64,
    /// Rounded for display; tier decisions use the unrounded ratio
    pub percentage: i64,
    pub status: BudgetStatus,
    pub message: String,
    pub suggestions: Vec<String>,
}

/// End-of-month spending projection from the month-to-date run rate
#[derive(Debug, Clone, Serialize)]
pub struct BudgetProjection {
    pub estimated_end_of_month: i64,
    pub will_exceed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excess_amount: Option<i64>,
}

/// Aggregate view across all budgets
#[derive(Debug, Clone, Serialize)]
pub struct BudgetAnalysis {
    pub alerts: Vec<BudgetAlert>,
    /// Aggregate tier; never `over`, critical is the ceiling here
    pub overall_status: BudgetStatus,
    pub total_budget: i64,
    pub total_spent: i64,
    pub days_remaining: i64,
    pub projection: BudgetProjection,
}

/// The current window for a budget period, inclusive on both ends
///
/// Daily is today, weekly runs Monday through Sunday, monthly is the
/// calendar month.
pub fn period_window(period: BudgetPeriod, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    match period {
        BudgetPeriod::Daily => (today, today),
        BudgetPeriod::Weekly => {
            let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            (start, start + Duration::days(6))
        }
        BudgetPeriod::Monthly => {
            let start = today.with_day(1).unwrap_or(today);
            (start, last_day_of_month(today.year(), today.month()))
        }
    }
}

/// Whole days left in the period, counting today
pub fn days_remaining(period: BudgetPeriod, today: NaiveDate) -> i64 {
    let (_, end) = period_window(period, today);
    (end - today).num_days() + 1
}

/// Total expenses for one category within a window
pub fn spent_in_window(
    transactions: &[Transaction],
    category: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> i64 {
    transactions
        .iter()
        .filter(|tx| {
            tx.kind == TransactionType::Expense
                && tx.category == category
                && tx.date >= start
                && tx.date <= end
        })
        .map(|tx| tx.amount)
        .sum()
}

/// Tier for a spent/budget ratio; thresholds are inclusive
pub fn alert_status(spent: i64, budget: i64) -> BudgetStatus {
    if budget <= 0 {
        return if spent > 0 {
            BudgetStatus::Over
        } else {
            BudgetStatus::Safe
        };
    }
    let percentage = spent as f64 / budget as f64 * 100.0;
    if percentage >= 100.0 {
        BudgetStatus::Over
    } else if percentage >= 90.0 {
        BudgetStatus::Critical
    } else if percentage >= 75.0 {
        BudgetStatus::Warning
    } else {
        BudgetStatus::Safe
    }
}

fn alert_message(
    status: BudgetStatus,
    category: &str,
    spent: i64,
    budget: i64,
    percentage: i64,
    days_left: i64,
) -> String {
    match status {
        BudgetStatus::Over => format!(
            "Budget {} sudah over {}! 🚨",
            category,
            format_rupiah(spent - budget)
        ),
        BudgetStatus::Critical => format!(
            "Hati-hati! Budget {} tinggal {} ({} hari lagi) ⚠️",
            category,
            format_rupiah(budget - spent),
            days_left
        ),
        BudgetStatus::Warning => format!(
            "Budget {} sudah {}% terpakai. Mulai hemat ya! 💡",
            category, percentage
        ),
        BudgetStatus::Safe => format!("Budget {} masih aman ({}%) ✅", category, percentage),
    }
}

/// Evaluate one budget in its current window, without suggestions
pub fn evaluate_budget(budget: &Budget, transactions: &[Transaction], today: NaiveDate) -> BudgetAlert {
    let (start, end) = period_window(budget.period, today);
    let spent = spent_in_window(transactions, &budget.category, start, end);
    let status = alert_status(spent, budget.amount);
    let percentage = if budget.amount > 0 {
        (spent as f64 / budget.amount as f64 * 100.0).round() as i64
    } else {
        0
    };
    let days_left = days_remaining(budget.period, today);

    BudgetAlert {
        category: budget.category.clone(),
        spent,
        budget: budget.amount,
        percentage,
        status,
        message: alert_message(status, &budget.category, spent, budget.amount, percentage, days_left),
        suggestions: Vec::new(),
    }
}

/// Budget analysis with model-generated saving suggestions
pub struct BudgetAlertEngine<'a> {
    gateway: &'a AIGateway,
}

impl<'a> BudgetAlertEngine<'a> {
    pub fn new(gateway: &'a AIGateway) -> Self {
        Self { gateway }
    }

    /// Evaluate all budgets and the aggregate projection
    ///
    /// Suggestions are requested only for non-safe alerts and degrade to
    /// static ones when the gateway fails.
    pub async fn analyze(
        &self,
        library: &mut PromptLibrary,
        budgets: &[Budget],
        transactions: &[Transaction],
        today: NaiveDate,
    ) -> BudgetAnalysis {
        let mut alerts = Vec::with_capacity(budgets.len());
        for budget in budgets {
            let mut alert = evaluate_budget(budget, transactions, today);
            if alert.status != BudgetStatus::Safe {
                let days_left = days_remaining(budget.period, today);
                alert.suggestions = self
                    .suggestions_for(library, &alert, days_left)
                    .await;
            }
            alerts.push(alert);
        }

        let total_budget: i64 = budgets.iter().map(|b| b.amount).sum();
        let total_spent: i64 = alerts.iter().map(|a| a.spent).sum();

        let overall_percentage = if total_budget > 0 {
            total_spent as f64 / total_budget as f64 * 100.0
        } else {
            0.0
        };
        let overall_status = if overall_percentage >= 90.0 {
            BudgetStatus::Critical
        } else if overall_percentage >= 75.0 {
            BudgetStatus::Warning
        } else {
            BudgetStatus::Safe
        };

        let days_in_month = last_day_of_month(today.year(), today.month()).day() as i64;
        let days_passed = today.day() as i64;
        let daily_average = total_spent as f64 / days_passed as f64;
        let estimated_end_of_month = (daily_average * days_in_month as f64).round() as i64;
        let will_exceed = estimated_end_of_month > total_budget;

        BudgetAnalysis {
            alerts,
            overall_status,
            total_budget,
            total_spent,
            days_remaining: days_in_month - days_passed,
            projection: BudgetProjection {
                estimated_end_of_month,
                will_exceed,
                excess_amount: will_exceed.then_some(estimated_end_of_month - total_budget),
            },
        }
    }

    /// Up to three category-specific saving suggestions
    async fn suggestions_for(
        &self,
        library: &mut PromptLibrary,
        alert: &BudgetAlert,
        days_left: i64,
    ) -> Vec<String> {
        let prompt = match self.render_prompt(library, alert, days_left) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(category = %alert.category, error = %e, "budget suggestion prompt failed");
                return fallback_suggestions(&alert.category);
            }
        };

        match self.gateway.complete_simple(&prompt).await {
            Ok(response) => match parse_suggestion_list(&response, 3) {
                Ok(suggestions) if !suggestions.is_empty() => suggestions,
                _ => fallback_suggestions(&alert.category),
            },
            Err(e) => {
                warn!(category = %alert.category, error = %e, "budget suggestion call failed");
                fallback_suggestions(&alert.category)
            }
        }
    }

    fn render_prompt(
        &self,
        library: &mut PromptLibrary,
        alert: &BudgetAlert,
        days_left: i64,
    ) -> crate::error::Result<String> {
        // Run rate over the elapsed part of a 30-day window
        let days_elapsed = (30 - days_left).max(1);
        let daily_average = alert.spent / days_elapsed;

        let spent = group_thousands(alert.spent);
        let budget = group_thousands(alert.budget);
        let percentage = alert.percentage.to_string();
        let days_left = days_left.to_string();
        let daily_average = group_thousands(daily_average);
        let goal = if alert.percentage > 100 {
            "mengurangi overspending"
        } else {
            "menjaga agar tidak melebihi budget"
        };

        let template = library.get(PromptId::SuggestBudget)?;
        let mut vars: HashMap<&str, &str> = HashMap::new();
        vars.insert("category", &alert.category);
        vars.insert("spent", &spent);
        vars.insert("budget", &budget);
        vars.insert("percentage", &percentage);
        vars.insert("days_remaining", &days_left);
        vars.insert("daily_average", &daily_average);
        vars.insert("goal", goal);
        Ok(template.render(&vars))
    }
}

/// Static suggestions per category, used when the model is unreachable
fn fallback_suggestions(category: &str) -> Vec<String> {
    let suggestions: &[&str] = match category {
        "Makan & Minum" => &[
            "Masak di rumah 3-4x seminggu untuk hemat Rp200-300rb",
            "Bawa bekal ke kantor, hindari makan di luar setiap hari",
            "Manfaatkan promo delivery app hanya untuk weekend",
        ],
        "Transportasi" => &[
            "Gunakan transportasi umum atau carpool 2-3x seminggu",
            "Jalan kaki atau naik sepeda untuk jarak dekat (<2km)",
            "Gabungkan perjalanan agar tidak bolak-balik",
        ],
        "Hiburan" => &[
            "Cari free activities: jogging di taman, nonton film di rumah",
            "Batasi nongkrong di kafe max 2x/bulan",
            "Manfaatkan trial gratis sebelum subscribe layanan baru",
        ],
        "Belanja" => &[
            "Buat list sebelum belanja, stick to the list",
            "Tunda pembelian impulsif 24-48 jam dulu",
            "Cari promo atau tunggu sale untuk barang non-urgent",
        ],
        _ => &[
            "Review pengeluaran harian dan identifikasi yang bisa dikurangi",
            "Tunda pembelian non-esensial hingga bulan depan",
            "Set spending limit harian untuk sisa bulan ini",
        ],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ChatClient, MockBackend};
    use crate::config::{AIConfig, RetryPolicy};
    use chrono::{TimeZone, Utc};
    use std::time::Duration as StdDuration;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn expense(category: &str, amount: i64, date: NaiveDate) -> Transaction {
        Transaction {
            id: format!("tx-{}-{}", category, date),
            account_id: "acc-1".to_string(),
            kind: TransactionType::Expense,
            amount,
            category: category.to_string(),
            description: category.to_string(),
            date,
            timestamp: Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap()),
            to_account_id: None,
            from_account_id: None,
            merchant: None,
            items: None,
            is_reconciliation: false,
            reconciliation: None,
        }
    }

    fn budget(category: &str, amount: i64, period: BudgetPeriod) -> Budget {
        Budget {
            id: format!("budget-{}", category),
            category: category.to_string(),
            amount,
            period,
        }
    }

    fn test_gateway(mock: MockBackend) -> AIGateway {
        let config = AIConfig {
            retry: RetryPolicy {
                max_attempts: 2,
                timeout: StdDuration::from_secs(1),
                initial_backoff: StdDuration::from_millis(1),
            },
            ..AIConfig::default()
        };
        AIGateway::with_backend(ChatClient::Mock(mock), config)
    }

    #[test]
    fn test_period_windows() {
        // 2024-05-15 is a Wednesday
        let today = day(2024, 5, 15);
        assert_eq!(period_window(BudgetPeriod::Daily, today), (today, today));
        assert_eq!(
            period_window(BudgetPeriod::Weekly, today),
            (day(2024, 5, 13), day(2024, 5, 19))
        );
        assert_eq!(
            period_window(BudgetPeriod::Monthly, today),
            (day(2024, 5, 1), day(2024, 5, 31))
        );

        // Monday maps onto itself as the week start
        assert_eq!(
            period_window(BudgetPeriod::Weekly, day(2024, 5, 13)).0,
            day(2024, 5, 13)
        );
        // Leap February
        assert_eq!(
            period_window(BudgetPeriod::Monthly, day(2024, 2, 10)).1,
            day(2024, 2, 29)
        );
    }

    #[test]
    fn test_days_remaining_counts_today() {
        assert_eq!(days_remaining(BudgetPeriod::Daily, day(2024, 5, 15)), 1);
        // Wednesday: Wed..Sun
        assert_eq!(days_remaining(BudgetPeriod::Weekly, day(2024, 5, 15)), 5);
        assert_eq!(days_remaining(BudgetPeriod::Monthly, day(2024, 5, 15)), 17);
        assert_eq!(days_remaining(BudgetPeriod::Monthly, day(2024, 5, 31)), 1);
    }

    #[test]
    fn test_spent_in_window_filters() {
        let transactions = vec![
            expense("Makan & Minum", 50_000, day(2024, 5, 10)),
            expense("Makan & Minum", 30_000, day(2024, 5, 1)),
            expense("Makan & Minum", 99_000, day(2024, 4, 30)), // outside
            expense("Transportasi", 20_000, day(2024, 5, 10)),  // other category
        ];
        let spent = spent_in_window(&transactions, "Makan & Minum", day(2024, 5, 1), day(2024, 5, 31));
        assert_eq!(spent, 80_000);
    }

    #[test]
    fn test_income_not_counted_as_spending() {
        let mut tx = expense("Gaji", 5_000_000, day(2024, 5, 1));
        tx.kind = TransactionType::Income;
        assert_eq!(
            spent_in_window(&[tx], "Gaji", day(2024, 5, 1), day(2024, 5, 31)),
            0
        );
    }

    #[test]
    fn test_alert_status_thresholds_inclusive() {
        assert_eq!(alert_status(74_999, 100_000), BudgetStatus::Safe);
        assert_eq!(alert_status(75_000, 100_000), BudgetStatus::Warning);
        assert_eq!(alert_status(89_999, 100_000), BudgetStatus::Warning);
        assert_eq!(alert_status(90_000, 100_000), BudgetStatus::Critical);
        assert_eq!(alert_status(99_999, 100_000), BudgetStatus::Critical);
        assert_eq!(alert_status(100_000, 100_000), BudgetStatus::Over);
        assert_eq!(alert_status(150_000, 100_000), BudgetStatus::Over);
    }

    #[test]
    fn test_alert_messages_per_tier() {
        let today = day(2024, 5, 15);
        let transactions = vec![expense("Makan & Minum", 1_200_000, day(2024, 5, 10))];
        let alert = evaluate_budget(
            &budget("Makan & Minum", 1_000_000, BudgetPeriod::Monthly),
            &transactions,
            today,
        );
        assert_eq!(alert.status, BudgetStatus::Over);
        assert_eq!(alert.message, "Budget Makan & Minum sudah over Rp200.000! 🚨");

        let transactions = vec![expense("Transportasi", 460_000, day(2024, 5, 10))];
        let alert = evaluate_budget(
            &budget("Transportasi", 500_000, BudgetPeriod::Monthly),
            &transactions,
            today,
        );
        assert_eq!(alert.status, BudgetStatus::Critical);
        assert_eq!(
            alert.message,
            "Hati-hati! Budget Transportasi tinggal Rp40.000 (17 hari lagi) ⚠️"
        );

        let transactions = vec![expense("Hiburan", 80_000, day(2024, 5, 10))];
        let alert = evaluate_budget(
            &budget("Hiburan", 100_000, BudgetPeriod::Monthly),
            &transactions,
            today,
        );
        assert_eq!(alert.status, BudgetStatus::Warning);
        assert_eq!(
            alert.message,
            "Budget Hiburan sudah 80% terpakai. Mulai hemat ya! 💡"
        );

        let transactions = vec![expense("Belanja", 10_000, day(2024, 5, 10))];
        let alert = evaluate_budget(
            &budget("Belanja", 100_000, BudgetPeriod::Monthly),
            &transactions,
            today,
        );
        assert_eq!(alert.status, BudgetStatus::Safe);
        assert_eq!(alert.message, "Budget Belanja masih aman (10%) ✅");
    }

    #[tokio::test]
    async fn test_analyze_fills_suggestions_for_hot_budgets() {
        let mock = MockBackend::new();
        mock.push_reply(r#"["Masak sendiri", "Kurangi kopi susu"]"#);
        let gateway = test_gateway(mock.clone());
        let engine = BudgetAlertEngine::new(&gateway);
        let mut library = PromptLibrary::embedded_only();

        let budgets = vec![
            budget("Makan & Minum", 1_000_000, BudgetPeriod::Monthly),
            budget("Transportasi", 500_000, BudgetPeriod::Monthly),
        ];
        let transactions = vec![
            expense("Makan & Minum", 800_000, day(2024, 5, 10)),
            expense("Transportasi", 100_000, day(2024, 5, 10)),
        ];

        let analysis = engine
            .analyze(&mut library, &budgets, &transactions, day(2024, 5, 15))
            .await;

        assert_eq!(analysis.alerts.len(), 2);
        assert_eq!(analysis.alerts[0].status, BudgetStatus::Warning);
        assert_eq!(
            analysis.alerts[0].suggestions,
            vec!["Masak sendiri", "Kurangi kopi susu"]
        );
        // Safe budgets never trigger a model call
        assert_eq!(analysis.alerts[1].status, BudgetStatus::Safe);
        assert!(analysis.alerts[1].suggestions.is_empty());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_suggestions_fall_back_when_gateway_fails() {
        let mock = MockBackend::new();
        mock.push_failure("HTTP 500");
        mock.push_failure("HTTP 500");
        let gateway = test_gateway(mock);
        let engine = BudgetAlertEngine::new(&gateway);
        let mut library = PromptLibrary::embedded_only();

        let budgets = vec![budget("Makan & Minum", 100_000, BudgetPeriod::Monthly)];
        let transactions = vec![expense("Makan & Minum", 95_000, day(2024, 5, 10))];

        let analysis = engine
            .analyze(&mut library, &budgets, &transactions, day(2024, 5, 15))
            .await;

        assert_eq!(
            analysis.alerts[0].suggestions[0],
            "Masak di rumah 3-4x seminggu untuk hemat Rp200-300rb"
        );
        assert_eq!(analysis.alerts[0].suggestions.len(), 3);
    }

    #[tokio::test]
    async fn test_suggestion_prompt_carries_numbers() {
        let mock = MockBackend::new();
        mock.push_reply(r#"["ok"]"#);
        let gateway = test_gateway(mock.clone());
        let engine = BudgetAlertEngine::new(&gateway);
        let mut library = PromptLibrary::embedded_only();

        let budgets = vec![budget("Belanja", 1_000_000, BudgetPeriod::Monthly)];
        let transactions = vec![expense("Belanja", 800_000, day(2024, 5, 15))];

        engine
            .analyze(&mut library, &budgets, &transactions, day(2024, 5, 15))
            .await;

        let request = mock.last_request().unwrap();
        let prompt = request.user.text();
        assert!(prompt.contains("Rp800.000 untuk kategori Belanja"));
        assert!(prompt.contains("dari budget Rp1.000.000 (80%)"));
        assert!(prompt.contains("Sisa waktu: 17 hari"));
        assert!(prompt.contains("menjaga agar tidak melebihi budget"));
    }

    #[tokio::test]
    async fn test_projection_run_rate() {
        let gateway = test_gateway(MockBackend::with_reply(r#"["x"]"#));
        let engine = BudgetAlertEngine::new(&gateway);
        let mut library = PromptLibrary::embedded_only();

        let budgets = vec![budget("Makan & Minum", 1_000_000, BudgetPeriod::Monthly)];
        let transactions = vec![expense("Makan & Minum", 500_000, day(2024, 5, 5))];

        let analysis = engine
            .analyze(&mut library, &budgets, &transactions, day(2024, 5, 10))
            .await;

        // 500k over 10 days, projected across 31
        assert_eq!(analysis.projection.estimated_end_of_month, 1_550_000);
        assert!(analysis.projection.will_exceed);
        assert_eq!(analysis.projection.excess_amount, Some(550_000));
        assert_eq!(analysis.days_remaining, 21);
    }

    #[tokio::test]
    async fn test_overall_status_aggregates() {
        let gateway = test_gateway(MockBackend::with_reply(r#"["x"]"#));
        let engine = BudgetAlertEngine::new(&gateway);
        let mut library = PromptLibrary::embedded_only();

        let budgets = vec![
            budget("Makan & Minum", 500_000, BudgetPeriod::Monthly),
            budget("Transportasi", 500_000, BudgetPeriod::Monthly),
        ];
        // 780k of 1M total -> 78% -> warning overall
        let transactions = vec![
            expense("Makan & Minum", 480_000, day(2024, 5, 5)),
            expense("Transportasi", 300_000, day(2024, 5, 6)),
        ];

        let analysis = engine
            .analyze(&mut library, &budgets, &transactions, day(2024, 5, 15))
            .await;
        assert_eq!(analysis.overall_status, BudgetStatus::Warning);
        assert_eq!(analysis.total_budget, 1_000_000);
        assert_eq!(analysis.total_spent, 780_000);
    }

    #[test]
    fn test_fallback_suggestions_generic_bucket() {
        assert_eq!(fallback_suggestions("Tagihan").len(), 3);
        assert!(fallback_suggestions("Tagihan")[0].contains("Review pengeluaran"));
        assert!(fallback_suggestions("Hiburan")[1].contains("nongkrong"));
    }
}
