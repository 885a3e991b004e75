//! Model-backed narrative commands (report, classify, goal)

use std::path::Path;

use anyhow::Result;
use chrono::{Datelike, Local};

use dompet_core::insights::analyze_savings_goal;
use dompet_core::ledger::format_rupiah;
use dompet_core::{AIGateway, AppConfig, InsightEngine, PromptLibrary, Transaction};

use super::parse_month;
use crate::store::LedgerFile;

pub async fn cmd_classify(ledger_path: &Path, description: &str) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;
    let config = AppConfig::from_env()?;
    let categories = ledger.category_set(&config.categories);
    let gateway = AIGateway::new(config.ai);
    let mut library = PromptLibrary::new();
    let engine = InsightEngine::new(&gateway);

    let category = engine
        .suggest_category(&mut library, description, &categories)
        .await;
    println!("🏷️  {}", category);

    Ok(())
}

pub async fn cmd_report_monthly(ledger_path: &Path, month: Option<&str>) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;
    let (year, month_num) = parse_month(month)?;
    let period = format!("{}-{:02}", year, month_num);

    let scoped: Vec<Transaction> = ledger
        .transactions
        .iter()
        .filter(|t| t.date.year() == year && t.date.month() == month_num)
        .cloned()
        .collect();

    let config = AppConfig::from_env()?;
    let gateway = AIGateway::new(config.ai);
    let mut library = PromptLibrary::new();
    let engine = InsightEngine::new(&gateway);

    println!("🤖 Menyusun laporan {}...", period);
    let narrative = engine.monthly_insight(&mut library, &scoped, &period).await;
    println!();
    println!("{}", narrative);

    Ok(())
}

pub async fn cmd_report_health(ledger_path: &Path) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;
    let config = AppConfig::from_env()?;
    let gateway = AIGateway::new(config.ai);
    let mut library = PromptLibrary::new();
    let engine = InsightEngine::new(&gateway);
    let today = Local::now().date_naive();

    println!("🤖 Memeriksa kesehatan keuangan...");
    let narrative = engine
        .health_report(&mut library, &ledger.accounts, &ledger.transactions, today)
        .await;
    println!();
    println!("{}", narrative);

    Ok(())
}

pub fn cmd_goal(ledger_path: &Path, amount: i64, months: u32, json: bool) -> Result<()> {
    if amount <= 0 {
        anyhow::bail!("Target harus lebih dari nol");
    }
    if months == 0 {
        anyhow::bail!("Jumlah bulan minimal 1");
    }

    let ledger = LedgerFile::load(ledger_path)?;
    let today = Local::now().date_naive();
    let plan = analyze_savings_goal(amount, months, &ledger.accounts, &ledger.transactions, today);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let status = if plan.is_feasible {
        "✅ realistis"
    } else {
        "⚠️  perlu penyesuaian"
    };

    println!();
    println!("🎯 Target {} dalam {} bulan", format_rupiah(amount), months);
    println!("   ──────────────────────────────────────────────");
    println!(
        "   {:<24} {:>16}",
        "Tabungan saat ini",
        format_rupiah(plan.current_savings)
    );
    println!(
        "   {:<24} {:>12}/bln",
        "Perlu menabung",
        format_rupiah(plan.required_monthly)
    );
    println!(
        "   {:<24} {:>12}/bln",
        "Rata-rata 3 bln terakhir",
        format_rupiah(plan.current_monthly)
    );
    if plan.gap > 0 {
        println!("   {:<24} {:>12}/bln", "Kurang", format_rupiah(plan.gap));
    }
    println!("   Status: {}", status);
    println!();
    println!("   {}", plan.recommendation);
    println!();

    Ok(())
}
