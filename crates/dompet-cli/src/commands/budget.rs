//! Budget command implementations

use std::path::Path;
use std::str::FromStr;

use anyhow::Result;
use chrono::Local;

use dompet_core::ledger::format_rupiah;
use dompet_core::models::BudgetPeriod;
use dompet_core::{AIGateway, AppConfig, BudgetAlertEngine, PromptLibrary};

use super::truncate;
use crate::store::LedgerFile;

/// Budget status across every category, with alerts and projection.
///
/// Saving suggestions for hot categories come from the model and fall back
/// to static tips when the backend is unreachable.
pub async fn cmd_budget_status(ledger_path: &Path, json: bool) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;

    if ledger.budgets.is_empty() {
        println!("Belum ada budget. Set dengan: dompet budget set \"Makan & Minum\" 1500000");
        return Ok(());
    }

    let config = AppConfig::from_env()?;
    let gateway = AIGateway::new(config.ai);
    let mut library = PromptLibrary::new();
    let engine = BudgetAlertEngine::new(&gateway);
    let today = Local::now().date_naive();

    let analysis = engine
        .analyze(&mut library, &ledger.budgets, &ledger.transactions, today)
        .await;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!();
    println!("📋 Status Budget");
    println!("   ──────────────────────────────────────────────────────");
    for alert in &analysis.alerts {
        println!(
            "   {:<20} {:>13} / {:<13} {:>4}%",
            truncate(&alert.category, 20),
            format_rupiah(alert.spent),
            format_rupiah(alert.budget),
            alert.percentage
        );
        println!("      {}", alert.message);
        for tip in &alert.suggestions {
            println!("      • {}", tip);
        }
    }
    println!("   ──────────────────────────────────────────────────────");
    println!(
        "   Total {} / {} ({} hari tersisa bulan ini)",
        format_rupiah(analysis.total_spent),
        format_rupiah(analysis.total_budget),
        analysis.days_remaining
    );

    let projection = &analysis.projection;
    if projection.will_exceed {
        println!(
            "   ⚠️  Proyeksi akhir bulan {} (lewat {})",
            format_rupiah(projection.estimated_end_of_month),
            format_rupiah(projection.excess_amount.unwrap_or(0))
        );
    } else {
        println!(
            "   Proyeksi akhir bulan {}",
            format_rupiah(projection.estimated_end_of_month)
        );
    }
    println!();

    Ok(())
}

pub fn cmd_budget_set(ledger_path: &Path, category: &str, amount: i64, period: &str) -> Result<()> {
    if amount <= 0 {
        anyhow::bail!("Jumlah budget harus lebih dari nol");
    }
    let period = BudgetPeriod::from_str(period).map_err(|e| anyhow::anyhow!(e))?;

    let mut ledger = LedgerFile::load(ledger_path)?;
    let config = AppConfig::load()?;
    let categories = ledger.category_set(&config.categories);
    let Some(canonical) = categories.resolve(category) else {
        anyhow::bail!(
            "Kategori '{}' tidak dikenal. Pilihan: {}",
            category,
            categories.names().join(", ")
        );
    };
    let canonical = canonical.to_string();

    let replaced = ledger.upsert_budget(&canonical, amount, period);
    ledger.save(ledger_path)?;

    let verb = if replaced { "diperbarui" } else { "dibuat" };
    println!(
        "✅ Budget {} {}: {} per {}",
        canonical,
        verb,
        format_rupiah(amount),
        period_label(period)
    );

    Ok(())
}

pub fn cmd_budget_remove(ledger_path: &Path, category: &str) -> Result<()> {
    let mut ledger = LedgerFile::load(ledger_path)?;

    if !ledger.remove_budget(category) {
        anyhow::bail!("Tidak ada budget untuk kategori '{}'", category);
    }
    ledger.save(ledger_path)?;

    println!("✅ Budget {} dihapus", category);
    Ok(())
}

fn period_label(period: BudgetPeriod) -> &'static str {
    match period {
        BudgetPeriod::Daily => "hari",
        BudgetPeriod::Weekly => "minggu",
        BudgetPeriod::Monthly => "bulan",
    }
}
