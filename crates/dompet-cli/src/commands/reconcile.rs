//! Reconciliation command implementation

use std::path::Path;

use anyhow::Result;
use chrono::{Local, Utc};

use dompet_core::ledger::format_rupiah;
use dompet_core::reconcile::{self, ReconcileAdvisor};
use dompet_core::{AIGateway, AppConfig, PromptLibrary, Transaction};

use crate::store::LedgerFile;

/// Compare an account against its real-world balance and close the gap
/// with an adjustment transaction.
pub async fn cmd_reconcile(
    ledger_path: &Path,
    account: &str,
    actual: i64,
    reason: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let mut ledger = LedgerFile::load(ledger_path)?;

    let Some(acc) = ledger.find_account(account).cloned() else {
        let names: Vec<&str> = ledger.accounts.iter().map(|a| a.name.as_str()).collect();
        anyhow::bail!(
            "Akun '{}' tidak ditemukan. Akun yang ada: {}",
            account,
            names.join(", ")
        );
    };

    let validation = reconcile::validate(&acc.id, actual, &ledger.accounts);
    if !validation.is_valid {
        anyhow::bail!(validation
            .error
            .unwrap_or_else(|| "Validasi rekonsiliasi gagal".to_string()));
    }
    if let Some(warning) = validation.warning {
        println!("⚠️  {}", warning);
    }

    let data = reconcile::gap(&acc, &ledger.transactions, actual);

    println!();
    println!("🔄 Rekonsiliasi {}", acc.name);
    println!("   ──────────────────────────────────────────");
    println!(
        "   {:<18} {:>18}",
        "Saldo tercatat",
        format_rupiah(data.recorded_balance)
    );
    println!(
        "   {:<18} {:>18}",
        "Saldo sebenarnya",
        format_rupiah(data.actual_balance)
    );
    println!(
        "   {:<18} {:>18}",
        "Selisih",
        format_rupiah(data.difference)
    );

    if data.difference == 0 {
        println!();
        println!("✅ Saldo sudah cocok, tidak perlu penyesuaian.");
        return Ok(());
    }

    // Hypotheses for the drift; the model hint degrades to static tips offline
    let config = AppConfig::from_env()?;
    let gateway = AIGateway::new(config.ai);
    let mut library = PromptLibrary::new();

    let mut recent: Vec<Transaction> = ledger
        .transactions
        .iter()
        .filter(|t| t.account_id == acc.id)
        .cloned()
        .collect();
    recent.sort_by(|a, b| b.date.cmp(&a.date));
    recent.truncate(10);

    let suggestions = ReconcileAdvisor::new(&gateway)
        .suggestions(&mut library, data.difference, &recent)
        .await;

    println!();
    for tip in &suggestions {
        println!("   {}", tip);
    }

    let advice = reconcile::recommended_interval(&acc, &ledger.transactions, Utc::now());
    println!();
    println!("   📅 {}", advice.reason);

    let today = Local::now().date_naive();
    let Some(adjustment) = reconcile::build_adjustment(&acc, &ledger.transactions, actual, reason, today)
    else {
        return Ok(());
    };

    if dry_run {
        println!();
        println!(
            "   (dry run: penyesuaian {} tidak disimpan)",
            format_rupiah(adjustment.amount)
        );
        return Ok(());
    }

    ledger.append(vec![adjustment]);
    ledger.save(ledger_path)?;

    println!();
    println!(
        "✅ Penyesuaian dicatat. Saldo {} sekarang {}.",
        acc.name,
        format_rupiah(actual)
    );

    Ok(())
}
