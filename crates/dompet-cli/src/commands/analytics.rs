//! Offline ledger math commands (balances, cash flow, recurring, anomalies)

use std::path::Path;

use anyhow::Result;
use chrono::Local;

use dompet_core::ledger::{
    all_balances, detect_anomalies, detect_recurring, format_rupiah, monthly_cash_flow, net_worth,
    AnomalyConfig, Frequency, RecurringConfig, Severity,
};

use super::{parse_month, truncate};
use crate::store::LedgerFile;

pub fn cmd_balances(ledger_path: &Path, json: bool) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;
    let balances = all_balances(&ledger.accounts, &ledger.transactions);

    if json {
        println!("{}", serde_json::to_string_pretty(&balances)?);
        return Ok(());
    }

    if balances.is_empty() {
        println!("Belum ada akun. Jalankan 'dompet init' dulu.");
        return Ok(());
    }

    println!();
    println!("💰 Saldo Akun");
    println!("   ──────────────────────────────────────────────");
    for b in &balances {
        let marker = if b.is_active { "" } else { " (nonaktif)" };
        println!(
            "   {:<22} {:>18}{}",
            truncate(&b.name, 22),
            format_rupiah(b.current_balance),
            marker
        );
    }
    println!("   ──────────────────────────────────────────────");
    println!(
        "   {:<22} {:>18}",
        "Total",
        format_rupiah(net_worth(&ledger.accounts, &ledger.transactions))
    );
    println!();

    Ok(())
}

pub fn cmd_cashflow(ledger_path: &Path, month: Option<&str>, json: bool) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;
    let (year, month_num) = parse_month(month)?;
    let analysis = monthly_cash_flow(&ledger.transactions, year, month_num);

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!();
    println!("📊 Arus Kas {}-{:02}", year, month_num);
    println!("   ──────────────────────────────────────────────");
    println!(
        "   {:<22} {:>18}",
        "Pemasukan",
        format_rupiah(analysis.total_inflow)
    );
    println!(
        "   {:<22} {:>18}",
        "Pengeluaran",
        format_rupiah(analysis.total_outflow)
    );
    println!(
        "   {:<22} {:>18}",
        "Arus kas bersih",
        format_rupiah(analysis.net_cash_flow)
    );

    if !analysis.expense_categories.is_empty() {
        println!();
        println!("   Pengeluaran per kategori:");
        for c in &analysis.expense_categories {
            println!(
                "   {:<22} {:>18}",
                truncate(&c.category, 22),
                format_rupiah(c.amount)
            );
        }
    }

    if let Some(top) = &analysis.biggest_expense {
        println!();
        println!(
            "   Pengeluaran terbesar: {} ({})",
            truncate(&top.description, 40),
            format_rupiah(top.amount)
        );
    }
    if let Some(top) = &analysis.biggest_income {
        println!(
            "   Pemasukan terbesar:   {} ({})",
            truncate(&top.description, 40),
            format_rupiah(top.amount)
        );
    }
    println!();

    Ok(())
}

pub fn cmd_recurring(ledger_path: &Path, json: bool) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;
    let recurring = detect_recurring(&ledger.transactions, &RecurringConfig::default());

    if json {
        println!("{}", serde_json::to_string_pretty(&recurring)?);
        return Ok(());
    }

    if recurring.is_empty() {
        println!("Tidak ada langganan atau tagihan rutin yang terdeteksi.");
        return Ok(());
    }

    println!();
    println!("🔄 Transaksi Rutin");
    println!("   ────────────────────────────────────────────────────────────");
    for r in &recurring {
        println!(
            "   {:<20} {:>15}  {:<9} berikutnya {}",
            truncate(&r.merchant, 20),
            format_rupiah(r.average_amount),
            frequency_label(r.frequency),
            r.next_expected
        );
    }
    println!();

    Ok(())
}

pub fn cmd_anomalies(ledger_path: &Path, json: bool) -> Result<()> {
    let ledger = LedgerFile::load(ledger_path)?;
    let today = Local::now().date_naive();
    let anomalies = detect_anomalies(&ledger.transactions, today, &AnomalyConfig::default());

    if json {
        println!("{}", serde_json::to_string_pretty(&anomalies)?);
        return Ok(());
    }

    if anomalies.is_empty() {
        println!("Tidak ada pengeluaran yang mencurigakan. 👍");
        return Ok(());
    }

    println!();
    println!("🚨 Pengeluaran Tidak Biasa");
    println!("   ────────────────────────────────────────────────────────────");
    for a in &anomalies {
        let icon = match a.severity {
            Severity::High => "🔴",
            Severity::Medium => "🟡",
        };
        println!(
            "   {} {} ({}) {}",
            icon,
            truncate(&a.transaction.description, 30),
            a.transaction.date,
            format_rupiah(a.transaction.amount)
        );
        println!("      {}", a.reason);
    }
    println!();

    Ok(())
}

fn frequency_label(frequency: Frequency) -> &'static str {
    match frequency {
        Frequency::Daily => "harian",
        Frequency::Weekly => "mingguan",
        Frequency::Monthly => "bulanan",
        Frequency::Yearly => "tahunan",
    }
}
