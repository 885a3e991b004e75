//! Conversational entry commands (chat, scan)

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;

use dompet_core::{AppConfig, ChatInput, Pipeline};

use crate::store::LedgerFile;

/// Record one chat message against the ledger
pub async fn cmd_chat(ledger_path: &Path, message: &str) -> Result<()> {
    run_turn(ledger_path, message, None).await
}

/// Scan a receipt photo into a transaction
pub async fn cmd_scan(ledger_path: &Path, file: &Path, caption: Option<&str>) -> Result<()> {
    let image = fs::read(file)
        .with_context(|| format!("Failed to read image file: {}", file.display()))?;
    run_turn(ledger_path, caption.unwrap_or(""), Some(image)).await
}

/// One full pipeline turn: classify, extract, validate, persist, reply.
///
/// Backend failures after the configured retries are reported in the reply
/// stream rather than as a hard error; the ledger is left untouched.
async fn run_turn(ledger_path: &Path, text: &str, image: Option<Vec<u8>>) -> Result<()> {
    let mut ledger = LedgerFile::load(ledger_path)?;
    let config = AppConfig::from_env()?;
    let attempts = config.ai.retry.max_attempts;
    let categories = ledger.category_set(&config.categories);
    let mut pipeline = Pipeline::new(config.ai);

    let input = ChatInput {
        text,
        image: image.as_deref(),
        accounts: &ledger.accounts,
        transactions: &ledger.transactions,
        categories: &categories,
        history: &[],
        profile: ledger.profile.as_deref(),
        today: Local::now().date_naive(),
    };

    let reply = match pipeline.process(input).await {
        Ok(reply) => reply,
        Err(err) => {
            println!(
                "⚠️  Koneksi AI bermasalah setelah {} percobaan: {}",
                attempts, err
            );
            return Ok(());
        }
    };

    println!("{}", reply.message);
    if let Some(warning) = &reply.warning {
        println!("⚠️  {}", warning);
    }

    if !reply.transactions.is_empty() {
        let ids = ledger.append(reply.transactions);
        ledger.save(ledger_path)?;
        if ids.len() == 1 {
            println!("💾 Transaksi tersimpan di {}", ledger_path.display());
        } else {
            println!(
                "💾 {} transaksi tersimpan di {}",
                ids.len(),
                ledger_path.display()
            );
        }
    }

    Ok(())
}
