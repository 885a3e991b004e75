//! Command implementations for the Dompet CLI
//!
//! Commands are organized by domain:
//! - `core` - Ledger bootstrap (init)
//! - `chat` - Conversational entry (chat, scan)
//! - `analytics` - Offline ledger math (balances, cashflow, recurring, anomalies)
//! - `budget` - Budget status and management
//! - `insights` - Model-backed narratives (report, classify, goal)
//! - `reconcile` - Balance reconciliation
//! - `prompts` - Prompt inspection commands

pub mod analytics;
pub mod budget;
pub mod chat;
pub mod core;
pub mod insights;
pub mod prompts;
pub mod reconcile;

// Re-export command functions for main.rs
pub use analytics::*;
pub use budget::*;
pub use chat::*;
pub use core::*;
pub use insights::*;
pub use prompts::*;
pub use reconcile::*;

use anyhow::{Context, Result};
use chrono::{Datelike, Local};

/// Parse an optional `YYYY-MM` argument, defaulting to the current month
pub fn parse_month(arg: Option<&str>) -> Result<(i32, u32)> {
    const HINT: &str = "Format bulan harus YYYY-MM, contoh: 2024-05";

    let Some(raw) = arg else {
        let today = Local::now().date_naive();
        return Ok((today.year(), today.month()));
    };

    let (y, m) = raw.split_once('-').context(HINT)?;
    let year: i32 = y.parse().context(HINT)?;
    let month: u32 = m.parse().context(HINT)?;
    if !(1..=12).contains(&month) {
        anyhow::bail!("Bulan harus 1-12, bukan {}", month);
    }
    Ok((year, month))
}

/// Truncate a string to a maximum display length
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
