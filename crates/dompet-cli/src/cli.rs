//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dompet")]
#[command(about = "Chat-first personal finance assistant", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Ledger file path
    #[arg(long, default_value = "dompet.json", global = true)]
    pub ledger: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a starter ledger file
    Init {
        /// Overwrite an existing ledger file
        #[arg(long)]
        force: bool,
    },

    /// Record one chat message against the ledger
    Chat {
        /// What happened, in plain words ("beli kopi 25rb pake gopay")
        message: String,
    },

    /// Scan a receipt photo into a transaction
    Scan {
        /// Image file (JPEG or PNG)
        #[arg(short, long)]
        file: PathBuf,

        /// Optional caption sent along with the photo
        #[arg(short, long)]
        caption: Option<String>,
    },

    /// Show the current balance of every account
    Balances {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cash flow breakdown for one month
    Cashflow {
        /// Month to analyze (YYYY-MM, defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect recurring charges (subscriptions and bills)
    Recurring {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Flag expenses that look unusual for their category
    Anomalies {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Budget status, alerts, and end-of-month projection
    Budget {
        #[command(subcommand)]
        action: Option<BudgetAction>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Suggest a category for a transaction description
    Classify {
        /// Transaction description ("Grab ke kantor")
        description: String,
    },

    /// Reconcile an account against its real-world balance
    Reconcile {
        /// Account id or name
        account: String,

        /// Actual balance observed in the app or bank statement (rupiah)
        actual: i64,

        /// Why the balance drifted, if known
        #[arg(short, long)]
        reason: Option<String>,

        /// Show the adjustment without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Check whether a savings target is realistic
    Goal {
        /// Target amount (rupiah)
        amount: i64,

        /// Months to reach the target
        #[arg(short, long, default_value = "12")]
        months: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Model-written narrative reports
    Report {
        #[command(subcommand)]
        report_type: ReportType,
    },

    /// Manage AI prompts (list available prompts, view override status)
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },
}

#[derive(Subcommand)]
pub enum BudgetAction {
    /// Set (or replace) the budget for a category
    Set {
        /// Category name, must match the configured category list
        category: String,

        /// Budget amount (rupiah)
        amount: i64,

        /// Budget period: daily, weekly, monthly
        #[arg(short, long, default_value = "monthly")]
        period: String,
    },

    /// Remove a category's budget
    Remove {
        /// Category name
        category: String,
    },
}

#[derive(Subcommand)]
pub enum ReportType {
    /// Spending insight for one month
    Monthly {
        /// Month to analyze (YYYY-MM, defaults to the current month)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Full financial health check across all accounts
    Health,
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all prompts and their override status
    List,

    /// Show the full content of one prompt
    Show {
        /// Prompt ID (e.g. "extract_transaction")
        prompt_id: String,
    },

    /// Show the prompt override directory path
    Path,
}
