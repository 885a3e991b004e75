//! Dompet CLI entry point
//!
//! A chat-first personal finance assistant over a plain JSON ledger:
//!
//! ```text
//! dompet init
//! dompet chat "beli kopi 25rb pake gopay"
//! dompet scan --file struk.jpg
//! dompet balances
//! dompet budget set "Makan & Minum" 1500000
//! dompet reconcile BCA 2500000
//! dompet report monthly
//! ```

mod cli;
mod commands;
mod store;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{BudgetAction, Cli, Commands, PromptsAction, ReportType};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set; otherwise --verbose selects debug over info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init { force } => commands::cmd_init(&cli.ledger, force),
        Commands::Chat { message } => commands::cmd_chat(&cli.ledger, &message).await,
        Commands::Scan { file, caption } => {
            commands::cmd_scan(&cli.ledger, &file, caption.as_deref()).await
        }
        Commands::Balances { json } => commands::cmd_balances(&cli.ledger, json),
        Commands::Cashflow { month, json } => {
            commands::cmd_cashflow(&cli.ledger, month.as_deref(), json)
        }
        Commands::Recurring { json } => commands::cmd_recurring(&cli.ledger, json),
        Commands::Anomalies { json } => commands::cmd_anomalies(&cli.ledger, json),
        Commands::Budget { action, json } => match action {
            None => commands::cmd_budget_status(&cli.ledger, json).await,
            Some(BudgetAction::Set {
                category,
                amount,
                period,
            }) => commands::cmd_budget_set(&cli.ledger, &category, amount, &period),
            Some(BudgetAction::Remove { category }) => {
                commands::cmd_budget_remove(&cli.ledger, &category)
            }
        },
        Commands::Classify { description } => {
            commands::cmd_classify(&cli.ledger, &description).await
        }
        Commands::Reconcile {
            account,
            actual,
            reason,
            dry_run,
        } => {
            commands::cmd_reconcile(&cli.ledger, &account, actual, reason.as_deref(), dry_run).await
        }
        Commands::Goal {
            amount,
            months,
            json,
        } => commands::cmd_goal(&cli.ledger, amount, months, json),
        Commands::Report { report_type } => match report_type {
            ReportType::Monthly { month } => {
                commands::cmd_report_monthly(&cli.ledger, month.as_deref()).await
            }
            ReportType::Health => commands::cmd_report_health(&cli.ledger).await,
        },
        Commands::Prompts { action } => match action.unwrap_or(PromptsAction::List) {
            PromptsAction::List => commands::cmd_prompts_list(),
            PromptsAction::Show { prompt_id } => commands::cmd_prompts_show(&prompt_id),
            PromptsAction::Path => commands::cmd_prompts_path(),
        },
    }
}
