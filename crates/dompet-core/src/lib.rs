//! Dompet Core Library
//!
//! Shared functionality for the dompet personal finance assistant:
//! - Ledger math over accounts and transactions (balances, double-entry
//!   transfers, cash flow, recurring detection, anomaly detection)
//! - Chat pipeline: intent classification, context assembly, extraction,
//!   and validation of model output into stored transactions
//! - Pluggable chat backends (OpenAI-compatible servers, mock)
//! - Model routing, temperature policy, and retry per task kind
//! - Prompt library with file-based overrides
//! - Budget alerts with period windows and end-of-month projection
//! - Balance reconciliation with adjustment transactions
//! - Narrative insights (health report, monthly summary, savings goals)

pub mod ai;
pub mod budget;
pub mod config;
pub mod context;
pub mod error;
pub mod insights;
pub mod intent;
pub mod ledger;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod reconcile;
pub mod validator;

/// Test utilities including a mock chat-completions server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{
    AIGateway, ChatBackend, ChatClient, ChatTurn, CompletionRequest, MockBackend,
    OpenAICompatibleBackend, TaskKind, UserContent,
};
pub use budget::{BudgetAlert, BudgetAlertEngine, BudgetAnalysis, BudgetStatus};
pub use config::{AIConfig, AppConfig, CategorySet, ModelSet, RetryPolicy};
pub use context::ContextBuilder;
pub use error::{Error, Result};
pub use insights::{InsightEngine, SavingsPlan};
pub use intent::{Intent, IntentType};
pub use models::{
    Account, AccountBalance, AccountType, Budget, BudgetPeriod, NewTransaction, ReceiptItem,
    Transaction, TransactionType,
};
pub use pipeline::{ChatInput, Pipeline, Reply};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use reconcile::ReconcileAdvisor;
pub use validator::{ResponseValidator, TransactionOutcome};
