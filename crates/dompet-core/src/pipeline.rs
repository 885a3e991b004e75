//! One-turn chat orchestration
//!
//! [`Pipeline`] wires a full turn together: classify the intent, render
//! the per-intent system prompt from live ledger state, run the
//! completion, and for transaction intents validate the model's JSON
//! into balanced ledger writes. Everything user-facing lands in
//! [`Reply`]; transport errors propagate so the caller can report the
//! outage.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::ai::{AIGateway, ChatTurn, TaskKind, UserContent};
use crate::config::{AIConfig, CategorySet};
use crate::context::ContextBuilder;
use crate::error::Result;
use crate::intent::{classify, IntentType};
use crate::models::{Account, NewTransaction, Transaction};
use crate::prompts::{PromptId, PromptLibrary};
use crate::validator::{ResponseValidator, TransactionOutcome};

/// One user turn with the ledger state it runs against
pub struct ChatInput<'a> {
    pub text: &'a str,
    /// Raw receipt image bytes; presence forces the receipt-scan path
    pub image: Option<&'a [u8]>,
    pub accounts: &'a [Account],
    pub transactions: &'a [Transaction],
    pub categories: &'a CategorySet,
    /// Prior turns, oldest first; the gateway trims to its window
    pub history: &'a [ChatTurn],
    pub profile: Option<&'a str>,
    pub today: NaiveDate,
}

/// What one turn produced
#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub success: bool,
    pub intent: IntentType,
    /// User-facing text, always present
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Validated ledger writes: empty, one, or a transfer pair
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<NewTransaction>,
    pub needs_clarification: bool,
}

impl Reply {
    fn conversational(intent: IntentType, message: String) -> Self {
        Self {
            success: true,
            intent,
            message,
            warning: None,
            transactions: Vec::new(),
            needs_clarification: false,
        }
    }

    fn from_outcome(intent: IntentType, outcome: TransactionOutcome) -> Self {
        match outcome {
            TransactionOutcome::Created {
                transactions,
                message,
                warning,
            } => Self {
                success: true,
                intent,
                message,
                warning,
                transactions,
                needs_clarification: false,
            },
            TransactionOutcome::NeedsClarification { message } => Self {
                success: false,
                intent,
                message,
                warning: None,
                transactions: Vec::new(),
                needs_clarification: true,
            },
            TransactionOutcome::Failed { message } => Self {
                success: false,
                intent,
                message,
                warning: None,
                transactions: Vec::new(),
                needs_clarification: false,
            },
        }
    }
}

/// The one-turn chat pipeline
pub struct Pipeline {
    gateway: AIGateway,
    library: PromptLibrary,
}

impl Pipeline {
    /// Pipeline against the configured backend, with prompt overrides
    /// picked up from the platform data dir
    pub fn new(config: AIConfig) -> Self {
        Self {
            gateway: AIGateway::new(config),
            library: PromptLibrary::new(),
        }
    }

    /// Assemble from explicit parts (tests, custom override dirs)
    pub fn with_parts(gateway: AIGateway, library: PromptLibrary) -> Self {
        Self { gateway, library }
    }

    pub fn gateway(&self) -> &AIGateway {
        &self.gateway
    }

    pub fn library_mut(&mut self) -> &mut PromptLibrary {
        &mut self.library
    }

    /// Run one turn end to end.
    ///
    /// Transaction intents return validated ledger writes or a failure
    /// message; everything else returns the model's text as-is. A
    /// transport error after all retries surfaces as `Err`.
    pub async fn process(&mut self, input: ChatInput<'_>) -> Result<Reply> {
        let intent = classify(input.text, input.image.is_some());
        debug!(intent = %intent.kind, confidence = intent.confidence, "turn classified");

        let mut builder =
            ContextBuilder::new(input.accounts, input.transactions, input.categories);
        if let Some(profile) = input.profile {
            builder = builder.with_profile(profile);
        }
        let (system, mut task) = builder.system_prompt(&mut self.library, intent.kind, input.today)?;

        let user = match input.image {
            Some(image) => {
                task = TaskKind::Vision;
                let text = if input.text.trim().is_empty() {
                    self.scan_instruction()?
                } else {
                    input.text.to_string()
                };
                UserContent::with_image(text, image)
            }
            None => UserContent::Text(input.text.to_string()),
        };

        let response = self
            .gateway
            .complete(task, &system, input.history, user)
            .await?;

        if intent.kind == IntentType::Transaction {
            let validator =
                ResponseValidator::new(input.accounts, input.transactions, input.categories);
            let outcome = validator.handle(&response, input.today);
            return Ok(Reply::from_outcome(intent.kind, outcome));
        }

        Ok(Reply::conversational(intent.kind, response))
    }

    /// Fixed user text for an image-only turn
    fn scan_instruction(&mut self) -> Result<String> {
        let template = self.library.get(PromptId::ScanReceipt)?;
        Ok(template.render(&HashMap::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{ChatClient, MockBackend};
    use crate::config::{AIConfig, ModelSet, RetryPolicy};
    use crate::models::{AccountType, TransactionType};
    use std::time::Duration;

    const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn accounts() -> Vec<Account> {
        vec![
            Account {
                id: "acc-bca".to_string(),
                name: "BCA".to_string(),
                account_type: AccountType::Bank,
                provider: Some("BCA".to_string()),
                initial_balance: 2_000_000,
                is_active: true,
            },
            Account {
                id: "acc-gopay".to_string(),
                name: "GoPay".to_string(),
                account_type: AccountType::EWallet,
                provider: Some("GoPay".to_string()),
                initial_balance: 150_000,
                is_active: true,
            },
        ]
    }

    fn test_pipeline(mock: MockBackend) -> Pipeline {
        let config = AIConfig {
            models: ModelSet {
                fast: "fast-model".to_string(),
                smart: "smart-model".to_string(),
                vision: "vision-model".to_string(),
            },
            retry: RetryPolicy {
                max_attempts: 2,
                timeout: Duration::from_secs(1),
                initial_backoff: Duration::from_millis(1),
            },
            ..AIConfig::default()
        };
        let gateway = AIGateway::with_backend(ChatClient::Mock(mock), config);
        Pipeline::with_parts(gateway, PromptLibrary::embedded_only())
    }

    fn input<'a>(
        text: &'a str,
        image: Option<&'a [u8]>,
        accounts: &'a [Account],
        categories: &'a CategorySet,
    ) -> ChatInput<'a> {
        ChatInput {
            text,
            image,
            accounts,
            transactions: &[],
            categories,
            history: &[],
            profile: None,
            today: day(2024, 5, 15),
        }
    }

    #[tokio::test]
    async fn test_expense_turn_end_to_end() {
        let mock = MockBackend::with_reply(
            r#"{"type": "expense", "amount": 45000, "category": "Makan & Minum", "description": "Kopi Starbucks", "date": "2024-05-15", "accountId": "acc-bca"}"#,
        );
        let mut pipeline = test_pipeline(mock.clone());
        let accounts = accounts();
        let categories = CategorySet::default();

        let reply = pipeline
            .process(input("beli kopi starbucks 45rb", None, &accounts, &categories))
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.intent, IntentType::Transaction);
        assert_eq!(reply.transactions.len(), 1);
        assert_eq!(reply.transactions[0].kind, TransactionType::Expense);
        assert_eq!(reply.transactions[0].amount, 45_000);
        assert_eq!(
            reply.message,
            "Siap! Kopi Starbucks Rp45.000 berhasil dicatat (hari ini)."
        );

        // Extraction turns run deterministic on the fast model, with the
        // ledger state in the system prompt
        let request = mock.last_request().unwrap();
        assert_eq!(request.model, "fast-model");
        assert_eq!(request.temperature, 0.0);
        assert!(request.system.contains("SALDO REAL-TIME"));
        assert!(request.system.contains("BCA"));
        assert_eq!(request.user.text(), "beli kopi starbucks 45rb");
    }

    #[tokio::test]
    async fn test_query_turn_returns_model_text() {
        let mock = MockBackend::with_reply("Saldo BCA kamu Rp2.000.000.");
        let mut pipeline = test_pipeline(mock.clone());
        let accounts = accounts();
        let categories = CategorySet::default();

        let reply = pipeline
            .process(input("berapa saldo bca?", None, &accounts, &categories))
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.intent, IntentType::Query);
        assert_eq!(reply.message, "Saldo BCA kamu Rp2.000.000.");
        assert!(reply.transactions.is_empty());

        let request = mock.last_request().unwrap();
        assert_eq!(request.model, "fast-model");
        assert_eq!(request.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_advice_routes_to_smart_model() {
        let mock = MockBackend::with_reply("Coba kurangi jajan kopi.");
        let mut pipeline = test_pipeline(mock.clone());
        let accounts = accounts();
        let categories = CategorySet::default();

        let reply = pipeline
            .process(input("ada tips hemat?", None, &accounts, &categories))
            .await
            .unwrap();

        assert_eq!(reply.intent, IntentType::Advice);
        let request = mock.last_request().unwrap();
        assert_eq!(request.model, "smart-model");
        assert_eq!(request.temperature, 0.7);
    }

    #[tokio::test]
    async fn test_receipt_image_turn() {
        let mock = MockBackend::with_reply(
            r#"{"type": "expense", "amount": 54900, "category": "Belanja", "description": "Indomaret", "date": "2024-05-15", "accountId": "acc-bca", "merchant": "Indomaret", "items": [{"name": "Indomie", "qty": 5, "price": 3500}, {"name": "Teh Botol", "qty": 2, "price": 5000}]}"#,
        );
        let mut pipeline = test_pipeline(mock.clone());
        let accounts = accounts();
        let categories = CategorySet::default();

        let reply = pipeline
            .process(input("", Some(JPEG_MAGIC), &accounts, &categories))
            .await
            .unwrap();

        assert!(reply.success);
        assert_eq!(reply.intent, IntentType::Transaction);
        assert_eq!(reply.transactions.len(), 1);
        let items = reply.transactions[0].items.as_ref().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].qty, 5);
        assert!(reply.message.contains("(2 item)"));

        // Vision route, with the scan instruction as the user text
        let request = mock.last_request().unwrap();
        assert_eq!(request.model, "vision-model");
        assert_eq!(request.temperature, 0.0);
        assert!(request.user.has_image());
        assert_eq!(
            request.user.text(),
            "Analisis struk belanja ini. Ekstrak nama merchant, items, dan total bayar."
        );
    }

    #[tokio::test]
    async fn test_image_with_caption_keeps_caption() {
        let mock = MockBackend::with_reply(
            r#"{"type": "expense", "amount": 10000, "category": "Lainnya", "description": "Struk", "date": "", "accountId": "acc-bca"}"#,
        );
        let mut pipeline = test_pipeline(mock.clone());
        let accounts = accounts();
        let categories = CategorySet::default();

        pipeline
            .process(input("struk dari indomaret", Some(JPEG_MAGIC), &accounts, &categories))
            .await
            .unwrap();

        let request = mock.last_request().unwrap();
        assert!(request.user.has_image());
        assert_eq!(request.user.text(), "struk dari indomaret");
    }

    #[tokio::test]
    async fn test_transfer_clarification_round_trip() {
        let mock = MockBackend::with_reply(
            r#"{"type": "transfer", "amount": 500000, "accountId": "", "toAccountId": "", "requiresClarification": true}"#,
        );
        let mut pipeline = test_pipeline(mock);
        let accounts = accounts();
        let categories = CategorySet::default();

        let reply = pipeline
            .process(input("transfer 500rb", None, &accounts, &categories))
            .await
            .unwrap();

        assert!(!reply.success);
        assert!(reply.needs_clarification);
        assert!(reply.message.contains("akun mana"));
        assert!(reply.transactions.is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_model_reply_fails_politely() {
        let mock = MockBackend::with_reply("maaf, saya tidak mengerti");
        let mut pipeline = test_pipeline(mock);
        let accounts = accounts();
        let categories = CategorySet::default();

        let reply = pipeline
            .process(input("catat pengeluaran", None, &accounts, &categories))
            .await
            .unwrap();

        assert!(!reply.success);
        assert!(!reply.needs_clarification);
        assert_eq!(
            reply.message,
            "Maaf, saya tidak bisa mengenali data transaksi. Coba ulangi dengan format yang lebih jelas."
        );
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let mock = MockBackend::new();
        mock.push_failure("connection refused");
        mock.push_failure("connection refused");
        let mut pipeline = test_pipeline(mock);
        let accounts = accounts();
        let categories = CategorySet::default();

        let err = pipeline
            .process(input("berapa saldo?", None, &accounts, &categories))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_history_forwarded() {
        let mock = MockBackend::with_reply("lanjut");
        let mut pipeline = test_pipeline(mock.clone());
        let accounts = accounts();
        let categories = CategorySet::default();

        let history = vec![
            ChatTurn::user("berapa saldo?"),
            ChatTurn::assistant("Rp2.000.000"),
            ChatTurn::user("yang gopay?"),
        ];
        let mut turn = input("terus totalnya?", None, &accounts, &categories);
        turn.history = &history;

        pipeline.process(turn).await.unwrap();

        let request = mock.last_request().unwrap();
        assert_eq!(request.history.len(), 3);
        assert_eq!(request.history[0].content, "berapa saldo?");
    }
}
