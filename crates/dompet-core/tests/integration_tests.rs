//! Integration tests for dompet-core
//!
//! These tests exercise the full chat → extraction → validation workflow
//! over real HTTP against the mock chat-completions server, plus the
//! retry and engine paths that sit on top of the gateway.

use std::time::Duration;

use chrono::NaiveDate;

use dompet_core::reconcile::ReconcileAdvisor;
use dompet_core::test_utils::MockChatServer;
use dompet_core::{
    AIConfig, AIGateway, Account, AccountType, Budget, BudgetAlertEngine, BudgetPeriod,
    BudgetStatus, CategorySet, ChatInput, ChatTurn, InsightEngine, IntentType, ModelSet, Pipeline,
    PromptLibrary, RetryPolicy, Transaction, TransactionType,
};

const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Accounts matching the ids the mock server's canned replies use
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

fn expense(category: &str, amount: i64, date: NaiveDate) -> Transaction {
    Transaction {
        id: format!("tx-{}-{}", category, amount),
        account_id: "acc-bca".to_string(),
        kind: TransactionType::Expense,
        amount,
        category: category.to_string(),
        description: category.to_string(),
        date,
        timestamp: date.and_hms_opt(12, 0, 0).unwrap().and_utc(),
        to_account_id: None,
        from_account_id: None,
        merchant: None,
        items: None,
        is_reconciliation: false,
        reconciliation: None,
    }
}

/// Gateway config pointed at the mock server, with fast test timings
fn server_config(url: &str) -> AIConfig {
    AIConfig {
        base_url: url.to_string(),
        models: ModelSet {
            fast: "fast-model".to_string(),
            smart: "smart-model".to_string(),
            vision: "vision-model".to_string(),
        },
        retry: RetryPolicy {
            max_attempts: 2,
            timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(1),
        },
        ..AIConfig::default()
    }
}

fn pipeline_against(url: &str) -> Pipeline {
    let gateway = AIGateway::new(server_config(url));
    Pipeline::with_parts(gateway, PromptLibrary::embedded_only())
}

fn chat<'a>(
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

// =============================================================================
// Chat Pipeline over HTTP
// =============================================================================

#[tokio::test]
async fn test_expense_chat_over_http() {
    let server = MockChatServer::start().await;
    let mut pipeline = pipeline_against(&server.url());
    let accounts = accounts();
    let categories = CategorySet::default();

    let reply = pipeline
        .process(chat("beli kopi 45rb pake gopay", None, &accounts, &categories))
        .await
        .expect("pipeline turn failed");

    assert!(reply.success);
    assert_eq!(reply.intent, IntentType::Transaction);
    assert_eq!(reply.transactions.len(), 1);
    assert_eq!(reply.transactions[0].kind, TransactionType::Expense);
    assert_eq!(reply.transactions[0].amount, 45_000);
    assert_eq!(reply.transactions[0].account_id, "acc-gopay");
    assert_eq!(
        reply.message,
        "Siap! Kopi Starbucks Rp45.000 berhasil dicatat (hari ini)."
    );

    // Extraction rode the fast model over the wire
    assert_eq!(server.hits(), 1);
    let body = server.last_body().unwrap();
    assert_eq!(body["model"], "fast-model");
    assert_eq!(body["temperature"], 0.0);
}

#[tokio::test]
async fn test_transfer_chat_creates_balanced_pair() {
    let server = MockChatServer::start().await;
    let mut pipeline = pipeline_against(&server.url());
    let accounts = accounts();
    let categories = CategorySet::default();

    let reply = pipeline
        .process(chat(
            "transfer 500rb dari bca ke gopay",
            None,
            &accounts,
            &categories,
        ))
        .await
        .expect("pipeline turn failed");

    assert!(reply.success);
    assert_eq!(reply.transactions.len(), 2);

    let expense_leg = &reply.transactions[0];
    let income_leg = &reply.transactions[1];
    assert_eq!(expense_leg.kind, TransactionType::Expense);
    assert_eq!(expense_leg.account_id, "acc-bca");
    assert_eq!(expense_leg.to_account_id.as_deref(), Some("acc-gopay"));
    assert_eq!(income_leg.kind, TransactionType::Income);
    assert_eq!(income_leg.account_id, "acc-gopay");
    assert_eq!(income_leg.from_account_id.as_deref(), Some("acc-bca"));
    assert_eq!(expense_leg.amount, income_leg.amount);
    assert_eq!(reply.message, "Berhasil transfer Rp500.000 dari BCA ke GoPay.");
}

#[tokio::test]
async fn test_receipt_scan_over_http() {
    let server = MockChatServer::start().await;
    let mut pipeline = pipeline_against(&server.url());
    let accounts = accounts();
    let categories = CategorySet::default();

    let reply = pipeline
        .process(chat("", Some(JPEG_MAGIC), &accounts, &categories))
        .await
        .expect("pipeline turn failed");

    assert!(reply.success);
    assert_eq!(reply.transactions.len(), 1);
    let tx = &reply.transactions[0];
    assert_eq!(tx.merchant.as_deref(), Some("Indomaret"));
    assert_eq!(tx.items.as_ref().map(Vec::len), Some(2));
    assert_eq!(
        reply.message,
        "Siap! Indomaret Rp20.500 berhasil dicatat (hari ini) (2 item)."
    );

    // Vision route with a multimodal user message on the wire
    let body = server.last_body().unwrap();
    assert_eq!(body["model"], "vision-model");
    let content = &body["messages"].as_array().unwrap().last().unwrap()["content"];
    assert!(content.is_array());
    assert_eq!(content[1]["type"], "image_url");
}

#[tokio::test]
async fn test_history_forwarded_on_the_wire() {
    let server = MockChatServer::start().await;
    let mut pipeline = pipeline_against(&server.url());
    let accounts = accounts();
    let categories = CategorySet::default();

    let history = vec![
        ChatTurn::user("berapa saldo bca?"),
        ChatTurn::assistant("Saldo BCA kamu Rp2.000.000."),
        ChatTurn::user("kalau gopay?"),
    ];
    let mut turn = chat("terus totalnya berapa?", None, &accounts, &categories);
    turn.history = &history;

    pipeline.process(turn).await.expect("pipeline turn failed");

    let body = server.last_body().unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 5);
    let roles: Vec<&str> = messages
        .iter()
        .map(|m| m["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["system", "user", "assistant", "user", "user"]);
}

// =============================================================================
// Gateway Retry and Health
// =============================================================================

#[tokio::test]
async fn test_gateway_retry_recovers_after_server_error() {
    let server = MockChatServer::start().await;
    let gateway = AIGateway::new(server_config(&server.url()));

    server.push_status(500);
    let reply = gateway
        .complete_simple("halo")
        .await
        .expect("second attempt should recover");

    assert!(!reply.is_empty());
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_gateway_retry_exhaustion_surfaces_last_error() {
    let server = MockChatServer::start().await;
    let gateway = AIGateway::new(server_config(&server.url()));

    server.push_status(500);
    server.push_status(503);
    let err = gateway.complete_simple("halo").await.unwrap_err();

    assert!(err.to_string().contains("HTTP 503"));
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn test_gateway_health_check() {
    let server = MockChatServer::start().await;
    let gateway = AIGateway::new(server_config(&server.url()));

    assert!(gateway.health_check().await);
}

// =============================================================================
// Engines over HTTP
// =============================================================================

#[tokio::test]
async fn test_category_suggestion_over_http() {
    let server = MockChatServer::start().await;
    let gateway = AIGateway::new(server_config(&server.url()));
    let mut library = PromptLibrary::embedded_only();
    let categories = CategorySet::default();

    let engine = InsightEngine::new(&gateway);
    let category = engine
        .suggest_category(&mut library, "Grab ke kantor", &categories)
        .await;

    assert_eq!(category, "Transportasi");
}

#[tokio::test]
async fn test_budget_suggestions_scripted_over_http() {
    let server = MockChatServer::start().await;
    let gateway = AIGateway::new(server_config(&server.url()));
    let mut library = PromptLibrary::embedded_only();

    let budgets = vec![Budget {
        id: "b-1".to_string(),
        category: "Makan & Minum".to_string(),
        amount: 1_000_000,
        period: BudgetPeriod::Monthly,
    }];
    let transactions = vec![expense("Makan & Minum", 800_000, day(2024, 5, 10))];

    server.push_reply(r#"["Masak di rumah", "Bawa bekal ke kantor", "Kurangi kopi kekinian"]"#);

    let engine = BudgetAlertEngine::new(&gateway);
    let analysis = engine
        .analyze(&mut library, &budgets, &transactions, day(2024, 5, 15))
        .await;

    assert_eq!(analysis.alerts.len(), 1);
    assert_eq!(analysis.alerts[0].status, BudgetStatus::Warning);
    assert_eq!(
        analysis.alerts[0].suggestions,
        vec![
            "Masak di rumah",
            "Bawa bekal ke kantor",
            "Kurangi kopi kekinian"
        ]
    );
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn test_reconcile_hint_appended_over_http() {
    let server = MockChatServer::start().await;
    let gateway = AIGateway::new(server_config(&server.url()));
    let mut library = PromptLibrary::embedded_only();

    let recent = vec![expense("Lainnya", 50_000, day(2024, 5, 10))];
    server.push_reply("Cek transaksi GoPay minggu ini, sepertinya ada yang belum dicatat");

    let advisor = ReconcileAdvisor::new(&gateway);
    let suggestions = advisor.suggestions(&mut library, -50_000, &recent).await;

    // Three static moderate-gap tips plus the model hint
    assert_eq!(suggestions.len(), 4);
    assert_eq!(
        suggestions.last().unwrap(),
        "🤖 Cek transaksi GoPay minggu ini, sepertinya ada yang belum dicatat"
    );
}
