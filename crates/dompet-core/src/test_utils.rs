//! Test utilities for dompet-core
//!
//! This module provides testing infrastructure including a mock
//! OpenAI-compatible chat server that can be used for development and
//! integration tests. Replies are canned per prompt pattern; individual
//! calls can be overridden with a scripted reply queue to exercise
//! failure and retry paths over real HTTP.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::sync::oneshot;

/// One scripted response for the completions endpoint
#[derive(Debug, Clone)]
pub enum ServerReply {
    /// Successful completion carrying this assistant text
    Text(String),
    /// Error response with this HTTP status and a JSON error body
    Status(u16),
}

#[derive(Default)]
struct ServerState {
    /// Scripted replies consumed front-to-back; empty queue falls back
    /// to the canned pattern-matched replies
    queue: Mutex<VecDeque<ServerReply>>,
    /// Completion calls served so far
    hits: AtomicUsize,
    /// Body of the most recent completion request
    last_body: Mutex<Option<Value>>,
}

/// Mock OpenAI-compatible chat server for testing and development
pub struct MockChatServer {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    state: Arc<ServerState>,
}

impl MockChatServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = Arc::new(ServerState::default());
        let app = Router::new()
            .route("/v1/models", get(handle_models))
            .route("/v1/chat/completions", post(handle_chat))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            state,
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Queue a scripted assistant reply for the next completion call
    pub fn push_reply(&self, text: &str) {
        self.state
            .queue
            .lock()
            .unwrap()
            .push_back(ServerReply::Text(text.to_string()));
    }

    /// Queue an HTTP error status for the next completion call
    pub fn push_status(&self, status: u16) {
        self.state
            .queue
            .lock()
            .unwrap()
            .push_back(ServerReply::Status(status));
    }

    /// Number of completion calls served so far
    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    /// Body of the most recent completion request, if any was served
    pub fn last_body(&self) -> Option<Value> {
        self.state.last_body.lock().unwrap().clone()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockChatServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Models endpoint (health check)
async fn handle_models() -> Json<Value> {
    Json(json!({
        "object": "list",
        "data": [
            {"id": "fast-model", "object": "model"},
            {"id": "smart-model", "object": "model"},
            {"id": "vision-model", "object": "model"}
        ]
    }))
}

/// Chat completions endpoint
async fn handle_chat(State(state): State<Arc<ServerState>>, Json(request): Json<Value>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().unwrap() = Some(request.clone());

    let scripted = state.queue.lock().unwrap().pop_front();
    match scripted {
        Some(ServerReply::Status(status)) => error_response(status),
        Some(ServerReply::Text(text)) => completion_response(&request, &text).into_response(),
        None => {
            let reply = canned_reply(&request);
            completion_response(&request, &reply).into_response()
        }
    }
}

/// Successful completion body wrapping the assistant text
fn completion_response(request: &Value, text: &str) -> Json<Value> {
    let model = request
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("mock-model");
    Json(json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion",
        "created": 0,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    }))
}

/// Error body in the OpenAI shape (message at `error.message`)
fn error_response(status: u16) -> Response {
    let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (code, Json(json!({"error": {"message": "mock failure"}}))).into_response()
}

/// Pick a canned reply based on what the request is asking for
///
/// These patterns match the prompt files in prompts/*.md.
fn canned_reply(request: &Value) -> String {
    if has_image(request) {
        // Receipt scan (scan_receipt.md routes here with an image part)
        return receipt_reply();
    }

    let system = message_text(request, "system");
    let user = message_text(request, "user");

    if system.contains("Ekstrak data transaksi") {
        // Transaction extraction (extract_transaction.md pattern)
        return extraction_reply(&user);
    }
    if user.contains("Deskripsi Transaksi:") {
        // Category suggestion (suggest_category.md pattern)
        return category_reply(&user);
    }

    // Default: a short conversational answer
    "Baik! Ada lagi yang bisa saya bantu?".to_string()
}

/// Mock transaction extraction keyed off the user text
///
/// Account ids match the fixtures used across this crate's tests
/// (acc-bca, acc-gopay).
fn extraction_reply(user: &str) -> String {
    let text = user.to_lowercase();

    if text.contains("transfer") {
        return r#"{"type": "transfer", "amount": 500000, "category": "Transfer",
            "description": "Transfer ke GoPay", "accountId": "acc-bca",
            "toAccountId": "acc-gopay"}"#
            .to_string();
    }
    if text.contains("gaji") {
        return r#"{"type": "income", "amount": 5000000, "category": "Gaji",
            "description": "Gaji bulanan", "accountId": "acc-bca"}"#
            .to_string();
    }
    if text.contains("kopi") {
        return r#"{"type": "expense", "amount": 45000, "category": "Makan & Minum",
            "description": "Kopi Starbucks", "accountId": "acc-gopay",
            "merchant": "Starbucks"}"#
            .to_string();
    }
    if text.contains("bensin") {
        return r#"{"type": "expense", "amount": 50000, "category": "Transportasi",
            "description": "Isi bensin", "accountId": "acc-bca"}"#
            .to_string();
    }

    r#"{"error": true, "errorMessage": "Input tidak jelas, coba sebutkan jumlahnya"}"#.to_string()
}

/// Mock receipt parse (two items, totals consistent)
fn receipt_reply() -> String {
    r#"{
        "type": "expense",
        "amount": 20500,
        "category": "Belanja",
        "description": "Indomaret",
        "merchant": "Indomaret",
        "accountId": "acc-gopay",
        "items": [
            {"name": "Indomie Goreng", "qty": 3, "price": 3500},
            {"name": "Teh Botol", "qty": 2, "price": 5000}
        ]
    }"#
    .to_string()
}

/// Mock category suggestion keyed off the quoted description
fn category_reply(user: &str) -> String {
    let text = user.to_lowercase();
    let category = if text.contains("grab") || text.contains("gojek") || text.contains("bensin") {
        "Transportasi"
    } else if text.contains("kopi") || text.contains("makan") || text.contains("resto") {
        "Makan & Minum"
    } else if text.contains("listrik") || text.contains("pulsa") || text.contains("wifi") {
        "Tagihan"
    } else {
        "Lainnya"
    };
    category.to_string()
}

/// True when the final user message carries multimodal content parts
fn has_image(request: &Value) -> bool {
    request
        .get("messages")
        .and_then(Value::as_array)
        .and_then(|messages| messages.last())
        .and_then(|message| message.get("content"))
        .map(|content| content.is_array())
        .unwrap_or(false)
}

/// Concatenated text of all messages with the given role
fn message_text(request: &Value, role: &str) -> String {
    let Some(messages) = request.get("messages").and_then(Value::as_array) else {
        return String::new();
    };

    messages
        .iter()
        .filter(|message| message.get("role").and_then(Value::as_str) == Some(role))
        .filter_map(|message| match message.get("content") {
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Array(parts)) => Some(
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
