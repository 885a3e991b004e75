//! Pluggable chat backend abstraction
//!
//! Every model interaction in the crate is one stateless completion call:
//! a system prompt carrying the financial context, optional conversation
//! history, and the user's message (text or text plus a receipt photo).
//!
//! # Architecture
//!
//! - `ChatBackend` trait: the single-call interface all backends implement
//! - `ChatClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - `AIGateway`: model routing, temperature, and retry on top of a client
//!
//! # Configuration
//!
//! Environment variables:
//! - `DOMPET_AI_BACKEND`: Backend to use (openai_compatible, mock). Default: openai_compatible
//! - `DOMPET_AI_BASE_URL`: Server URL (default: https://openrouter.ai/api)
//! - `DOMPET_AI_API_KEY`: Bearer token if required (optional)

mod gateway;
mod mock;
mod openai_compatible;
pub mod parsing;
pub mod types;

pub use gateway::AIGateway;
pub use mock::{MockBackend, MockReply};
pub use openai_compatible::OpenAICompatibleBackend;
pub use types::*;

use async_trait::async_trait;

use crate::config::AIConfig;
use crate::error::Result;

/// Trait defining the interface for all chat backends
///
/// Backends are transport only; model choice, temperature, and retry live
/// in the gateway. Backends should be Send + Sync to allow use across
/// async tasks.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one completion request and return the raw assistant text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Check if the backend is available
    async fn health_check(&self) -> bool;

    /// Get the host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete chat client enum
///
/// Provides Clone and compile-time dispatch without Box<dyn> overhead.
#[derive(Clone)]
pub enum ChatClient {
    /// Any server implementing the OpenAI chat completions API
    /// (OpenRouter, vLLM, LocalAI, llama-server, etc.)
    OpenAICompatible(OpenAICompatibleBackend),
    /// Mock backend for testing
    Mock(MockBackend),
}

impl ChatClient {
    /// Create a client from gateway configuration
    pub fn from_config(config: &AIConfig) -> Self {
        ChatClient::OpenAICompatible(OpenAICompatibleBackend::from_config(config))
    }

    /// Create a client from environment variables
    ///
    /// Checks `DOMPET_AI_BACKEND` to determine which backend to use:
    /// - `openai_compatible` (default): Uses DOMPET_AI_BASE_URL and DOMPET_AI_API_KEY
    /// - `mock`: Creates a mock backend for testing
    pub fn from_env() -> Self {
        let backend =
            std::env::var("DOMPET_AI_BACKEND").unwrap_or_else(|_| "openai_compatible".to_string());

        match backend.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "openrouter" => {
                ChatClient::OpenAICompatible(OpenAICompatibleBackend::from_env())
            }
            "mock" => ChatClient::Mock(MockBackend::new()),
            _ => {
                tracing::warn!(backend = %backend, "Unknown DOMPET_AI_BACKEND, falling back to openai_compatible");
                ChatClient::OpenAICompatible(OpenAICompatibleBackend::from_env())
            }
        }
    }

    /// Create a mock backend for testing
    pub fn mock() -> Self {
        ChatClient::Mock(MockBackend::new())
    }
}

// Implement ChatBackend for ChatClient by delegating to the inner backend
#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match self {
            ChatClient::OpenAICompatible(b) => b.complete(request).await,
            ChatClient::Mock(b) => b.complete(request).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            ChatClient::OpenAICompatible(b) => b.health_check().await,
            ChatClient::Mock(b) => b.health_check().await,
        }
    }

    fn host(&self) -> &str {
        match self {
            ChatClient::OpenAICompatible(b) => b.host(),
            ChatClient::Mock(b) => b.host(),
        }
    }
}
