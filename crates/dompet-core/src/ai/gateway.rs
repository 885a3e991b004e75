//! Completion gateway with model routing and retry
//!
//! Every model call in the crate funnels through [`AIGateway`]. The gateway
//! owns the retry contract (attempts, backoff, per-call timeout via the
//! backend) and picks the configured model for the task kind. Callers hand
//! it a rendered system prompt and user content, nothing transport-level.

use tracing::{debug, warn};

use crate::config::AIConfig;
use crate::error::{Error, Result};

use super::types::{ChatTurn, CompletionRequest, TaskKind, UserContent};
use super::{ChatBackend, ChatClient};

/// Gateway for all outbound completion calls
#[derive(Clone)]
pub struct AIGateway {
    backend: ChatClient,
    config: AIConfig,
}

impl AIGateway {
    /// Create a gateway talking to the configured OpenAI-compatible endpoint
    pub fn new(config: AIConfig) -> Self {
        let backend = ChatClient::from_config(&config);
        Self { backend, config }
    }

    /// Create a gateway over an explicit backend (used by tests)
    pub fn with_backend(backend: ChatClient, config: AIConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &AIConfig {
        &self.config
    }

    /// The configured model for a task kind
    pub fn model_for(&self, task: TaskKind) -> &str {
        match task {
            TaskKind::Extraction | TaskKind::Conversational => &self.config.models.fast,
            TaskKind::Reasoning => &self.config.models.smart,
            TaskKind::Vision => &self.config.models.vision,
        }
    }

    /// Run one completion with retry
    ///
    /// All attempts must fail for the call to fail; the last error is the
    /// one surfaced. Sleeps double between attempts (1s, 2s, 4s at the
    /// default policy).
    pub async fn complete(
        &self,
        task: TaskKind,
        system: &str,
        history: &[ChatTurn],
        user: UserContent,
    ) -> Result<String> {
        let request = CompletionRequest {
            model: self.model_for(task).to_string(),
            temperature: task.temperature(),
            max_tokens: self.config.max_tokens,
            system: system.to_string(),
            history: trim_history(history, self.config.max_history_turns),
            user,
        };

        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            match self.backend.complete(&request).await {
                Ok(text) => {
                    debug!(task = %task, model = %request.model, attempt, "completion ok");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(task = %task, attempt, max_attempts, error = %e, "completion attempt failed");
                    last_error = Some(e);
                    if attempt < max_attempts {
                        tokio::time::sleep(self.config.retry.backoff_after(attempt)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Api("no completion attempt was made".into())))
    }

    /// One-shot completion with a generic persona, routed by task kind
    ///
    /// Used by the engines that embed their whole instruction in the
    /// prompt text (budget suggestions, insights, reconciliation hints).
    pub async fn complete_task(&self, task: TaskKind, prompt: &str) -> Result<String> {
        self.complete(
            task,
            "You are a helpful financial assistant.",
            &[],
            UserContent::Text(prompt.to_string()),
        )
        .await
    }

    /// One-shot conversational completion
    pub async fn complete_simple(&self, prompt: &str) -> Result<String> {
        self.complete_task(TaskKind::Conversational, prompt).await
    }

    /// Check whether the backend endpoint is reachable
    pub async fn health_check(&self) -> bool {
        self.backend.health_check().await
    }

    /// Host URL of the backend (for logging)
    pub fn host(&self) -> &str {
        self.backend.host()
    }
}

/// Keep only the newest `max` turns, oldest dropped first
fn trim_history(history: &[ChatTurn], max: usize) -> Vec<ChatTurn> {
    history[history.len().saturating_sub(max)..].to_vec()
}
