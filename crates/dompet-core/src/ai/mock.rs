//! Mock backend for testing
//!
//! Returns scripted responses without a network round trip. Tests queue
//! replies in order; once the queue runs dry the default reply is served.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::types::CompletionRequest;
use super::ChatBackend;

/// One scripted mock response
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Successful completion with this text
    Text(String),
    /// Failed attempt surfacing this error message
    Failure(String),
}

/// Mock chat backend for testing
///
/// Clones share the reply queue and call log, so a test can keep a handle
/// while the gateway owns another.
#[derive(Clone, Default)]
pub struct MockBackend {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    default_reply: Arc<Mutex<String>>,
    /// Whether health_check should return true
    pub healthy: bool,
    calls: Arc<AtomicUsize>,
    last_request: Arc<Mutex<Option<CompletionRequest>>>,
}

impl MockBackend {
    /// Create a new mock backend (healthy by default)
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    /// Create an unhealthy mock backend
    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::default()
        }
    }

    /// Create a mock that always answers with the given text
    pub fn with_reply(text: impl Into<String>) -> Self {
        let backend = Self::new();
        backend.set_default_reply(text);
        backend
    }

    /// Queue a successful reply
    pub fn push_reply(&self, text: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(MockReply::Text(text.into()));
        }
    }

    /// Queue a failed attempt
    pub fn push_failure(&self, message: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(MockReply::Failure(message.into()));
        }
    }

    /// Set the reply served when the queue is empty
    pub fn set_default_reply(&self, text: impl Into<String>) {
        if let Ok(mut default_reply) = self.default_reply.lock() {
            *default_reply = text.into();
        }
    }

    /// Number of completion calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent request, if any call was made
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request.clone());
        }

        let scripted = self
            .replies
            .lock()
            .map_err(|_| Error::Api("mock reply queue lock poisoned".into()))?
            .pop_front();

        match scripted {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Failure(message)) => Err(Error::Api(message)),
            None => {
                let default_reply = self
                    .default_reply
                    .lock()
                    .map_err(|_| Error::Api("mock reply lock poisoned".into()))?;
                Ok(default_reply.clone())
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::types::{TaskKind, UserContent};

    fn request(text: &str) -> CompletionRequest {
        CompletionRequest {
            model: "mock-model".to_string(),
            temperature: TaskKind::Conversational.temperature(),
            max_tokens: 100,
            system: "sistem".to_string(),
            history: Vec::new(),
            user: UserContent::Text(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mock = MockBackend::new();
        mock.push_reply("pertama");
        mock.push_failure("gangguan");
        mock.push_reply("kedua");

        assert_eq!(mock.complete(&request("a")).await.unwrap(), "pertama");
        assert!(mock.complete(&request("b")).await.is_err());
        assert_eq!(mock.complete(&request("c")).await.unwrap(), "kedua");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_default_reply_when_queue_empty() {
        let mock = MockBackend::with_reply("selalu ini");
        assert_eq!(mock.complete(&request("x")).await.unwrap(), "selalu ini");
        assert_eq!(mock.complete(&request("y")).await.unwrap(), "selalu ini");
    }

    #[tokio::test]
    async fn test_last_request_captured() {
        let mock = MockBackend::new();
        assert!(mock.last_request().is_none());

        mock.complete(&request("catat kopi 25rb")).await.unwrap();
        let captured = mock.last_request().unwrap();
        assert_eq!(captured.user.text(), "catat kopi 25rb");
        assert_eq!(captured.model, "mock-model");
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mock = MockBackend::new();
        let clone = mock.clone();
        clone.push_reply("dari clone");

        assert_eq!(mock.complete(&request("z")).await.unwrap(), "dari clone");
        assert_eq!(clone.call_count(), 1);
    }

    #[tokio::test]
    async fn test_health() {
        assert!(MockBackend::new().health_check().await);
        assert!(!MockBackend::unhealthy().health_check().await);
    }
}
