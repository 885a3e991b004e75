//! Request types shared by all chat backends

use base64::Engine;
use serde::{Deserialize, Serialize};

/// Task kinds the gateway routes between
///
/// The kind decides which configured model handles the call and which
/// sampling temperature is used. Structured-output tasks run cold,
/// free-text tasks run warm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// JSON extraction from natural language
    Extraction,
    /// Receipt photo understanding
    Vision,
    /// Plain question answering and planning
    #[default]
    Conversational,
    /// Analysis and advice that benefits from a stronger model
    Reasoning,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Vision => "vision",
            Self::Conversational => "conversational",
            Self::Reasoning => "reasoning",
        }
    }

    /// Sampling temperature for this task kind
    pub fn temperature(&self) -> f32 {
        match self {
            Self::Extraction | Self::Vision => 0.0,
            Self::Conversational | Self::Reasoning => 0.7,
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "extraction" => Ok(Self::Extraction),
            "vision" => Ok(Self::Vision),
            "conversational" => Ok(Self::Conversational),
            "reasoning" => Ok(Self::Reasoning),
            _ => Err(format!("Unknown task kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Role of one prior conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One prior message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The user-authored part of a completion call
#[derive(Debug, Clone)]
pub enum UserContent {
    Text(String),
    /// Text plus a base64-encoded JPEG, sent as a multimodal message
    TextWithImage {
        text: String,
        image_base64: String,
    },
}

impl UserContent {
    /// Build multimodal content from raw image bytes
    pub fn with_image(text: impl Into<String>, image_data: &[u8]) -> Self {
        Self::TextWithImage {
            text: text.into(),
            image_base64: base64::engine::general_purpose::STANDARD.encode(image_data),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Text(t) => t,
            Self::TextWithImage { text, .. } => text,
        }
    }

    pub fn has_image(&self) -> bool {
        matches!(self, Self::TextWithImage { .. })
    }
}

/// A fully resolved completion call, ready for any backend
///
/// The gateway resolves model and sampling parameters before a backend
/// sees the request, so backends stay configuration-free.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub temperature: f32,
    /// Completion cap per call
    pub max_tokens: u32,
    /// System message, already rendered with the user's financial context
    pub system: String,
    /// Prior conversation, oldest first
    pub history: Vec<ChatTurn>,
    pub user: UserContent,
}
