//! Runtime configuration
//!
//! Every knob lives on an explicit config object handed to the component
//! that uses it; nothing reads ambient global state at call time.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for an override in the data dir (~/.local/share/dompet/config/defaults.toml)
//! 2. Fall back to embedded defaults (compiled into the binary)
//!
//! Environment variables (`DOMPET_AI_BASE_URL`, `DOMPET_AI_API_KEY`) are
//! consulted only inside [`AppConfig::from_env`] at construction time.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/defaults.toml");

/// Category that is always a valid transaction category, independent of the
/// user's configured list
pub const TRANSFER_CATEGORY: &str = "Transfer";

/// Category assigned to balance-correction transactions
pub const RECONCILIATION_CATEGORY: &str = "Rekonsiliasi";

/// Fallback category when nothing in the configured list matches
pub const FALLBACK_CATEGORY: &str = "Lainnya";

/// Retry contract for external completion calls
///
/// The observable behavior is fixed: `max_attempts` tries, each bounded by
/// `timeout`, with sleeps of `initial_backoff * 2^(attempt-1)` between
/// failures (1s, 2s, 4s at the defaults).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Per-attempt timeout for the HTTP call
    pub timeout: Duration,
    /// Backoff before the second attempt; doubles each further attempt
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(30),
            initial_backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Sleep duration after a failed attempt (1-based), before the next one
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// The three model roles the pipeline routes between
#[derive(Debug, Clone)]
pub struct ModelSet {
    /// Extraction and classification (fast, cheap)
    pub fast: String,
    /// Analysis and advice (stronger reasoning)
    pub smart: String,
    /// Receipt OCR
    pub vision: String,
}

impl Default for ModelSet {
    fn default() -> Self {
        Self {
            fast: "google/gemini-2.0-flash-001".to_string(),
            smart: "google/gemini-2.0-flash-001".to_string(),
            vision: "google/gemini-2.0-flash-001".to_string(),
        }
    }
}

/// Configuration for the AI gateway
#[derive(Debug, Clone)]
pub struct AIConfig {
    /// Base URL of the OpenAI-compatible endpoint (no trailing slash)
    pub base_url: String,
    /// Bearer token, if the endpoint requires one
    pub api_key: Option<String>,
    pub models: ModelSet,
    pub retry: RetryPolicy,
    /// Completion cap per call
    pub max_tokens: u32,
    /// Conversation turns forwarded to the model, oldest dropped first
    pub max_history_turns: usize,
}

impl Default for AIConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api".to_string(),
            api_key: None,
            models: ModelSet::default(),
            retry: RetryPolicy::default(),
            max_tokens: 2000,
            max_history_turns: 10,
        }
    }
}

/// The user's valid transaction categories, in display order
#[derive(Debug, Clone)]
pub struct CategorySet {
    categories: Vec<String>,
}

impl Default for CategorySet {
    fn default() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Built-in category list, used until the user customizes it
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Makan & Minum",
    "Transportasi",
    "Belanja",
    "Hiburan",
    "Tagihan",
    "Transfer",
    "Lainnya",
    "Gaji",
    "Investasi",
    "Kesehatan",
    "Pendidikan",
];

impl CategorySet {
    pub fn new(categories: Vec<String>) -> Self {
        Self { categories }
    }

    pub fn names(&self) -> &[String] {
        &self.categories
    }

    /// Case-insensitive lookup returning the canonical spelling.
    /// "Transfer" always resolves, even when removed from the list.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let needle = name.trim();
        if needle.eq_ignore_ascii_case(TRANSFER_CATEGORY) {
            return Some(TRANSFER_CATEGORY);
        }
        self.categories
            .iter()
            .find(|c| c.eq_ignore_ascii_case(needle))
            .map(|c| c.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Add a category if not already present (case-insensitive)
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.contains(name) {
            return false;
        }
        self.categories.push(name.to_string());
        true
    }

    /// Remove a category. Removing "Transfer" from the list is allowed but it
    /// stays resolvable.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.categories.len();
        self.categories
            .retain(|c| !c.eq_ignore_ascii_case(name.trim()));
        self.categories.len() != before
    }

    /// Render as a comma-separated enum for prompt embedding
    pub fn as_prompt_list(&self) -> String {
        self.categories.join(", ")
    }
}

/// Top-level application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub ai: AIConfig,
    pub categories: CategorySet,
}

impl AppConfig {
    /// Load from the embedded defaults, honoring a data-dir override file
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit path (falls back to embedded defaults when absent)
    pub fn load_from(path: PathBuf) -> Result<Self> {
        load_config(Some(&path))
    }

    /// Load, then apply environment overrides for the connection settings
    pub fn from_env() -> Result<Self> {
        let mut config = Self::load()?;
        if let Ok(url) = std::env::var("DOMPET_AI_BASE_URL") {
            if !url.is_empty() {
                config.ai.base_url = url.trim_end_matches('/').to_string();
            }
        }
        if let Ok(key) = std::env::var("DOMPET_AI_API_KEY") {
            if !key.is_empty() {
                config.ai.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("DOMPET_AI_MODEL") {
            if !model.is_empty() {
                config.ai.models = ModelSet {
                    fast: model.clone(),
                    smart: model.clone(),
                    vision: model,
                };
            }
        }
        Ok(config)
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("dompet").join("config").join("defaults.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&PathBuf>) -> Result<AppConfig> {
    let content = if let Some(path) = override_path {
        if path.exists() {
            fs::read_to_string(path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
        } else {
            DEFAULT_CONFIG.to_string()
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            fs::read_to_string(&default_path)
                .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?
        } else {
            DEFAULT_CONFIG.to_string()
        }
    } else {
        DEFAULT_CONFIG.to_string()
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    ai: Option<RawAI>,
    categories: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawAI {
    base_url: Option<String>,
    max_tokens: Option<u32>,
    max_history_turns: Option<usize>,
    models: Option<RawModels>,
    retry: Option<RawRetry>,
}

#[derive(Debug, Deserialize)]
struct RawModels {
    fast: Option<String>,
    smart: Option<String>,
    vision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRetry {
    max_attempts: Option<u32>,
    timeout_secs: Option<u64>,
    initial_backoff_ms: Option<u64>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<AppConfig> {
    let raw: RawConfig =
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = AppConfig::default();

    if let Some(ai) = raw.ai {
        if let Some(url) = ai.base_url {
            config.ai.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(max_tokens) = ai.max_tokens {
            config.ai.max_tokens = max_tokens;
        }
        if let Some(turns) = ai.max_history_turns {
            config.ai.max_history_turns = turns;
        }
        if let Some(models) = ai.models {
            if let Some(fast) = models.fast {
                config.ai.models.fast = fast;
            }
            if let Some(smart) = models.smart {
                config.ai.models.smart = smart;
            }
            if let Some(vision) = models.vision {
                config.ai.models.vision = vision;
            }
        }
        if let Some(retry) = ai.retry {
            if let Some(attempts) = retry.max_attempts {
                config.ai.retry.max_attempts = attempts;
            }
            if let Some(timeout) = retry.timeout_secs {
                config.ai.retry.timeout = Duration::from_secs(timeout);
            }
            if let Some(backoff) = retry.initial_backoff_ms {
                config.ai.retry.initial_backoff = Duration::from_millis(backoff);
            }
        }
    }

    if let Some(categories) = raw.categories {
        if !categories.is_empty() {
            config.categories = CategorySet::new(categories);
        }
    }

    Ok(config)
}
