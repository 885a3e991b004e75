//! Prompt library for the AI gateway
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/dompet/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! This allows users to customize prompts without modifying the source,
//! while automatically getting new default prompts on upgrade.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const EXTRACT_TRANSACTION: &str = include_str!("../../../prompts/extract_transaction.md");
    pub const SCAN_RECEIPT: &str = include_str!("../../../prompts/scan_receipt.md");
    pub const ANSWER_QUERY: &str = include_str!("../../../prompts/answer_query.md");
    pub const GIVE_ADVICE: &str = include_str!("../../../prompts/give_advice.md");
    pub const PLAN_FINANCE: &str = include_str!("../../../prompts/plan_finance.md");
    pub const ANALYZE_FINANCE: &str = include_str!("../../../prompts/analyze_finance.md");
    pub const SUGGEST_BUDGET: &str = include_str!("../../../prompts/suggest_budget.md");
    pub const MONTHLY_INSIGHT: &str = include_str!("../../../prompts/monthly_insight.md");
    pub const HEALTH_REPORT: &str = include_str!("../../../prompts/health_report.md");
    pub const SUGGEST_CATEGORY: &str = include_str!("../../../prompts/suggest_category.md");
    pub const RECONCILE_HINT: &str = include_str!("../../../prompts/reconcile_hint.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Structured transaction extraction from natural language or receipts
    ExtractTransaction,
    /// Fixed instruction sent alongside a receipt photo
    ScanReceipt,
    AnswerQuery,
    GiveAdvice,
    PlanFinance,
    AnalyzeFinance,
    /// Per-category saving suggestions when a budget runs hot
    SuggestBudget,
    MonthlyInsight,
    HealthReport,
    SuggestCategory,
    /// One-line hypothesis for a reconciliation difference
    ReconcileHint,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractTransaction => "extract_transaction",
            Self::ScanReceipt => "scan_receipt",
            Self::AnswerQuery => "answer_query",
            Self::GiveAdvice => "give_advice",
            Self::PlanFinance => "plan_finance",
            Self::AnalyzeFinance => "analyze_finance",
            Self::SuggestBudget => "suggest_budget",
            Self::MonthlyInsight => "monthly_insight",
            Self::HealthReport => "health_report",
            Self::SuggestCategory => "suggest_category",
            Self::ReconcileHint => "reconcile_hint",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[
            Self::ExtractTransaction,
            Self::ScanReceipt,
            Self::AnswerQuery,
            Self::GiveAdvice,
            Self::PlanFinance,
            Self::AnalyzeFinance,
            Self::SuggestBudget,
            Self::MonthlyInsight,
            Self::HealthReport,
            Self::SuggestCategory,
            Self::ReconcileHint,
        ]
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::ExtractTransaction => defaults::EXTRACT_TRANSACTION,
            Self::ScanReceipt => defaults::SCAN_RECEIPT,
            Self::AnswerQuery => defaults::ANSWER_QUERY,
            Self::GiveAdvice => defaults::GIVE_ADVICE,
            Self::PlanFinance => defaults::PLAN_FINANCE,
            Self::AnalyzeFinance => defaults::ANALYZE_FINANCE,
            Self::SuggestBudget => defaults::SUGGEST_BUDGET,
            Self::MonthlyInsight => defaults::MONTHLY_INSIGHT,
            Self::HealthReport => defaults::HEALTH_REPORT,
            Self::SuggestCategory => defaults::SUGGEST_CATEGORY,
            Self::ReconcileHint => defaults::RECONCILE_HINT,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Task type for model routing (extraction, conversational, reasoning, vision)
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt body (sent as the system message after rendering)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    /// Path to override file (if any)
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Render the prompt with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut result = self.content.clone();

        // Simple mustache-style replacement: {{var}}
        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }

        // Also handle conditional blocks: {{#if var}}...{{/if}}
        // For simplicity, we remove unmatched conditionals
        result = remove_unmatched_conditionals(&result, vars);

        result
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    /// Override directory path
    override_dir: Option<PathBuf>,
    /// Cached parsed prompts
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        let override_dir = default_prompts_dir();
        Self {
            override_dir,
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        Ok(self.cache.get(&id).unwrap())
    }

    /// Load a prompt (checking override first, then default)
    fn load(&self, id: PromptId) -> Result<Prompt> {
        // Check for override
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::Prompt(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        // Use embedded default
        let content = id.default_content();
        let (metadata, body) = parse_prompt(content)?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let has_override = self.has_override(id);
                let prompt = self.get(id).ok();
                PromptInfo {
                    id: id.as_str().to_string(),
                    version: prompt.map(|p| p.metadata.version).unwrap_or(0),
                    task_type: prompt
                        .map(|p| p.metadata.task_type.clone())
                        .unwrap_or_default(),
                    has_override,
                    override_path: if has_override {
                        self.override_dir
                            .as_ref()
                            .map(|d| d.join(format!("{}.md", id.as_str())))
                    } else {
                        None
                    },
                }
            })
            .collect()
    }

    /// Check if a prompt has an override file
    pub fn has_override(&self, id: PromptId) -> bool {
        if let Some(ref override_dir) = self.override_dir {
            override_dir.join(format!("{}.md", id.as_str())).exists()
        } else {
            false
        }
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Clear the cache (useful after editing override files)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    /// Prompt identifier
    pub id: String,
    /// Version from metadata
    pub version: u32,
    /// Task type for model routing
    pub task_type: String,
    /// Whether an override exists
    pub has_override: bool,
    /// Path to override file (if exists)
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("dompet").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    // Check for YAML frontmatter
    if !content.starts_with("---") {
        return Err(Error::Prompt(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    // Find end of frontmatter
    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::Prompt("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = &rest[..end].trim();
    let body = &rest[end + 3..].trim();

    // Parse frontmatter as YAML
    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::Prompt(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Remove unmatched conditional blocks from the template
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    // Find all {{#if var}}...{{/if}} blocks
    loop {
        if let Some(if_start) = result.find("{{#if ") {
            let var_start = if_start + 6;
            if let Some(var_end) = result[var_start..].find("}}") {
                let var_name = &result[var_start..var_start + var_end];
                let block_start = var_start + var_end + 2;

                // Find matching {{/if}}
                if let Some(endif_pos) = result[block_start..].find("{{/if}}") {
                    let block_content = &result[block_start..block_start + endif_pos];
                    let full_end = block_start + endif_pos + 7;

                    // Check if variable is present and non-empty
                    let should_include = vars.get(var_name).is_some_and(|v| !v.is_empty());

                    if should_include {
                        // Keep block content, remove markers
                        result = format!(
                            "{}{}{}",
                            &result[..if_start],
                            block_content,
                            &result[full_end..]
                        );
                    } else {
                        // Remove entire block
                        result = format!("{}{}", &result[..if_start], &result[full_end..]);
                    }
                    continue;
                }
            }
        }
        break;
    }

    result
}
