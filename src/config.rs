//! Configuration for the RFP pipeline.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{Result, RfpError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Remote (OpenAI-compatible) LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "https://api.openai.com")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "gpt-4o-mini")
    pub model: String,

    /// Maximum tokens for response (optional)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation (optional)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.0
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Local model served by Ollama.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            model: "llama3".to_string(),
            temperature: default_temperature(),
        }
    }
}

/// How answers are graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeMode {
    /// Ask an LLM oracle with the tolerance rubric.
    #[default]
    Llm,
    /// Apply the tolerance rubric locally, no model calls.
    Rules,
}

impl JudgeMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "llm" | "oracle" => Some(Self::Llm),
            "rules" | "rule" | "local" => Some(Self::Rules),
            _ => None,
        }
    }
}

/// Judge configuration. The LLM judge reuses the remote endpoint credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    pub mode: JudgeMode,
    pub model: String,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            mode: JudgeMode::default(),
            model: "gpt-5".to_string(),
        }
    }
}

/// Retrieval strategy, resolved once when a backend is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// BM25 over chunk tokens.
    #[default]
    Keyword,
    /// Embedding similarity only (requires the `embeddings` feature).
    Vector,
    /// Rank fusion of keyword and vector results (requires the `embeddings` feature).
    Hybrid,
}

impl RetrievalMode {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyword" | "bm25" => Some(Self::Keyword),
            "vector" | "vector_only" | "vector-only" => Some(Self::Vector),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }

    /// Whether this mode needs chunk embeddings.
    pub fn needs_embeddings(&self) -> bool {
        !matches!(self, Self::Keyword)
    }
}

/// Retrieval and chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub remote_mode: RetrievalMode,
    pub local_mode: RetrievalMode,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            chunk_size: 1000,
            chunk_overlap: 200,
            remote_mode: RetrievalMode::default(),
            local_mode: RetrievalMode::default(),
        }
    }
}

/// Evaluation loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    /// Maximum in-flight items per run.
    pub concurrency: usize,
    /// Time budget for one item (answer + judge), in seconds.
    pub item_timeout_secs: u64,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            item_timeout_secs: 120,
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Cloud model settings
    pub remote: LlmConfig,
    /// Local model settings
    pub local: OllamaConfig,
    pub judge: JudgeConfig,
    pub retrieval: RetrievalConfig,
    pub eval: EvalConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    remote: Option<LlmFileSection>,
    local: Option<OllamaFileSection>,
    judge: Option<JudgeFileSection>,
    retrieval: Option<RetrievalFileSection>,
    eval: Option<EvalFileSection>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct OllamaFileSection {
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct JudgeFileSection {
    mode: Option<JudgeMode>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetrievalFileSection {
    top_k: Option<usize>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    remote_mode: Option<RetrievalMode>,
    local_mode: Option<RetrievalMode>,
}

#[derive(Debug, Deserialize)]
struct EvalFileSection {
    concurrency: Option<usize>,
    item_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, OLLAMA_URL, ...)
    /// 2. Config file (~/.config/rfp-rag-eval/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                config = Self::load_from_file(&config_path)?;
            }
        }

        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(api_base) = lookup("LLM_API_BASE") {
            self.remote.api_base = api_base;
        }
        if let Some(api_key) = lookup("LLM_API_KEY") {
            self.remote.api_key = api_key;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            self.remote.model = model;
        }
        if let Some(tokens) = lookup("LLM_MAX_TOKENS") {
            self.remote.max_tokens = parse_number("LLM_MAX_TOKENS", &tokens)?;
        }
        if let Some(temp) = lookup("LLM_TEMPERATURE") {
            self.remote.temperature = parse_number("LLM_TEMPERATURE", &temp)?;
        }

        if let Some(url) = lookup("OLLAMA_URL") {
            self.local.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.local.model = model;
        }

        if let Some(mode) = lookup("JUDGE_MODE") {
            self.judge.mode = JudgeMode::from_str(&mode)
                .ok_or_else(|| RfpError::Config(format!("Unknown JUDGE_MODE '{}'", mode)))?;
        }
        if let Some(model) = lookup("JUDGE_MODEL") {
            self.judge.model = model;
        }

        if let Some(mode) = lookup("RFP_REMOTE_RETRIEVAL") {
            self.retrieval.remote_mode = parse_retrieval_mode("RFP_REMOTE_RETRIEVAL", &mode)?;
        }
        if let Some(mode) = lookup("RFP_LOCAL_RETRIEVAL") {
            self.retrieval.local_mode = parse_retrieval_mode("RFP_LOCAL_RETRIEVAL", &mode)?;
        }

        if let Some(n) = lookup("RFP_EVAL_CONCURRENCY") {
            self.eval.concurrency = parse_number("RFP_EVAL_CONCURRENCY", &n)?;
        }
        if let Some(secs) = lookup("RFP_ITEM_TIMEOUT") {
            self.eval.item_timeout_secs = parse_number("RFP_ITEM_TIMEOUT", &secs)?;
        }

        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| RfpError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse a YAML document on top of the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| RfpError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(remote) = file_config.remote {
            if let Some(api_base) = remote.api_base {
                config.remote.api_base = api_base;
            }
            if let Some(api_key) = remote.api_key {
                config.remote.api_key = api_key;
            }
            if let Some(model) = remote.model {
                config.remote.model = model;
            }
            if let Some(max_tokens) = remote.max_tokens {
                config.remote.max_tokens = max_tokens;
            }
            if let Some(temperature) = remote.temperature {
                config.remote.temperature = temperature;
            }
        }

        if let Some(local) = file_config.local {
            if let Some(base_url) = local.base_url {
                config.local.base_url = base_url;
            }
            if let Some(model) = local.model {
                config.local.model = model;
            }
            if let Some(temperature) = local.temperature {
                config.local.temperature = temperature;
            }
        }

        if let Some(judge) = file_config.judge {
            if let Some(mode) = judge.mode {
                config.judge.mode = mode;
            }
            if let Some(model) = judge.model {
                config.judge.model = model;
            }
        }

        if let Some(retrieval) = file_config.retrieval {
            if let Some(top_k) = retrieval.top_k {
                config.retrieval.top_k = top_k;
            }
            if let Some(chunk_size) = retrieval.chunk_size {
                config.retrieval.chunk_size = chunk_size;
            }
            if let Some(chunk_overlap) = retrieval.chunk_overlap {
                config.retrieval.chunk_overlap = chunk_overlap;
            }
            if let Some(mode) = retrieval.remote_mode {
                config.retrieval.remote_mode = mode;
            }
            if let Some(mode) = retrieval.local_mode {
                config.retrieval.local_mode = mode;
            }
        }

        if let Some(eval) = file_config.eval {
            if let Some(concurrency) = eval.concurrency {
                config.eval.concurrency = concurrency;
            }
            if let Some(secs) = eval.item_timeout_secs {
                config.eval.item_timeout_secs = secs;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rfp-rag-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that the remote endpoint is usable.
    ///
    /// Only needed when the remote backend or the LLM judge will be called.
    pub fn validate_remote(&self) -> Result<()> {
        if self.remote.api_base.is_empty() {
            return Err(RfpError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.remote.api_key.is_empty() {
            return Err(RfpError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.remote.model.is_empty() {
            return Err(RfpError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        Ok(())
    }

    /// Validate settings that every command relies on.
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            return Err(RfpError::Config("retrieval.top_k must be at least 1".to_string()));
        }
        if self.retrieval.chunk_size == 0 || self.retrieval.chunk_overlap >= self.retrieval.chunk_size {
            return Err(RfpError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.retrieval.chunk_overlap, self.retrieval.chunk_size
            )));
        }
        if self.local.model.is_empty() {
            return Err(RfpError::Config(
                "Local model is required. Set OLLAMA_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }
        if self.eval.item_timeout_secs == 0 {
            return Err(RfpError::Config(
                "eval.item_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a config from explicit remote values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            remote: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Remote endpoint settings with the judge model swapped in.
    pub fn judge_llm(&self) -> LlmConfig {
        LlmConfig {
            model: self.judge.model.clone(),
            ..self.remote.clone()
        }
    }
}

fn parse_retrieval_mode(key: &str, value: &str) -> Result<RetrievalMode> {
    RetrievalMode::from_str(value)
        .ok_or_else(|| RfpError::Config(format!("Unknown {} '{}'", key, value)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RfpError::Config(format!("{} must be a number, got '{}'", key, value)))
}
