//! Configuration loading, validation, and management for Tandem.
//!
//! Loads configuration from `~/.tandem/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tandem/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the language model (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Model used by the planner
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Cheaper model for bulk summarisation
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    #[serde(default)]
    pub temperature: f32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    #[serde(default)]
    pub identity: IdentityConfig,

    /// Loop limits and timeouts
    #[serde(default)]
    pub agent: AgentConfig,

    /// Context token budget and per-tier shares
    #[serde(default)]
    pub budget: BudgetConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub browse: BrowseConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_fast_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("fast_model", &self.fast_model)
            .field("temperature", &self.temperature)
            .field("providers", &self.providers)
            .field("identity", &self.identity)
            .field("agent", &self.agent)
            .field("budget", &self.budget)
            .field("memory", &self.memory)
            .field("search", &self.search)
            .field("browse", &self.browse)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("api_key", &redact(&self.api_key))
            .field("endpoint", &self.endpoint)
            .field("top_k", &self.top_k)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,

    #[serde(default = "default_personalities")]
    pub personalities: Vec<String>,

    /// Reported to the planner as the user's location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

fn default_identity_name() -> String {
    "Tandem".into()
}
fn default_personalities() -> Vec<String> {
    vec!["help users find accurate, referenced answers".into()]
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            personalities: default_personalities(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Planner iterations allowed per query
    #[serde(default = "default_action_credit")]
    pub action_credit: u32,

    /// Conversation turns considered for the prompt
    #[serde(default = "default_window")]
    pub history_window: usize,

    #[serde(default = "default_window")]
    pub short_term_top_k: usize,

    #[serde(default = "default_window")]
    pub long_term_top_k: usize,

    /// Per-action execution timeout
    #[serde(default = "default_action_timeout")]
    pub action_timeout_secs: u64,

    /// Per-request timeout for the language model
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_action_credit() -> u32 {
    5
}
fn default_window() -> usize {
    5
}
fn default_action_timeout() -> u64 {
    60
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            action_credit: default_action_credit(),
            history_window: default_window(),
            short_term_top_k: default_window(),
            long_term_top_k: default_window(),
            action_timeout_secs: default_action_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    /// Hard ceiling for one planner request
    #[serde(default = "default_total_tokens")]
    pub total_tokens: usize,

    #[serde(default = "default_short_term_tokens")]
    pub short_term_tokens: usize,

    #[serde(default = "default_long_term_tokens")]
    pub long_term_tokens: usize,

    #[serde(default = "default_history_tokens")]
    pub history_tokens: usize,
}

fn default_total_tokens() -> usize {
    4000
}
fn default_short_term_tokens() -> usize {
    2000
}
fn default_long_term_tokens() -> usize {
    800
}
fn default_history_tokens() -> usize {
    1200
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            total_tokens: default_total_tokens(),
            short_term_tokens: default_short_term_tokens(),
            long_term_tokens: default_long_term_tokens(),
            history_tokens: default_history_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Long-term store: "file" or "memory"
    #[serde(default = "default_store")]
    pub store: String,

    /// JSONL path for the file store; defaults under the config dir
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// "provider" (remote embeddings) or "hash" (offline feature hashing)
    #[serde(default = "default_embedder")]
    pub embedder: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_hash_dimensions")]
    pub hash_dimensions: usize,

    /// Fraction of recency lost per hour since last access
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,

    #[serde(default = "default_weight")]
    pub similarity_weight: f64,

    #[serde(default = "default_weight")]
    pub recency_weight: f64,

    /// Long-term entries at or below this distance are relevant
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f32,

    /// Promotion skips keys at or below this distance from an existing entry
    #[serde(default = "default_dedup_threshold")]
    pub dedup_threshold: f32,
}

fn default_store() -> String {
    "file".into()
}
fn default_embedder() -> String {
    "provider".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_hash_dimensions() -> usize {
    256
}
fn default_decay_rate() -> f64 {
    0.05
}
fn default_weight() -> f64 {
    1.0
}
fn default_relevance_threshold() -> f32 {
    0.35
}
fn default_dedup_threshold() -> f32 {
    0.1
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            store: default_store(),
            path: None,
            embedder: default_embedder(),
            embedding_model: default_embedding_model(),
            hash_dimensions: default_hash_dimensions(),
            decay_rate: default_decay_rate(),
            similarity_weight: default_weight(),
            recency_weight: default_weight(),
            relevance_threshold: default_relevance_threshold(),
            dedup_threshold: default_dedup_threshold(),
        }
    }
}

impl MemoryConfig {
    /// Where the file store lives.
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("memory").join("long_term.jsonl"))
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Bing Web Search subscription key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_window")]
    pub top_k: usize,
}

fn default_search_endpoint() -> String {
    "https://api.bing.microsoft.com/v7.0/search".into()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_search_endpoint(),
            top_k: default_window(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowseConfig {
    #[serde(default = "default_chunk_tokens")]
    pub chunk_tokens: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Pages are shrunk until they fit this many tokens
    #[serde(default = "default_chunk_tokens")]
    pub target_tokens: usize,

    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    #[serde(default = "default_true")]
    pub use_fast_model: bool,
}

fn default_chunk_tokens() -> usize {
    2000
}
fn default_chunk_overlap() -> usize {
    500
}
fn default_max_rounds() -> usize {
    6
}

impl Default for BrowseConfig {
    fn default() -> Self {
        Self {
            chunk_tokens: default_chunk_tokens(),
            chunk_overlap: default_chunk_overlap(),
            target_tokens: default_chunk_tokens(),
            max_rounds: default_max_rounds(),
            use_fast_model: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.tandem/config.toml).
    ///
    /// Also checks environment variables:
    /// - `TANDEM_API_KEY` (highest priority), then `OPENAI_API_KEY`
    /// - `TANDEM_PROVIDER`, `TANDEM_MODEL`
    /// - `BING_SUBSCRIPTION_KEY` for search
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("TANDEM_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("TANDEM_PROVIDER") {
            self.default_provider = provider;
        }

        if let Ok(model) = std::env::var("TANDEM_MODEL") {
            self.default_model = model;
        }

        if self.search.api_key.is_none() {
            self.search.api_key = std::env::var("BING_SUBSCRIPTION_KEY").ok();
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tandem")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.action_credit == 0 {
            return Err(ConfigError::ValidationError(
                "agent.action_credit must be at least 1".into(),
            ));
        }

        if !(0.0..1.0).contains(&self.memory.decay_rate) {
            return Err(ConfigError::ValidationError(
                "memory.decay_rate must be in [0.0, 1.0)".into(),
            ));
        }

        for (name, value) in [
            ("relevance_threshold", self.memory.relevance_threshold),
            ("dedup_threshold", self.memory.dedup_threshold),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "memory.{name} must be a distance between 0.0 and 2.0"
                )));
            }
        }

        if !matches!(self.memory.store.as_str(), "file" | "memory") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory.store '{}'",
                self.memory.store
            )));
        }

        if !matches!(self.memory.embedder.as_str(), "provider" | "hash") {
            return Err(ConfigError::ValidationError(format!(
                "unknown memory.embedder '{}'",
                self.memory.embedder
            )));
        }

        let b = &self.budget;
        for (name, share) in [
            ("short_term_tokens", b.short_term_tokens),
            ("long_term_tokens", b.long_term_tokens),
            ("history_tokens", b.history_tokens),
        ] {
            if share > b.total_tokens {
                return Err(ConfigError::ValidationError(format!(
                    "budget.{name} ({share}) exceeds budget.total_tokens ({})",
                    b.total_tokens
                )));
            }
        }

        if self.browse.chunk_tokens == 0 || self.browse.chunk_overlap >= self.browse.chunk_tokens {
            return Err(ConfigError::ValidationError(
                "browse.chunk_overlap must be smaller than a non-zero browse.chunk_tokens".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }

    /// Write the default config to `path`, creating parent directories.
    pub fn write_default(path: &Path) -> Result<(), ConfigError> {
        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, Self::default_toml()).map_err(write_err)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            fast_model: default_fast_model(),
            temperature: 0.0,
            providers: HashMap::new(),
            identity: IdentityConfig::default(),
            agent: AgentConfig::default(),
            budget: BudgetConfig::default(),
            memory: MemoryConfig::default(),
            search: SearchConfig::default(),
            browse: BrowseConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
