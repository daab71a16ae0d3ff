// src/config/mod.rs
// Central configuration, assembled from environment variables.

pub mod helpers;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: AppConfig = AppConfig::from_env();
}

/// Top-level configuration, composed from domain sub-configs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub upstream: UpstreamConfig,
    pub database: DatabaseConfig,
    pub qdrant: QdrantConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    pub scheduler: SchedulerConfig,
    pub context: ContextConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            upstream: UpstreamConfig::from_env(),
            database: DatabaseConfig::from_env(),
            qdrant: QdrantConfig::from_env(),
            embedding: EmbeddingConfig::from_env(),
            llm: LlmConfig::from_env(),
            scheduler: SchedulerConfig::from_env(),
            context: ContextConfig::from_env(),
            logging: LoggingConfig::from_env(),
        }
    }
}

/// Upstream messaging API connection details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub api_token: String,
    pub base_url: String,
    /// Host used to render message permalinks (`<host>/archives/...`).
    pub link_host: String,
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        Self {
            api_token: helpers::require_env("ATTENDANT_UPSTREAM_TOKEN"),
            base_url: helpers::env_or("ATTENDANT_UPSTREAM_BASE_URL", "https://slack.com/api"),
            link_host: helpers::env_or("ATTENDANT_UPSTREAM_LINK_HOST", "slack.com"),
        }
    }
}

/// Relational store connection details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: helpers::env_or("DATABASE_URL", "sqlite://attendant.db"),
            max_connections: helpers::env_parsed("ATTENDANT_DB_MAX_CONNECTIONS", 5),
        }
    }
}

/// Vector store connection details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    pub vector_dim: u64,
}

impl QdrantConfig {
    pub fn from_env() -> Self {
        Self {
            url: helpers::env_or("ATTENDANT_QDRANT_URL", "http://localhost:6334"),
            collection: helpers::env_or("ATTENDANT_QDRANT_COLLECTION", "attendant_messages"),
            vector_dim: helpers::env_parsed("ATTENDANT_EMBEDDING_DIM", 384),
        }
    }
}

/// Embedding-host connection details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub host: String,
    pub model: String,
    pub api_key: String,
    pub dim: usize,
}

impl EmbeddingConfig {
    pub fn from_env() -> Self {
        Self {
            host: helpers::env_or("ATTENDANT_EMBEDDING_HOST", "https://api.openai.com/v1"),
            model: helpers::env_or("ATTENDANT_EMBEDDING_MODEL", "text-embedding-3-small"),
            api_key: helpers::env_or("ATTENDANT_EMBEDDING_API_KEY", ""),
            dim: helpers::env_parsed("ATTENDANT_EMBEDDING_DIM", 384),
        }
    }
}

/// Which wire-format family the configured language model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LlmProviderKind {
    Anthropic,
    OpenAi,
}

/// Language-model host connection details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub model: String,
    pub api_key: String,
    pub host: String,
}

impl LlmConfig {
    pub fn from_env() -> Self {
        let provider = match helpers::env_or("ATTENDANT_LLM_PROVIDER", "anthropic").as_str() {
            "openai" => LlmProviderKind::OpenAi,
            _ => LlmProviderKind::Anthropic,
        };
        let default_host = match provider {
            LlmProviderKind::Anthropic => "https://api.anthropic.com/v1",
            LlmProviderKind::OpenAi => "https://api.openai.com/v1",
        };
        Self {
            provider,
            model: helpers::env_or("ATTENDANT_LLM_MODEL", "claude-sonnet-4-5"),
            api_key: helpers::env_or("ATTENDANT_LLM_API_KEY", ""),
            host: helpers::env_or("ATTENDANT_LLM_HOST", default_host),
        }
    }
}

/// Scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub poll_interval_seconds: u64,
    pub max_concurrent_syncs: usize,
    pub metadata_persist_every_n_ticks: u64,
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            poll_interval_seconds: helpers::env_parsed("ATTENDANT_POLL_INTERVAL_SECONDS", 60),
            max_concurrent_syncs: helpers::env_parsed("ATTENDANT_MAX_CONCURRENT_SYNCS", 10),
            metadata_persist_every_n_ticks: 10,
        }
    }
}

/// Agent conversation context-bounding tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    pub max_recent_turns: usize,
    pub summarize_threshold: usize,
    pub max_summary_tokens: u32,
}

impl ContextConfig {
    pub fn from_env() -> Self {
        Self {
            max_recent_turns: helpers::env_parsed("ATTENDANT_CONTEXT_MAX_RECENT_TURNS", 4),
            summarize_threshold: helpers::env_parsed("ATTENDANT_CONTEXT_SUMMARIZE_THRESHOLD", 6),
            max_summary_tokens: helpers::env_parsed("ATTENDANT_CONTEXT_MAX_SUMMARY_TOKENS", 1000),
        }
    }
}

/// Structured logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            filter: helpers::env_or("ATTENDANT_LOG_FILTER", "info,attendant=debug"),
        }
    }
}
