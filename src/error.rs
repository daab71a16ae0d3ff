// src/error.rs
// Crate-wide error types.

use thiserror::Error;

/// Errors surfaced by [`crate::rate_gate::RateGate`].
#[derive(Debug, Error)]
pub enum RateGateError {
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error(transparent)]
    Inner(#[from] anyhow::Error),
}

/// Classification of an upstream API failure, used by [`crate::rate_gate::RateGate`]
/// to decide whether a call is retryable.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("rate limited{}", retry_after.map(|s| format!(" (retry after {s}s)")).unwrap_or_default())]
    RateLimited { retry_after: Option<f64> },

    #[error("not found")]
    NotFound,

    #[error("not a member of this conversation")]
    NotMember,

    #[error("permission denied")]
    PermissionDenied,

    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream error: {0}")]
    Other(String),
}

impl UpstreamError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }

    pub fn retry_after(&self) -> Option<f64> {
        match self {
            UpstreamError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Errors surfaced by [`crate::store::Store`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("vector store error: {0}")]
    Vector(String),

    #[error("conflict that idempotent upsert should have prevented: {0}")]
    Conflict(String),
}

/// Errors surfaced by the agent conversation loop.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("maximum iterations ({0}) reached")]
    MaxIterationsReached(u32),

    #[error("language model error: {0}")]
    Llm(#[from] anyhow::Error),
}
