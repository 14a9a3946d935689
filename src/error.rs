//! Error types shared across the benchmark engine.

use thiserror::Error;

/// The result type used throughout the library.
pub type Result<T> = std::result::Result<T, BenchError>;

#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid configuration or malformed user input. Always fatal before
    /// any run starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transport-level failure for a single request (connect, timeout,
    /// body read). Recorded per-outcome by callers, never fatal to a run.
    #[error("request failed: {0}")]
    Request(String),

    /// Non-2xx response from the target. Treated identically to a
    /// transport error by the statistics path.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Deployment, readiness-wait, or endpoint-resolution failure from
    /// the deployment manager collaborator.
    #[error("deployment error: {0}")]
    Deployment(String),

    /// A single-shot run completed with zero successful iterations.
    #[error("all iterations failed")]
    AllIterationsFailed,

    /// Report output could not be written. A requested report that cannot
    /// be produced is a contract violation, so this is always surfaced.
    #[error("report I/O error: {0}")]
    Report(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for BenchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BenchError::Request("request timeout - target did not respond in time".to_string())
        } else if err.is_connect() {
            BenchError::Request("connection failed - unable to reach target".to_string())
        } else {
            BenchError::Request(err.to_string())
        }
    }
}

impl From<url::ParseError> for BenchError {
    fn from(err: url::ParseError) -> Self {
        BenchError::Config(format!("invalid URL: {err}"))
    }
}
