use thiserror::Error;

/// Failures that can occur during or after backend dispatch.
///
/// Validation, authentication, authorization and rate-limit outcomes are
/// decided at the HTTP layer before any backend resource is spent and are
/// deliberately not part of this taxonomy. Everything here is caught by the
/// orchestrator and folded into a well-formed `ExecutionResult`.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The judge polling budget or a sandbox/orchestrator watchdog expired.
    /// Distinct from the judge's own "Time Limit Exceeded" verdict, which is
    /// a normal terminal status.
    #[error("Code execution timed out after {0}s")]
    ExecutionTimeout(u64),

    #[error("judge transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("container engine error: {0}")]
    Docker(#[from] bollard::errors::Error),

    #[error("sandbox I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to fetch file: {0}")]
    ContentFetch(String),

    #[error("{0}")]
    Internal(String),
}
