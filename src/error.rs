use thiserror::Error;

/// Failures surfaced by engine operations.
///
/// `UnknownAdvisor`, `NotFound` and `InvalidInput` are reported conditions the
/// caller can recover from. `Persistence` means the store rejected the write and
/// the in-memory state was left as it was before the call.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("Unknown advisor: {0}")]
    UnknownAdvisor(String),

    #[error("Prediction not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Persistence failure: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl ScoringError {
    /// Whether this is a domain condition rather than an infrastructure failure.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

pub type ScoringResult<T> = std::result::Result<T, ScoringError>;
