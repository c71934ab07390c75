use thiserror::Error;

/// Failure taxonomy shared by the lifecycle engine and the HTTP layer.
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Bad input shape or size.  Recoverable: the user corrects and resubmits.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Authorization denial.  Not retryable.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Missing profile or complaint.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Provider-level failure.  The record is left unchanged.
    #[error("Persistence error: {0}")]
    Persistence(String),
}
