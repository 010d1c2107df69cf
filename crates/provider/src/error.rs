use thiserror::Error;

/// Failure surface of the provider. `Transient` failures are retried by the
/// workers that hit them; everything else is reported to the caller with no
/// state changed.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Date out of representable range: {0}")]
    OutOfRange(i64),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Entity not found: {0}")]
    NotFound(String),
    #[error("Storage unavailable")]
    ResourceUnavailable,
    #[error("Internal error")]
    Transient(#[from] anyhow::Error),
}

impl From<almanac_domain::RecurrenceError> for ProviderError {
    fn from(e: almanac_domain::RecurrenceError) -> Self {
        match e {
            almanac_domain::RecurrenceError::InvalidFormat(s) => Self::InvalidArgument(s),
            almanac_domain::RecurrenceError::OutOfRange(ms) => Self::OutOfRange(ms),
        }
    }
}
