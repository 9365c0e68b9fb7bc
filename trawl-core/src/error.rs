use std::time::Duration;
use thiserror::Error;
use trawl_probes::ProbeError;

#[derive(Error, Debug)]
pub enum TrawlError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checker error: {0}")]
    Checker(#[from] CheckerError),
}

impl TrawlError {
    /// Errors caused by the caller's input rather than by the service.
    pub fn is_input_error(&self) -> bool {
        matches!(self, TrawlError::InvalidUrl(_) | TrawlError::InvalidInput(_))
    }
}

/// Failure of a single checker. Recorded on that checker's result, never
/// propagated out of an evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckerError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<ProbeError> for CheckerError {
    fn from(err: ProbeError) -> Self {
        match err {
            ProbeError::MissingApiKey(service) => {
                CheckerError::Unavailable(format!("{} API key not configured", service))
            }
            other => CheckerError::Failed(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrawlError>;
