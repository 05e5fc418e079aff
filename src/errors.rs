//! Error types for the enrollment pipeline

use thiserror::Error;

/// Main error type for a single enrollment run.
#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("HOTP seed is empty")]
    EmptySeed,

    #[error("Activation failed: {0}")]
    Activation(#[from] ActivationError),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of the activation request, classified by the layer that failed.
#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The raw body is kept so it can be shown in diagnostics mode.
    #[error("could not decode provider response: {source}")]
    Decode {
        source: serde_json::Error,
        body: String,
    },

    #[error("provider rejected the activation (HTTP {status}, stat {stat}): {reason}")]
    Rejected {
        status: u16,
        stat: String,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else {
            TransportError::Other(err.to_string())
        }
    }
}
