// src/error.rs
// Error types for probe execution

use std::error::Error as StdError;
use std::time::Duration;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::harness::outcome::ErrorKind;

/// Failure of a single network action against the system under test
#[derive(Error, Debug, Clone)]
pub enum ProbeError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

impl ProbeError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn invalid_target(msg: impl Into<String>) -> Self {
        Self::InvalidTarget(msg.into())
    }

    /// Taxonomy bucket reported on the outcome
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProbeError::Connection(_) | ProbeError::InvalidTarget(_) => ErrorKind::ConnectionError,
            ProbeError::Timeout(_) => ErrorKind::Timeout,
            ProbeError::Decode(_) => ErrorKind::DecodeError,
        }
    }
}

/// Probe operation result type
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Flatten an error and its sources into one line.
///
/// reqwest in particular hides the useful part ("Connection refused") in
/// the source chain.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProbeError::Decode(error_chain(&err))
        } else if err.is_builder() {
            ProbeError::InvalidTarget(error_chain(&err))
        } else {
            ProbeError::Connection(error_chain(&err))
        }
    }
}

impl From<tungstenite::Error> for ProbeError {
    fn from(err: tungstenite::Error) -> Self {
        match err {
            tungstenite::Error::Url(e) => ProbeError::InvalidTarget(e.to_string()),
            tungstenite::Error::Http(response) => ProbeError::Connection(format!(
                "handshake rejected with status {}",
                response.status().as_u16()
            )),
            other => ProbeError::Connection(error_chain(&other)),
        }
    }
}
