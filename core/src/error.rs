//! Error types for the HAT client.
//!
//! # Design
//! `HatError` is a closed set. Every call surfaces exactly one of these
//! kinds through its error path; nothing in the core retries or panics.
//! `GeneralError` keeps the originating transport failure (when there is one)
//! as its `source` so diagnostics survive classification.
//!
//! `TransportError` is what a `Transport` reports when no HTTP exchange
//! completed. It is plain data (`Clone + Eq`) so outcomes can be compared in
//! tests and moved across tasks freely.

use thiserror::Error;

/// Message attached to `GeneralError` when the server or transport failed.
pub const SERVER_ERROR_MESSAGE: &str = "Server responded with error";

/// Message attached to `GeneralError` for 401 responses.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Every way a HAT call can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HatError {
    /// The request timed out or the device is offline.
    #[error("no internet connection")]
    NoInternetConnection,

    /// Catch-all for server and transport failures.
    #[error("{message}{}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    GeneralError {
        message: String,
        status: Option<u16>,
        #[source]
        cause: Option<TransportError>,
    },

    /// The exchange succeeded but carried no usable result.
    #[error("no values found")]
    NoValuesFound,

    /// The data table addressed by namespace/scope does not exist (404).
    #[error("table does not exist")]
    TableDoesNotExist,

    /// A field the caller relies on is missing from an otherwise valid body.
    #[error("expected field `{0}` not found")]
    ExpectedFieldNotFound(&'static str),
}

impl HatError {
    pub fn general(message: impl Into<String>, status: Option<u16>) -> Self {
        HatError::GeneralError {
            message: message.into(),
            status,
            cause: None,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HatError::GeneralError { status, .. } => *status,
            HatError::TableDoesNotExist => Some(404),
            _ => None,
        }
    }

    /// True when the server rejected the token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, HatError::GeneralError { status: Some(401), .. })
    }
}

/// Broad category of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    TimedOut,
    Offline,
    Other,
}

/// A failure below HTTP: no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Other, message)
    }
}
