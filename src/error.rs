//! Error types for capture, query and export operations
//!
//! Two families are kept apart: [`SondaError`] for things the library itself
//! reports (bad filter, bad config, unsupported export), and [`TransportError`]
//! for failures of the intercepted transports, whose text ends up in a
//! record's `errorText` and is handed back to the caller untouched.

use crate::record::TransportKind;
use thiserror::Error;

/// Errors reported by the session, filters, configuration and exporters
#[derive(Debug, Error)]
pub enum SondaError {
    #[error("invalid URL pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),

    #[error("{0} records cannot be rendered as a cURL command")]
    UnsupportedKind(TransportKind),

    #[error("no record at index {0}")]
    NoRecord(usize),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure of an underlying transport
///
/// Cloneable so the interceptor can keep the text for the record while the
/// original error value propagates to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("network error: {0}")]
    Network(String),

    #[error("aborted")]
    Aborted,

    #[error("connection closed")]
    Closed,

    #[error("rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, SondaError>;
