//! Errors raised by the KV/ranking store.
//!
//! These never become caller-visible results: the cache-aside layer and the
//! analytics engine log them and carry on.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("KV store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("KV command {command} timed out after {after:?}")]
    Timeout { command: &'static str, after: Duration },

    #[error("KV command {command} failed: {reason}")]
    Command {
        command: &'static str,
        reason: String,
    },

    #[error("Cache value (de)serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Invalid cache key: {key}")]
    InvalidKey { key: String },
}

impl CacheError {
    pub fn command(command: &'static str, reason: impl ToString) -> Self {
        CacheError::Command {
            command,
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization {
            reason: err.to_string(),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;
