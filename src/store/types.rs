//! Content store types

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix that marks an address produced by the offline store
pub const SYNTHETIC_PREFIX: &str = "mock-ipfs-";

/// Opaque locator returned by the content store for uploaded bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Produced by the offline store rather than a real upload
    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with(SYNTHETIC_PREFIX)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Descriptive metadata sent alongside the bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub file_name: String,
    pub content_type: String,
    pub description: String,
}

/// Content store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Content store credentials are not configured")]
    MissingCredentials,

    #[error("Content store request failed: {0}")]
    Request(String),

    #[error("Content store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Content store returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        StoreError::Request(e.to_string())
    }
}
