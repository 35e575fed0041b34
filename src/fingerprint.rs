//! Content fingerprinting
//!
//! A fingerprint is the SHA-256 digest of an asset's complete byte content,
//! rendered as lowercase hex (64 digits, no separators, no `0x`). It proves
//! content identity and is independent of where the bytes are stored.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Length of a hex-encoded SHA-256 digest
pub const FINGERPRINT_HEX_LEN: usize = 64;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Content could not be fully read
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("Failed to read content: {0}")]
    Io(#[from] std::io::Error),

    #[error("Content truncated: expected {expected} bytes, read {actual}")]
    Truncated { expected: u64, actual: u64 },
}

/// A string is not a well-formed fingerprint
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid fingerprint: {0}")]
pub struct InvalidFingerprint(pub String);

/// Hex-encoded SHA-256 digest of an asset's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a fingerprint in either case, normalising to lowercase
    pub fn parse(value: &str) -> Result<Self, InvalidFingerprint> {
        let value = value.trim();
        if value.len() != FINGERPRINT_HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidFingerprint(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Case-insensitive comparison against a stored hex digest
    pub fn matches(&self, stored: &str) -> bool {
        self.0.eq_ignore_ascii_case(stored.trim())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `n` hex digits, for log lines
    pub fn short(&self, n: usize) -> &str {
        &self.0[..n.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = InvalidFingerprint;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(value: Fingerprint) -> Self {
        value.0
    }
}

/// Fingerprint an in-memory buffer
pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(data);
    Fingerprint(hex::encode(hasher.finalize()))
}

/// Fingerprint a byte stream, consuming it to the end before returning
pub async fn fingerprint_reader<R>(reader: R) -> Result<Fingerprint, ReadError>
where
    R: AsyncRead + Unpin,
{
    let (fingerprint, _) = digest_stream(reader).await?;
    Ok(fingerprint)
}

/// Fingerprint a byte stream of known length
///
/// A stream that ends early is a `ReadError::Truncated`.
pub async fn fingerprint_reader_exact<R>(reader: R, expected_len: u64) -> Result<Fingerprint, ReadError>
where
    R: AsyncRead + Unpin,
{
    let (fingerprint, read) = digest_stream(reader).await?;
    if read != expected_len {
        return Err(ReadError::Truncated {
            expected: expected_len,
            actual: read,
        });
    }
    Ok(fingerprint)
}

/// Fingerprint a file on disk
pub async fn fingerprint_file(path: impl AsRef<Path>) -> Result<Fingerprint, ReadError> {
    let file = tokio::fs::File::open(path.as_ref()).await?;
    let expected = file.metadata().await?.len();
    fingerprint_reader_exact(file, expected).await
}

async fn digest_stream<R>(mut reader: R) -> Result<(Fingerprint, u64), ReadError>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];
    let mut total: u64 = 0;

    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
        total += n as u64;
    }

    Ok((Fingerprint(hex::encode(hasher.finalize())), total))
}
