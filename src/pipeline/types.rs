//! Pipeline types

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::fingerprint::{Fingerprint, InvalidFingerprint, ReadError};
use crate::ledger::{AccountAddress, AssetId, InvalidAddress, LedgerError};
use crate::store::{ContentAddress, StoreError};

// ============================================================================
// Inputs
// ============================================================================

/// Where the bytes of an asset come from
#[derive(Debug, Clone)]
pub enum AssetContent {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl AssetContent {
    /// Read the complete content
    pub async fn read(&self) -> Result<Vec<u8>, ReadError> {
        match self {
            AssetContent::Bytes(data) => Ok(data.clone()),
            AssetContent::File(path) => {
                let data = tokio::fs::read(path).await?;
                Ok(data)
            }
        }
    }

    /// Size in bytes; files are measured without being read
    pub async fn size(&self) -> Result<u64, ReadError> {
        match self {
            AssetContent::Bytes(data) => Ok(data.len() as u64),
            AssetContent::File(path) => Ok(tokio::fs::metadata(path).await?.len()),
        }
    }

    /// Read at most `max + 1` bytes, so growth past the limit is detectable
    /// without buffering the whole file
    pub async fn read_limited(&self, max: u64) -> Result<Vec<u8>, ReadError> {
        match self {
            AssetContent::Bytes(data) => Ok(data.clone()),
            AssetContent::File(path) => {
                let file = tokio::fs::File::open(path).await?;
                let mut data = Vec::new();
                file.take(max.saturating_add(1)).read_to_end(&mut data).await?;
                Ok(data)
            }
        }
    }

    /// Size in bytes, when known without reading
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            AssetContent::Bytes(data) => Some(data.len() as u64),
            AssetContent::File(_) => None,
        }
    }
}

/// A request to register a new asset
#[derive(Debug, Clone)]
pub struct AssetSubmission {
    pub name: String,
    pub description: String,
    pub file_name: String,
    pub content_type: String,
    pub content: AssetContent,
}

// ============================================================================
// Run State
// ============================================================================

/// Registration stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Hashing,
    Uploading,
    Registering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Hashing => "Hashing",
            Stage::Uploading => "Upload",
            Stage::Registering => "Ledger registration",
        };
        f.write_str(name)
    }
}

/// State of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RunState {
    Idle,
    Hashing,
    Uploading,
    Registering,
    #[serde(rename_all = "camelCase")]
    Completed { asset_id: AssetId },
    Failed { stage: Stage, cause: String },
}

impl RunState {
    fn rank(&self) -> u8 {
        match self {
            RunState::Idle => 0,
            RunState::Hashing => 1,
            RunState::Uploading => 2,
            RunState::Registering => 3,
            RunState::Completed { .. } | RunState::Failed { .. } => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed { .. } | RunState::Failed { .. })
    }

    /// The stage being executed, if any
    pub fn active_stage(&self) -> Option<Stage> {
        match self {
            RunState::Hashing => Some(Stage::Hashing),
            RunState::Uploading => Some(Stage::Uploading),
            RunState::Registering => Some(Stage::Registering),
            _ => None,
        }
    }
}

/// Draft shown while a run is in flight; never a committed asset
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingDraft {
    pub pending: bool,
    pub name: String,
    pub description: String,
    pub fingerprint: Option<Fingerprint>,
    pub content_address: Option<ContentAddress>,
}

/// One client-local registration attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    pub id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub draft: PendingDraft,
    pub warnings: Vec<String>,
}

impl PipelineRun {
    pub fn new(name: &str, description: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
            started_at: now,
            updated_at: now,
            draft: PendingDraft {
                pending: true,
                name: name.to_string(),
                description: description.to_string(),
                fingerprint: None,
                content_address: None,
            },
            warnings: Vec::new(),
        }
    }

    /// Move strictly forward; terminal states are final
    pub fn advance(&mut self, next: RunState) -> Result<(), InvalidTransition> {
        if self.state.is_terminal() || next.rank() <= self.state.rank() {
            return Err(InvalidTransition {
                from: self.state.clone(),
                to: next,
            });
        }
        if next.is_terminal() {
            self.draft.pending = false;
        }
        self.state = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid run transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
}

// ============================================================================
// Outcomes
// ============================================================================

/// A confirmed registration
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub run_id: Uuid,
    pub asset_id: AssetId,
    pub owner: AccountAddress,
    pub content_address: ContentAddress,
    pub fingerprint: Fingerprint,
    pub gateway_url: String,
    /// The content address is synthetic, not a real upload
    pub synthetic: bool,
    pub transaction_id: String,
    pub warnings: Vec<String>,
}

/// Verdict of a verification, with the evidence it rests on
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub asset_id: AssetId,
    pub success: bool,
    pub fingerprint: Fingerprint,
    pub stored_fingerprint: String,
    pub message: String,
}

/// A confirmed ownership transfer
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub asset_id: AssetId,
    pub from: AccountAddress,
    pub to: AccountAddress,
    pub transaction_id: String,
}

// ============================================================================
// Errors
// ============================================================================

/// Malformed user input, rejected before any network call
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    #[error(transparent)]
    InvalidFingerprint(#[from] InvalidFingerprint),

    #[error("Invalid asset id: {0}")]
    InvalidAssetId(String),

    #[error("Only image files can be registered, got {0}")]
    InvalidFileType(String),

    #[error("File too large: {size} bytes (max: {max})")]
    FileTooLarge { size: u64, max: u64 },

    #[error("New owner is already the owner")]
    SelfTransfer,

    #[error("An identical registration is already in progress")]
    DuplicateSubmission,
}

/// Failure of a single stage
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Registration failure
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Ledger not ready: {0}")]
    NotReady(#[source] LedgerError),

    #[error("{stage} stage failed: {cause}")]
    Failed {
        stage: Stage,
        #[source]
        cause: StageError,
    },
}

impl PipelineError {
    /// The stage that failed, if the run got that far
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Failed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Verification could not reach a verdict
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Could not verify asset {asset_id}: {reason}")]
    Inconclusive { asset_id: AssetId, reason: String },

    #[error("Could not read presented file: {0}")]
    Read(#[from] ReadError),
}

/// Transfer and metadata update failures
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_moves_forward() {
        let mut run = PipelineRun::new("name", "desc");
        run.advance(RunState::Hashing).unwrap();
        run.advance(RunState::Uploading).unwrap();
        run.advance(RunState::Registering).unwrap();
        run.advance(RunState::Completed { asset_id: AssetId(1) }).unwrap();
        assert!(!run.draft.pending);
    }

    #[test]
    fn test_run_rejects_backwards_and_retry_in_place() {
        let mut run = PipelineRun::new("name", "desc");
        run.advance(RunState::Hashing).unwrap();
        run.advance(RunState::Uploading).unwrap();
        assert!(run.advance(RunState::Hashing).is_err());
        assert!(run.advance(RunState::Uploading).is_err());

        run.advance(RunState::Failed {
            stage: Stage::Uploading,
            cause: "down".to_string(),
        })
        .unwrap();
        assert!(run.advance(RunState::Registering).is_err());
        assert!(run.advance(RunState::Idle).is_err());
    }

    #[test]
    fn test_failed_from_any_active_stage() {
        let mut run = PipelineRun::new("name", "desc");
        run.advance(RunState::Hashing).unwrap();
        assert_eq!(run.state.active_stage(), Some(Stage::Hashing));
        run.advance(RunState::Failed {
            stage: Stage::Hashing,
            cause: "io".to_string(),
        })
        .unwrap();
        assert!(run.state.is_terminal());
    }

    #[test]
    fn test_error_names_stage() {
        let err = PipelineError::Failed {
            stage: Stage::Uploading,
            cause: StageError::Store(StoreError::Request("timeout".to_string())),
        };
        assert_eq!(err.to_string(), "Upload stage failed: Content store request failed: timeout");
        assert_eq!(err.stage(), Some(Stage::Uploading));
    }

    #[tokio::test]
    async fn test_content_from_missing_file() {
        let content = AssetContent::File(PathBuf::from("/nonexistent/image.png"));
        assert!(matches!(content.read().await, Err(ReadError::Io(_))));
        assert!(matches!(content.size().await, Err(ReadError::Io(_))));
    }

    #[tokio::test]
    async fn test_read_limited_stops_past_limit() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 10]).unwrap();
        file.flush().unwrap();

        let content = AssetContent::File(file.path().to_path_buf());
        assert_eq!(content.size().await.unwrap(), 10);
        assert_eq!(content.read_limited(4).await.unwrap().len(), 5);
        assert_eq!(content.read_limited(64).await.unwrap().len(), 10);
    }
}
