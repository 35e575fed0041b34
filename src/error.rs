//! Error types for the Asset Vault server

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::ledger::LedgerError;
use crate::pipeline::{
    OperationError, PipelineError, Stage, StageError, ValidationError, VerificationError,
};
use crate::store::StoreError;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
}

fn validation_status(e: &ValidationError) -> (StatusCode, &'static str) {
    match e {
        ValidationError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
        ValidationError::InvalidFileType(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, "INVALID_FILE_TYPE"),
        ValidationError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS"),
        ValidationError::DuplicateSubmission => (StatusCode::CONFLICT, "DUPLICATE_SUBMISSION"),
        _ => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
    }
}

fn ledger_status(e: &LedgerError) -> (StatusCode, &'static str) {
    match e {
        LedgerError::NotConnected => (StatusCode::UNAUTHORIZED, "NOT_CONNECTED"),
        LedgerError::AssetNotFound(_) => (StatusCode::NOT_FOUND, "ASSET_NOT_FOUND"),
        LedgerError::NotOwner(_) => (StatusCode::FORBIDDEN, "NOT_OWNER"),
        LedgerError::AlreadyRegistered(_) => (StatusCode::CONFLICT, "ALREADY_REGISTERED"),
        LedgerError::Rejected(_) => (StatusCode::UNPROCESSABLE_ENTITY, "LEDGER_REJECTED"),
        LedgerError::MissingConfirmation => (StatusCode::BAD_GATEWAY, "MISSING_CONFIRMATION"),
        LedgerError::Unreachable(_) => (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_UNREACHABLE"),
        LedgerError::Unsupported(_) => (StatusCode::NOT_IMPLEMENTED, "LEDGER_UNSUPPORTED"),
        LedgerError::InvalidResponse(_) => (StatusCode::BAD_GATEWAY, "LEDGER_INVALID_RESPONSE"),
    }
}

fn store_status(e: &StoreError) -> (StatusCode, &'static str) {
    match e {
        StoreError::MissingCredentials => (StatusCode::SERVICE_UNAVAILABLE, "STORE_NOT_CONFIGURED"),
        _ => (StatusCode::BAD_GATEWAY, "STORE_ERROR"),
    }
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, Option<Stage>) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            AppError::Multipart(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            AppError::Validation(e) => {
                let (status, code) = validation_status(e);
                (status, code, None)
            }
            AppError::Ledger(e) => {
                let (status, code) = ledger_status(e);
                (status, code, None)
            }
            AppError::Operation(OperationError::Validation(e)) => {
                let (status, code) = validation_status(e);
                (status, code, None)
            }
            AppError::Operation(OperationError::Ledger(e)) => {
                let (status, code) = ledger_status(e);
                (status, code, None)
            }
            AppError::Verification(VerificationError::Inconclusive { .. }) => {
                (StatusCode::SERVICE_UNAVAILABLE, "VERIFICATION_INCONCLUSIVE", None)
            }
            AppError::Verification(VerificationError::Read(_)) => {
                (StatusCode::BAD_REQUEST, "READ_ERROR", None)
            }
            AppError::Pipeline(PipelineError::Validation(e)) => {
                let (status, code) = validation_status(e);
                (status, code, None)
            }
            AppError::Pipeline(PipelineError::NotReady(e)) => {
                let (status, code) = ledger_status(e);
                (status, code, None)
            }
            AppError::Pipeline(PipelineError::Failed { stage, cause }) => {
                let (status, code) = match cause {
                    StageError::Read(_) => (StatusCode::BAD_REQUEST, "READ_ERROR"),
                    StageError::Validation(e) => validation_status(e),
                    StageError::Store(e) => store_status(e),
                    StageError::Ledger(e) => ledger_status(e),
                };
                (status, code, Some(*stage))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, stage) = self.classify();

        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }
        let message = self.to_string();

        let body = Json(ErrorResponse {
            error: code,
            message,
            stage,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::AssetId;

    #[test]
    fn test_inconclusive_is_not_a_client_error() {
        let err = AppError::from(VerificationError::Inconclusive {
            asset_id: AssetId(9),
            reason: "Asset not found: 9".to_string(),
        });
        let (status, code, _) = err.classify();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(code, "VERIFICATION_INCONCLUSIVE");
    }

    #[test]
    fn test_failed_stage_reported() {
        let err = AppError::from(PipelineError::Failed {
            stage: Stage::Registering,
            cause: StageError::Ledger(LedgerError::Rejected("reverted".to_string())),
        });
        let (status, code, stage) = err.classify();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(code, "LEDGER_REJECTED");
        assert_eq!(stage, Some(Stage::Registering));
        assert!(err.to_string().contains("reverted"));
    }

    #[test]
    fn test_duplicate_submission_conflict() {
        let err = AppError::from(PipelineError::Failed {
            stage: Stage::Hashing,
            cause: StageError::Validation(ValidationError::DuplicateSubmission),
        });
        let (status, code, stage) = err.classify();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(code, "DUPLICATE_SUBMISSION");
        assert_eq!(stage, Some(Stage::Hashing));
    }
}
