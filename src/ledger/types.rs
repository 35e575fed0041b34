//! Ledger types

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::Fingerprint;
use crate::store::ContentAddress;

// ============================================================================
// Identifiers
// ============================================================================

/// Ledger-assigned asset identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub u64);

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(AssetId)
    }
}

/// Ethereum-style account address: `0x` followed by 40 hex digits
///
/// Stored lowercase so that differently-cased spellings of the same
/// account compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountAddress(String);

/// A string is not a well-formed account address
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid account address: {0}")]
pub struct InvalidAddress(pub String);

impl AccountAddress {
    pub fn parse(value: &str) -> Result<Self, InvalidAddress> {
        let value = value.trim();
        let valid = value.len() == 42
            && value.starts_with("0x")
            && value[2..].bytes().all(|b| b.is_ascii_hexdigit());
        if !valid {
            return Err(InvalidAddress(value.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccountAddress {
    type Error = InvalidAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccountAddress> for String {
    fn from(value: AccountAddress) -> Self {
        value.0
    }
}

// ============================================================================
// Assets
// ============================================================================

/// A registered asset as the ledger reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub description: String,
    pub content_address: ContentAddress,
    /// Hex digest exactly as stored by the ledger
    pub fingerprint: String,
    pub owner: AccountAddress,
    pub created_at: DateTime<Utc>,
    pub transferred_at: DateTime<Utc>,
}

/// Arguments of the registration entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub description: String,
    pub content_address: ContentAddress,
    pub fingerprint: Fingerprint,
}

// ============================================================================
// Confirmations
// ============================================================================

/// Events emitted by the asset contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum LedgerEvent {
    #[serde(rename_all = "camelCase")]
    AssetRegistered {
        asset_id: AssetId,
        owner: AccountAddress,
        content_address: ContentAddress,
        fingerprint: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    AssetTransferred {
        asset_id: AssetId,
        from: AccountAddress,
        to: AccountAddress,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    AssetUpdated {
        asset_id: AssetId,
        owner: AccountAddress,
        timestamp: DateTime<Utc>,
    },
}

/// A finalized ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub transaction_id: String,
    #[serde(default)]
    pub events: Vec<LedgerEvent>,
}

impl Receipt {
    /// Asset id carried by the `AssetRegistered` event, if any
    pub fn registered_asset_id(&self) -> Option<AssetId> {
        self.events.iter().find_map(|event| match event {
            LedgerEvent::AssetRegistered { asset_id, .. } => Some(*asset_id),
            _ => None,
        })
    }

    pub fn has_transfer_of(&self, id: AssetId) -> bool {
        self.events.iter().any(|event| {
            matches!(event, LedgerEvent::AssetTransferred { asset_id, .. } if *asset_id == id)
        })
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Entry points a ledger may expose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerOperation {
    Register,
    Transfer,
    UpdateMetadata,
    GetDetails,
    AssetsByOwner,
    VerifyIntegrity,
    TotalAssets,
    IsAddressRegistered,
    IsFingerprintRegistered,
}

impl LedgerOperation {
    pub const ALL: [LedgerOperation; 9] = [
        LedgerOperation::Register,
        LedgerOperation::Transfer,
        LedgerOperation::UpdateMetadata,
        LedgerOperation::GetDetails,
        LedgerOperation::AssetsByOwner,
        LedgerOperation::VerifyIntegrity,
        LedgerOperation::TotalAssets,
        LedgerOperation::IsAddressRegistered,
        LedgerOperation::IsFingerprintRegistered,
    ];
}

/// Versioned descriptor of supported entry points, declared once at connect time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub version: u32,
    pub operations: BTreeSet<LedgerOperation>,
}

impl Capabilities {
    pub fn all(version: u32) -> Self {
        Self {
            version,
            operations: LedgerOperation::ALL.into_iter().collect(),
        }
    }

    pub fn supports(&self, operation: LedgerOperation) -> bool {
        self.operations.contains(&operation)
    }

    pub fn require(&self, operation: LedgerOperation) -> Result<(), LedgerError> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(LedgerError::Unsupported(operation))
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("No account connected")]
    NotConnected,

    #[error("Asset not found: {0}")]
    AssetNotFound(AssetId),

    #[error("Caller is not the owner of asset {0}")]
    NotOwner(AssetId),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transaction confirmed without the expected event")]
    MissingConfirmation,

    #[error("Ledger unreachable: {0}")]
    Unreachable(String),

    #[error("Ledger does not support {0:?}")]
    Unsupported(LedgerOperation),

    #[error("Ledger returned an invalid response: {0}")]
    InvalidResponse(String),
}
