//! Ledger trait
//!
//! The asset contract's entry points, keyed by asset id. Mutating calls
//! take the calling account and resolve once the transaction is final.

use async_trait::async_trait;

use crate::fingerprint::Fingerprint;
use crate::store::ContentAddress;

use super::types::{
    AccountAddress, Asset, AssetId, Capabilities, LedgerError, Receipt, RegisterRequest,
};

/// System of record for asset ownership and metadata
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Declare the supported entry points
    async fn capabilities(&self) -> Result<Capabilities, LedgerError>;

    /// Register a new asset owned by `caller`
    async fn register(
        &self,
        caller: &AccountAddress,
        request: &RegisterRequest,
    ) -> Result<Receipt, LedgerError>;

    /// Reassign ownership of an asset owned by `caller`
    async fn transfer(
        &self,
        caller: &AccountAddress,
        asset_id: AssetId,
        new_owner: &AccountAddress,
    ) -> Result<Receipt, LedgerError>;

    /// Replace name and description of an asset owned by `caller`
    async fn update_metadata(
        &self,
        caller: &AccountAddress,
        asset_id: AssetId,
        name: &str,
        description: &str,
    ) -> Result<Receipt, LedgerError>;

    async fn get_details(&self, asset_id: AssetId) -> Result<Asset, LedgerError>;

    async fn assets_by_owner(&self, owner: &AccountAddress) -> Result<Vec<AssetId>, LedgerError>;

    /// Compare a fingerprint against the one stored for `asset_id`
    async fn verify_integrity(
        &self,
        asset_id: AssetId,
        fingerprint: &Fingerprint,
    ) -> Result<bool, LedgerError>;

    async fn total_assets(&self) -> Result<u64, LedgerError>;

    async fn is_address_registered(&self, address: &ContentAddress) -> Result<bool, LedgerError>;

    async fn is_fingerprint_registered(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerError>;
}
