//! In-process ledger
//!
//! Mirrors the asset contract's observable behavior: sequential ids from 1,
//! exclusive ownership, one registration per content address and per
//! fingerprint, ledger-set timestamps and an event log.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::fingerprint::Fingerprint;
use crate::store::ContentAddress;

use super::provider::Ledger;
use super::types::{
    AccountAddress, Asset, AssetId, Capabilities, LedgerError, LedgerEvent, Receipt,
    RegisterRequest,
};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// In-memory asset ledger
#[derive(Clone)]
pub struct MemoryLedger {
    inner: Arc<MemoryLedgerInner>,
}

struct MemoryLedgerInner {
    state: RwLock<LedgerState>,
    capabilities: Capabilities,
    reachable: AtomicBool,
    /// Time a mutating call waits before it is final
    confirmation_delay: Duration,
    tx_counter: AtomicU64,
}

#[derive(Default)]
struct LedgerState {
    assets: BTreeMap<AssetId, Asset>,
    by_owner: HashMap<AccountAddress, Vec<AssetId>>,
    addresses: HashSet<String>,
    fingerprints: HashSet<String>,
    events: Vec<LedgerEvent>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl LedgerState {
    /// Ledger time never runs backwards
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn owned_asset(&self, caller: &AccountAddress, asset_id: AssetId) -> Result<&Asset, LedgerError> {
        let asset = self
            .assets
            .get(&asset_id)
            .ok_or(LedgerError::AssetNotFound(asset_id))?;
        if &asset.owner != caller {
            return Err(LedgerError::NotOwner(asset_id));
        }
        Ok(asset)
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::with_options(Capabilities::all(1), Duration::ZERO)
    }

    /// Create with a custom capability set and confirmation delay
    pub fn with_options(capabilities: Capabilities, confirmation_delay: Duration) -> Self {
        Self {
            inner: Arc::new(MemoryLedgerInner {
                state: RwLock::new(LedgerState::default()),
                capabilities,
                reachable: AtomicBool::new(true),
                confirmation_delay,
                tx_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Simulate the network going away (or coming back)
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Every event emitted so far, in order
    pub async fn events(&self) -> Vec<LedgerEvent> {
        self.inner.state.read().await.events.clone()
    }

    fn check_reachable(&self) -> Result<(), LedgerError> {
        if self.inner.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(LedgerError::Unreachable("memory ledger offline".to_string()))
        }
    }

    async fn await_confirmation(&self) {
        if !self.inner.confirmation_delay.is_zero() {
            tokio::time::sleep(self.inner.confirmation_delay).await;
        }
    }

    fn next_transaction_id(&self) -> String {
        let n = self.inner.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("0x{:064x}", n)
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn capabilities(&self) -> Result<Capabilities, LedgerError> {
        self.check_reachable()?;
        Ok(self.inner.capabilities.clone())
    }

    async fn register(
        &self,
        caller: &AccountAddress,
        request: &RegisterRequest,
    ) -> Result<Receipt, LedgerError> {
        self.check_reachable()?;
        self.await_confirmation().await;

        let mut state = self.inner.state.write().await;

        if request.name.trim().is_empty() {
            return Err(LedgerError::Rejected("Name cannot be empty".to_string()));
        }
        if state.addresses.contains(request.content_address.as_str()) {
            return Err(LedgerError::AlreadyRegistered(format!(
                "content address {}",
                request.content_address
            )));
        }
        if state.fingerprints.contains(request.fingerprint.as_str()) {
            return Err(LedgerError::AlreadyRegistered(format!(
                "fingerprint {}",
                request.fingerprint
            )));
        }

        let asset_id = AssetId(state.assets.len() as u64 + 1);
        let timestamp = state.next_timestamp();
        let asset = Asset {
            id: asset_id,
            name: request.name.clone(),
            description: request.description.clone(),
            content_address: request.content_address.clone(),
            fingerprint: request.fingerprint.as_str().to_string(),
            owner: caller.clone(),
            created_at: timestamp,
            transferred_at: timestamp,
        };

        state.assets.insert(asset_id, asset);
        state.by_owner.entry(caller.clone()).or_default().push(asset_id);
        state.addresses.insert(request.content_address.as_str().to_string());
        state.fingerprints.insert(request.fingerprint.as_str().to_string());

        let event = LedgerEvent::AssetRegistered {
            asset_id,
            owner: caller.clone(),
            content_address: request.content_address.clone(),
            fingerprint: request.fingerprint.as_str().to_string(),
            timestamp,
        };
        state.events.push(event.clone());

        tracing::debug!(asset_id = %asset_id, owner = %caller, "Memory ledger registered asset");

        Ok(Receipt {
            transaction_id: self.next_transaction_id(),
            events: vec![event],
        })
    }

    async fn transfer(
        &self,
        caller: &AccountAddress,
        asset_id: AssetId,
        new_owner: &AccountAddress,
    ) -> Result<Receipt, LedgerError> {
        self.check_reachable()?;
        self.await_confirmation().await;

        if new_owner.as_str() == ZERO_ADDRESS {
            return Err(LedgerError::Rejected("Invalid new owner".to_string()));
        }

        let mut state = self.inner.state.write().await;
        state.owned_asset(caller, asset_id)?;

        let timestamp = state.next_timestamp();
        if let Some(ids) = state.by_owner.get_mut(caller) {
            ids.retain(|id| *id != asset_id);
        }
        state.by_owner.entry(new_owner.clone()).or_default().push(asset_id);
        if let Some(asset) = state.assets.get_mut(&asset_id) {
            asset.owner = new_owner.clone();
            asset.transferred_at = timestamp;
        }

        let event = LedgerEvent::AssetTransferred {
            asset_id,
            from: caller.clone(),
            to: new_owner.clone(),
            timestamp,
        };
        state.events.push(event.clone());

        Ok(Receipt {
            transaction_id: self.next_transaction_id(),
            events: vec![event],
        })
    }

    async fn update_metadata(
        &self,
        caller: &AccountAddress,
        asset_id: AssetId,
        name: &str,
        description: &str,
    ) -> Result<Receipt, LedgerError> {
        self.check_reachable()?;
        self.await_confirmation().await;

        let mut state = self.inner.state.write().await;
        state.owned_asset(caller, asset_id)?;

        let timestamp = state.next_timestamp();
        if let Some(asset) = state.assets.get_mut(&asset_id) {
            asset.name = name.to_string();
            asset.description = description.to_string();
        }

        let event = LedgerEvent::AssetUpdated {
            asset_id,
            owner: caller.clone(),
            timestamp,
        };
        state.events.push(event.clone());

        Ok(Receipt {
            transaction_id: self.next_transaction_id(),
            events: vec![event],
        })
    }

    async fn get_details(&self, asset_id: AssetId) -> Result<Asset, LedgerError> {
        self.check_reachable()?;
        let state = self.inner.state.read().await;
        state
            .assets
            .get(&asset_id)
            .cloned()
            .ok_or(LedgerError::AssetNotFound(asset_id))
    }

    async fn assets_by_owner(&self, owner: &AccountAddress) -> Result<Vec<AssetId>, LedgerError> {
        self.check_reachable()?;
        let state = self.inner.state.read().await;
        Ok(state.by_owner.get(owner).cloned().unwrap_or_default())
    }

    async fn verify_integrity(
        &self,
        asset_id: AssetId,
        fingerprint: &Fingerprint,
    ) -> Result<bool, LedgerError> {
        self.check_reachable()?;
        let state = self.inner.state.read().await;
        let asset = state
            .assets
            .get(&asset_id)
            .ok_or(LedgerError::AssetNotFound(asset_id))?;
        Ok(fingerprint.matches(&asset.fingerprint))
    }

    async fn total_assets(&self) -> Result<u64, LedgerError> {
        self.check_reachable()?;
        Ok(self.inner.state.read().await.assets.len() as u64)
    }

    async fn is_address_registered(&self, address: &ContentAddress) -> Result<bool, LedgerError> {
        self.check_reachable()?;
        Ok(self.inner.state.read().await.addresses.contains(address.as_str()))
    }

    async fn is_fingerprint_registered(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerError> {
        self.check_reachable()?;
        Ok(self
            .inner
            .state
            .read()
            .await
            .fingerprints
            .contains(fingerprint.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;

    fn account(digit: char) -> AccountAddress {
        AccountAddress::parse(&format!("0x{}", digit.to_string().repeat(40))).unwrap()
    }

    fn request(content: &[u8], address: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Cosmic Horizon".to_string(),
            description: "Artwork".to_string(),
            content_address: ContentAddress::new(address),
            fingerprint: fingerprint(content),
        }
    }

    #[tokio::test]
    async fn test_register_assigns_sequential_ids() {
        let ledger = MemoryLedger::new();
        let owner = account('1');

        let first = ledger.register(&owner, &request(b"a", "QmA")).await.unwrap();
        let second = ledger.register(&owner, &request(b"b", "QmB")).await.unwrap();

        assert_eq!(first.registered_asset_id(), Some(AssetId(1)));
        assert_eq!(second.registered_asset_id(), Some(AssetId(2)));
        assert_eq!(ledger.total_assets().await.unwrap(), 2);
        assert_eq!(
            ledger.assets_by_owner(&owner).await.unwrap(),
            vec![AssetId(1), AssetId(2)]
        );
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let ledger = MemoryLedger::new();
        let owner = account('1');
        ledger.register(&owner, &request(b"a", "QmA")).await.unwrap();

        let same_hash = ledger.register(&owner, &request(b"a", "QmOther")).await;
        assert!(matches!(same_hash, Err(LedgerError::AlreadyRegistered(_))));

        let same_address = ledger.register(&owner, &request(b"b", "QmA")).await;
        assert!(matches!(same_address, Err(LedgerError::AlreadyRegistered(_))));

        assert!(ledger.is_address_registered(&ContentAddress::new("QmA")).await.unwrap());
        assert!(ledger.is_fingerprint_registered(&fingerprint(b"a")).await.unwrap());
        assert!(!ledger.is_fingerprint_registered(&fingerprint(b"b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_moves_ownership() {
        let ledger = MemoryLedger::new();
        let alice = account('1');
        let bob = account('2');
        let id = ledger
            .register(&alice, &request(b"a", "QmA"))
            .await
            .unwrap()
            .registered_asset_id()
            .unwrap();

        let receipt = ledger.transfer(&alice, id, &bob).await.unwrap();
        assert!(receipt.has_transfer_of(id));

        let asset = ledger.get_details(id).await.unwrap();
        assert_eq!(asset.owner, bob);
        assert!(asset.transferred_at >= asset.created_at);
        assert!(ledger.assets_by_owner(&alice).await.unwrap().is_empty());
        assert_eq!(ledger.assets_by_owner(&bob).await.unwrap(), vec![id]);

        // Alice no longer owns it
        let again = ledger.transfer(&alice, id, &bob).await;
        assert!(matches!(again, Err(LedgerError::NotOwner(_))));
    }

    #[tokio::test]
    async fn test_transfer_to_zero_address_rejected() {
        let ledger = MemoryLedger::new();
        let alice = account('1');
        ledger.register(&alice, &request(b"a", "QmA")).await.unwrap();

        let zero = AccountAddress::parse(ZERO_ADDRESS).unwrap();
        let result = ledger.transfer(&alice, AssetId(1), &zero).await;
        assert!(matches!(result, Err(LedgerError::Rejected(_))));
    }

    #[tokio::test]
    async fn test_update_metadata_owner_only() {
        let ledger = MemoryLedger::new();
        let alice = account('1');
        ledger.register(&alice, &request(b"a", "QmA")).await.unwrap();

        let denied = ledger
            .update_metadata(&account('2'), AssetId(1), "New", "Desc")
            .await;
        assert!(matches!(denied, Err(LedgerError::NotOwner(_))));

        ledger
            .update_metadata(&alice, AssetId(1), "New", "Desc")
            .await
            .unwrap();
        let asset = ledger.get_details(AssetId(1)).await.unwrap();
        assert_eq!(asset.name, "New");
        assert_eq!(asset.fingerprint, fingerprint(b"a").as_str());
    }

    #[tokio::test]
    async fn test_verify_integrity() {
        let ledger = MemoryLedger::new();
        ledger.register(&account('1'), &request(b"a", "QmA")).await.unwrap();

        assert!(ledger.verify_integrity(AssetId(1), &fingerprint(b"a")).await.unwrap());
        assert!(!ledger.verify_integrity(AssetId(1), &fingerprint(b"b")).await.unwrap());
        assert!(matches!(
            ledger.verify_integrity(AssetId(9), &fingerprint(b"a")).await,
            Err(LedgerError::AssetNotFound(AssetId(9)))
        ));
    }

    #[tokio::test]
    async fn test_unreachable() {
        let ledger = MemoryLedger::new();
        ledger.set_reachable(false);
        assert!(matches!(
            ledger.get_details(AssetId(1)).await,
            Err(LedgerError::Unreachable(_))
        ));
        ledger.set_reachable(true);
        assert!(matches!(
            ledger.get_details(AssetId(1)).await,
            Err(LedgerError::AssetNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_event_log_order() {
        let ledger = MemoryLedger::new();
        let alice = account('1');
        ledger.register(&alice, &request(b"a", "QmA")).await.unwrap();
        ledger.transfer(&alice, AssetId(1), &account('2')).await.unwrap();

        let events = ledger.events().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LedgerEvent::AssetRegistered { .. }));
        assert!(matches!(events[1], LedgerEvent::AssetTransferred { .. }));
    }
}
