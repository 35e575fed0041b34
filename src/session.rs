//! Account session and ledger context
//!
//! The ledger handle and the connected account are constructed once at
//! startup and shared by reference. Account and network changes are driven
//! from outside the pipeline; every change is published on a broadcast
//! channel so caches can invalidate themselves.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::ledger::{AccountAddress, Capabilities, Ledger, LedgerError, LedgerOperation};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Session change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    AccountChanged { account: AccountAddress },
    Disconnected,
    /// The previous account is dropped; callers must reconnect
    NetworkChanged { network: String },
}

/// Snapshot of the session for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub account: Option<AccountAddress>,
    pub network: String,
    pub connected: bool,
}

/// The connected account
#[derive(Clone)]
pub struct AccountSession {
    inner: Arc<AccountSessionInner>,
}

struct AccountSessionInner {
    state: RwLock<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

struct SessionState {
    account: Option<AccountAddress>,
    network: String,
}

impl AccountSession {
    pub fn new(network: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(AccountSessionInner {
                state: RwLock::new(SessionState {
                    account: None,
                    network: network.into(),
                }),
                events,
            }),
        }
    }

    /// Connect (or switch to) an account
    pub fn connect(&self, account: AccountAddress) {
        {
            let mut state = self.inner.state.write();
            if state.account.as_ref() == Some(&account) {
                return;
            }
            state.account = Some(account.clone());
        }
        tracing::info!(account = %account, "Account connected");
        self.publish(SessionEvent::AccountChanged { account });
    }

    pub fn disconnect(&self) {
        let previous = self.inner.state.write().account.take();
        if previous.is_some() {
            tracing::info!("Account disconnected");
            self.publish(SessionEvent::Disconnected);
        }
    }

    /// Switch networks; the account must reconnect afterwards
    pub fn switch_network(&self, network: impl Into<String>) {
        let network = network.into();
        {
            let mut state = self.inner.state.write();
            if state.network == network {
                return;
            }
            state.network = network.clone();
            state.account = None;
        }
        tracing::info!(network = %network, "Network changed, account cleared");
        self.publish(SessionEvent::NetworkChanged { network });
    }

    pub fn account(&self) -> Option<AccountAddress> {
        self.inner.state.read().account.clone()
    }

    /// The connected account, or `LedgerError::NotConnected`
    pub fn require_account(&self) -> Result<AccountAddress, LedgerError> {
        self.account().ok_or(LedgerError::NotConnected)
    }

    pub fn network(&self) -> String {
        self.inner.state.read().network.clone()
    }

    pub fn info(&self) -> SessionInfo {
        let state = self.inner.state.read();
        SessionInfo {
            account: state.account.clone(),
            network: state.network.clone(),
            connected: state.account.is_some(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}

/// Ledger handle, account session and the capabilities declared at connect time
#[derive(Clone)]
pub struct LedgerContext {
    ledger: Arc<dyn Ledger>,
    session: AccountSession,
    capabilities: Capabilities,
}

impl LedgerContext {
    /// Connect to a ledger and record the entry points it declares
    pub async fn connect(ledger: Arc<dyn Ledger>, session: AccountSession) -> Result<Self, LedgerError> {
        let capabilities = ledger.capabilities().await?;
        tracing::info!(
            version = capabilities.version,
            operations = capabilities.operations.len(),
            "Ledger capabilities declared"
        );
        Ok(Self {
            ledger,
            session,
            capabilities,
        })
    }

    pub fn ledger(&self) -> &dyn Ledger {
        self.ledger.as_ref()
    }

    pub fn session(&self) -> &AccountSession {
        &self.session
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Fail fast for an entry point the ledger did not declare
    pub fn require(&self, operation: LedgerOperation) -> Result<(), LedgerError> {
        self.capabilities.require(operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    fn account(digit: char) -> AccountAddress {
        AccountAddress::parse(&format!("0x{}", digit.to_string().repeat(40))).unwrap()
    }

    #[tokio::test]
    async fn test_connect_publishes_event() {
        let session = AccountSession::new("local");
        let mut events = session.subscribe();

        session.connect(account('1'));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::AccountChanged { account: account('1') }
        );
        assert_eq!(session.account(), Some(account('1')));
    }

    #[tokio::test]
    async fn test_reconnect_same_account_is_silent() {
        let session = AccountSession::new("local");
        session.connect(account('1'));
        let mut events = session.subscribe();
        session.connect(account('1'));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_network_change_requires_reconnect() {
        let session = AccountSession::new("local");
        session.connect(account('1'));
        let mut events = session.subscribe();

        session.switch_network("sepolia");
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::NetworkChanged { network: "sepolia".to_string() }
        );
        assert!(session.account().is_none());
        assert!(matches!(session.require_account(), Err(LedgerError::NotConnected)));
        assert_eq!(session.network(), "sepolia");
    }

    #[tokio::test]
    async fn test_context_checks_capabilities_once() {
        let mut caps = Capabilities::all(2);
        caps.operations.remove(&LedgerOperation::UpdateMetadata);
        let ledger = MemoryLedger::with_options(caps, std::time::Duration::ZERO);

        let ctx = LedgerContext::connect(Arc::new(ledger.clone()), AccountSession::new("local"))
            .await
            .unwrap();
        assert_eq!(ctx.capabilities().version, 2);

        // Declared set is retained even if the ledger later goes offline
        ledger.set_reachable(false);
        assert!(ctx.require(LedgerOperation::Register).is_ok());
        assert!(matches!(
            ctx.require(LedgerOperation::UpdateMetadata),
            Err(LedgerError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_when_unreachable() {
        let ledger = MemoryLedger::new();
        ledger.set_reachable(false);
        let result = LedgerContext::connect(Arc::new(ledger), AccountSession::new("local")).await;
        assert!(matches!(result, Err(LedgerError::Unreachable(_))));
    }
}
