//! Content store module
//!
//! Asset bytes live in an IPFS-style content-addressed store. The Pinata
//! pinning service is the real backend; the mock store hands out clearly
//! synthetic addresses for offline use.

mod provider;
mod types;

pub use provider::{gateway_url, ContentStore, MockStore, PinataStore};
pub use types::*;

#[cfg(test)]
pub use provider::FailingStore;
