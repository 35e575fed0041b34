//! Ledger module
//!
//! The ledger is the system of record for asset ownership and metadata.
//! Two backends are provided:
//! - `MemoryLedger`: in-process, used for local runs and tests
//! - `HttpLedger`: JSON client for a gateway in front of the deployed contract

mod http;
mod memory;
mod provider;
mod types;

pub use http::HttpLedger;
pub use memory::MemoryLedger;
pub use provider::Ledger;
pub use types::*;
