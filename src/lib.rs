//! Asset Vault Library
//!
//! Verifiable digital assets: content fingerprints, a content store for the
//! bytes and a ledger for ownership records. The server binary is in main.rs.
//!
//! # Modules
//!
//! - `fingerprint`: SHA-256 content fingerprints
//! - `store`: Content-addressed storage (Pinata, synthetic fallback)
//! - `ledger`: Asset ownership ledger (in-memory, HTTP gateway)
//! - `session`: Connected account and network, with change events
//! - `pipeline`: Hash, upload and register; verify; transfer
//! - `routes`: HTTP API

pub mod cache;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod pipeline;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
