//! Asset Lifecycle Pipeline
//!
//! Sequences the external calls needed to register, verify and transfer
//! assets, and defines what happens when one of them fails.
//!
//! Registration flow:
//! 1. Fingerprint the original bytes
//! 2. Upload to the content store, receiving a content address
//! 3. Register on the ledger, receiving the asset id
//!
//! Verification flow:
//! 1. Look up the asset on the ledger
//! 2. Fingerprint the presented file
//! 3. Let the ledger compare it against the stored fingerprint

mod lock;
mod runs;
mod service;
mod types;
mod validate;

pub use runs::RunTracker;
pub use service::{AssetPipeline, PipelineOptions};
pub use types::*;
pub use validate::{parse_asset_id, parse_transfer_target, require_text, validate_submission};
