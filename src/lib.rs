pub mod api;
pub mod canonical;
pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod marketplace;
pub mod models;
pub mod store;
pub mod timeout;
pub mod verifier;

pub use canonical::{canonical_json, CanonicalError, SharedJson};
pub use engine::BatchEngine;
pub use models::{content_hash, BatchVerification, MetadataRecord, OnChainBatch, TransferEntry};
pub use timeout::with_timeout;
pub use verifier::MetadataVerifier;
