use crate::canonical::CanonicalError;
use crate::ledger::{BatchLedger, LedgerError};
use crate::models::{
    BatchVerification, MetadataRecord, OnChainBatch, SealedMetadata, TransferEntry,
    BATCH_METADATA_COLLECTION,
};
use crate::store::{DocumentStore, StoreError};
use crate::timeout::with_timeout;
use crate::verifier::MetadataVerifier;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_LEDGER_TIMEOUT_MS: u64 = 7000;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Missing batchId")]
    MissingBatchId,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
}

/// Batch metadata registration and verification.
///
/// The document store is the trusted source; the ledger, when present, is
/// read on a best-effort basis and never fails a lookup.
pub struct BatchEngine {
    store: Arc<dyn DocumentStore>,
    ledger: Option<Arc<dyn BatchLedger>>,
    verifier: MetadataVerifier,
    ledger_timeout_ms: u64,
}

impl BatchEngine {
    pub fn new(store: Arc<dyn DocumentStore>, ledger: Option<Arc<dyn BatchLedger>>) -> Self {
        Self {
            store,
            ledger,
            verifier: MetadataVerifier,
            ledger_timeout_ms: DEFAULT_LEDGER_TIMEOUT_MS,
        }
    }

    pub fn with_ledger_timeout(mut self, timeout_ms: u64) -> Self {
        self.ledger_timeout_ms = timeout_ms;
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn register_metadata(
        &self,
        batch_id: &str,
        metadata: serde_json::Value,
    ) -> Result<SealedMetadata, EngineError> {
        let batch_id = normalize_batch_id(batch_id)?;
        let record = MetadataRecord::seal(metadata)?;
        let sealed = SealedMetadata {
            batch_id: batch_id.to_string(),
            metadata_hash: record.metadata_hash.clone().unwrap_or_default(),
            metadata_canonical: record.metadata_canonical.clone().unwrap_or_default(),
        };
        let document = serde_json::to_value(&record).map_err(|e| StoreError::Decode {
            collection: BATCH_METADATA_COLLECTION.to_string(),
            id: batch_id.to_string(),
            details: e.to_string(),
        })?;
        self.store.put(BATCH_METADATA_COLLECTION, batch_id, document).await?;
        info!(batch_id, hash = %sealed.metadata_hash, "registered batch metadata");
        Ok(sealed)
    }

    pub async fn lookup(&self, batch_id: &str) -> Result<BatchVerification, EngineError> {
        let batch_id = normalize_batch_id(batch_id)?;
        // A store failure returns at once and drops the pending ledger read.
        let (stored, (on_chain_batch, on_chain_history)) = tokio::try_join!(
            self.store.get(BATCH_METADATA_COLLECTION, batch_id),
            async { Ok::<_, StoreError>(self.read_chain(batch_id).await) }
        )?;

        let Some(document) = stored else {
            debug!(batch_id, "no stored metadata");
            return Ok(BatchVerification {
                batch_id: batch_id.to_string(),
                metadata: None,
                metadata_hash: None,
                metadata_canonical: None,
                computed_hash: None,
                metadata_valid: false,
                on_chain_batch,
                on_chain_history,
            });
        };

        let record = MetadataRecord::from_document(&document);
        let check = self.verifier.verify(&record);
        if check.computed_hash.is_some() && !check.valid {
            warn!(batch_id, "stored metadata hash does not match canonical form");
        }
        Ok(BatchVerification {
            batch_id: batch_id.to_string(),
            metadata: Some(document),
            metadata_hash: record.metadata_hash,
            metadata_canonical: record.metadata_canonical,
            computed_hash: check.computed_hash,
            metadata_valid: check.valid,
            on_chain_batch,
            on_chain_history,
        })
    }

    /// Reads the snapshot and the history side by side. Each half degrades to
    /// empty on its own; a timeout loses both.
    async fn read_chain(&self, batch_id: &str) -> (Option<OnChainBatch>, Vec<TransferEntry>) {
        let Some(ledger) = &self.ledger else {
            return (None, Vec::new());
        };
        let read = async { tokio::join!(ledger.get_batch(batch_id), ledger.get_batch_history(batch_id)) };
        let (batch, history) = match with_timeout(read, self.ledger_timeout_ms).await {
            Ok(pair) => pair,
            Err(elapsed) => {
                let err = LedgerError::from(elapsed);
                warn!(batch_id, ledger = ledger.ledger_name(), error = %err, "on-chain read failed");
                return (None, Vec::new());
            }
        };
        let batch = match batch {
            Ok(batch) if batch.exists => Some(batch),
            Ok(_) => {
                debug!(batch_id, "ledger reports batch as nonexistent");
                None
            }
            Err(err) => {
                warn!(batch_id, ledger = ledger.ledger_name(), error = %err, "on-chain batch read failed");
                None
            }
        };
        let history = history.unwrap_or_else(|err| {
            warn!(batch_id, ledger = ledger.ledger_name(), error = %err, "on-chain history read failed");
            Vec::new()
        });
        (batch, history)
    }
}

fn normalize_batch_id(batch_id: &str) -> Result<&str, EngineError> {
    let trimmed = batch_id.trim();
    if trimmed.is_empty() {
        return Err(EngineError::MissingBatchId);
    }
    Ok(trimmed)
}
