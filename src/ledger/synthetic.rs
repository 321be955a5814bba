use crate::ledger::base::{BatchLedger, LedgerError};
use crate::models::{OnChainBatch, TransferEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// In-process ledger with canned batches and an optional artificial delay.
#[derive(Debug, Default)]
pub struct SyntheticLedger {
    batches: RwLock<HashMap<String, (OnChainBatch, Vec<TransferEntry>)>>,
    delay: Duration,
    calls: AtomicUsize,
}

impl SyntheticLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub async fn insert(&self, batch: OnChainBatch, history: Vec<TransferEntry>) {
        self.batches
            .write()
            .await
            .insert(batch.batch_id.clone(), (batch, history));
    }

    /// Number of reads served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn read(&self, batch_id: &str) -> Result<(OnChainBatch, Vec<TransferEntry>), LedgerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.batches
            .read()
            .await
            .get(batch_id)
            .cloned()
            .ok_or_else(|| LedgerError::Rpc {
                code: 3,
                message: format!("execution reverted: unknown batch {}", batch_id),
            })
    }
}

#[async_trait]
impl BatchLedger for SyntheticLedger {
    fn ledger_name(&self) -> &'static str {
        "synthetic"
    }

    async fn get_batch(&self, batch_id: &str) -> Result<OnChainBatch, LedgerError> {
        Ok(self.read(batch_id).await?.0)
    }

    async fn get_batch_history(&self, batch_id: &str) -> Result<Vec<TransferEntry>, LedgerError> {
        Ok(self.read(batch_id).await?.1)
    }
}

pub fn sample_batch(batch_id: &str) -> OnChainBatch {
    OnChainBatch {
        batch_id: batch_id.to_string(),
        product_type: "maize".to_string(),
        current_owner: "0x1111111111111111111111111111111111111111".to_string(),
        origin: "Nakuru, Kenya".to_string(),
        harvest_date: 1_717_200_000,
        created_at: 1_717_286_400,
        info: "dried to 13% moisture".to_string(),
        exists: true,
    }
}

pub fn sample_history() -> Vec<TransferEntry> {
    vec![TransferEntry {
        from: "0x1111111111111111111111111111111111111111".to_string(),
        to: "0x2222222222222222222222222222222222222222".to_string(),
        timestamp: 1_717_372_800,
        note: "sold to county cooperative".to_string(),
    }]
}
