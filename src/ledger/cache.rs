use crate::ledger::base::{BatchLedger, LedgerError};
use crate::models::{OnChainBatch, TransferEntry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

const MAX_ENTRIES: usize = 1000;

struct Cached<T> {
    value: T,
    expires_at: Instant,
}

/// Read-through cache in front of another ledger. Only successful reads are
/// kept; every failure goes back to the inner ledger next time.
pub struct CachedLedger {
    inner: Arc<dyn BatchLedger>,
    ttl: Duration,
    batches: RwLock<HashMap<String, Cached<OnChainBatch>>>,
    histories: RwLock<HashMap<String, Cached<Vec<TransferEntry>>>>,
}

impl CachedLedger {
    pub fn new(inner: Arc<dyn BatchLedger>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            batches: RwLock::new(HashMap::new()),
            histories: RwLock::new(HashMap::new()),
        }
    }
}

async fn lookup<T: Clone>(map: &RwLock<HashMap<String, Cached<T>>>, key: &str) -> Option<T> {
    let map = map.read().await;
    map.get(key)
        .filter(|c| c.expires_at > Instant::now())
        .map(|c| c.value.clone())
}

async fn store<T>(map: &RwLock<HashMap<String, Cached<T>>>, key: &str, value: T, ttl: Duration) {
    let mut map = map.write().await;
    if map.len() >= MAX_ENTRIES {
        let now = Instant::now();
        map.retain(|_, c| c.expires_at > now);
        if map.len() >= MAX_ENTRIES {
            map.clear();
        }
    }
    map.insert(
        key.to_string(),
        Cached {
            value,
            expires_at: Instant::now() + ttl,
        },
    );
}

#[async_trait]
impl BatchLedger for CachedLedger {
    fn ledger_name(&self) -> &'static str {
        self.inner.ledger_name()
    }

    async fn get_batch(&self, batch_id: &str) -> Result<OnChainBatch, LedgerError> {
        if let Some(hit) = lookup(&self.batches, batch_id).await {
            debug!(batch_id, "ledger batch served from cache");
            return Ok(hit);
        }
        let batch = self.inner.get_batch(batch_id).await?;
        store(&self.batches, batch_id, batch.clone(), self.ttl).await;
        Ok(batch)
    }

    async fn get_batch_history(&self, batch_id: &str) -> Result<Vec<TransferEntry>, LedgerError> {
        if let Some(hit) = lookup(&self.histories, batch_id).await {
            debug!(batch_id, "ledger history served from cache");
            return Ok(hit);
        }
        let history = self.inner.get_batch_history(batch_id).await?;
        store(&self.histories, batch_id, history.clone(), self.ttl).await;
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::synthetic::{sample_batch, SyntheticLedger};

    #[tokio::test]
    async fn second_read_is_cached() {
        let inner = Arc::new(SyntheticLedger::new());
        inner.insert(sample_batch("batch-001"), vec![]).await;
        let cached = CachedLedger::new(inner.clone(), Duration::from_secs(60));

        cached.get_batch("batch-001").await.unwrap();
        cached.get_batch("batch-001").await.unwrap();
        cached.get_batch_history("batch-001").await.unwrap();
        assert_eq!(inner.calls(), 2);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let inner = Arc::new(SyntheticLedger::new());
        let cached = CachedLedger::new(inner.clone(), Duration::from_secs(60));

        assert!(cached.get_batch("late").await.is_err());
        inner.insert(sample_batch("late"), vec![]).await;
        assert_eq!(cached.get_batch("late").await.unwrap().batch_id, "late");
    }

    #[tokio::test]
    async fn expired_entries_refetch() {
        let inner = Arc::new(SyntheticLedger::new());
        inner.insert(sample_batch("batch-002"), vec![]).await;
        let cached = CachedLedger::new(inner.clone(), Duration::ZERO);

        cached.get_batch("batch-002").await.unwrap();
        cached.get_batch("batch-002").await.unwrap();
        assert_eq!(inner.calls(), 2);
    }
}
