use crate::models::{OnChainBatch, TransferEntry};
use crate::timeout::Elapsed;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("invalid contract address {0}")]
    InvalidAddress(String),
    #[error("ledger transport error: {0}")]
    Transport(String),
    #[error("ledger rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed ledger response: {0}")]
    Decode(String),
    #[error("ledger chain id mismatch: expected {expected}, node reports {actual}")]
    NetworkMismatch { expected: u64, actual: u64 },
    #[error(transparent)]
    Timeout(#[from] Elapsed),
}

/// Read-only view of the batch registry contract.
#[async_trait]
pub trait BatchLedger: Send + Sync {
    fn ledger_name(&self) -> &'static str;
    async fn get_batch(&self, batch_id: &str) -> Result<OnChainBatch, LedgerError>;
    async fn get_batch_history(&self, batch_id: &str) -> Result<Vec<TransferEntry>, LedgerError>;
}
