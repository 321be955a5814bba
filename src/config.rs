use crate::ledger::{BatchLedger, CachedLedger, LedgerError, RpcLedger, RpcLedgerConfig};
use crate::store::{DocumentStore, FirestoreConfig, FirestoreStore, MemoryStore, StoreError};
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreBackend {
    Memory,
    Firestore,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("FIRESTORE_PROJECT_ID is required for the firestore store backend")]
    MissingFirestoreProject,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Service configuration. Every flag falls back to an environment variable,
/// which is how deployments set it.
#[derive(Debug, Clone, Parser)]
#[command(name = "agrichain")]
#[command(about = "Agricultural marketplace backend with verifiable batch metadata")]
pub struct AppConfig {
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind: SocketAddr,

    #[arg(long, env = "STORE_BACKEND", value_enum, default_value_t = StoreBackend::Memory)]
    pub store: StoreBackend,

    #[arg(long, env = "FIRESTORE_PROJECT_ID")]
    pub firestore_project_id: Option<String>,

    #[arg(long, env = "FIRESTORE_DATABASE", default_value = "(default)")]
    pub firestore_database: String,

    #[arg(long, env = "FIRESTORE_EMULATOR_HOST")]
    pub firestore_emulator_host: Option<String>,

    #[arg(long, env = "FIRESTORE_ACCESS_TOKEN", hide_env_values = true)]
    pub firestore_access_token: Option<String>,

    #[arg(long, env = "LEDGER_RPC_URL")]
    pub ledger_rpc_url: Option<String>,

    #[arg(long, env = "LEDGER_CONTRACT_ADDRESS")]
    pub ledger_contract_address: Option<String>,

    /// Chain id the RPC endpoint must report
    #[arg(long, env = "LEDGER_CHAIN_ID")]
    pub ledger_chain_id: Option<u64>,

    /// Bound on each on-chain lookup; 0 disables it
    #[arg(long, env = "LEDGER_CALL_TIMEOUT_MS", default_value_t = 7000)]
    pub ledger_call_timeout_ms: u64,

    /// Read-through cache lifetime for on-chain results; 0 disables caching
    #[arg(long, env = "LEDGER_CACHE_TTL_MS", default_value_t = 15000)]
    pub ledger_cache_ttl_ms: u64,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl AppConfig {
    /// `None` when either the endpoint or the contract address is missing.
    pub fn ledger_config(&self) -> Option<RpcLedgerConfig> {
        Some(RpcLedgerConfig {
            rpc_url: non_blank(&self.ledger_rpc_url)?,
            contract_address: non_blank(&self.ledger_contract_address)?,
            chain_id: self.ledger_chain_id,
        })
    }

    pub fn build_store(&self) -> Result<Arc<dyn DocumentStore>, ConfigError> {
        match self.store {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Firestore => {
                let project = non_blank(&self.firestore_project_id).ok_or(ConfigError::MissingFirestoreProject)?;
                let mut config = FirestoreConfig::new(project);
                config.database = self.firestore_database.clone();
                config.emulator_host = non_blank(&self.firestore_emulator_host);
                config.access_token = non_blank(&self.firestore_access_token);
                Ok(Arc::new(FirestoreStore::new(config)?))
            }
        }
    }

    pub fn build_ledger(&self) -> Result<Option<Arc<dyn BatchLedger>>, ConfigError> {
        let Some(config) = self.ledger_config() else {
            info!("ledger not configured, on-chain lookups disabled");
            return Ok(None);
        };
        info!(rpc_url = %config.rpc_url, contract = %config.contract_address, "ledger configured");
        let ledger: Arc<dyn BatchLedger> = Arc::new(RpcLedger::new(config)?);
        if self.ledger_cache_ttl_ms == 0 {
            return Ok(Some(ledger));
        }
        Ok(Some(Arc::new(CachedLedger::new(
            ledger,
            Duration::from_millis(self.ledger_cache_ttl_ms),
        ))))
    }
}
