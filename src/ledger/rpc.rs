use crate::ledger::abi;
use crate::ledger::base::{BatchLedger, LedgerError};
use crate::models::{OnChainBatch, TransferEntry};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider, ProviderError, RpcError};
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::{Address, BlockId, BlockNumber, TransactionRequest, U256};
use tokio::sync::OnceCell;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct RpcLedgerConfig {
    pub rpc_url: String,
    pub contract_address: String,
    /// Expected chain id; when set, the node is checked once before first use.
    pub chain_id: Option<u64>,
}

/// `eth_call` client for the batch registry contract.
///
/// One instance is built at start-up and shared; the provider's connection
/// pool and the chain-id check live for the life of the process.
pub struct RpcLedger {
    config: RpcLedgerConfig,
    provider: Provider<Http>,
    contract: Address,
    network: OnceCell<u64>,
}

impl RpcLedger {
    pub fn new(config: RpcLedgerConfig) -> Result<Self, LedgerError> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| LedgerError::Transport(format!("invalid rpc url {}: {}", config.rpc_url, e)))?;
        let contract = config
            .contract_address
            .parse::<Address>()
            .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", config.contract_address, e)))?;
        Ok(Self {
            config,
            provider,
            contract,
            network: OnceCell::new(),
        })
    }

    async fn ensure_network(&self) -> Result<(), LedgerError> {
        let Some(expected) = self.config.chain_id else {
            return Ok(());
        };
        let actual = self
            .network
            .get_or_try_init(|| async {
                let reported = self.provider.get_chainid().await.map_err(provider_error)?;
                if reported > U256::from(u64::MAX) {
                    return Err(LedgerError::Decode(format!("chain id {} out of range", reported)));
                }
                let actual = reported.as_u64();
                info!(chain_id = actual, rpc_url = %self.config.rpc_url, "connected to ledger");
                Ok::<u64, LedgerError>(actual)
            })
            .await?;
        if *actual != expected {
            return Err(LedgerError::NetworkMismatch {
                expected,
                actual: *actual,
            });
        }
        Ok(())
    }

    async fn eth_call(&self, signature: &str, batch_id: &str) -> Result<Vec<u8>, LedgerError> {
        self.ensure_network().await?;
        let tx: TypedTransaction = TransactionRequest::new()
            .to(self.contract)
            .data(abi::encode_string_call(signature, batch_id))
            .into();
        debug!(signature, batch_id, "ledger eth_call");
        let data = self
            .provider
            .call(&tx, Some(BlockId::Number(BlockNumber::Latest)))
            .await
            .map_err(provider_error)?;
        if data.is_empty() {
            return Err(LedgerError::Decode(format!("{} returned no data", signature)));
        }
        Ok(data.to_vec())
    }
}

fn provider_error(err: ProviderError) -> LedgerError {
    if let Some(rpc) = err.as_error_response() {
        return LedgerError::Rpc {
            code: rpc.code,
            message: rpc.message.clone(),
        };
    }
    if err.as_serde_error().is_some() {
        return LedgerError::Decode(err.to_string());
    }
    LedgerError::Transport(err.to_string())
}

#[async_trait]
impl BatchLedger for RpcLedger {
    fn ledger_name(&self) -> &'static str {
        "json-rpc"
    }

    async fn get_batch(&self, batch_id: &str) -> Result<OnChainBatch, LedgerError> {
        let data = self.eth_call(abi::GET_BATCH, batch_id).await?;
        abi::decode_batch(&data).map_err(LedgerError::Decode)
    }

    async fn get_batch_history(&self, batch_id: &str) -> Result<Vec<TransferEntry>, LedgerError> {
        let data = self.eth_call(abi::GET_BATCH_HISTORY, batch_id).await?;
        abi::decode_history(&data).map_err(LedgerError::Decode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rpc_url: &str, contract_address: &str) -> RpcLedgerConfig {
        RpcLedgerConfig {
            rpc_url: rpc_url.to_string(),
            contract_address: contract_address.to_string(),
            chain_id: None,
        }
    }

    #[test]
    fn rejects_bad_contract_address() {
        let err = RpcLedger::new(config("http://localhost:8545", "0xnot-an-address"))
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::InvalidAddress(_)));
    }

    #[test]
    fn rejects_bad_rpc_url() {
        let err = RpcLedger::new(config("not a url", "0x5fbdb2315678afecb367f032d93f642f64180aa3"))
            .err()
            .unwrap();
        assert!(matches!(err, LedgerError::Transport(_)));
    }
}
