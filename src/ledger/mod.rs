pub mod abi;
pub mod base;
pub mod cache;
pub mod rpc;
pub mod synthetic;

pub use base::{BatchLedger, LedgerError};
pub use cache::CachedLedger;
pub use rpc::{RpcLedger, RpcLedgerConfig};
pub use synthetic::SyntheticLedger;
