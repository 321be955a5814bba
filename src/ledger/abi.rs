//! ABI glue for the batch registry contract: one `string` argument going
//! out, and the batch tuple or the transfer tuple array coming back. The
//! wire format itself is handled by `ethers::abi`; this module only maps
//! tokens onto the typed snapshot structs.

use crate::models::{OnChainBatch, TransferEntry};
use ethers::abi::{self, ParamType, Token};
use ethers::types::{Address, U256};

pub const GET_BATCH: &str = "getBatch(string)";
pub const GET_BATCH_HISTORY: &str = "getBatchHistory(string)";

pub fn selector(signature: &str) -> [u8; 4] {
    ethers::utils::id(signature)
}

/// Calldata for `signature` with one `string` argument.
pub fn encode_string_call(signature: &str, arg: &str) -> Vec<u8> {
    let mut data = selector(signature).to_vec();
    data.extend(abi::encode(&[Token::String(arg.to_string())]));
    data
}

fn batch_type() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::String,
        ParamType::String,
        ParamType::Address,
        ParamType::String,
        ParamType::Uint(256),
        ParamType::Uint(256),
        ParamType::String,
        ParamType::Bool,
    ])
}

fn transfer_type() -> ParamType {
    ParamType::Tuple(vec![
        ParamType::Address,
        ParamType::Address,
        ParamType::Uint(256),
        ParamType::String,
    ])
}

fn string(field: &str, token: Token) -> Result<String, String> {
    match token {
        Token::String(s) => Ok(s),
        other => Err(format!("{} is {:?}, expected string", field, other)),
    }
}

fn uint(field: &str, token: Token) -> Result<u64, String> {
    match token {
        Token::Uint(v) if v <= U256::from(u64::MAX) => Ok(v.as_u64()),
        Token::Uint(v) => Err(format!("{} = {} does not fit in u64", field, v)),
        other => Err(format!("{} is {:?}, expected uint", field, other)),
    }
}

fn address(field: &str, token: Token) -> Result<String, String> {
    match token {
        Token::Address(a) => Ok(format!("0x{}", hex::encode(a.as_bytes()))),
        other => Err(format!("{} is {:?}, expected address", field, other)),
    }
}

fn boolean(field: &str, token: Token) -> Result<bool, String> {
    match token {
        Token::Bool(b) => Ok(b),
        other => Err(format!("{} is {:?}, expected bool", field, other)),
    }
}

fn tuple<const N: usize>(token: Token) -> Result<[Token; N], String> {
    match token {
        Token::Tuple(fields) => fields
            .try_into()
            .map_err(|fields: Vec<Token>| format!("tuple has {} fields, expected {}", fields.len(), N)),
        other => Err(format!("expected tuple, got {:?}", other)),
    }
}

fn single(mut tokens: Vec<Token>) -> Result<Token, String> {
    match tokens.len() {
        1 => Ok(tokens.remove(0)),
        n => Err(format!("expected one return value, got {}", n)),
    }
}

/// Decodes the return data of `getBatch(string)`.
pub fn decode_batch(data: &[u8]) -> Result<OnChainBatch, String> {
    let tokens = abi::decode(&[batch_type()], data).map_err(|e| e.to_string())?;
    let [batch_id, product_type, current_owner, origin, harvest_date, created_at, info, exists] =
        tuple::<8>(single(tokens)?)?;
    Ok(OnChainBatch {
        batch_id: string("batchId", batch_id)?,
        product_type: string("productType", product_type)?,
        current_owner: address("currentOwner", current_owner)?,
        origin: string("origin", origin)?,
        harvest_date: uint("harvestDate", harvest_date)?,
        created_at: uint("createdAt", created_at)?,
        info: string("info", info)?,
        exists: boolean("exists", exists)?,
    })
}

/// Decodes the return data of `getBatchHistory(string)`.
pub fn decode_history(data: &[u8]) -> Result<Vec<TransferEntry>, String> {
    let tokens = abi::decode(&[ParamType::Array(Box::new(transfer_type()))], data)
        .map_err(|e| e.to_string())?;
    let Token::Array(entries) = single(tokens)? else {
        return Err("history is not an array".to_string());
    };
    entries
        .into_iter()
        .map(|entry| {
            let [from, to, timestamp, note] = tuple::<4>(entry)?;
            Ok(TransferEntry {
                from: address("from", from)?,
                to: address("to", to)?,
                timestamp: uint("timestamp", timestamp)?,
                note: string("note", note)?,
            })
        })
        .collect()
}

/// Return-data encoders, for tests that stand up a fake contract node.
pub mod encode {
    use super::*;

    fn address_token(address: &str) -> Token {
        Token::Address(address.parse::<Address>().unwrap_or_default())
    }

    pub fn batch(batch: &OnChainBatch) -> Vec<u8> {
        abi::encode(&[Token::Tuple(vec![
            Token::String(batch.batch_id.clone()),
            Token::String(batch.product_type.clone()),
            address_token(&batch.current_owner),
            Token::String(batch.origin.clone()),
            Token::Uint(U256::from(batch.harvest_date)),
            Token::Uint(U256::from(batch.created_at)),
            Token::String(batch.info.clone()),
            Token::Bool(batch.exists),
        ])])
    }

    pub fn history(entries: &[TransferEntry]) -> Vec<u8> {
        let tuples = entries
            .iter()
            .map(|e| {
                Token::Tuple(vec![
                    address_token(&e.from),
                    address_token(&e.to),
                    Token::Uint(U256::from(e.timestamp)),
                    Token::String(e.note.clone()),
                ])
            })
            .collect();
        abi::encode(&[Token::Array(tuples)])
    }
}
