use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::canonical::{canonical_json, CanonicalError};

pub const BATCH_METADATA_COLLECTION: &str = "batchMetadata";

/// Stored metadata document for one batch, keyed by batch id.
///
/// Every field is optional on read: documents written by older tooling may
/// lack the canonical string or carry a hash of the wrong type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub metadata_hash: Option<String>,
    #[serde(default)]
    pub metadata_canonical: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl MetadataRecord {
    pub fn seal(metadata: Value) -> Result<Self, CanonicalError> {
        let canonical = canonical_json(&metadata)?;
        Ok(Self {
            metadata_hash: Some(content_hash(&canonical)),
            metadata_canonical: Some(canonical),
            metadata,
            created_at: Some(now_iso()),
        })
    }

    /// Lenient read of a raw stored document.
    pub fn from_document(doc: &Value) -> Self {
        Self {
            metadata: doc.get("metadata").cloned().unwrap_or(Value::Null),
            metadata_hash: doc.get("metadataHash").and_then(|v| v.as_str()).map(str::to_string),
            metadata_canonical: doc
                .get("metadataCanonical")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            created_at: doc.get("createdAt").and_then(|v| v.as_str()).map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnChainBatch {
    pub batch_id: String,
    pub product_type: String,
    pub current_owner: String,
    pub origin: String,
    pub harvest_date: u64,
    pub created_at: u64,
    pub info: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEntry {
    pub from: String,
    pub to: String,
    pub timestamp: u64,
    pub note: String,
}

/// Answer of the batch lookup route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchVerification {
    pub batch_id: String,
    pub metadata: Option<Value>,
    pub metadata_hash: Option<String>,
    pub metadata_canonical: Option<String>,
    pub computed_hash: Option<String>,
    pub metadata_valid: bool,
    pub on_chain_batch: Option<OnChainBatch>,
    pub on_chain_history: Vec<TransferEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedMetadata {
    pub batch_id: String,
    pub metadata_hash: String,
    pub metadata_canonical: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Farmer,
    Distributor,
    Retailer,
    Consumer,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumPost {
    #[serde(default)]
    pub id: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    #[serde(default)]
    pub id: String,
    pub seller_id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub batch_id: Option<String>,
    pub price: f64,
    pub quantity: u32,
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

/// SHA-256 of the canonical string, 64 lowercase hex chars.
pub fn content_hash(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
