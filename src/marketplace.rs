//! Users, forum posts and product listings.
//!
//! All three are plain documents; [`Resource`] carries the per-type rules and
//! [`Marketplace`] the shared create/read/update/delete flow.

use crate::models::{new_record_id, now_iso, ForumPost, ProductListing, User};
use crate::store::{DocumentStore, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("{0}")]
    Invalid(String),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub trait Resource: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;
    const KIND: &'static str;

    fn validate(&self) -> Result<(), String>;
    fn stamp(&mut self, id: String, created_at: String, updated_at: String);
    fn created_at(&self) -> &str;
    /// Query filters accepted on list; unknown keys are ignored.
    fn matches(&self, _filters: &HashMap<String, String>) -> bool {
        true
    }
}

fn require(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", field));
    }
    Ok(())
}

fn filter_eq(filters: &HashMap<String, String>, key: &str, value: &str) -> bool {
    filters.get(key).map_or(true, |wanted| wanted == value)
}

impl Resource for User {
    const COLLECTION: &'static str = "users";
    const KIND: &'static str = "user";

    fn validate(&self) -> Result<(), String> {
        require("displayName", &self.display_name)?;
        require("email", &self.email)?;
        if !self.email.contains('@') {
            return Err(format!("email {} is not valid", self.email));
        }
        Ok(())
    }

    fn stamp(&mut self, id: String, created_at: String, updated_at: String) {
        self.id = id;
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }
}

impl Resource for ForumPost {
    const COLLECTION: &'static str = "posts";
    const KIND: &'static str = "post";

    fn validate(&self) -> Result<(), String> {
        require("authorId", &self.author_id)?;
        require("title", &self.title)?;
        require("body", &self.body)
    }

    fn stamp(&mut self, id: String, created_at: String, updated_at: String) {
        self.id = id;
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn matches(&self, filters: &HashMap<String, String>) -> bool {
        filter_eq(filters, "authorId", &self.author_id)
    }
}

impl Resource for ProductListing {
    const COLLECTION: &'static str = "products";
    const KIND: &'static str = "product";

    fn validate(&self) -> Result<(), String> {
        require("sellerId", &self.seller_id)?;
        require("name", &self.name)?;
        require("category", &self.category)?;
        require("unit", &self.unit)?;
        if !self.price.is_finite() || self.price < 0.0 {
            return Err("price must be a non-negative number".to_string());
        }
        Ok(())
    }

    fn stamp(&mut self, id: String, created_at: String, updated_at: String) {
        self.id = id;
        self.created_at = created_at;
        self.updated_at = updated_at;
    }

    fn created_at(&self) -> &str {
        &self.created_at
    }

    fn matches(&self, filters: &HashMap<String, String>) -> bool {
        filter_eq(filters, "sellerId", &self.seller_id) && filter_eq(filters, "category", &self.category)
    }
}

#[derive(Clone)]
pub struct Marketplace {
    store: Arc<dyn DocumentStore>,
}

impl Marketplace {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn decode<R: Resource>(id: &str, document: serde_json::Value) -> Result<R, MarketplaceError> {
        serde_json::from_value(document).map_err(|e| {
            MarketplaceError::Store(StoreError::Decode {
                collection: R::COLLECTION.to_string(),
                id: id.to_string(),
                details: e.to_string(),
            })
        })
    }

    fn encode<R: Resource>(id: &str, record: &R) -> Result<serde_json::Value, MarketplaceError> {
        serde_json::to_value(record).map_err(|e| {
            MarketplaceError::Store(StoreError::Decode {
                collection: R::COLLECTION.to_string(),
                id: id.to_string(),
                details: e.to_string(),
            })
        })
    }

    pub async fn list<R: Resource>(&self, filters: &HashMap<String, String>) -> Result<Vec<R>, MarketplaceError> {
        let mut out = Vec::new();
        for (id, document) in self.store.list(R::COLLECTION).await? {
            let record: R = Self::decode(&id, document)?;
            if record.matches(filters) {
                out.push(record);
            }
        }
        Ok(out)
    }

    pub async fn get<R: Resource>(&self, id: &str) -> Result<R, MarketplaceError> {
        match self.store.get(R::COLLECTION, id).await? {
            Some(document) => Self::decode(id, document),
            None => Err(MarketplaceError::NotFound {
                kind: R::KIND,
                id: id.to_string(),
            }),
        }
    }

    pub async fn create<R: Resource>(&self, mut record: R) -> Result<R, MarketplaceError> {
        record.validate().map_err(MarketplaceError::Invalid)?;
        let id = new_record_id();
        let now = now_iso();
        record.stamp(id.clone(), now.clone(), now);
        self.store.put(R::COLLECTION, &id, Self::encode(&id, &record)?).await?;
        info!(kind = R::KIND, id = %id, "created record");
        Ok(record)
    }

    pub async fn update<R: Resource>(&self, id: &str, mut record: R) -> Result<R, MarketplaceError> {
        record.validate().map_err(MarketplaceError::Invalid)?;
        let existing: R = self.get(id).await?;
        record.stamp(id.to_string(), existing.created_at().to_string(), now_iso());
        self.store.put(R::COLLECTION, id, Self::encode(id, &record)?).await?;
        Ok(record)
    }

    pub async fn delete<R: Resource>(&self, id: &str) -> Result<(), MarketplaceError> {
        if !self.store.delete(R::COLLECTION, id).await? {
            return Err(MarketplaceError::NotFound {
                kind: R::KIND,
                id: id.to_string(),
            });
        }
        info!(kind = R::KIND, id, "deleted record");
        Ok(())
    }
}
