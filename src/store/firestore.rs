//! Firestore REST (v1) document store.
//!
//! Documents travel as Firestore typed values (`{"stringValue": ..}` and so
//! on); [`to_firestore`] and [`from_firestore`] convert between that form and
//! plain JSON.

use crate::store::base::{DocumentStore, StoreError};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Number, Value};
use std::time::Duration;
use tracing::debug;

const PUBLIC_ENDPOINT: &str = "https://firestore.googleapis.com/v1";
const PAGE_SIZE: u32 = 300;

#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    /// `host:port` of a local emulator; switches to plain HTTP without auth.
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: "(default)".to_string(),
            emulator_host: None,
            access_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct FirestoreStore {
    config: FirestoreConfig,
    documents_root: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<FirestoreDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(config: FirestoreConfig) -> Result<Self, StoreError> {
        let endpoint = match &config.emulator_host {
            Some(host) => format!("http://{}/v1", host.trim_end_matches('/')),
            None => PUBLIC_ENDPOINT.to_string(),
        };
        let documents_root = format!(
            "{}/projects/{}/databases/{}/documents",
            endpoint, config.project_id, config.database
        );
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self {
            config,
            documents_root,
            http,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.documents_root)
            .map_err(|e| StoreError::Unavailable(format!("invalid firestore url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("firestore url cannot take path segments".to_string()))?
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match (&self.config.emulator_host, &self.config.access_token) {
            (None, Some(token)) => builder.bearer_auth(token),
            _ => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        builder
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn unexpected_status(status: StatusCode, body: String) -> StoreError {
    StoreError::Unavailable(format!("firestore returned {}: {}", status, body))
}

fn document_id(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

fn decode_document(collection: &str, doc: FirestoreDocument) -> Result<(String, Value), StoreError> {
    let id = document_id(&doc.name).to_string();
    let value = fields_to_json(&doc.fields).map_err(|details| StoreError::Decode {
        collection: collection.to_string(),
        id: id.clone(),
        details,
    })?;
    Ok((id, value))
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    fn backend_name(&self) -> &'static str {
        "firestore"
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let url = self.url(&[collection, id])?;
        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let doc: FirestoreDocument = response
                    .json()
                    .await
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                decode_document(collection, doc).map(|(_, value)| Some(value))
            }
            status => Err(unexpected_status(status, response.text().await.unwrap_or_default())),
        }
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = self.url(&[collection])?;
            url.query_pairs_mut().append_pair("pageSize", &PAGE_SIZE.to_string());
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }
            let response = self.send(self.request(reqwest::Method::GET, url)).await?;
            let status = response.status();
            if status == StatusCode::NOT_FOUND {
                break;
            }
            if !status.is_success() {
                return Err(unexpected_status(status, response.text().await.unwrap_or_default()));
            }
            let page: ListDocumentsResponse = response
                .json()
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            for doc in page.documents {
                out.push(decode_document(collection, doc)?);
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        debug!(collection, count = out.len(), "listed firestore documents");
        Ok(out)
    }

    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<(), StoreError> {
        let Value::Object(map) = &document else {
            return Err(StoreError::Decode {
                collection: collection.to_string(),
                id: id.to_string(),
                details: "top-level document must be an object".to_string(),
            });
        };
        let fields = json_to_fields(map).map_err(|details| StoreError::Decode {
            collection: collection.to_string(),
            id: id.to_string(),
            details,
        })?;
        let body = json!({ "fields": fields });
        let url = self.url(&[collection, id])?;
        let response = self
            .send(self.request(reqwest::Method::PATCH, url).json(&body))
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(unexpected_status(status, response.text().await.unwrap_or_default()));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        if self.get(collection, id).await?.is_none() {
            return Ok(false);
        }
        let url = self.url(&[collection, id])?;
        let response = self.send(self.request(reqwest::Method::DELETE, url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(unexpected_status(status, response.text().await.unwrap_or_default())),
        }
    }
}

pub fn json_to_fields(map: &Map<String, Value>) -> Result<Map<String, Value>, String> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), to_firestore(v).map_err(|e| format!("{}: {}", k, e))?)))
        .collect()
}

pub fn fields_to_json(fields: &Map<String, Value>) -> Result<Value, String> {
    let mut out = Map::new();
    for (k, v) in fields {
        out.insert(k.clone(), from_firestore(v).map_err(|e| format!("{}: {}", k, e))?);
    }
    Ok(Value::Object(out))
}

/// Firestore integers are int64; unsigned values past `i64::MAX` are
/// rejected rather than degraded to doubles.
pub fn to_firestore(value: &Value) -> Result<Value, String> {
    Ok(match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) if n.is_f64() => json!({ "doubleValue": n.as_f64().unwrap_or_default() }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => return Err(format!("integer {} exceeds the int64 range", n)),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values = items.iter().map(to_firestore).collect::<Result<Vec<_>, _>>()?;
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": json_to_fields(map)? } }),
    })
}

pub fn from_firestore(value: &Value) -> Result<Value, String> {
    let Some(map) = value.as_object() else {
        return Err("typed value must be an object".to_string());
    };
    let Some((kind, inner)) = map.iter().next() else {
        return Err("empty typed value".to_string());
    };
    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "booleanValue is not a bool".to_string()),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(|i| Value::Number(i.into()))
                .ok_or_else(|| format!("bad integerValue {}", inner))
        }
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| format!("bad doubleValue {}", inner)),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| format!("{} is not a string", kind)),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner.get("values").and_then(|v| v.as_array());
            let items = values
                .map(|vs| vs.iter().map(from_firestore).collect::<Result<Vec<_>, _>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(items))
        }
        "mapValue" => match inner.get("fields").and_then(|v| v.as_object()) {
            Some(fields) => fields_to_json(fields),
            None => Ok(Value::Object(Map::new())),
        },
        other => Err(format!("unsupported typed value {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_values_convert_both_ways() {
        let plain = json!({
            "crop": "coffee",
            "kg": 120,
            "moisture": 11.5,
            "organic": true,
            "certs": ["fairtrade", null],
            "farm": {"region": "Sidama"}
        });
        let Value::Object(map) = &plain else { unreachable!() };
        let fields = json_to_fields(map).unwrap();
        assert_eq!(fields["kg"], json!({"integerValue": "120"}));
        assert_eq!(fields["moisture"], json!({"doubleValue": 11.5}));
        assert_eq!(
            fields["farm"],
            json!({"mapValue": {"fields": {"region": {"stringValue": "Sidama"}}}})
        );
        assert_eq!(fields_to_json(&fields).unwrap(), plain);
    }

    #[test]
    fn integers_past_int64_rejected() {
        let big = json!({"lot": {"weights": [1, u64::MAX]}});
        let Value::Object(map) = &big else { unreachable!() };
        let err = json_to_fields(map).unwrap_err();
        assert!(err.starts_with("lot: "));
        assert!(err.contains("18446744073709551615"));

        let edge = json!({"n": i64::MAX, "m": i64::MIN});
        let Value::Object(map) = &edge else { unreachable!() };
        let fields = json_to_fields(map).unwrap();
        assert_eq!(fields["n"], json!({"integerValue": i64::MAX.to_string()}));
        assert_eq!(fields_to_json(&fields).unwrap(), edge);
    }

    #[tokio::test]
    async fn put_refuses_unrepresentable_integers() {
        let store = FirestoreStore::new(FirestoreConfig::new("agri-demo")).unwrap();
        let err = store
            .put("batchMetadata", "batch-001", json!({"metadata": {"serial": u64::MAX}}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode { .. }));
    }

    #[test]
    fn reads_server_only_kinds() {
        let ts = json!({"timestampValue": "2024-05-01T10:00:00Z"});
        assert_eq!(from_firestore(&ts).unwrap(), json!("2024-05-01T10:00:00Z"));
        assert_eq!(from_firestore(&json!({"arrayValue": {}})).unwrap(), json!([]));
        assert_eq!(from_firestore(&json!({"mapValue": {}})).unwrap(), json!({}));
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(from_firestore(&json!({"integerValue": "12x"})).is_err());
        assert!(from_firestore(&json!({"mysteryValue": 1})).is_err());
        assert!(from_firestore(&json!("raw")).is_err());
    }

    #[test]
    fn document_urls_escape_ids() {
        let store = FirestoreStore::new(FirestoreConfig::new("agri-demo")).unwrap();
        let url = store.url(&["batchMetadata", "lot 7/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://firestore.googleapis.com/v1/projects/agri-demo/databases/(default)/documents/batchMetadata/lot%207%2Fb"
        );
    }

    #[test]
    fn emulator_host_switches_endpoint() {
        let mut config = FirestoreConfig::new("agri-demo");
        config.emulator_host = Some("localhost:8081".to_string());
        let store = FirestoreStore::new(config).unwrap();
        assert!(store
            .url(&["users"])
            .unwrap()
            .as_str()
            .starts_with("http://localhost:8081/v1/projects/agri-demo/"));
    }
}
