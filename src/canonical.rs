//! Canonical JSON encoding.
//!
//! Object keys are emitted in ordinal order at every depth, arrays keep their
//! order and scalars use plain JSON literal syntax. Two documents with the same
//! keys and values therefore always encode to the same string, which is what
//! the content hashes in [`crate::models::content_hash`] are computed over.

use serde_json::{Map, Number, Value};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CanonicalError {
    #[error("cyclic structure: container is already on the encoding path")]
    CyclicStructure,
}

/// A JSON document node as seen by the encoder.
pub enum JsonNode<G> {
    Scalar(Value),
    Array(Vec<G>),
    Object(Vec<(String, G)>),
}

/// Anything the canonical encoder can walk.
///
/// `container_id` must return a stable identity for arrays and objects; the
/// encoder uses it to detect a container that appears inside itself.
pub trait JsonGraph: Sized {
    fn container_id(&self) -> Option<usize>;
    fn node(&self) -> JsonNode<Self>;
}

pub struct CanonicalEncoder {
    out: String,
    visiting: HashSet<usize>,
}

impl CanonicalEncoder {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            visiting: HashSet::new(),
        }
    }

    pub fn encode<G: JsonGraph>(mut self, root: &G) -> Result<String, CanonicalError> {
        self.write(root)?;
        Ok(self.out)
    }

    fn write<G: JsonGraph>(&mut self, value: &G) -> Result<(), CanonicalError> {
        let Some(id) = value.container_id() else {
            return self.write_node(value.node());
        };
        if !self.visiting.insert(id) {
            return Err(CanonicalError::CyclicStructure);
        }
        let result = self.write_node(value.node());
        self.visiting.remove(&id);
        result
    }

    fn write_node<G: JsonGraph>(&mut self, node: JsonNode<G>) -> Result<(), CanonicalError> {
        match node {
            JsonNode::Scalar(scalar) => self.out.push_str(&scalar.to_string()),
            JsonNode::Array(items) => {
                self.out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.write(item)?;
                }
                self.out.push(']');
            }
            JsonNode::Object(mut entries) => {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
                self.out.push('{');
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        self.out.push(',');
                    }
                    self.out.push_str(&Value::String(key.clone()).to_string());
                    self.out.push(':');
                    self.write(item)?;
                }
                self.out.push('}');
            }
        }
        Ok(())
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl<'v> JsonGraph for &'v Value {
    fn container_id(&self) -> Option<usize> {
        match self {
            Value::Array(_) | Value::Object(_) => Some(*self as *const Value as usize),
            _ => None,
        }
    }

    fn node(&self) -> JsonNode<Self> {
        match *self {
            Value::Array(items) => JsonNode::Array(items.iter().collect()),
            Value::Object(map) => JsonNode::Object(map.iter().map(|(k, v)| (k.clone(), v)).collect()),
            scalar => JsonNode::Scalar(scalar.clone()),
        }
    }
}

pub fn canonical_json(value: &Value) -> Result<String, CanonicalError> {
    CanonicalEncoder::new().encode(&value)
}

/// JSON graph with shared containers. Unlike [`Value`], the same array or
/// object can be reachable from several parents, or from inside itself.
#[derive(Debug, Clone)]
pub enum SharedJson {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Rc<RefCell<Vec<SharedJson>>>),
    Object(Rc<RefCell<Vec<(String, SharedJson)>>>),
}

impl SharedJson {
    pub fn array(items: Vec<SharedJson>) -> Self {
        SharedJson::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object<K: Into<String>>(entries: Vec<(K, SharedJson)>) -> Self {
        let entries = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        SharedJson::Object(Rc::new(RefCell::new(entries)))
    }

    /// Appends to an array node. No-op for other nodes.
    pub fn push(&self, item: SharedJson) {
        if let SharedJson::Array(items) = self {
            items.borrow_mut().push(item);
        }
    }

    /// Inserts or replaces a key on an object node. No-op for other nodes.
    pub fn insert(&self, key: &str, item: SharedJson) {
        if let SharedJson::Object(entries) = self {
            let mut entries = entries.borrow_mut();
            match entries.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = item,
                None => entries.push((key.to_string(), item)),
            }
        }
    }

    /// Drops every child of a container; used to break reference cycles.
    pub fn clear(&self) {
        match self {
            SharedJson::Array(items) => items.borrow_mut().clear(),
            SharedJson::Object(entries) => entries.borrow_mut().clear(),
            _ => {}
        }
    }

    pub fn canonical(&self) -> Result<String, CanonicalError> {
        CanonicalEncoder::new().encode(self)
    }
}

impl JsonGraph for SharedJson {
    fn container_id(&self) -> Option<usize> {
        match self {
            SharedJson::Array(items) => Some(Rc::as_ptr(items) as *const () as usize),
            SharedJson::Object(entries) => Some(Rc::as_ptr(entries) as *const () as usize),
            _ => None,
        }
    }

    fn node(&self) -> JsonNode<Self> {
        match self {
            SharedJson::Null => JsonNode::Scalar(Value::Null),
            SharedJson::Bool(b) => JsonNode::Scalar(Value::Bool(*b)),
            SharedJson::Number(n) => JsonNode::Scalar(Value::Number(n.clone())),
            SharedJson::String(s) => JsonNode::Scalar(Value::String(s.clone())),
            SharedJson::Array(items) => JsonNode::Array(items.borrow().clone()),
            SharedJson::Object(entries) => JsonNode::Object(entries.borrow().clone()),
        }
    }
}

impl From<&Value> for SharedJson {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SharedJson::Null,
            Value::Bool(b) => SharedJson::Bool(*b),
            Value::Number(n) => SharedJson::Number(n.clone()),
            Value::String(s) => SharedJson::String(s.clone()),
            Value::Array(items) => SharedJson::array(items.iter().map(SharedJson::from).collect()),
            Value::Object(map) => SharedJson::object(
                map.iter().map(|(k, v)| (k.clone(), SharedJson::from(v))).collect(),
            ),
        }
    }
}

/// Parses a canonical string back into a key-sorted [`Value`].
pub fn parse_canonical(input: &str) -> Result<Value, serde_json::Error> {
    let value: Value = serde_json::from_str(input)?;
    Ok(sort_keys(value))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, sort_keys(v));
            }
            Value::Object(sorted)
        }
        scalar => scalar,
    }
}
