//! Document store seam.
//!
//! Services in this crate never talk to a database client directly; they take a
//! `&dyn DocumentStore` and work with JSON documents addressed by collection and
//! id. Field paths are dotted (`roleSpecificData.isAvailable`) and resolve into
//! nested maps.

pub mod dynamo;
pub mod memory;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::Value;
use thiserror::Error;

pub use dynamo::DynamoStore;
pub use memory::MemoryStore;

/// A stored document, without its id.
pub type Document = serde_json::Map<String, Value>;

/// Default number of document reads a service keeps in flight at once.
pub const DEFAULT_READ_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Users,
    Ambulances,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Ambulances => "ambulances",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
    #[error("No document to update: {collection}/{id}")]
    NotFound { collection: Collection, id: String },
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Malformed document: {0}")]
    Decode(String),
}

/// Equality test on a single field path.
///
/// An absent field compares equal to `null` and to an empty list, so a
/// precondition built from a freshly decoded (defaulted) model still matches
/// the document it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub path: String,
    pub value: Value,
}

impl FieldFilter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match field(doc, &self.path) {
            Some(found) => found == &self.value,
            None => matches_absent(&self.value),
        }
    }
}

pub(crate) fn matches_absent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Field-level update of one existing document.
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub collection: Collection,
    pub id: String,
    pub fields: Vec<(String, Value)>,
    pub precondition: Option<FieldFilter>,
}

impl Write {
    pub fn update(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
            fields: vec![],
            precondition: None,
        }
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((path.into(), value.into()));
        self
    }

    /// Only apply the write if `path` still holds `value`.
    pub fn expecting(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.precondition = Some(FieldFilter::eq(path, value));
        self
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents matching every filter, as `(id, document)` pairs.
    async fn query(
        &self,
        collection: Collection,
        filters: &[FieldFilter],
    ) -> Result<Vec<(String, Document)>, StoreError>;

    /// Update fields of an existing document. Fails with `NotFound` if the
    /// document does not exist.
    async fn update(&self, write: Write) -> Result<(), StoreError> {
        self.commit(vec![write]).await
    }

    /// Apply all writes atomically: every write lands or none does.
    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError>;

    /// Yields once per observed change to `collection`. Implementations may
    /// over-report; consumers compare snapshots.
    fn changes(&self, collection: Collection) -> BoxStream<'static, ()>;

    fn read_concurrency(&self) -> usize {
        DEFAULT_READ_CONCURRENCY
    }
}

/// Resolve a dotted path inside a document.
pub fn field<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set a dotted path, creating (or replacing non-map) intermediate values.
pub fn set_field(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Document::new()));
            if !child.is_object() {
                *child = Value::Object(Document::new());
            }
            if let Value::Object(map) = child {
                set_field(map, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn field_resolves_nested_paths() {
        let d = doc(json!({"roleSpecificData": {"isAvailable": true}, "role": "admin"}));
        assert_eq!(field(&d, "role"), Some(&json!("admin")));
        assert_eq!(field(&d, "roleSpecificData.isAvailable"), Some(&json!(true)));
        assert_eq!(field(&d, "roleSpecificData.missing"), None);
        assert_eq!(field(&d, "role.nested"), None);
    }

    #[test]
    fn set_field_creates_intermediate_maps() {
        let mut d = Document::new();
        set_field(&mut d, "roleSpecificData.assignedAmbulances", json!(["a1"]));
        set_field(&mut d, "roleSpecificData.isAvailable", json!(false));
        assert_eq!(
            Value::Object(d),
            json!({"roleSpecificData": {"assignedAmbulances": ["a1"], "isAvailable": false}})
        );
    }

    #[test]
    fn set_field_replaces_scalar_parent() {
        let mut d = doc(json!({"roleSpecificData": 3}));
        set_field(&mut d, "roleSpecificData.isAvailable", json!(true));
        assert_eq!(field(&d, "roleSpecificData.isAvailable"), Some(&json!(true)));
    }

    #[test]
    fn absent_field_matches_empty_list_and_null_only() {
        let d = Document::new();
        assert!(FieldFilter::eq("a.b", json!([])).matches(&d));
        assert!(FieldFilter::eq("a", Value::Null).matches(&d));
        assert!(!FieldFilter::eq("a", json!(false)).matches(&d));
        assert!(!FieldFilter::eq("a", json!(["x"])).matches(&d));
    }
}
