use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use super::{set_field, Collection, Document, DocumentStore, FieldFilter, StoreError, Write};

/// In-process document store. Reads and batches are serialized through one
/// lock, which gives `commit` its all-or-nothing behaviour.
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Document>>>,
    notifier: broadcast::Sender<Collection>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (notifier, _) = broadcast::channel(64);
        Self {
            collections: RwLock::new(HashMap::new()),
            notifier,
        }
    }

    /// Create or replace a whole document. Non-object values are rejected.
    pub async fn insert(&self, collection: Collection, id: &str, value: Value) -> Result<(), StoreError> {
        let Value::Object(doc) = value else {
            return Err(StoreError::Decode(format!("{}/{} is not an object", collection, id)));
        };
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(id.to_string(), doc);
        self.notify(collection);
        Ok(())
    }

    pub async fn remove(&self, collection: Collection, id: &str) -> Option<Document> {
        let removed = self
            .collections
            .write()
            .await
            .get_mut(&collection)
            .and_then(|docs| docs.remove(id));
        if removed.is_some() {
            self.notify(collection);
        }
        removed
    }

    fn notify(&self, collection: Collection) {
        // No subscribers is not an error.
        let _ = self.notifier.send(collection);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn query(
        &self,
        collection: Collection,
        filters: &[FieldFilter],
    ) -> Result<Vec<(String, Document)>, StoreError> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(vec![]);
        };
        Ok(docs
            .iter()
            .filter(|(_, doc)| filters.iter().all(|f| f.matches(doc)))
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    async fn commit(&self, writes: Vec<Write>) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let mut collections = self.collections.write().await;

        // Validate the whole batch before touching anything.
        for write in &writes {
            let doc = collections
                .get(&write.collection)
                .and_then(|docs| docs.get(&write.id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: write.collection,
                    id: write.id.clone(),
                })?;
            if let Some(expected) = &write.precondition {
                if !expected.matches(doc) {
                    return Err(StoreError::Conflict(format!(
                        "{}/{} field {} changed",
                        write.collection, write.id, expected.path
                    )));
                }
            }
        }

        let mut touched = BTreeSet::new();
        for write in writes {
            if let Some(doc) = collections
                .get_mut(&write.collection)
                .and_then(|docs| docs.get_mut(&write.id))
            {
                for (path, value) in write.fields {
                    set_field(doc, &path, value);
                }
                touched.insert(write.collection);
            }
        }
        drop(collections);

        for collection in touched {
            self.notify(collection);
        }
        Ok(())
    }

    fn changes(&self, collection: Collection) -> BoxStream<'static, ()> {
        let rx = self.notifier.subscribe();
        stream::unfold(rx, move |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(changed) if changed == collection => return Some(((), rx)),
                    Ok(_) => continue,
                    // Missed notifications still mean something changed.
                    Err(broadcast::error::RecvError::Lagged(_)) => return Some(((), rx)),
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}
