use chrono::Utc;
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::Value;

use super::model::{fields, Ambulance, AmbulanceStatus};
use crate::error::DispatchError;
use crate::store::{Collection, DocumentStore, StoreError, Write};

pub async fn load_ambulance(store: &dyn DocumentStore, ambulance_id: &str) -> Result<Option<Ambulance>, StoreError> {
    store
        .get(Collection::Ambulances, ambulance_id)
        .await?
        .map(|doc| Ambulance::from_document(ambulance_id, doc))
        .transpose()
}

fn load_owned(
    store: &dyn DocumentStore,
    ambulance_id: String,
) -> BoxFuture<'_, Result<Option<Ambulance>, StoreError>> {
    Box::pin(async move { load_ambulance(store, &ambulance_id).await })
}

/// Load ambulances in the order of `ids`, skipping ids with no document.
///
/// Reads run concurrently, at most `store.read_concurrency()` at a time.
pub async fn load_ambulances(store: &dyn DocumentStore, ids: &[String]) -> Result<Vec<Ambulance>, StoreError> {
    let limit = store.read_concurrency().max(1);
    let loaded: Vec<Option<Ambulance>> = stream::iter(ids.to_vec())
        .map(|id| load_owned(store, id))
        .buffered(limit)
        .try_collect()
        .await?;

    Ok(loaded.into_iter().flatten().collect())
}

pub async fn get_ambulance(store: &dyn DocumentStore, ambulance_id: &str) -> Result<Option<Ambulance>, DispatchError> {
    load_ambulance(store, ambulance_id)
        .await
        .map_err(|e| DispatchError::op("load ambulance", e))
}

/// Set an ambulance's status, e.g. when its crew goes on a call.
pub async fn update_ambulance_status(
    store: &dyn DocumentStore,
    ambulance_id: &str,
    status: AmbulanceStatus,
) -> Result<(), DispatchError> {
    let write = Write::update(Collection::Ambulances, ambulance_id)
        .set(fields::STATUS, status.as_str())
        .set(fields::UPDATED_AT, Value::String(Utc::now().to_rfc3339()));

    store.update(write).await.map_err(|e| {
        tracing::error!("Failed to update status of ambulance {}: {}", ambulance_id, e);
        DispatchError::op("update ambulance status", e)
    })?;

    tracing::info!("Ambulance {} is now {}", ambulance_id, status.as_str());
    Ok(())
}
