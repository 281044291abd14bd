use chrono::Utc;
use futures::stream::BoxStream;
use serde_json::{json, Value};

use crate::ambulances::model::{fields as ambulance_fields, Ambulance, AmbulanceStatus};
use crate::ambulances::service::load_ambulances;
use crate::error::DispatchError;
use crate::live::live_snapshots;
use crate::store::{Collection, DocumentStore, Write};
use crate::users::model::fields as user_fields;
use crate::users::service::{load_driver, require_driver};

fn timestamp() -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// Assign an ambulance to a driver.
///
/// Adds the id to the driver's list (no-op if already present) and points the
/// ambulance at the driver. Both documents change in one batch; the batch is
/// rejected if the driver's list changed since it was read.
pub async fn assign(
    store: &dyn DocumentStore,
    driver_id: &str,
    ambulance_id: &str,
) -> Result<(), DispatchError> {
    const ACTION: &str = "assign ambulance";
    let driver = require_driver(store, driver_id, ACTION).await?;

    let current = driver.role_specific_data.assigned_ambulances;
    let mut next = current.clone();
    if !next.iter().any(|id| id == ambulance_id) {
        next.push(ambulance_id.to_string());
    }

    let now = timestamp();
    let writes = vec![
        Write::update(Collection::Users, driver_id)
            .set(user_fields::ASSIGNED_AMBULANCES, json!(next))
            .set(user_fields::UPDATED_AT, now.clone())
            .expecting(user_fields::ASSIGNED_AMBULANCES, json!(current)),
        Write::update(Collection::Ambulances, ambulance_id)
            .set(ambulance_fields::CURRENT_DRIVER_ID, driver_id)
            .set(ambulance_fields::UPDATED_AT, now),
    ];

    store.commit(writes).await.map_err(|e| {
        tracing::error!("Failed to assign ambulance {} to driver {}: {}", ambulance_id, driver_id, e);
        DispatchError::op(ACTION, e)
    })?;

    tracing::info!("Assigned ambulance {} to driver {}", ambulance_id, driver_id);
    Ok(())
}

/// Remove an ambulance from a driver.
///
/// Drops the id from the driver's list (no-op if absent) and always clears the
/// ambulance's driver and takes it offline.
pub async fn unassign(
    store: &dyn DocumentStore,
    driver_id: &str,
    ambulance_id: &str,
) -> Result<(), DispatchError> {
    const ACTION: &str = "unassign ambulance";
    let driver = require_driver(store, driver_id, ACTION).await?;

    let current = driver.role_specific_data.assigned_ambulances;
    let next: Vec<&String> = current.iter().filter(|id| *id != ambulance_id).collect();

    let now = timestamp();
    let writes = vec![
        Write::update(Collection::Users, driver_id)
            .set(user_fields::ASSIGNED_AMBULANCES, json!(next))
            .set(user_fields::UPDATED_AT, now.clone())
            .expecting(user_fields::ASSIGNED_AMBULANCES, json!(current)),
        Write::update(Collection::Ambulances, ambulance_id)
            .set(ambulance_fields::CURRENT_DRIVER_ID, Value::Null)
            .set(ambulance_fields::STATUS, AmbulanceStatus::Offline.as_str())
            .set(ambulance_fields::UPDATED_AT, now),
    ];

    store.commit(writes).await.map_err(|e| {
        tracing::error!("Failed to unassign ambulance {} from driver {}: {}", ambulance_id, driver_id, e);
        DispatchError::op(ACTION, e)
    })?;

    tracing::info!("Unassigned ambulance {} from driver {}", ambulance_id, driver_id);
    Ok(())
}

/// Move a driver from one ambulance to another in a single batch: `from_id`
/// goes offline with no driver, `to_id` becomes available under `driver_id`.
///
/// Only the two ambulance documents change. The driver's
/// `assignedAmbulances` list is left as it was, so callers that need the list
/// to follow must `assign`/`unassign` as well. Switching an ambulance to
/// itself is rejected.
pub async fn switch_assignment(
    store: &dyn DocumentStore,
    driver_id: &str,
    from_id: &str,
    to_id: &str,
) -> Result<(), DispatchError> {
    const ACTION: &str = "switch ambulance";
    require_driver(store, driver_id, ACTION).await?;
    if from_id == to_id {
        return Err(DispatchError::op(
            ACTION,
            format!("ambulance {} cannot replace itself", from_id),
        ));
    }

    let now = timestamp();
    let writes = vec![
        Write::update(Collection::Ambulances, from_id)
            .set(ambulance_fields::CURRENT_DRIVER_ID, Value::Null)
            .set(ambulance_fields::STATUS, AmbulanceStatus::Offline.as_str())
            .set(ambulance_fields::UPDATED_AT, now.clone()),
        Write::update(Collection::Ambulances, to_id)
            .set(ambulance_fields::CURRENT_DRIVER_ID, driver_id)
            .set(ambulance_fields::STATUS, AmbulanceStatus::Available.as_str())
            .set(ambulance_fields::UPDATED_AT, now),
    ];

    store.commit(writes).await.map_err(|e| {
        tracing::error!("Failed to switch driver {} from {} to {}: {}", driver_id, from_id, to_id, e);
        DispatchError::op(ACTION, e)
    })?;

    tracing::info!("Switched driver {} from ambulance {} to {}", driver_id, from_id, to_id);
    Ok(())
}

/// Ambulances currently listed on the driver, in list order. Empty when the
/// driver does not exist; ambulances without a document are skipped.
pub async fn assigned_ambulances(
    store: &dyn DocumentStore,
    driver_id: &str,
) -> Result<Vec<Ambulance>, DispatchError> {
    const ACTION: &str = "load assigned ambulances";
    let Some(driver) = load_driver(store, driver_id)
        .await
        .map_err(|e| DispatchError::op(ACTION, e))?
    else {
        return Ok(vec![]);
    };

    load_ambulances(store, driver.assigned_ambulances())
        .await
        .map_err(|e| DispatchError::op(ACTION, e))
}

/// Live version of [`assigned_ambulances`].
pub fn get_assigned_ambulances<'a>(
    store: &'a dyn DocumentStore,
    driver_id: &str,
) -> BoxStream<'a, Result<Vec<Ambulance>, DispatchError>> {
    let driver_id = driver_id.to_string();
    live_snapshots(store, &[Collection::Users, Collection::Ambulances], move || {
        let driver_id = driver_id.clone();
        async move { assigned_ambulances(store, &driver_id).await }
    })
}
