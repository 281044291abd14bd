use std::collections::HashMap;

use chrono::Utc;
use futures::stream::BoxStream;
use serde_json::Value;

use super::model::{fields, User, UserRole};
use crate::ambulances::service::load_ambulances;
use crate::error::DispatchError;
use crate::live::live_snapshots;
use crate::store::{Collection, DocumentStore, FieldFilter, StoreError, Write};

/// Load a user document (no role check). `Ok(None)` when it does not exist.
pub async fn load_driver(store: &dyn DocumentStore, driver_id: &str) -> Result<Option<User>, StoreError> {
    store
        .get(Collection::Users, driver_id)
        .await?
        .map(|doc| User::from_document(driver_id, doc))
        .transpose()
}

/// Load the driver or fail with `DriverNotFound`.
pub(crate) async fn require_driver(
    store: &dyn DocumentStore,
    driver_id: &str,
    action: &'static str,
) -> Result<User, DispatchError> {
    load_driver(store, driver_id)
        .await
        .map_err(|e| DispatchError::op(action, e))?
        .ok_or_else(|| {
            tracing::warn!("Driver {} not found while trying to {}", driver_id, action);
            DispatchError::DriverNotFound(driver_id.to_string())
        })
}

pub async fn get_driver(store: &dyn DocumentStore, driver_id: &str) -> Result<User, DispatchError> {
    require_driver(store, driver_id, "load driver").await
}

async fn query_drivers(store: &dyn DocumentStore, filters: &[FieldFilter]) -> Result<Vec<User>, StoreError> {
    store
        .query(Collection::Users, filters)
        .await?
        .into_iter()
        .map(|(id, doc)| User::from_document(&id, doc))
        .collect()
}

/// Active drivers with at least one assigned ambulance.
///
/// `hospital_id` is accepted for API compatibility but is not a filter: user
/// documents carry no hospital link to match on.
pub async fn drivers_for_hospital(
    store: &dyn DocumentStore,
    hospital_id: &str,
) -> Result<Vec<User>, DispatchError> {
    tracing::debug!("Listing drivers (hospital {} is not applied as a filter)", hospital_id);

    let filters = [
        FieldFilter::eq(fields::ROLE, UserRole::AmbulanceDriver.as_str()),
        FieldFilter::eq(fields::IS_ACTIVE, true),
    ];
    let drivers = query_drivers(store, &filters)
        .await
        .map_err(|e| DispatchError::op("load drivers", e))?;

    Ok(drivers
        .into_iter()
        .filter(|d| !d.assigned_ambulances().is_empty())
        .collect())
}

/// Live version of [`drivers_for_hospital`].
pub fn list_drivers_for_hospital<'a>(
    store: &'a dyn DocumentStore,
    hospital_id: &str,
) -> BoxStream<'a, Result<Vec<User>, DispatchError>> {
    let hospital_id = hospital_id.to_string();
    live_snapshots(store, &[Collection::Users], move || {
        let hospital_id = hospital_id.clone();
        async move { drivers_for_hospital(store, &hospital_id).await }
    })
}

/// On-shift active drivers that can take a call: no ambulance assigned yet, or
/// at least one assigned ambulance that is `available` or `offline`.
pub async fn available_drivers(
    store: &dyn DocumentStore,
    hospital_id: &str,
) -> Result<Vec<User>, DispatchError> {
    const ACTION: &str = "load available drivers";
    tracing::debug!("Listing available drivers (hospital {} is not applied as a filter)", hospital_id);

    let filters = [
        FieldFilter::eq(fields::ROLE, UserRole::AmbulanceDriver.as_str()),
        FieldFilter::eq(fields::IS_AVAILABLE, true),
        FieldFilter::eq(fields::IS_ACTIVE, true),
    ];
    let drivers = query_drivers(store, &filters)
        .await
        .map_err(|e| DispatchError::op(ACTION, e))?;

    // Each ambulance is read once, however many drivers list it.
    let mut ids: Vec<String> = Vec::new();
    for id in drivers.iter().flat_map(|d| d.assigned_ambulances()) {
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    let statuses: HashMap<String, _> = load_ambulances(store, &ids)
        .await
        .map_err(|e| DispatchError::op(ACTION, e))?
        .into_iter()
        .map(|a| (a.id, a.status))
        .collect();

    Ok(drivers
        .into_iter()
        .filter(|d| {
            let assigned = d.assigned_ambulances();
            assigned.is_empty()
                || assigned
                    .iter()
                    .filter_map(|id| statuses.get(id))
                    .any(|status| status.is_dispatchable())
        })
        .collect())
}

/// Live version of [`available_drivers`]; reloads on driver and ambulance changes.
pub fn list_available_drivers<'a>(
    store: &'a dyn DocumentStore,
    hospital_id: &str,
) -> BoxStream<'a, Result<Vec<User>, DispatchError>> {
    let hospital_id = hospital_id.to_string();
    live_snapshots(store, &[Collection::Users, Collection::Ambulances], move || {
        let hospital_id = hospital_id.clone();
        async move { available_drivers(store, &hospital_id).await }
    })
}

/// Put a driver on or off shift.
pub async fn set_availability(
    store: &dyn DocumentStore,
    driver_id: &str,
    is_available: bool,
) -> Result<(), DispatchError> {
    let now = Value::String(Utc::now().to_rfc3339());
    let write = Write::update(Collection::Users, driver_id)
        .set(fields::IS_AVAILABLE, is_available)
        .set(fields::LAST_AVAILABILITY_UPDATE, now.clone())
        .set(fields::UPDATED_AT, now);

    store.update(write).await.map_err(|e| {
        tracing::error!("Failed to update availability for driver {}: {}", driver_id, e);
        DispatchError::op("update availability", e)
    })?;

    tracing::info!("Driver {} availability set to {}", driver_id, is_available);
    Ok(())
}
