use futures::stream::BoxStream;

use super::model::DriverStats;
use crate::ambulances::service::load_ambulances;
use crate::error::DispatchError;
use crate::live::live_snapshots;
use crate::store::{Collection, DocumentStore};
use crate::users::service::require_driver;

/// Count a driver's ambulances by status. Not cached: every call re-reads the
/// driver and each assigned ambulance.
pub async fn get_stats(store: &dyn DocumentStore, driver_id: &str) -> Result<DriverStats, DispatchError> {
    const ACTION: &str = "load driver stats";
    let driver = require_driver(store, driver_id, ACTION).await?;

    let assigned = driver.assigned_ambulances();
    let ambulances = load_ambulances(store, assigned)
        .await
        .map_err(|e| DispatchError::op(ACTION, e))?;

    Ok(DriverStats::tally(
        assigned.len(),
        &ambulances,
        driver.role_specific_data.is_available,
        driver.role_specific_data.last_availability_update,
    ))
}

pub fn watch_stats<'a>(
    store: &'a dyn DocumentStore,
    driver_id: &str,
) -> BoxStream<'a, Result<DriverStats, DispatchError>> {
    let driver_id = driver_id.to_string();
    live_snapshots(store, &[Collection::Users, Collection::Ambulances], move || {
        let driver_id = driver_id.clone();
        async move { get_stats(store, &driver_id).await }
    })
}
