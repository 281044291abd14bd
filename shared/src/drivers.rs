use dispatch_atoms::store::DocumentStore;
use dispatch_atoms::users::{self, UpdateAvailabilityPayload};
use dispatch_atoms::{assignments, stats};
use lambda_http::{http::StatusCode, Body, Error, Response};

use crate::responses::{bad_request, dispatch_error, json_response};

/// List drivers with ambulances assigned (current snapshot)
pub async fn list_drivers(store: &dyn DocumentStore, hospital_id: &str) -> Result<Response<Body>, Error> {
    match users::drivers_for_hospital(store, hospital_id).await {
        Ok(drivers) => json_response(StatusCode::OK, &drivers),
        Err(e) => dispatch_error(e),
    }
}

/// List drivers that can take a call (current snapshot)
pub async fn list_available_drivers(store: &dyn DocumentStore, hospital_id: &str) -> Result<Response<Body>, Error> {
    match users::available_drivers(store, hospital_id).await {
        Ok(drivers) => json_response(StatusCode::OK, &drivers),
        Err(e) => dispatch_error(e),
    }
}

pub async fn get_driver(store: &dyn DocumentStore, driver_id: &str) -> Result<Response<Body>, Error> {
    match users::get_driver(store, driver_id).await {
        Ok(driver) => json_response(StatusCode::OK, &driver),
        Err(e) => dispatch_error(e),
    }
}

/// Toggle a driver's shift, then return the refreshed driver
pub async fn set_availability(
    store: &dyn DocumentStore,
    driver_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: UpdateAvailabilityPayload = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => return bad_request(e),
    };

    if let Err(e) = users::set_availability(store, driver_id, req.is_available).await {
        return dispatch_error(e);
    }

    get_driver(store, driver_id).await
}

pub async fn get_stats(store: &dyn DocumentStore, driver_id: &str) -> Result<Response<Body>, Error> {
    match stats::get_stats(store, driver_id).await {
        Ok(stats) => json_response(StatusCode::OK, &stats),
        Err(e) => dispatch_error(e),
    }
}

/// Ambulances on the driver's list (current snapshot)
pub async fn list_assigned_ambulances(store: &dyn DocumentStore, driver_id: &str) -> Result<Response<Body>, Error> {
    match assignments::assigned_ambulances(store, driver_id).await {
        Ok(ambulances) => json_response(StatusCode::OK, &ambulances),
        Err(e) => dispatch_error(e),
    }
}
