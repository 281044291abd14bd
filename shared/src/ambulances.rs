use dispatch_atoms::ambulances::{self, UpdateAmbulancePayload};
use dispatch_atoms::assignments;
use dispatch_atoms::store::DocumentStore;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Deserialize;

use crate::drivers::list_assigned_ambulances;
use crate::responses::{bad_request, dispatch_error, error_response, json_response, no_content};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchAssignmentPayload {
    pub from_ambulance_id: String,
    pub to_ambulance_id: String,
}

pub async fn get_ambulance(store: &dyn DocumentStore, ambulance_id: &str) -> Result<Response<Body>, Error> {
    match ambulances::get_ambulance(store, ambulance_id).await {
        Ok(Some(ambulance)) => json_response(StatusCode::OK, &ambulance),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Ambulance not found"),
        Err(e) => dispatch_error(e),
    }
}

pub async fn update_ambulance(
    store: &dyn DocumentStore,
    ambulance_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: UpdateAmbulancePayload = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => return bad_request(e),
    };

    if let Err(e) = ambulances::update_ambulance_status(store, ambulance_id, req.status).await {
        return dispatch_error(e);
    }

    get_ambulance(store, ambulance_id).await
}

/// Assign, then return the driver's ambulances
pub async fn assign(
    store: &dyn DocumentStore,
    driver_id: &str,
    ambulance_id: &str,
) -> Result<Response<Body>, Error> {
    if let Err(e) = assignments::assign(store, driver_id, ambulance_id).await {
        return dispatch_error(e);
    }
    list_assigned_ambulances(store, driver_id).await
}

pub async fn unassign(
    store: &dyn DocumentStore,
    driver_id: &str,
    ambulance_id: &str,
) -> Result<Response<Body>, Error> {
    match assignments::unassign(store, driver_id, ambulance_id).await {
        Ok(()) => no_content(),
        Err(e) => dispatch_error(e),
    }
}

pub async fn switch_assignment(
    store: &dyn DocumentStore,
    driver_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: SwitchAssignmentPayload = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => return bad_request(e),
    };

    match assignments::switch_assignment(store, driver_id, &req.from_ambulance_id, &req.to_ambulance_id).await {
        Ok(()) => no_content(),
        Err(e) => dispatch_error(e),
    }
}
