use std::sync::Arc;

use dispatch_shared::responses::not_found;
use dispatch_shared::{ambulances, drivers, AppState};
use lambda_http::http::header::{HeaderValue, VARY};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};

fn with_cors_headers(mut resp: Response<Body>) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET,POST,PUT,PATCH,DELETE,OPTIONS"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type,Authorization"),
    );
    headers.append(VARY, HeaderValue::from_static("Origin"));
    resp
}

/// Main Lambda handler - routes requests to driver and ambulance endpoints
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    let body = event.body();
    tracing::info!("Dispatch API invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        let resp = Response::builder()
            .status(StatusCode::OK)
            .body(Body::Empty)
            .map_err(Box::new)?;
        return Ok(with_cors_headers(resp));
    }

    let store = state.store.as_ref();
    let hospital_id = event
        .query_string_parameters_ref()
        .and_then(|params| params.first("hospitalId"))
        .unwrap_or_default()
        .to_string();
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let resp = match (method, parts.as_slice()) {
        // --- DRIVERS ---
        // GET /drivers - drivers with ambulances
        (&Method::GET, ["drivers"]) => drivers::list_drivers(store, &hospital_id).await,
        // GET /drivers/available - drivers that can take a call
        (&Method::GET, ["drivers", "available"]) => {
            drivers::list_available_drivers(store, &hospital_id).await
        }
        // GET /drivers/{id}
        (&Method::GET, ["drivers", driver_id]) => drivers::get_driver(store, driver_id).await,
        // PUT /drivers/{id}/availability
        (&Method::PUT, ["drivers", driver_id, "availability"]) => {
            drivers::set_availability(store, driver_id, body).await
        }
        // GET /drivers/{id}/stats
        (&Method::GET, ["drivers", driver_id, "stats"]) => drivers::get_stats(store, driver_id).await,

        // --- ASSIGNMENTS ---
        // GET /drivers/{id}/ambulances
        (&Method::GET, ["drivers", driver_id, "ambulances"]) => {
            drivers::list_assigned_ambulances(store, driver_id).await
        }
        // POST /drivers/{id}/ambulances/{aid} - assign
        (&Method::POST, ["drivers", driver_id, "ambulances", ambulance_id]) => {
            ambulances::assign(store, driver_id, ambulance_id).await
        }
        // DELETE /drivers/{id}/ambulances/{aid} - unassign
        (&Method::DELETE, ["drivers", driver_id, "ambulances", ambulance_id]) => {
            ambulances::unassign(store, driver_id, ambulance_id).await
        }
        // POST /drivers/{id}/switch
        (&Method::POST, ["drivers", driver_id, "switch"]) => {
            ambulances::switch_assignment(store, driver_id, body).await
        }

        // --- AMBULANCES ---
        (&Method::GET, ["ambulances", ambulance_id]) => ambulances::get_ambulance(store, ambulance_id).await,
        (&Method::PATCH, ["ambulances", ambulance_id]) => {
            ambulances::update_ambulance(store, ambulance_id, body).await
        }
        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            not_found()
        }
    };

    resp.map(with_cors_headers)
}
