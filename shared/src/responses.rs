use dispatch_atoms::DispatchError;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub fn error_response(status: StatusCode, message: &str) -> Result<Response<Body>, Error> {
    json_response(status, &serde_json::json!({ "error": message }))
}

/// Missing driver is a 404; every other failure is reported as a 500.
pub fn dispatch_error(err: DispatchError) -> Result<Response<Body>, Error> {
    if err.is_not_found() {
        return error_response(StatusCode::NOT_FOUND, &err.to_string());
    }
    tracing::error!("Dispatch operation failed: {}", err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

pub fn bad_request(err: serde_json::Error) -> Result<Response<Body>, Error> {
    error_response(StatusCode::BAD_REQUEST, &format!("Invalid request body: {}", err))
}

pub fn no_content() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn not_found() -> Result<Response<Body>, Error> {
    error_response(StatusCode::NOT_FOUND, "Not found")
}
