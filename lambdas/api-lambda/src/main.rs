use std::sync::Arc;

use dispatch_shared::AppState;
use lambda_http::{run, service_fn, tracing, Error, Request};

mod http_handler;
use http_handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Built once per cold start and shared by every invocation.
    let state = Arc::new(AppState::from_env().await);

    run(service_fn(move |event: Request| {
        let state = state.clone();
        async move { function_handler(event, state).await }
    }))
    .await
}
