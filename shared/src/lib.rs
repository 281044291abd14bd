pub mod ambulances;
pub mod config;
pub mod drivers;
pub mod responses;

use std::sync::Arc;

use aws_sdk_dynamodb::Client as DynamoClient;
use dispatch_atoms::store::{DocumentStore, DynamoStore};

pub use config::Config;

/// Clients shared across Lambda invocations.
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    /// Build the DynamoDB-backed state from the environment.
    pub async fn from_env() -> Self {
        let config = Config::from_env();
        let aws_config = aws_config::load_from_env().await;
        let dynamo_client = DynamoClient::new(&aws_config);

        let store = DynamoStore::new(dynamo_client, &config.users_table, &config.ambulances_table)
            .with_read_concurrency(config.fan_out_limit)
            .with_poll_interval(config.poll_interval);

        tracing::info!(
            "Dispatch state ready - users: {} ambulances: {} fan-out: {}",
            config.users_table,
            config.ambulances_table,
            config.fan_out_limit
        );

        Self::with_store(Arc::new(store))
    }

    pub fn with_store(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}
