use std::str::FromStr;
use std::time::Duration;

use dispatch_atoms::store::DEFAULT_READ_CONCURRENCY;

pub const USERS_TABLE: &str = "USERS_TABLE";
pub const AMBULANCES_TABLE: &str = "AMBULANCES_TABLE";
pub const FAN_OUT_LIMIT: &str = "FAN_OUT_LIMIT";
pub const POLL_INTERVAL_MS: &str = "POLL_INTERVAL_MS";

const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

/// Runtime settings, read once at cold start.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub users_table: String,
    pub ambulances_table: String,
    /// Max concurrent ambulance reads per operation.
    pub fan_out_limit: usize,
    /// How often live listings re-read the tables.
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            users_table: "users".to_string(),
            ambulances_table: "ambulances".to_string(),
            fan_out_limit: DEFAULT_READ_CONCURRENCY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            users_table: lookup(USERS_TABLE).unwrap_or(defaults.users_table),
            ambulances_table: lookup(AMBULANCES_TABLE).unwrap_or(defaults.ambulances_table),
            fan_out_limit: positive(FAN_OUT_LIMIT, lookup(FAN_OUT_LIMIT), defaults.fan_out_limit),
            poll_interval: Duration::from_millis(positive(
                POLL_INTERVAL_MS,
                lookup(POLL_INTERVAL_MS),
                DEFAULT_POLL_INTERVAL_MS,
            )),
        }
    }
}

/// Parse a positive number, falling back to `default` on absent or bad input.
fn positive<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
{
    let Some(raw) = raw else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => value,
        _ => {
            tracing::warn!("Invalid {}={:?}, using {}", key, raw, default);
            default
        }
    }
}
