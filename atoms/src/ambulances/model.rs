use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Document, StoreError};

/// Field paths inside an `ambulances` document.
pub mod fields {
    pub const STATUS: &str = "status";
    pub const CURRENT_DRIVER_ID: &str = "currentDriverId";
    pub const UPDATED_AT: &str = "updatedAt";
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum AmbulanceStatus {
    Available,
    #[default]
    Offline,
    OnDuty,
}

impl AmbulanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmbulanceStatus::Available => "available",
            AmbulanceStatus::Offline => "offline",
            AmbulanceStatus::OnDuty => "on_duty",
        }
    }

    /// Not currently on a call.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, AmbulanceStatus::Available | AmbulanceStatus::Offline)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ambulance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: AmbulanceStatus,
    #[serde(default)]
    pub current_driver_id: Option<String>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ambulance {
    pub fn from_document(id: &str, doc: Document) -> Result<Self, StoreError> {
        let mut ambulance: Ambulance = serde_json::from_value(Value::Object(doc))
            .map_err(|e| StoreError::Decode(format!("ambulances/{}: {}", id, e)))?;
        ambulance.id = id.to_string();
        Ok(ambulance)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateAmbulancePayload {
    pub status: AmbulanceStatus,
}
