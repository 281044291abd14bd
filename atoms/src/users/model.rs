use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Document, StoreError};

/// Field paths inside a `users` document.
pub mod fields {
    pub const ROLE: &str = "role";
    pub const IS_ACTIVE: &str = "isActive";
    pub const IS_AVAILABLE: &str = "roleSpecificData.isAvailable";
    pub const LAST_AVAILABILITY_UPDATE: &str = "roleSpecificData.lastAvailabilityUpdate";
    pub const ASSIGNED_AMBULANCES: &str = "roleSpecificData.assignedAmbulances";
    pub const UPDATED_AT: &str = "updatedAt";
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum UserRole {
    Patient,
    AmbulanceDriver,
    HospitalStaff,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Patient => "patient",
            UserRole::AmbulanceDriver => "ambulanceDriver",
            UserRole::HospitalStaff => "hospitalStaff",
            UserRole::Admin => "admin",
        }
    }
}

/// Driver-only part of a user document.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DriverData {
    pub is_available: bool,
    pub last_availability_update: Option<DateTime<Utc>>,
    /// Expected to hold unique ids; the store does not enforce it.
    pub assigned_ambulances: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub role: UserRole,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub role_specific_data: DriverData,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn from_document(id: &str, doc: Document) -> Result<Self, StoreError> {
        let mut user: User = serde_json::from_value(Value::Object(doc))
            .map_err(|e| StoreError::Decode(format!("users/{}: {}", id, e)))?;
        user.id = id.to_string();
        Ok(user)
    }

    pub fn assigned_ambulances(&self) -> &[String] {
        &self.role_specific_data.assigned_ambulances
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAvailabilityPayload {
    pub is_available: bool,
}
