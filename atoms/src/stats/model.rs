use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::ambulances::model::{Ambulance, AmbulanceStatus};

/// Fleet summary for one driver.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DriverStats {
    /// Length of the assignment list, including ids with no ambulance document.
    pub total: usize,
    pub available: usize,
    pub on_duty: usize,
    pub is_available: bool,
    pub last_update: Option<DateTime<Utc>>,
}

impl DriverStats {
    pub fn tally(
        assigned: usize,
        ambulances: &[Ambulance],
        is_available: bool,
        last_update: Option<DateTime<Utc>>,
    ) -> Self {
        let count = |status: AmbulanceStatus| ambulances.iter().filter(|a| a.status == status).count();
        Self {
            total: assigned,
            available: count(AmbulanceStatus::Available),
            on_duty: count(AmbulanceStatus::OnDuty),
            is_available,
            last_update,
        }
    }
}
