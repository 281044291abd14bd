pub mod model;
pub mod service;

pub use model::{DriverData, UpdateAvailabilityPayload, User, UserRole};
pub use service::*;
