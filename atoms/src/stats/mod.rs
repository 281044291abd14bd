pub mod model;
pub mod service;

pub use model::DriverStats;
pub use service::*;
