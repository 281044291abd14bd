use std::fmt::Display;

use thiserror::Error;

/// Failure of a dispatch operation.
///
/// Callers get a flat message naming the failed operation; a missing driver is
/// the one condition reported on its own.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Driver not found")]
    DriverNotFound(String),
    #[error("Failed to {action}: {cause}")]
    Operation { action: &'static str, cause: String },
}

impl DispatchError {
    pub(crate) fn op(action: &'static str, cause: impl Display) -> Self {
        DispatchError::Operation {
            action,
            cause: cause.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::DriverNotFound(_))
    }
}
