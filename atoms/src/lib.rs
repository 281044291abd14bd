//! Driver and ambulance bookkeeping for the dispatch app.
//!
//! Every operation takes a [`store::DocumentStore`]; nothing here holds state
//! of its own.

pub mod ambulances;
pub mod assignments;
pub mod error;
pub mod live;
pub mod stats;
pub mod store;
pub mod users;

pub use error::DispatchError;
