// Application layer - use cases over the record store.
// Loads consistent snapshots of friends and expenses and hands them to the
// pure balance/settlement engine in `domain`.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
