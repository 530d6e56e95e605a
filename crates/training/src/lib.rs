//! Training catalog (certification types) and the expiry calculator.
//!
//! Pure domain logic: no IO, no HTTP, no storage. Name uniqueness and referential
//! checks are enforced by whichever store holds the catalog.

pub mod expiry;
pub mod training;

pub use expiry::{MAX_VALIDITY_DAYS, ValidityPeriod, compute_expiry};
pub use training::{RegisterTraining, Training, UpdateTraining};
