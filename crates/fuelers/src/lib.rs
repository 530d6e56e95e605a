//! Fueler registry domain module (certifiable ramp/fuel-crew employees).
//!
//! Business rules for fueler profiles, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod fueler;

pub use fueler::{Fueler, FuelerStatus, RegisterFueler, UpdateFueler};
