//! `fuelcert-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the catalog, registry and
//! certification ledger (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AssignmentId, CertificationId, FuelerId, HistoryEntryId, TrainingId, UserId};
pub use value_object::ValueObject;
