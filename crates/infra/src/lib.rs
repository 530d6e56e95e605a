//! Infrastructure layer: storage adapters, application services, configuration.
//!
//! - `store`: storage boundary (`CatalogStore`, `RegistryStore`, `LedgerStore`,
//!   `AssignmentStore`) with an in-memory adapter for tests/dev and a Postgres adapter for
//!   production
//! - `services`: use-case orchestration on top of a store (catalog, registry, ledger,
//!   assignments, calendar)
//! - `config`: environment-driven runtime configuration

pub mod config;
pub mod services;
pub mod store;


pub use config::{AppConfig, ConfigError};
pub use services::{
    CalendarProjector, CertificationLedger, FuelerRegistry, LedgerOptions, TrainingAssignments, TrainingCatalog,
};
pub use store::{
    AssignmentFilter, AssignmentStore, CatalogStore, CertificationFilter, InMemoryStore, LedgerStore, PostgresStore,
    RegistryStore, Store, StoreError, StoreResult,
};
