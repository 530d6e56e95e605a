use std::sync::Arc;

use fuelcert_infra::{
    AppConfig, CalendarProjector, CertificationLedger, FuelerRegistry, InMemoryStore, LedgerOptions, PostgresStore,
    Store, StoreError, TrainingAssignments, TrainingCatalog,
};

/// Backend shared by every service.
pub type SharedStore = Arc<dyn Store>;

/// Services available to handlers, all running on the same store.
pub struct AppServices {
    pub catalog: TrainingCatalog<SharedStore>,
    pub registry: FuelerRegistry<SharedStore>,
    pub ledger: CertificationLedger<SharedStore>,
    pub calendar: CalendarProjector<SharedStore>,
    pub assignments: TrainingAssignments<SharedStore>,
}

impl AppServices {
    pub fn new(store: SharedStore, options: LedgerOptions) -> Self {
        Self {
            catalog: TrainingCatalog::new(store.clone()),
            registry: FuelerRegistry::new(store.clone()),
            ledger: CertificationLedger::new(store.clone(), options),
            calendar: CalendarProjector::new(store.clone()),
            assignments: TrainingAssignments::new(store),
        }
    }

    pub fn in_memory(options: LedgerOptions) -> Self {
        Self::new(Arc::new(InMemoryStore::new()), options)
    }

    /// Postgres when `DATABASE_URL` is set, in-memory otherwise.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StoreError> {
        let options = LedgerOptions {
            audit_create: config.audit_create,
        };

        match &config.database_url {
            Some(url) => {
                let store = PostgresStore::connect(url, config.database_max_connections).await?;
                tracing::info!(backend = "postgres", "services initialized");
                Ok(Self::new(Arc::new(store), options))
            }
            None => {
                tracing::warn!(backend = "in_memory", "DATABASE_URL not set; data will not survive a restart");
                Ok(Self::in_memory(options))
            }
        }
    }
}
