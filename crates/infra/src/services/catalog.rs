use tracing::instrument;

use fuelcert_core::{DomainError, TrainingId};
use fuelcert_training::{RegisterTraining, Training, UpdateTraining};

use crate::store::{CatalogStore, StoreResult};

/// Training catalog use cases.
#[derive(Debug, Clone)]
pub struct TrainingCatalog<S> {
    store: S,
}

impl<S: CatalogStore> TrainingCatalog<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, cmd), fields(training_id = %cmd.training_id, name = %cmd.name), err)]
    pub async fn register(&self, cmd: RegisterTraining) -> StoreResult<Training> {
        let training = Training::register(cmd)?;
        self.store.insert_training(&training).await?;
        tracing::info!(validity = ?training.validity, "training registered");
        Ok(training)
    }

    pub async fn get(&self, id: TrainingId) -> StoreResult<Training> {
        self.store
            .get_training(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("training {id}")).into())
    }

    pub async fn list(&self) -> StoreResult<Vec<Training>> {
        self.store.list_trainings().await
    }

    /// Changing the validity period affects future completions only; existing expiry
    /// dates are not recomputed.
    #[instrument(skip(self, update), fields(training_id = %id), err)]
    pub async fn update(&self, id: TrainingId, update: UpdateTraining) -> StoreResult<Training> {
        let mut training = self.get(id).await?;
        training.apply_update(update, super::now())?;
        self.store.save_training(&training).await?;
        Ok(training)
    }

    #[instrument(skip(self), fields(training_id = %id), err)]
    pub async fn delete(&self, id: TrainingId) -> StoreResult<()> {
        self.store.delete_training(id).await?;
        tracing::info!("training deleted");
        Ok(())
    }
}
