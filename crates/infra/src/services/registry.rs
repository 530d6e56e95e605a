use tracing::instrument;

use fuelcert_core::{DomainError, FuelerId, UserId};
use fuelcert_fuelers::{Fueler, FuelerStatus, RegisterFueler, UpdateFueler};

use crate::store::{RegistryStore, StoreResult};

/// Fueler registry use cases.
#[derive(Debug, Clone)]
pub struct FuelerRegistry<S> {
    store: S,
}

impl<S: RegistryStore> FuelerRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(skip(self, cmd), fields(fueler_id = %cmd.fueler_id, user_id = %cmd.user_id), err)]
    pub async fn register(&self, cmd: RegisterFueler) -> StoreResult<Fueler> {
        let fueler = Fueler::register(cmd)?;
        self.store.insert_fueler(&fueler).await?;
        tracing::info!("fueler registered");
        Ok(fueler)
    }

    pub async fn get(&self, id: FuelerId) -> StoreResult<Fueler> {
        self.store
            .get_fueler(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("fueler {id}")).into())
    }

    /// The profile linked to an account.
    pub async fn for_user(&self, user_id: UserId) -> StoreResult<Fueler> {
        self.store
            .find_fueler_by_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("fueler profile for user {user_id}")).into())
    }

    pub async fn list(&self, status: Option<FuelerStatus>) -> StoreResult<Vec<Fueler>> {
        self.store.list_fuelers(status).await
    }

    #[instrument(skip(self, update), fields(fueler_id = %id), err)]
    pub async fn update(&self, id: FuelerId, update: UpdateFueler) -> StoreResult<Fueler> {
        let mut fueler = self.get(id).await?;
        fueler.apply_update(update, super::now())?;
        self.store.save_fueler(&fueler).await?;
        Ok(fueler)
    }

    #[instrument(skip(self), fields(fueler_id = %id), err)]
    pub async fn set_status(&self, id: FuelerId, status: FuelerStatus) -> StoreResult<Fueler> {
        let mut fueler = self.get(id).await?;
        fueler.set_status(status, super::now())?;
        self.store.save_fueler(&fueler).await?;
        tracing::info!(status = status.as_str(), "fueler status changed");
        Ok(fueler)
    }

    #[instrument(skip(self), fields(fueler_id = %id), err)]
    pub async fn delete(&self, id: FuelerId) -> StoreResult<()> {
        self.store.delete_fueler(id).await
    }
}
