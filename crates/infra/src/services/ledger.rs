//! Certification ledger service: Create, Complete, reads and administrative removal.

use tracing::instrument;

use fuelcert_certification::{
    CertificationHistoryEntry, CertificationRecord, CompleteCertification, CompletionWrite, CreateCertification,
    ExpiryStatus,
};
use fuelcert_core::{CertificationId, DomainError, HistoryEntryId};

use crate::store::{CertificationFilter, LedgerStore, StoreResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerOptions {
    /// Also append a history entry when a record is created through Create.
    pub audit_create: bool,
}

#[derive(Debug, Clone)]
pub struct CertificationLedger<S> {
    store: S,
    options: LedgerOptions,
}

impl<S: LedgerStore> CertificationLedger<S> {
    pub fn new(store: S, options: LedgerOptions) -> Self {
        Self { store, options }
    }

    /// First-time record for a pair. Fails with `Conflict` if one exists.
    #[instrument(
        skip(self, cmd),
        fields(fueler_id = %cmd.fueler_id, training_id = %cmd.training_id),
        err
    )]
    pub async fn create(&self, cmd: CreateCertification) -> StoreResult<CertificationRecord> {
        let now = super::now();
        let write = self
            .store
            .create_certification(&cmd, self.options.audit_create, now.date_naive(), now)
            .await?;

        tracing::info!(
            certification_id = %write.record.id,
            expiry_date = ?write.record.expiry_date,
            audited = write.history.is_some(),
            "certification created"
        );
        Ok(write.record)
    }

    /// Record a completion: create or overwrite the current record and append history.
    #[instrument(
        skip(self, cmd),
        fields(fueler_id = %cmd.fueler_id, training_id = %cmd.training_id),
        err
    )]
    pub async fn complete(&self, cmd: CompleteCertification) -> StoreResult<CompletionWrite> {
        let now = super::now();
        let write = self
            .store
            .complete_certification(&cmd, now.date_naive(), now)
            .await?;

        tracing::info!(
            certification_id = %write.record.id,
            history_id = %write.history.id,
            outcome = ?write.outcome,
            expiry_date = ?write.record.expiry_date,
            "certification completed"
        );
        Ok(write)
    }

    pub async fn get(&self, id: CertificationId) -> StoreResult<CertificationRecord> {
        self.store
            .get_certification(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("certification {id}")).into())
    }

    /// Current records, optionally narrowed to one expiry status as of today.
    pub async fn list(
        &self,
        filter: &CertificationFilter,
        status: Option<ExpiryStatus>,
    ) -> StoreResult<Vec<CertificationRecord>> {
        let records = self.store.list_certifications(filter).await?;
        let Some(status) = status else {
            return Ok(records);
        };

        let today = super::today();
        Ok(records
            .into_iter()
            .filter(|r| r.expiry_status(today) == status)
            .collect())
    }

    #[instrument(skip(self), fields(certification_id = %id), err)]
    pub async fn delete(&self, id: CertificationId) -> StoreResult<()> {
        self.store.delete_certification(id).await?;
        tracing::info!("certification removed");
        Ok(())
    }

    pub async fn history(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationHistoryEntry>> {
        self.store.list_history(filter).await
    }

    pub async fn history_entry(&self, id: HistoryEntryId) -> StoreResult<CertificationHistoryEntry> {
        self.store
            .get_history_entry(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("history entry {id}")).into())
    }
}
