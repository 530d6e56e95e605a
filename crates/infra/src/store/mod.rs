//! Storage boundary for the catalog, the registry, the certification ledger and training
//! assignments.
//!
//! Stores own the atomic scope of every write. Ledger writes in particular run the pure
//! decisions from `fuelcert_certification::ledger` *inside* that scope, after the existing
//! record for the pair has been loaded under a per-pair lock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fuelcert_certification::{
    Assignment, AssignmentCompletion, AssignmentStatus, CalendarRange, CertificationHistoryEntry, CertificationRecord,
    CompleteAssignment, CompleteCertification, CompletionWrite, CreateCertification, CreationWrite,
};
use fuelcert_core::{AssignmentId, CertificationId, DomainError, FuelerId, HistoryEntryId, TrainingId, UserId};
use fuelcert_fuelers::{Fueler, FuelerStatus};
use fuelcert_training::Training;

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The atomic scope could not be completed (aborted, serialization failure, lost
    /// connection). Nothing was written.
    #[error("transaction failure: {0}")]
    TransactionFailure(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Narrows ledger and history queries. Empty filter means everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationFilter {
    pub fueler_id: Option<FuelerId>,
    pub training_id: Option<TrainingId>,
}

impl CertificationFilter {
    pub fn for_fueler(fueler_id: FuelerId) -> Self {
        Self {
            fueler_id: Some(fueler_id),
            training_id: None,
        }
    }

    pub fn matches(&self, fueler_id: FuelerId, training_id: TrainingId) -> bool {
        self.fueler_id.is_none_or(|f| f == fueler_id) && self.training_id.is_none_or(|t| t == training_id)
    }
}

/// Narrows assignment queries. Empty filter means everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFilter {
    pub fueler_id: Option<FuelerId>,
    pub training_id: Option<TrainingId>,
    pub status: Option<AssignmentStatus>,
}

impl AssignmentFilter {
    pub fn matches(&self, assignment: &Assignment) -> bool {
        self.fueler_id.is_none_or(|f| f == assignment.fueler_id)
            && self.training_id.is_none_or(|t| t == assignment.training_id)
            && self.status.is_none_or(|s| s == assignment.status)
    }
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fails with `Conflict` if the name is taken.
    async fn insert_training(&self, training: &Training) -> StoreResult<()>;

    /// Fails with `NotFound` if the training does not exist.
    async fn save_training(&self, training: &Training) -> StoreResult<()>;

    async fn get_training(&self, id: TrainingId) -> StoreResult<Option<Training>>;

    /// Ordered by name.
    async fn list_trainings(&self) -> StoreResult<Vec<Training>>;

    /// Fails with `Conflict` while any current record or history entry references it.
    async fn delete_training(&self, id: TrainingId) -> StoreResult<()>;
}

#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Fails with `Conflict` if the account already has a fueler profile.
    async fn insert_fueler(&self, fueler: &Fueler) -> StoreResult<()>;

    async fn save_fueler(&self, fueler: &Fueler) -> StoreResult<()>;

    async fn get_fueler(&self, id: FuelerId) -> StoreResult<Option<Fueler>>;

    async fn find_fueler_by_user(&self, user_id: UserId) -> StoreResult<Option<Fueler>>;

    /// Ordered by name.
    async fn list_fuelers(&self, status: Option<FuelerStatus>) -> StoreResult<Vec<Fueler>>;

    async fn delete_fueler(&self, id: FuelerId) -> StoreResult<()>;
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a first-time record. `NotFound` on dangling references, `Conflict` if the
    /// pair already has a current record.
    async fn create_certification(
        &self,
        cmd: &CreateCertification,
        audit_history: bool,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CreationWrite>;

    /// Upsert the current record and append one history entry, atomically.
    async fn complete_certification(
        &self,
        cmd: &CompleteCertification,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CompletionWrite>;

    async fn get_certification(&self, id: CertificationId) -> StoreResult<Option<CertificationRecord>>;

    /// Ordered by completion date, newest first.
    async fn list_certifications(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationRecord>>;

    /// Current records with a completion or expiry date inside the range.
    async fn certifications_in_range(&self, range: CalendarRange) -> StoreResult<Vec<CertificationRecord>>;

    /// Removes the current record only; history is kept.
    async fn delete_certification(&self, id: CertificationId) -> StoreResult<()>;

    /// Newest first.
    async fn list_history(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationHistoryEntry>>;

    async fn get_history_entry(&self, id: HistoryEntryId) -> StoreResult<Option<CertificationHistoryEntry>>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// `NotFound` on dangling references, `Conflict` if the pair already has an open
    /// assignment.
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()>;

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Option<Assignment>>;

    /// Open assignments first, then by due date (none last), then newest assigned.
    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>>;

    /// Run the ledger Complete for the assignment's pair and close the assignment, in one
    /// atomic scope. `NotFound` for an unknown assignment, `Conflict` if already completed.
    async fn complete_assignment(
        &self,
        cmd: &CompleteAssignment,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<AssignmentCompletion>;
}

/// Everything the application needs from a backend.
pub trait Store: CatalogStore + RegistryStore + LedgerStore + AssignmentStore {}

impl<T: CatalogStore + RegistryStore + LedgerStore + AssignmentStore + ?Sized> Store for T {}

/// Open first, due date ascending with undated last, then newest assigned.
pub(crate) fn assignment_order(a: &Assignment, b: &Assignment) -> std::cmp::Ordering {
    b.is_open()
        .cmp(&a.is_open())
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        })
        .then_with(|| b.assigned_at.cmp(&a.assigned_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn insert_training(&self, training: &Training) -> StoreResult<()> {
        (**self).insert_training(training).await
    }

    async fn save_training(&self, training: &Training) -> StoreResult<()> {
        (**self).save_training(training).await
    }

    async fn get_training(&self, id: TrainingId) -> StoreResult<Option<Training>> {
        (**self).get_training(id).await
    }

    async fn list_trainings(&self) -> StoreResult<Vec<Training>> {
        (**self).list_trainings().await
    }

    async fn delete_training(&self, id: TrainingId) -> StoreResult<()> {
        (**self).delete_training(id).await
    }
}

#[async_trait]
impl<S> RegistryStore for Arc<S>
where
    S: RegistryStore + ?Sized,
{
    async fn insert_fueler(&self, fueler: &Fueler) -> StoreResult<()> {
        (**self).insert_fueler(fueler).await
    }

    async fn save_fueler(&self, fueler: &Fueler) -> StoreResult<()> {
        (**self).save_fueler(fueler).await
    }

    async fn get_fueler(&self, id: FuelerId) -> StoreResult<Option<Fueler>> {
        (**self).get_fueler(id).await
    }

    async fn find_fueler_by_user(&self, user_id: UserId) -> StoreResult<Option<Fueler>> {
        (**self).find_fueler_by_user(user_id).await
    }

    async fn list_fuelers(&self, status: Option<FuelerStatus>) -> StoreResult<Vec<Fueler>> {
        (**self).list_fuelers(status).await
    }

    async fn delete_fueler(&self, id: FuelerId) -> StoreResult<()> {
        (**self).delete_fueler(id).await
    }
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn create_certification(
        &self,
        cmd: &CreateCertification,
        audit_history: bool,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CreationWrite> {
        (**self).create_certification(cmd, audit_history, today, now).await
    }

    async fn complete_certification(
        &self,
        cmd: &CompleteCertification,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CompletionWrite> {
        (**self).complete_certification(cmd, today, now).await
    }

    async fn get_certification(&self, id: CertificationId) -> StoreResult<Option<CertificationRecord>> {
        (**self).get_certification(id).await
    }

    async fn list_certifications(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationRecord>> {
        (**self).list_certifications(filter).await
    }

    async fn certifications_in_range(&self, range: CalendarRange) -> StoreResult<Vec<CertificationRecord>> {
        (**self).certifications_in_range(range).await
    }

    async fn delete_certification(&self, id: CertificationId) -> StoreResult<()> {
        (**self).delete_certification(id).await
    }

    async fn list_history(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationHistoryEntry>> {
        (**self).list_history(filter).await
    }

    async fn get_history_entry(&self, id: HistoryEntryId) -> StoreResult<Option<CertificationHistoryEntry>> {
        (**self).get_history_entry(id).await
    }
}

#[async_trait]
impl<S> AssignmentStore for Arc<S>
where
    S: AssignmentStore + ?Sized,
{
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        (**self).insert_assignment(assignment).await
    }

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Option<Assignment>> {
        (**self).get_assignment(id).await
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        (**self).list_assignments(filter).await
    }

    async fn complete_assignment(
        &self,
        cmd: &CompleteAssignment,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<AssignmentCompletion> {
        (**self).complete_assignment(cmd, today, now).await
    }
}
