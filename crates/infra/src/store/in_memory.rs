use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use fuelcert_certification::{
    Assignment, AssignmentCompletion, CalendarRange, CertificationHistoryEntry, CertificationKey, CertificationRecord,
    CompleteAssignment, CompleteCertification, CompletionWrite, CreateCertification, CreationWrite,
    decide_assignment_completion, decide_complete, decide_create,
};
use fuelcert_core::{AssignmentId, CertificationId, DomainError, FuelerId, HistoryEntryId, TrainingId, UserId};
use fuelcert_fuelers::{Fueler, FuelerStatus};
use fuelcert_training::Training;

use super::{
    AssignmentFilter, AssignmentStore, CatalogStore, CertificationFilter, LedgerStore, RegistryStore, StoreError,
    StoreResult, assignment_order,
};

#[derive(Debug, Default)]
struct State {
    trainings: HashMap<TrainingId, Training>,
    fuelers: HashMap<FuelerId, Fueler>,
    records: HashMap<CertificationId, CertificationRecord>,
    by_key: HashMap<CertificationKey, CertificationId>,
    history: Vec<CertificationHistoryEntry>,
    assignments: HashMap<AssignmentId, Assignment>,
}

impl State {
    fn record_for(&self, key: &CertificationKey) -> Option<&CertificationRecord> {
        self.by_key.get(key).and_then(|id| self.records.get(id))
    }

    fn training_ref(&self, id: TrainingId) -> StoreResult<&Training> {
        self.trainings
            .get(&id)
            .ok_or_else(|| DomainError::not_found(format!("training {id}")).into())
    }

    fn ensure_fueler(&self, id: FuelerId) -> StoreResult<()> {
        if self.fuelers.contains_key(&id) {
            Ok(())
        } else {
            Err(DomainError::not_found(format!("fueler {id}")).into())
        }
    }

    fn training_referenced(&self, id: TrainingId) -> bool {
        self.records.values().any(|r| r.training_id == id)
            || self.history.iter().any(|h| h.training_id == id)
            || self.assignments.values().any(|a| a.training_id == id)
    }

    fn fueler_referenced(&self, id: FuelerId) -> bool {
        self.records.values().any(|r| r.fueler_id == id)
            || self.history.iter().any(|h| h.fueler_id == id)
            || self.assignments.values().any(|a| a.fueler_id == id)
    }

    /// Write a decided completion. On `abort` the record write is undone and nothing else
    /// is written.
    fn apply_completion(&mut self, write: &CompletionWrite, abort: bool) -> StoreResult<()> {
        let key = write.record.key();
        let previous = self.records.insert(write.record.id, write.record.clone());
        self.by_key.insert(key, write.record.id);

        if abort {
            match previous {
                Some(previous) => {
                    self.records.insert(previous.id, previous);
                }
                None => {
                    self.records.remove(&write.record.id);
                    self.by_key.remove(&key);
                }
            }
            return Err(StoreError::TransactionFailure("aborted after record write".to_string()));
        }

        self.history.push(write.history.clone());
        Ok(())
    }
}

/// In-memory store for tests/dev.
///
/// All state sits behind one lock. Every ledger write takes the write lock once and performs
/// the existence check plus all of its writes before releasing it, so same-pair calls
/// serialize and a failed write leaves no partial state.
///
/// Writes for different pairs serialize too. The critical section is synchronous and never
/// spans an `.await`, so it lasts microseconds; per-pair locking lives in the Postgres store
/// (transaction advisory lock keyed by the pair).
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    abort_next_write: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next ledger write fail after its first row is written, forcing a rollback.
    #[cfg(test)]
    pub(crate) fn abort_next_write(&self) {
        self.abort_next_write.store(true, Ordering::SeqCst);
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| StoreError::TransactionFailure("lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| StoreError::TransactionFailure("lock poisoned".to_string()))
    }

    fn injected_abort(&self) -> bool {
        self.abort_next_write.swap(false, Ordering::SeqCst)
    }
}

fn sorted_by_name<T>(mut items: Vec<T>, name: impl Fn(&T) -> &str) -> Vec<T> {
    items.sort_by(|a, b| name(a).to_lowercase().cmp(&name(b).to_lowercase()));
    items
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn insert_training(&self, training: &Training) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.trainings.values().any(|t| t.name == training.name) {
            return Err(DomainError::conflict(format!("training name '{}' is already in use", training.name)).into());
        }
        if state.trainings.contains_key(&training.id) {
            return Err(DomainError::conflict(format!("training {} already exists", training.id)).into());
        }
        state.trainings.insert(training.id, training.clone());
        Ok(())
    }

    async fn save_training(&self, training: &Training) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.trainings.get_mut(&training.id) {
            Some(slot) => {
                *slot = training.clone();
                Ok(())
            }
            None => Err(DomainError::not_found(format!("training {}", training.id)).into()),
        }
    }

    async fn get_training(&self, id: TrainingId) -> StoreResult<Option<Training>> {
        Ok(self.read()?.trainings.get(&id).cloned())
    }

    async fn list_trainings(&self) -> StoreResult<Vec<Training>> {
        let trainings: Vec<Training> = self.read()?.trainings.values().cloned().collect();
        Ok(sorted_by_name(trainings, |t| t.name.as_str()))
    }

    async fn delete_training(&self, id: TrainingId) -> StoreResult<()> {
        let mut state = self.write()?;
        state.training_ref(id)?;
        if state.training_referenced(id) {
            return Err(
                DomainError::conflict(format!("training {id} is referenced by certifications or assignments")).into(),
            );
        }
        state.trainings.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for InMemoryStore {
    async fn insert_fueler(&self, fueler: &Fueler) -> StoreResult<()> {
        let mut state = self.write()?;
        if state.fuelers.values().any(|f| f.user_id == fueler.user_id) {
            return Err(DomainError::conflict(format!("user {} already has a fueler profile", fueler.user_id)).into());
        }
        if state.fuelers.contains_key(&fueler.id) {
            return Err(DomainError::conflict(format!("fueler {} already exists", fueler.id)).into());
        }
        state.fuelers.insert(fueler.id, fueler.clone());
        Ok(())
    }

    async fn save_fueler(&self, fueler: &Fueler) -> StoreResult<()> {
        let mut state = self.write()?;
        match state.fuelers.get_mut(&fueler.id) {
            Some(slot) => {
                *slot = fueler.clone();
                Ok(())
            }
            None => Err(DomainError::not_found(format!("fueler {}", fueler.id)).into()),
        }
    }

    async fn get_fueler(&self, id: FuelerId) -> StoreResult<Option<Fueler>> {
        Ok(self.read()?.fuelers.get(&id).cloned())
    }

    async fn find_fueler_by_user(&self, user_id: UserId) -> StoreResult<Option<Fueler>> {
        Ok(self.read()?.fuelers.values().find(|f| f.user_id == user_id).cloned())
    }

    async fn list_fuelers(&self, status: Option<FuelerStatus>) -> StoreResult<Vec<Fueler>> {
        let fuelers: Vec<Fueler> = self
            .read()?
            .fuelers
            .values()
            .filter(|f| status.is_none_or(|s| f.status == s))
            .cloned()
            .collect();
        Ok(sorted_by_name(fuelers, |f| f.name.as_str()))
    }

    async fn delete_fueler(&self, id: FuelerId) -> StoreResult<()> {
        let mut state = self.write()?;
        state.ensure_fueler(id)?;
        if state.fueler_referenced(id) {
            return Err(
                DomainError::conflict(format!("fueler {id} is referenced by certifications or assignments")).into(),
            );
        }
        state.fuelers.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_certification(
        &self,
        cmd: &CreateCertification,
        audit_history: bool,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CreationWrite> {
        let mut state = self.write()?;
        state.ensure_fueler(cmd.fueler_id)?;
        let training = state.training_ref(cmd.training_id)?;

        let key = cmd.key();
        let write = decide_create(state.record_for(&key), cmd, training, audit_history, today, now)?;

        state.records.insert(write.record.id, write.record.clone());
        state.by_key.insert(key, write.record.id);

        if let Some(history) = &write.history {
            if self.injected_abort() {
                state.records.remove(&write.record.id);
                state.by_key.remove(&key);
                return Err(StoreError::TransactionFailure("aborted after record write".to_string()));
            }
            state.history.push(history.clone());
        }

        Ok(write)
    }

    async fn complete_certification(
        &self,
        cmd: &CompleteCertification,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CompletionWrite> {
        let mut state = self.write()?;
        state.ensure_fueler(cmd.fueler_id)?;
        let training = state.training_ref(cmd.training_id)?;

        let existing = state.record_for(&cmd.key()).cloned();
        let write = decide_complete(existing, cmd, training, today, now)?;

        state.apply_completion(&write, self.injected_abort())?;
        Ok(write)
    }

    async fn get_certification(&self, id: CertificationId) -> StoreResult<Option<CertificationRecord>> {
        Ok(self.read()?.records.get(&id).cloned())
    }

    async fn list_certifications(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationRecord>> {
        let mut records: Vec<_> = self
            .read()?
            .records
            .values()
            .filter(|r| filter.matches(r.fueler_id, r.training_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.completed_date.cmp(&a.completed_date).then(a.id.cmp(&b.id)));
        Ok(records)
    }

    async fn certifications_in_range(&self, range: CalendarRange) -> StoreResult<Vec<CertificationRecord>> {
        Ok(self
            .read()?
            .records
            .values()
            .filter(|r| range.touches(r))
            .cloned()
            .collect())
    }

    async fn delete_certification(&self, id: CertificationId) -> StoreResult<()> {
        let mut state = self.write()?;
        let record = state
            .records
            .remove(&id)
            .ok_or_else(|| DomainError::not_found(format!("certification {id}")))?;
        state.by_key.remove(&record.key());
        Ok(())
    }

    async fn list_history(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationHistoryEntry>> {
        let mut entries: Vec<_> = self
            .read()?
            .history
            .iter()
            .filter(|h| filter.matches(h.fueler_id, h.training_id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn get_history_entry(&self, id: HistoryEntryId) -> StoreResult<Option<CertificationHistoryEntry>> {
        Ok(self.read()?.history.iter().find(|h| h.id == id).cloned())
    }
}

#[async_trait]
impl AssignmentStore for InMemoryStore {
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        let mut state = self.write()?;
        state.ensure_fueler(assignment.fueler_id)?;
        state.training_ref(assignment.training_id)?;
        if state.assignments.contains_key(&assignment.id) {
            return Err(DomainError::conflict(format!("assignment {} already exists", assignment.id)).into());
        }
        let key = assignment.key();
        if assignment.is_open() && state.assignments.values().any(|a| a.is_open() && a.key() == key) {
            return Err(DomainError::conflict(format!("{key} already has an open assignment")).into());
        }
        state.assignments.insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Option<Assignment>> {
        Ok(self.read()?.assignments.get(&id).cloned())
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let mut assignments: Vec<_> = self
            .read()?
            .assignments
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        assignments.sort_by(assignment_order);
        Ok(assignments)
    }

    async fn complete_assignment(
        &self,
        cmd: &CompleteAssignment,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<AssignmentCompletion> {
        let mut state = self.write()?;
        let assignment = state
            .assignments
            .get(&cmd.assignment_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("assignment {}", cmd.assignment_id)))?;
        state.ensure_fueler(assignment.fueler_id)?;
        let training = state.training_ref(assignment.training_id)?;

        let existing = state.record_for(&assignment.key()).cloned();
        let done = decide_assignment_completion(assignment, existing, cmd, training, today, now)?;

        state.apply_completion(&done.completion, self.injected_abort())?;
        state.assignments.insert(done.assignment.id, done.assignment.clone());
        Ok(done)
    }
}
