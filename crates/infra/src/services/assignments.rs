//! Assigned trainings: open an assignment, list them, close one with a ledger completion.

use tracing::instrument;

use fuelcert_certification::{AssignTraining, Assignment, AssignmentCompletion, CompleteAssignment};
use fuelcert_core::{AssignmentId, DomainError};

use crate::store::{AssignmentFilter, AssignmentStore, StoreResult};

#[derive(Debug, Clone)]
pub struct TrainingAssignments<S> {
    store: S,
}

impl<S: AssignmentStore> TrainingAssignments<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[instrument(
        skip(self, cmd),
        fields(assignment_id = %cmd.assignment_id, fueler_id = %cmd.fueler_id, training_id = %cmd.training_id),
        err
    )]
    pub async fn assign(&self, cmd: AssignTraining) -> StoreResult<Assignment> {
        let now = super::now();
        let assignment = Assignment::assign(cmd, now.date_naive(), now)?;
        self.store.insert_assignment(&assignment).await?;
        tracing::info!(due_date = ?assignment.due_date, "training assigned");
        Ok(assignment)
    }

    pub async fn get(&self, id: AssignmentId) -> StoreResult<Assignment> {
        self.store
            .get_assignment(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("assignment {id}")).into())
    }

    pub async fn list(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        self.store.list_assignments(filter).await
    }

    /// Record the completion on the ledger and close the assignment in one write.
    #[instrument(skip(self, cmd), fields(assignment_id = %cmd.assignment_id), err)]
    pub async fn complete(&self, cmd: CompleteAssignment) -> StoreResult<AssignmentCompletion> {
        let now = super::now();
        let done = self.store.complete_assignment(&cmd, now.date_naive(), now).await?;

        tracing::info!(
            certification_id = %done.completion.record.id,
            history_id = %done.completion.history.id,
            outcome = ?done.completion.outcome,
            "assignment completed"
        );
        Ok(done)
    }
}
