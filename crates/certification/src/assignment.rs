//! Training assignments: an admin asks a fueler to complete a training, optionally by a
//! due date. Completing the assignment records a Complete on the ledger and closes the
//! assignment in the same write.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use fuelcert_core::{AssignmentId, CertificationId, DomainError, DomainResult, Entity, FuelerId, TrainingId, UserId};
use fuelcert_training::Training;

use crate::command::{CompleteCertification, normalize_notes, validate_notes};
use crate::ledger::{CompletionWrite, decide_complete};
use crate::record::{CertificationKey, CertificationRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Assigned,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "assigned",
            AssignmentStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "assigned" => Ok(AssignmentStatus::Assigned),
            "completed" => Ok(AssignmentStatus::Completed),
            other => Err(DomainError::validation(format!(
                "status must be one of: assigned, completed (got '{other}')"
            ))),
        }
    }
}

/// A training a fueler has been asked to complete.
///
/// At most one open (`assigned`) assignment exists per fueler and training; stores enforce
/// that on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub fueler_id: FuelerId,
    pub training_id: TrainingId,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: AssignmentStatus,
    pub assigned_by: Option<UserId>,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// The current record the completion wrote to.
    pub certification_id: Option<CertificationId>,
}

impl Entity for Assignment {
    type Id = AssignmentId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Command: AssignTraining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignTraining {
    pub assignment_id: AssignmentId,
    pub fueler_id: FuelerId,
    pub training_id: TrainingId,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub assigned_by: Option<UserId>,
}

/// Command: CompleteAssignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteAssignment {
    pub assignment_id: AssignmentId,
    pub completed_date: NaiveDate,
    /// Falls back to the assignment's notes when absent.
    pub notes: Option<String>,
    pub certified_by: Option<UserId>,
}

/// Rows produced by completing an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentCompletion {
    pub assignment: Assignment,
    pub completion: CompletionWrite,
}

impl Assignment {
    /// Open a new assignment. A due date may not lie before `today`.
    pub fn assign(cmd: AssignTraining, today: NaiveDate, now: DateTime<Utc>) -> DomainResult<Self> {
        if let Some(due) = cmd.due_date {
            if due < today {
                return Err(DomainError::validation(format!("due_date {due} is in the past")));
            }
        }
        validate_notes(cmd.notes.as_deref())?;

        Ok(Self {
            id: cmd.assignment_id,
            fueler_id: cmd.fueler_id,
            training_id: cmd.training_id,
            due_date: cmd.due_date,
            notes: normalize_notes(cmd.notes.as_deref()),
            status: AssignmentStatus::Assigned,
            assigned_by: cmd.assigned_by,
            assigned_at: now,
            completed_at: None,
            certification_id: None,
        })
    }

    pub fn key(&self) -> CertificationKey {
        CertificationKey::new(self.fueler_id, self.training_id)
    }

    pub fn is_open(&self) -> bool {
        self.status == AssignmentStatus::Assigned
    }

    /// Open and past its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_open() && self.due_date.is_some_and(|d| d < today)
    }
}

/// Decide an assignment completion: the ledger Complete for the assignment's pair, plus the
/// closed assignment pointing at the resulting record.
///
/// Fails with `Conflict` if the assignment is already completed.
pub fn decide_assignment_completion(
    mut assignment: Assignment,
    existing: Option<CertificationRecord>,
    cmd: &CompleteAssignment,
    training: &Training,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<AssignmentCompletion> {
    if assignment.id != cmd.assignment_id {
        return Err(DomainError::invariant(format!(
            "assignment {} was loaded for a command on assignment {}",
            assignment.id, cmd.assignment_id
        )));
    }
    if !assignment.is_open() {
        return Err(DomainError::conflict(format!(
            "assignment {} is already completed",
            assignment.id
        )));
    }

    let complete = CompleteCertification {
        fueler_id: assignment.fueler_id,
        training_id: assignment.training_id,
        completed_date: cmd.completed_date,
        notes: cmd.notes.clone().or_else(|| assignment.notes.clone()),
        certified_by: cmd.certified_by,
    };
    let completion = decide_complete(existing, &complete, training, today, now)?;

    assignment.status = AssignmentStatus::Completed;
    assignment.completed_at = Some(now);
    assignment.certification_id = Some(completion.record.id);

    Ok(AssignmentCompletion { assignment, completion })
}
