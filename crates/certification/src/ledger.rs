//! Ledger decisions: what a Create or Complete writes, given the current state.
//!
//! Stores run these inside their atomic scope, after loading the existing record for the
//! pair under a per-key lock and before writing anything. The functions are pure: the same
//! inputs always produce the same rows (apart from freshly minted ids).

use chrono::{DateTime, NaiveDate, Utc};

use fuelcert_core::{CertificationId, DomainError, DomainResult};
use fuelcert_training::Training;

use crate::command::{CompleteCertification, CreateCertification, normalize_notes};
use crate::record::{CertificationHistoryEntry, CertificationRecord, CompletionOutcome};

/// Rows produced by a Create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreationWrite {
    pub record: CertificationRecord,
    /// Present only when creations are audited (see `audit_history`).
    pub history: Option<CertificationHistoryEntry>,
}

/// Rows produced by a Complete: the new state of the current record and exactly one
/// history entry carrying the same completion values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionWrite {
    pub record: CertificationRecord,
    pub history: CertificationHistoryEntry,
    pub outcome: CompletionOutcome,
}

/// Decide a first-time Create.
///
/// Fails with `Conflict` if a current record already exists for the pair. The expiry is
/// the explicit one when supplied, else derived from the training's validity period.
pub fn decide_create(
    existing: Option<&CertificationRecord>,
    cmd: &CreateCertification,
    training: &Training,
    audit_history: bool,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<CreationWrite> {
    ensure_training(training, cmd.training_id)?;
    cmd.validate(today)?;

    if let Some(existing) = existing {
        return Err(DomainError::conflict(format!(
            "certification {} already exists for {}",
            existing.id,
            cmd.key()
        )));
    }

    let expiry_date = cmd
        .expiry_date
        .or_else(|| training.validity.expiry_for(cmd.completed_date));

    let record = CertificationRecord {
        id: CertificationId::new(),
        fueler_id: cmd.fueler_id,
        training_id: cmd.training_id,
        completed_date: cmd.completed_date,
        expiry_date,
        notes: normalize_notes(cmd.notes.as_deref()),
        certified_by: cmd.certified_by,
        created_at: now,
        updated_at: now,
    };

    let history = audit_history.then(|| CertificationHistoryEntry::from_record(&record, now));

    Ok(CreationWrite { record, history })
}

/// Decide a Complete (the upsert).
///
/// With no current record a new one is created; otherwise the existing row is overwritten
/// in place, keeping its id and `created_at`. Either way one history entry is produced.
pub fn decide_complete(
    existing: Option<CertificationRecord>,
    cmd: &CompleteCertification,
    training: &Training,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> DomainResult<CompletionWrite> {
    ensure_training(training, cmd.training_id)?;
    cmd.validate(today)?;

    let expiry_date = training.validity.expiry_for(cmd.completed_date);
    let notes = normalize_notes(cmd.notes.as_deref());

    let (record, outcome) = match existing {
        Some(mut record) => {
            if record.key() != cmd.key() {
                return Err(DomainError::invariant(format!(
                    "loaded certification {} belongs to {}, not {}",
                    record.id,
                    record.key(),
                    cmd.key()
                )));
            }
            record.completed_date = cmd.completed_date;
            record.expiry_date = expiry_date;
            record.notes = notes;
            record.certified_by = cmd.certified_by;
            record.updated_at = now;
            (record, CompletionOutcome::Updated)
        }
        None => (
            CertificationRecord {
                id: CertificationId::new(),
                fueler_id: cmd.fueler_id,
                training_id: cmd.training_id,
                completed_date: cmd.completed_date,
                expiry_date,
                notes,
                certified_by: cmd.certified_by,
                created_at: now,
                updated_at: now,
            },
            CompletionOutcome::Created,
        ),
    };

    let history = CertificationHistoryEntry::from_record(&record, now);

    Ok(CompletionWrite {
        record,
        history,
        outcome,
    })
}

fn ensure_training(training: &Training, expected: fuelcert_core::TrainingId) -> DomainResult<()> {
    if training.id != expected {
        return Err(DomainError::invariant(format!(
            "training {} was loaded for a command on training {expected}",
            training.id
        )));
    }
    Ok(())
}
