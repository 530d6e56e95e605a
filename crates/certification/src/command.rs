use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use fuelcert_core::{DomainError, DomainResult, FuelerId, TrainingId, UserId};

use crate::record::CertificationKey;

const MAX_NOTES_LEN: usize = 2_000;

/// Command: CreateCertification (first-time record only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCertification {
    pub fueler_id: FuelerId,
    pub training_id: TrainingId,
    pub completed_date: NaiveDate,
    pub notes: Option<String>,
    /// Explicit expiry; derived from the training's validity period when `None`.
    pub expiry_date: Option<NaiveDate>,
    pub certified_by: Option<UserId>,
}

/// Command: CompleteCertification (create-or-overwrite + history).
///
/// The expiry is always derived from the training; there is no override on this path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteCertification {
    pub fueler_id: FuelerId,
    pub training_id: TrainingId,
    pub completed_date: NaiveDate,
    pub notes: Option<String>,
    pub certified_by: Option<UserId>,
}

impl CreateCertification {
    pub fn key(&self) -> CertificationKey {
        CertificationKey::new(self.fueler_id, self.training_id)
    }

    /// Check dates and notes against `today` (the server's calendar date).
    pub fn validate(&self, today: NaiveDate) -> DomainResult<()> {
        validate_completed_date(self.completed_date, today)?;
        if let Some(expiry) = self.expiry_date {
            if expiry < self.completed_date {
                return Err(DomainError::validation(format!(
                    "expiry_date {expiry} is before completed_date {}",
                    self.completed_date
                )));
            }
        }
        validate_notes(self.notes.as_deref())
    }
}

impl CompleteCertification {
    pub fn key(&self) -> CertificationKey {
        CertificationKey::new(self.fueler_id, self.training_id)
    }

    pub fn validate(&self, today: NaiveDate) -> DomainResult<()> {
        validate_completed_date(self.completed_date, today)?;
        validate_notes(self.notes.as_deref())
    }
}

pub fn earliest_completed_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Completion dates may not predate 1900-01-01 and may be at most one day ahead of `today`.
pub fn validate_completed_date(completed: NaiveDate, today: NaiveDate) -> DomainResult<()> {
    if completed < earliest_completed_date() {
        return Err(DomainError::validation(format!(
            "completed_date {completed} is before {}",
            earliest_completed_date()
        )));
    }
    if completed > today + Duration::days(1) {
        return Err(DomainError::validation(format!(
            "completed_date {completed} is in the future"
        )));
    }
    Ok(())
}

pub(crate) fn validate_notes(notes: Option<&str>) -> DomainResult<()> {
    match notes {
        Some(n) if n.chars().count() > MAX_NOTES_LEN => Err(DomainError::validation(format!(
            "notes cannot exceed {MAX_NOTES_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// Trim notes; blank notes are stored as absent.
pub(crate) fn normalize_notes(notes: Option<&str>) -> Option<String> {
    notes.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string)
}
