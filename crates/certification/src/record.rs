use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use fuelcert_core::{CertificationId, Entity, FuelerId, HistoryEntryId, TrainingId, UserId};

use crate::status::ExpiryStatus;

/// The (fueler, training) pair a current certification is unique on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CertificationKey {
    pub fueler_id: FuelerId,
    pub training_id: TrainingId,
}

impl CertificationKey {
    pub fn new(fueler_id: FuelerId, training_id: TrainingId) -> Self {
        Self {
            fueler_id,
            training_id,
        }
    }
}

impl core::fmt::Display for CertificationKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "fueler {} / training {}", self.fueler_id, self.training_id)
    }
}

/// The current certification of one fueler for one training.
///
/// At most one exists per [`CertificationKey`]; later completions overwrite it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationRecord {
    pub id: CertificationId,
    pub fueler_id: FuelerId,
    pub training_id: TrainingId,
    pub completed_date: NaiveDate,
    /// `None` when the training does not expire.
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Account that recorded the completion.
    pub certified_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CertificationRecord {
    pub fn key(&self) -> CertificationKey {
        CertificationKey::new(self.fueler_id, self.training_id)
    }

    pub fn expiry_status(&self, today: NaiveDate) -> ExpiryStatus {
        ExpiryStatus::classify(self.expiry_date, today)
    }

    pub fn days_until_expiry(&self, today: NaiveDate) -> Option<i64> {
        self.expiry_date.map(|d| (d - today).num_days())
    }
}

impl Entity for CertificationRecord {
    type Id = CertificationId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Immutable audit row: one per completion ever recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificationHistoryEntry {
    pub id: HistoryEntryId,
    pub fueler_id: FuelerId,
    pub training_id: TrainingId,
    pub completed_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub certified_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl CertificationHistoryEntry {
    /// Snapshot the completion values of a current record.
    pub fn from_record(record: &CertificationRecord, created_at: DateTime<Utc>) -> Self {
        Self {
            id: HistoryEntryId::new(),
            fueler_id: record.fueler_id,
            training_id: record.training_id,
            completed_date: record.completed_date,
            expiry_date: record.expiry_date,
            notes: record.notes.clone(),
            certified_by: record.certified_by,
            created_at,
        }
    }

    pub fn key(&self) -> CertificationKey {
        CertificationKey::new(self.fueler_id, self.training_id)
    }
}

impl Entity for CertificationHistoryEntry {
    type Id = HistoryEntryId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Whether a completion created the current record or overwrote it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionOutcome {
    Created,
    Updated,
}
