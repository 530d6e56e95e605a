use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fuelcert_core::{DomainError, DomainResult, Entity, TrainingId};

use crate::expiry::ValidityPeriod;

const MAX_NAME_LEN: usize = 200;

/// A certification type in the catalog (e.g. "Jet A Fueling", "Fuel Spill Response").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Training {
    pub id: TrainingId,
    /// Unique across the catalog.
    pub name: String,
    pub description: String,
    pub validity: ValidityPeriod,
    /// Optional aircraft-type scope; `None` applies to every aircraft.
    pub aircraft_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Training {
    type Id = TrainingId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Command: RegisterTraining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterTraining {
    pub training_id: TrainingId,
    pub name: String,
    pub description: Option<String>,
    /// Raw day count; `None`/`0` means non-expiring.
    pub validity_period_days: Option<i64>,
    pub aircraft_type: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateTraining.
///
/// Every field is optional; `None` keeps the current value. The name is immutable.
/// `validity_period_days: Some(0)` switches the training to non-expiring and an empty
/// `aircraft_type` clears the scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTraining {
    pub description: Option<String>,
    pub validity_period_days: Option<i64>,
    pub aircraft_type: Option<String>,
}

impl Training {
    pub fn register(cmd: RegisterTraining) -> DomainResult<Self> {
        let name = normalize_name(&cmd.name)?;
        let validity = ValidityPeriod::from_days(cmd.validity_period_days)?;

        Ok(Self {
            id: cmd.training_id,
            name,
            description: cmd.description.unwrap_or_default().trim().to_string(),
            validity,
            aircraft_type: normalize_scope(cmd.aircraft_type),
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    /// Apply an update. Validation happens before any field changes, so a rejected
    /// update leaves the training untouched.
    pub fn apply_update(&mut self, update: UpdateTraining, now: DateTime<Utc>) -> DomainResult<()> {
        let validity = match update.validity_period_days {
            Some(days) => ValidityPeriod::from_days(Some(days))?,
            None => self.validity,
        };

        if let Some(description) = update.description {
            self.description = description.trim().to_string();
        }
        if update.aircraft_type.is_some() {
            self.aircraft_type = normalize_scope(update.aircraft_type);
        }
        self.validity = validity;
        self.updated_at = now;
        Ok(())
    }

    pub fn validity_period_days(&self) -> Option<u32> {
        self.validity.days()
    }
}

fn normalize_name(raw: &str) -> DomainResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::validation("training name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "training name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn normalize_scope(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}
