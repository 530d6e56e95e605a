//! Expiry status of a current certification relative to a given day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use fuelcert_core::{DomainError, DomainResult};

pub const CRITICAL_WITHIN_DAYS: i64 = 7;
pub const WARNING_WITHIN_DAYS: i64 = 30;
pub const CAUTION_WITHIN_DAYS: i64 = 60;

/// Buckets used to flag certifications that need recurrent training soon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryStatus {
    Expired,
    Critical,
    Warning,
    Caution,
    Valid,
}

impl ExpiryStatus {
    /// Non-expiring certifications are always `Valid`. A certification expiring today
    /// is still `Critical`; it becomes `Expired` the day after.
    pub fn classify(expiry_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        let Some(expiry) = expiry_date else {
            return ExpiryStatus::Valid;
        };

        match (expiry - today).num_days() {
            d if d < 0 => ExpiryStatus::Expired,
            d if d <= CRITICAL_WITHIN_DAYS => ExpiryStatus::Critical,
            d if d <= WARNING_WITHIN_DAYS => ExpiryStatus::Warning,
            d if d <= CAUTION_WITHIN_DAYS => ExpiryStatus::Caution,
            _ => ExpiryStatus::Valid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpiryStatus::Expired => "expired",
            ExpiryStatus::Critical => "critical",
            ExpiryStatus::Warning => "warning",
            ExpiryStatus::Caution => "caution",
            ExpiryStatus::Valid => "valid",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "expired" => Ok(ExpiryStatus::Expired),
            "critical" => Ok(ExpiryStatus::Critical),
            "warning" => Ok(ExpiryStatus::Warning),
            "caution" => Ok(ExpiryStatus::Caution),
            "valid" => Ok(ExpiryStatus::Valid),
            _ => Err(DomainError::validation(
                "status must be one of: expired, critical, warning, caution, valid",
            )),
        }
    }
}
