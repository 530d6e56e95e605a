//! Expiry calculator: completion date + validity period → expiry date.
//!
//! Dates are pure calendar dates (`NaiveDate`); there is no timezone component anywhere
//! in the calculation.

use core::num::NonZeroU32;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use fuelcert_core::{DomainError, DomainResult, ValueObject};

/// Upper bound for a validity period (100 years).
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// Derive the expiry date of a completion.
///
/// - `None` or `Some(0)` means the training does not expire → `None`.
/// - Otherwise `completed + validity_period_days` calendar days.
///
/// Also returns `None` if the sum falls outside chrono's date range; validated inputs
/// (see [`ValidityPeriod::from_days`]) never get there.
pub fn compute_expiry(completed: NaiveDate, validity_period_days: Option<u32>) -> Option<NaiveDate> {
    match validity_period_days {
        None | Some(0) => None,
        Some(days) => completed.checked_add_days(Days::new(u64::from(days))),
    }
}

/// How long a completion of a training stays valid.
///
/// "Does not expire" is its own state rather than a magic number, so it can never be
/// confused with a very short or very long period. On the wire it is `null`; a period
/// is its number of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "Option<u32>", try_from = "Option<i64>")]
pub enum ValidityPeriod {
    NonExpiring,
    Days(NonZeroU32),
}

impl ValueObject for ValidityPeriod {}

impl ValidityPeriod {
    /// Validate a raw day count.
    ///
    /// `None` and `0` both mean non-expiring. Negative values and values above
    /// [`MAX_VALIDITY_DAYS`] are rejected.
    pub fn from_days(days: Option<i64>) -> DomainResult<Self> {
        let Some(days) = days else {
            return Ok(Self::NonExpiring);
        };

        if days < 0 {
            return Err(DomainError::validation(format!(
                "validity_period_days cannot be negative (got {days})"
            )));
        }
        if days > i64::from(MAX_VALIDITY_DAYS) {
            return Err(DomainError::validation(format!(
                "validity_period_days cannot exceed {MAX_VALIDITY_DAYS} (got {days})"
            )));
        }

        // Bounded above, so the cast cannot truncate.
        Ok(match NonZeroU32::new(days as u32) {
            Some(n) => Self::Days(n),
            None => Self::NonExpiring,
        })
    }

    pub fn days(&self) -> Option<u32> {
        match self {
            Self::NonExpiring => None,
            Self::Days(n) => Some(n.get()),
        }
    }

    pub fn expires(&self) -> bool {
        matches!(self, Self::Days(_))
    }

    /// Expiry date of a completion on `completed`.
    pub fn expiry_for(&self, completed: NaiveDate) -> Option<NaiveDate> {
        compute_expiry(completed, self.days())
    }
}

impl From<ValidityPeriod> for Option<u32> {
    fn from(value: ValidityPeriod) -> Self {
        value.days()
    }
}

impl TryFrom<Option<i64>> for ValidityPeriod {
    type Error = DomainError;

    fn try_from(value: Option<i64>) -> Result<Self, Self::Error> {
        Self::from_days(value)
    }
}
