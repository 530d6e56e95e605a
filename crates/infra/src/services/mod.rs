//! Application services: one per area, each generic over the store it needs.
//!
//! Services own the clock (`now`/`today`), logging and not-found handling; the stores own
//! atomicity.

use chrono::{DateTime, NaiveDate, Utc};

pub mod assignments;
pub mod calendar;
pub mod catalog;
pub mod ledger;
pub mod registry;

pub use assignments::TrainingAssignments;
pub use calendar::CalendarProjector;
pub use catalog::TrainingCatalog;
pub use ledger::{CertificationLedger, LedgerOptions};
pub use registry::FuelerRegistry;

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Server calendar date (UTC) used for expiry arithmetic and status buckets.
pub fn today() -> NaiveDate {
    now().date_naive()
}
