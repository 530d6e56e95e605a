use chrono::NaiveDate;
use tracing::instrument;

use fuelcert_certification::{CalendarEvent, CalendarNames, CalendarRange, project};

use crate::store::{CatalogStore, LedgerStore, RegistryStore, StoreResult};

/// Read-only calendar over the current records.
#[derive(Debug, Clone)]
pub struct CalendarProjector<S> {
    store: S,
}

impl<S> CalendarProjector<S>
where
    S: LedgerStore + CatalogStore + RegistryStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Events between `start` and `end` (inclusive). Missing bounds default to a window
    /// around today; `start > end` is a validation error.
    #[instrument(skip(self), err)]
    pub async fn calendar(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> StoreResult<(CalendarRange, Vec<CalendarEvent>)> {
        let today = super::today();
        let range = CalendarRange::with_defaults(start, end, today)?;

        let records = self.store.certifications_in_range(range).await?;

        let mut names = CalendarNames::default();
        if !records.is_empty() {
            for training in self.store.list_trainings().await? {
                names.trainings.insert(training.id, training.name);
            }
            for fueler in self.store.list_fuelers(None).await? {
                names.fuelers.insert(fueler.id, fueler.name);
            }
        }

        let events = project(records.iter(), range, &names, today);
        tracing::debug!(records = records.len(), events = events.len(), "calendar projected");
        Ok((range, events))
    }
}
