//! Calendar projection: completions and expirations of current certifications that fall
//! inside a date range.
//!
//! Read-only. The projector never looks at history, only at current records.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use fuelcert_core::{CertificationId, DomainError, DomainResult, FuelerId, TrainingId};

use crate::record::CertificationRecord;

/// Days before and after today covered when a caller omits the range.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl CalendarRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation(format!(
                "range start {start} is after range end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Fill in missing bounds: recent completions look back from `today`, upcoming
    /// expirations look ahead.
    pub fn with_defaults(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> DomainResult<Self> {
        let start = start.unwrap_or(today - Duration::days(DEFAULT_WINDOW_DAYS));
        let end = end.unwrap_or(today + Duration::days(DEFAULT_WINDOW_DAYS));
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Whether a record has anything to show in this range.
    pub fn touches(&self, record: &CertificationRecord) -> bool {
        self.contains(record.completed_date) || record.expiry_date.is_some_and(|d| self.contains(d))
    }
}

/// Event type. Declaration order is the tie-break order within one date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarEventKind {
    Completed,
    Expiring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(rename = "type")]
    pub kind: CalendarEventKind,
    pub date: NaiveDate,
    pub certification_id: CertificationId,
    pub fueler_id: FuelerId,
    pub fueler_name: String,
    pub training_id: TrainingId,
    pub training_name: String,
    /// Expiring events dated before today.
    pub overdue: bool,
}

/// Display names for the fuelers and trainings referenced by the projected records.
#[derive(Debug, Clone, Default)]
pub struct CalendarNames {
    pub fuelers: HashMap<FuelerId, String>,
    pub trainings: HashMap<TrainingId, String>,
}

impl CalendarNames {
    fn fueler(&self, id: &FuelerId) -> String {
        self.fuelers.get(id).cloned().unwrap_or_default()
    }

    fn training(&self, id: &TrainingId) -> String {
        self.trainings.get(id).cloned().unwrap_or_default()
    }
}

/// Project current records onto the calendar.
///
/// One `completed` event per record whose completion date is in range, one `expiring`
/// event per record whose expiry date is in range. Events are sorted by date, then type,
/// then fueler id, then training id.
pub fn project<'a>(
    records: impl IntoIterator<Item = &'a CertificationRecord>,
    range: CalendarRange,
    names: &CalendarNames,
    today: NaiveDate,
) -> Vec<CalendarEvent> {
    let mut events = Vec::new();

    for record in records {
        if range.contains(record.completed_date) {
            events.push(event(record, CalendarEventKind::Completed, record.completed_date, names, today));
        }
        if let Some(expiry) = record.expiry_date.filter(|d| range.contains(*d)) {
            events.push(event(record, CalendarEventKind::Expiring, expiry, names, today));
        }
    }

    events.sort_by(|a, b| {
        (a.date, a.kind, a.fueler_id, a.training_id).cmp(&(b.date, b.kind, b.fueler_id, b.training_id))
    });
    events
}

fn event(
    record: &CertificationRecord,
    kind: CalendarEventKind,
    date: NaiveDate,
    names: &CalendarNames,
    today: NaiveDate,
) -> CalendarEvent {
    CalendarEvent {
        kind,
        date,
        certification_id: record.id,
        fueler_id: record.fueler_id,
        fueler_name: names.fueler(&record.fueler_id),
        training_id: record.training_id,
        training_name: names.training(&record.training_id),
        overdue: kind == CalendarEventKind::Expiring && date < today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 20).unwrap()
    }

    fn record(fueler_id: FuelerId, completed: i64, expiry: Option<i64>) -> CertificationRecord {
        CertificationRecord {
            id: CertificationId::new(),
            fueler_id,
            training_id: TrainingId::new(),
            completed_date: today() + Duration::days(completed),
            expiry_date: expiry.map(|d| today() + Duration::days(d)),
            notes: None,
            certified_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn range(start: i64, end: i64) -> CalendarRange {
        CalendarRange::new(today() + Duration::days(start), today() + Duration::days(end)).unwrap()
    }

    #[test]
    fn record_with_both_dates_in_range_yields_two_events() {
        let fueler_id = FuelerId::new();
        let r = record(fueler_id, -2, Some(8));
        let mut names = CalendarNames::default();
        names.fuelers.insert(fueler_id, "Fueler Three".to_string());
        names.trainings.insert(r.training_id, "Deicing".to_string());

        let events = project([&r], range(-5, 10), &names, today());

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, CalendarEventKind::Completed);
        assert_eq!(events[0].date, today() - Duration::days(2));
        assert_eq!(events[1].kind, CalendarEventKind::Expiring);
        assert_eq!(events[1].date, today() + Duration::days(8));
        assert_eq!(events[1].fueler_name, "Fueler Three");
        assert_eq!(events[1].training_name, "Deicing");
        assert!(!events[1].overdue);
    }

    #[test]
    fn non_expiring_records_never_expire_on_the_calendar() {
        let r = record(FuelerId::new(), -1, None);
        let events = project([&r], range(-3650, 3650), &CalendarNames::default(), today());
        assert_eq!(events.len(), 1);
        assert!(events.iter().all(|e| e.kind == CalendarEventKind::Completed));
    }

    #[test]
    fn past_expirations_are_flagged_overdue() {
        let r = record(FuelerId::new(), -40, Some(-3));
        let events = project([&r], range(-10, 0), &CalendarNames::default(), today());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CalendarEventKind::Expiring);
        assert!(events[0].overdue);
    }

    #[test]
    fn same_day_ties_put_completions_first() {
        let a = record(FuelerId::new(), 0, None);
        let b = record(FuelerId::new(), -30, Some(0));
        let events = project([&b, &a], range(0, 0), &CalendarNames::default(), today());
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, CalendarEventKind::Completed);
        assert_eq!(events[1].kind, CalendarEventKind::Expiring);
    }

    #[test]
    fn range_rejects_inverted_bounds_and_fills_defaults() {
        assert!(matches!(
            CalendarRange::new(today(), today() - Duration::days(1)),
            Err(DomainError::Validation(_))
        ));

        let r = CalendarRange::with_defaults(None, None, today()).unwrap();
        assert_eq!(r.start(), today() - Duration::days(DEFAULT_WINDOW_DAYS));
        assert_eq!(r.end(), today() + Duration::days(DEFAULT_WINDOW_DAYS));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: output order does not depend on input order, and every event lies
        /// inside the range.
        #[test]
        fn projection_is_sorted_and_input_order_independent(
            rows in prop::collection::vec((-60i64..60, prop::option::of(-60i64..120)), 0..40),
            start in -60i64..0,
            len in 0i64..90,
        ) {
            let records: Vec<CertificationRecord> = rows
                .iter()
                .map(|(c, e)| record(FuelerId::new(), *c, *e))
                .collect();
            let range = range(start, start + len);
            let names = CalendarNames::default();

            let forward = project(records.iter(), range, &names, today());
            let backward = project(records.iter().rev(), range, &names, today());

            prop_assert_eq!(&forward, &backward);
            for pair in forward.windows(2) {
                prop_assert!(
                    (pair[0].date, pair[0].kind, pair[0].fueler_id, pair[0].training_id)
                        <= (pair[1].date, pair[1].kind, pair[1].fueler_id, pair[1].training_id)
                );
            }
            prop_assert!(forward.iter().all(|e| range.contains(e.date)));
        }
    }
}
