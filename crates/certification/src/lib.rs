//! Certification ledger domain module.
//!
//! Pure decision logic for the certification lifecycle:
//! - `ledger`: create-vs-upsert decisions and the history entry every completion appends
//! - `status`: how close a current certification is to expiring
//! - `assignment`: trainings assigned to a fueler, closed by a ledger completion
//! - `calendar`: read-only projection of completions and expirations over a date range
//!
//! Stores call into these functions inside their atomic write scope; nothing here
//! performs IO.

pub mod assignment;
pub mod calendar;
pub mod command;
pub mod ledger;
pub mod record;
pub mod status;

pub use assignment::{
    AssignTraining, Assignment, AssignmentCompletion, AssignmentStatus, CompleteAssignment, decide_assignment_completion,
};
pub use calendar::{CalendarEvent, CalendarEventKind, CalendarNames, CalendarRange, project};
pub use command::{CompleteCertification, CreateCertification};
pub use ledger::{CompletionWrite, CreationWrite, decide_complete, decide_create};
pub use record::{CertificationHistoryEntry, CertificationKey, CertificationRecord, CompletionOutcome};
pub use status::ExpiryStatus;
