use chrono::NaiveDate;
use serde::Deserialize;
use serde::de::IgnoredAny;
use serde_json::json;

use fuelcert_certification::{Assignment, CertificationHistoryEntry, CertificationRecord, CompletionWrite};
use fuelcert_core::{FuelerId, TrainingId};
use fuelcert_fuelers::Fueler;
use fuelcert_training::Training;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateTrainingRequest {
    pub name: String,
    pub description: Option<String>,
    /// `null` or `0` for trainings that never expire.
    pub validity_period_days: Option<i64>,
    pub aircraft_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTrainingRequest {
    pub description: Option<String>,
    pub validity_period_days: Option<i64>,
    pub aircraft_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterFuelerRequest {
    pub user_id: String,
    pub name: String,
    pub handheld_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateFuelerRequest {
    pub name: Option<String>,
    pub handheld_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetFuelerStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCertificationRequest {
    #[serde(alias = "fueler")]
    pub fueler_id: FuelerId,
    #[serde(alias = "training")]
    pub training_id: TrainingId,
    pub completed_date: NaiveDate,
    pub notes: Option<String>,
    /// Derived from the training when omitted.
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteCertificationRequest {
    #[serde(alias = "fueler")]
    pub fueler_id: FuelerId,
    #[serde(alias = "training")]
    pub training_id: TrainingId,
    /// Defaults to today.
    pub completed_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Always derived on Complete; accepted here only to be rejected.
    pub expiry_date: Option<IgnoredAny>,
}

#[derive(Debug, Deserialize)]
pub struct AssignTrainingRequest {
    #[serde(alias = "fueler")]
    pub fueler_id: FuelerId,
    #[serde(alias = "training")]
    pub training_id: TrainingId,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Body of `POST /assignments/:id/complete`. An empty body means all defaults.
#[derive(Debug, Default, Deserialize)]
pub struct CompleteAssignmentRequest {
    /// Defaults to today.
    pub completed_date: Option<NaiveDate>,
    /// Defaults to the assignment's notes.
    pub notes: Option<String>,
}

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CertificationQuery {
    pub fueler: Option<String>,
    pub training: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub fueler: Option<String>,
    pub training: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FuelerQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AssignmentQuery {
    /// Only the caller's own assignments.
    #[serde(default)]
    pub my: bool,
    pub status: Option<String>,
    pub fueler: Option<String>,
    pub training: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn training_to_json(t: &Training) -> serde_json::Value {
    json!({
        "id": t.id,
        "name": t.name,
        "description": t.description,
        "validity_period_days": t.validity_period_days(),
        "expires": t.validity.expires(),
        "aircraft_type": t.aircraft_type,
        "created_at": t.created_at,
        "updated_at": t.updated_at,
    })
}

pub fn fueler_to_json(f: &Fueler) -> serde_json::Value {
    json!({
        "id": f.id,
        "user_id": f.user_id,
        "name": f.name,
        "handheld_name": f.handheld_name,
        "status": f.status.as_str(),
        "created_at": f.created_at,
        "updated_at": f.updated_at,
    })
}

/// Current record plus its expiry status as of `today`.
pub fn certification_to_json(r: &CertificationRecord, today: NaiveDate) -> serde_json::Value {
    json!({
        "id": r.id,
        "fueler_id": r.fueler_id,
        "training_id": r.training_id,
        "completed_date": r.completed_date,
        "expiry_date": r.expiry_date,
        "notes": r.notes,
        "certified_by": r.certified_by,
        "days_until_expiry": r.days_until_expiry(today),
        "expiry_status": r.expiry_status(today).as_str(),
        "created_at": r.created_at,
        "updated_at": r.updated_at,
    })
}

pub fn history_to_json(h: &CertificationHistoryEntry) -> serde_json::Value {
    json!({
        "id": h.id,
        "fueler_id": h.fueler_id,
        "training_id": h.training_id,
        "completed_date": h.completed_date,
        "expiry_date": h.expiry_date,
        "notes": h.notes,
        "certified_by": h.certified_by,
        "created_at": h.created_at,
    })
}

/// The record as written by a Complete, with the outcome and the new history entry's id.
pub fn completion_to_json(w: &CompletionWrite, today: NaiveDate) -> serde_json::Value {
    let mut body = certification_to_json(&w.record, today);
    if let Some(fields) = body.as_object_mut() {
        fields.insert("outcome".to_string(), json!(w.outcome));
        fields.insert("history_id".to_string(), json!(w.history.id));
    }
    body
}

pub fn assignment_to_json(a: &Assignment, today: NaiveDate) -> serde_json::Value {
    json!({
        "id": a.id,
        "fueler_id": a.fueler_id,
        "training_id": a.training_id,
        "status": a.status.as_str(),
        "due_date": a.due_date,
        "overdue": a.is_overdue(today),
        "notes": a.notes,
        "assigned_by": a.assigned_by,
        "assigned_at": a.assigned_at,
        "completed_at": a.completed_at,
        "certification_id": a.certification_id,
    })
}
