use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use serde_json::json;

use fuelcert_core::DomainError;
use fuelcert_infra::StoreError;

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::Domain(e) => domain_error_to_response(e),
        StoreError::TransactionFailure(msg) => {
            tracing::warn!(error = %msg, "transaction failed");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "transaction_failure", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(what) => json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found")),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a typed id from a path or query segment.
pub fn parse_id<T>(raw: &str, what: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.trim()
        .parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id")))
}

pub fn parse_optional_id<T>(raw: Option<&str>, what: &str) -> Result<Option<T>, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| parse_id(s, what))
        .transpose()
}

/// Parse an ISO `YYYY-MM-DD` query parameter.
pub fn parse_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, axum::response::Response> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
                json_error(
                    StatusCode::BAD_REQUEST,
                    "validation_error",
                    format!("{field} must be a date in YYYY-MM-DD format"),
                )
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_domain_error_has_its_own_status() {
        let cases = [
            (DomainError::validation("bad"), StatusCode::BAD_REQUEST),
            (DomainError::invalid_id("bad"), StatusCode::BAD_REQUEST),
            (DomainError::not_found("fueler 1"), StatusCode::NOT_FOUND),
            (DomainError::conflict("dup"), StatusCode::CONFLICT),
            (DomainError::invariant("broken"), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, status) in cases {
            assert_eq!(domain_error_to_response(err).status(), status);
        }

        // Access decisions never travel as domain errors.
        for err in [
            DomainError::validation(""),
            DomainError::invalid_id(""),
            DomainError::not_found(""),
            DomainError::conflict(""),
            DomainError::invariant(""),
        ] {
            assert_ne!(domain_error_to_response(err).status(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn transaction_failures_are_retryable() {
        let resp = store_error_to_response(StoreError::TransactionFailure("deadlock".into()));
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn dates_must_be_iso() {
        assert!(matches!(parse_date(Some("2025-03-01"), "start"), Ok(Some(_))));
        assert!(matches!(parse_date(Some(""), "start"), Ok(None)));
        assert!(parse_date(Some("03/01/2025"), "start").is_err());
    }
}
