//! API-side access guard.
//!
//! Classifies the HTTP method and checks the caller against the route's policy before
//! any handler runs, keeping services and stores auth-agnostic.

use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use fuelcert_auth::{AccessPolicy, Authenticated, AuthzError, MethodKind, admin_or_read_only, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Check a request context against a policy.
pub fn authorize_request<P: AccessPolicy>(
    principal: Option<&PrincipalContext>,
    method: &axum::http::Method,
    policy: &P,
) -> Result<(), AuthzError> {
    let caller = principal.map(PrincipalContext::caller).unwrap_or_default();
    authorize(&caller, MethodKind::from_http_method(method.as_str()), policy)
}

/// Middleware: any authenticated caller may read, only admins may write.
pub async fn require_admin_or_read_only(
    principal: Option<Extension<PrincipalContext>>,
    req: Request,
    next: Next,
) -> Response {
    let principal = principal.map(|Extension(p)| p);
    match authorize_request(principal.as_ref(), req.method(), &admin_or_read_only()) {
        Ok(()) => next.run(req).await,
        Err(e) => authz_error_to_response(e),
    }
}

/// Middleware: any authenticated caller; the handler decides the rest.
pub async fn require_authenticated(
    principal: Option<Extension<PrincipalContext>>,
    req: Request,
    next: Next,
) -> Response {
    let principal = principal.map(|Extension(p)| p);
    match authorize_request(principal.as_ref(), req.method(), &Authenticated) {
        Ok(()) => next.run(req).await,
        Err(e) => authz_error_to_response(e),
    }
}

pub fn authz_error_to_response(err: AuthzError) -> Response {
    match err {
        AuthzError::Unauthenticated => errors::json_error(StatusCode::UNAUTHORIZED, "unauthenticated", err.to_string()),
        AuthzError::Forbidden(_) => errors::json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use fuelcert_auth::{PrincipalId, Role};

    #[test]
    fn line_staff_read_but_do_not_write() {
        let line = PrincipalContext::new(PrincipalId::new(), vec![Role::LINE], false);
        let policy = admin_or_read_only();

        assert!(authorize_request(Some(&line), &Method::GET, &policy).is_ok());
        assert!(matches!(
            authorize_request(Some(&line), &Method::POST, &policy),
            Err(AuthzError::Forbidden(_))
        ));
        assert_eq!(
            authorize_request(None, &Method::GET, &policy),
            Err(AuthzError::Unauthenticated)
        );
    }

    #[test]
    fn staff_flag_grants_writes() {
        let staff = PrincipalContext::new(PrincipalId::new(), vec![], true);
        assert!(authorize_request(Some(&staff), &Method::DELETE, &admin_or_read_only()).is_ok());
    }

    #[test]
    fn authenticated_callers_may_write_under_the_authenticated_policy() {
        let line = PrincipalContext::new(PrincipalId::new(), vec![Role::LINE], false);
        assert!(authorize_request(Some(&line), &Method::POST, &Authenticated).is_ok());
        assert_eq!(
            authorize_request(None, &Method::POST, &Authenticated),
            Err(AuthzError::Unauthenticated)
        );
    }
}
