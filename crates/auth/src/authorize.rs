use thiserror::Error;

use fuelcert_core::UserId;

use crate::policy::{AccessPolicy, Caller, MethodKind};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("authentication required")]
    Unauthenticated,

    #[error("forbidden: requires {0}")]
    Forbidden(String),
}

/// Authorize a caller for a method kind under a policy.
///
/// - No IO
/// - No panics
/// - Anonymous callers that are denied get `Unauthenticated`, everyone else `Forbidden`.
pub fn authorize<P: AccessPolicy + ?Sized>(
    caller: &Caller,
    method: MethodKind,
    policy: &P,
) -> Result<(), AuthzError> {
    if policy.allows(caller, method) {
        return Ok(());
    }

    tracing::debug!(
        principal = ?caller.principal_id,
        ?method,
        policy = %policy.describe(),
        "access denied"
    );

    if caller.is_authenticated() {
        Err(AuthzError::Forbidden(policy.describe()))
    } else {
        Err(AuthzError::Unauthenticated)
    }
}

/// Allow admins, or the account that owns the resource.
pub fn authorize_owner(caller: &Caller, owner: UserId) -> Result<(), AuthzError> {
    let Some(principal_id) = caller.principal_id else {
        return Err(AuthzError::Unauthenticated);
    };
    if caller.is_admin() || principal_id.user_id() == owner {
        return Ok(());
    }

    tracing::debug!(principal = %principal_id, %owner, "access denied: not the owner");
    Err(AuthzError::Forbidden("admin or owner".to_string()))
}
