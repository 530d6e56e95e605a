use fuelcert_auth::{Caller, PrincipalId, Role};
use fuelcert_core::UserId;

/// Principal context for a request (authenticated identity + roles).
///
/// Inserted by the auth middleware; present on every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
    is_staff: bool,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>, is_staff: bool) -> Self {
        Self {
            principal_id,
            roles,
            is_staff,
        }
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    /// Account identity, used as the certifier and to find the caller's fueler profile.
    pub fn user_id(&self) -> UserId {
        self.principal_id.user_id()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn is_staff(&self) -> bool {
        self.is_staff
    }

    pub fn caller(&self) -> Caller {
        Caller::authenticated(self.principal_id, self.roles.clone(), self.is_staff)
    }
}
