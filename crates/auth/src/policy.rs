//! Access policies as small composable predicates.
//!
//! A policy answers one question: may this caller perform this kind of method? Policies
//! know nothing about HTTP requests; the API layer classifies the method and builds the
//! [`Caller`] from the validated token.

use crate::{PrincipalId, Role};

/// Kind of operation being attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Safe methods (GET, HEAD, OPTIONS).
    Read,
    /// Everything that may change state.
    Write,
}

impl MethodKind {
    pub fn from_http_method(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" | "HEAD" | "OPTIONS" => MethodKind::Read,
            _ => MethodKind::Write,
        }
    }
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Caller {
    pub principal_id: Option<PrincipalId>,
    pub roles: Vec<Role>,
    pub is_staff: bool,
}

impl Caller {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(principal_id: PrincipalId, roles: Vec<Role>, is_staff: bool) -> Self {
        Self {
            principal_id: Some(principal_id),
            roles,
            is_staff,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.principal_id.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_staff || self.roles.iter().any(Role::is_admin)
    }
}

pub trait AccessPolicy: Send + Sync {
    fn allows(&self, caller: &Caller, method: MethodKind) -> bool;

    /// Human-readable form, used in denial messages.
    fn describe(&self) -> String;

    fn and<P: AccessPolicy>(self, other: P) -> And<Self, P>
    where
        Self: Sized,
    {
        And(self, other)
    }

    fn or<P: AccessPolicy>(self, other: P) -> Or<Self, P>
    where
        Self: Sized,
    {
        Or(self, other)
    }
}

/// Caller presented a valid token.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// Method is safe (read-only).
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnly;

/// Caller holds the admin role or is staff.
#[derive(Debug, Clone, Copy, Default)]
pub struct Admin;

#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(A, B);

#[derive(Debug, Clone, Copy)]
pub struct Or<A, B>(A, B);

impl AccessPolicy for Authenticated {
    fn allows(&self, caller: &Caller, _method: MethodKind) -> bool {
        caller.is_authenticated()
    }

    fn describe(&self) -> String {
        "authenticated".to_string()
    }
}

impl AccessPolicy for ReadOnly {
    fn allows(&self, _caller: &Caller, method: MethodKind) -> bool {
        method == MethodKind::Read
    }

    fn describe(&self) -> String {
        "read-only".to_string()
    }
}

impl AccessPolicy for Admin {
    fn allows(&self, caller: &Caller, _method: MethodKind) -> bool {
        caller.is_authenticated() && caller.is_admin()
    }

    fn describe(&self) -> String {
        "admin".to_string()
    }
}

impl<A: AccessPolicy, B: AccessPolicy> AccessPolicy for And<A, B> {
    fn allows(&self, caller: &Caller, method: MethodKind) -> bool {
        self.0.allows(caller, method) && self.1.allows(caller, method)
    }

    fn describe(&self) -> String {
        format!("({} and {})", self.0.describe(), self.1.describe())
    }
}

impl<A: AccessPolicy, B: AccessPolicy> AccessPolicy for Or<A, B> {
    fn allows(&self, caller: &Caller, method: MethodKind) -> bool {
        self.0.allows(caller, method) || self.1.allows(caller, method)
    }

    fn describe(&self) -> String {
        format!("({} or {})", self.0.describe(), self.1.describe())
    }
}

/// Any authenticated caller may read; only admins may write.
pub fn admin_or_read_only() -> impl AccessPolicy {
    Authenticated.and(ReadOnly.or(Admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Caller {
        Caller::authenticated(PrincipalId::new(), vec![Role::LINE], false)
    }

    fn admin() -> Caller {
        Caller::authenticated(PrincipalId::new(), vec![Role::ADMIN], false)
    }

    fn staff() -> Caller {
        Caller::authenticated(PrincipalId::new(), vec![], true)
    }

    #[test]
    fn admin_or_read_only_matrix() {
        let policy = admin_or_read_only();

        assert!(!policy.allows(&Caller::anonymous(), MethodKind::Read));
        assert!(!policy.allows(&Caller::anonymous(), MethodKind::Write));
        assert!(policy.allows(&line(), MethodKind::Read));
        assert!(!policy.allows(&line(), MethodKind::Write));
        assert!(policy.allows(&admin(), MethodKind::Write));
        assert!(policy.allows(&staff(), MethodKind::Write));
    }

    #[test]
    fn admin_requires_authentication() {
        let forged = Caller {
            principal_id: None,
            roles: vec![Role::ADMIN],
            is_staff: true,
        };
        assert!(!Admin.allows(&forged, MethodKind::Write));
        assert!(Admin.allows(&admin(), MethodKind::Write));
    }

    #[test]
    fn describe_shows_composition() {
        assert_eq!(
            admin_or_read_only().describe(),
            "(authenticated and (read-only or admin))"
        );
    }

    #[test]
    fn http_methods_classify() {
        assert_eq!(MethodKind::from_http_method("get"), MethodKind::Read);
        assert_eq!(MethodKind::from_http_method("OPTIONS"), MethodKind::Read);
        assert_eq!(MethodKind::from_http_method("POST"), MethodKind::Write);
        assert_eq!(MethodKind::from_http_method("DELETE"), MethodKind::Write);
    }
}
