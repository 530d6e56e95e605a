//! `fuelcert-auth`: authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it validates bearer tokens into claims
//! and decides access with small composable predicates over `(caller, method kind)`.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, authorize_owner};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use policy::{AccessPolicy, Admin, Authenticated, Caller, MethodKind, ReadOnly, admin_or_read_only};
pub use principal::PrincipalId;
pub use roles::Role;
