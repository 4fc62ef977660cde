//! `stockroom-auth`: authentication/authorization boundary.
//!
//! This crate is decoupled from HTTP and storage: it verifies bearer tokens,
//! maps roles to permissions and answers "may this principal do that".

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod roles;

pub use authorize::{authorize, AuthzError, Principal};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::{Permission, permissions_for_roles};
pub use roles::Role;
