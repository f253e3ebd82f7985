//! Authentication boundary
//!
//! Token issuance lives outside the portal. This module only resolves a
//! bearer credential into an [`Actor`] with a normalized [`Role`].

pub mod tokens;

pub use tokens::{hash_token, TokenAuthenticator};

use crate::error::PortalResult;
use crate::models::Actor;

/// Resolves bearer credentials to caller identities.
pub trait Authenticator: Send + Sync {
    /// `Unauthenticated` when no credential was sent, `InvalidCredential`
    /// when it does not resolve.
    fn authenticate(&self, bearer: Option<&str>) -> PortalResult<Actor>;
}

/// Extract the token from an `Authorization` header value.
pub fn parse_bearer(header_value: &str) -> Option<&str> {
    let header_value = header_value.trim();
    let rest = header_value
        .strip_prefix("Bearer ")
        .or_else(|| header_value.strip_prefix("bearer "))?;
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
