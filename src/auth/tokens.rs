//! Digest-backed bearer token table

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use super::Authenticator;
use crate::config::Credential;
use crate::error::{PortalError, PortalResult};
use crate::models::{Actor, Role};

/// SHA-256 hex digest of a raw token, as stored in `config.toml`.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.trim().as_bytes()))
}

/// Authenticator over a static table of token digests.
pub struct TokenAuthenticator {
    by_digest: HashMap<String, Actor>,
}

impl TokenAuthenticator {
    pub fn new(credentials: &[Credential]) -> PortalResult<Self> {
        let mut by_digest = HashMap::with_capacity(credentials.len());
        for cred in credentials {
            if cred.role == Role::System {
                return Err(PortalError::validation(format!(
                    "credential for {} may not carry the system role",
                    cred.subject_id
                )));
            }
            let actor = Actor::new(&cred.subject_id, cred.role, &cred.display_name);
            by_digest.insert(cred.token_sha256.to_ascii_lowercase(), actor);
        }
        Ok(Self { by_digest })
    }
}

impl Authenticator for TokenAuthenticator {
    fn authenticate(&self, bearer: Option<&str>) -> PortalResult<Actor> {
        let token = bearer.ok_or(PortalError::Unauthenticated)?;
        self.by_digest
            .get(&hash_token(token))
            .cloned()
            .ok_or(PortalError::InvalidCredential)
    }
}
