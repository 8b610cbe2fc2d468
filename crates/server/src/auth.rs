//! Capability-token authorization in front of the store API.
//!
//! Tokens come from configuration, one per role. The storage logic knows
//! nothing about roles: the split between writers, checkers, and
//! read-only consumers is enforced entirely here, at the HTTP boundary.
//! Presented tokens are never logged — only their SHA-256 fingerprints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

use granary_core::config::AuthConfig;

use crate::state::AppState;

// ── Roles ────────────────────────────────────────────────────────────

/// Caller capability. Admin implies everything; writer and checker each
/// imply reader (every producer may also query what it wrote).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reader,
    Writer,
    Checker,
    Admin,
}

impl Role {
    pub fn allows(self, required: Role) -> bool {
        match required {
            Role::Reader => true,
            Role::Writer => matches!(self, Role::Writer | Role::Admin),
            Role::Checker => matches!(self, Role::Checker | Role::Admin),
            Role::Admin => matches!(self, Role::Admin),
        }
    }
}

/// Short stable fingerprint of a token, safe for logs.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let hex: String = digest.iter().take(4).map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

// ── Token table ──────────────────────────────────────────────────────

pub struct AuthTokens {
    tokens: HashMap<String, Role>,
    open: bool,
}

impl AuthTokens {
    pub fn from_config(auth: &AuthConfig) -> Self {
        let mut tokens = HashMap::new();
        if let Some(t) = &auth.admin_token {
            tokens.insert(t.clone(), Role::Admin);
        }
        if let Some(t) = &auth.writer_token {
            tokens.insert(t.clone(), Role::Writer);
        }
        if let Some(t) = &auth.checker_token {
            tokens.insert(t.clone(), Role::Checker);
        }
        if let Some(t) = &auth.reader_token {
            tokens.insert(t.clone(), Role::Reader);
        }
        let open = auth.is_open();
        if open {
            warn!("no auth tokens configured — server runs open (development mode)");
        }
        Self { tokens, open }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Resolve a bearer token to a role. With no tokens configured the
    /// server is open and every caller is admin.
    pub fn resolve(&self, bearer: Option<&str>) -> Result<Role, AuthRejection> {
        if self.open {
            return Ok(Role::Admin);
        }
        let token = bearer.ok_or(AuthRejection::Missing)?;
        match self.tokens.get(token) {
            Some(&role) => Ok(role),
            None => {
                warn!(token = %fingerprint(token), "rejected unknown token");
                Err(AuthRejection::Unknown)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    Missing,
    Unknown,
}

fn unauthorized(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": message })),
    )
}

// ── Extractor ────────────────────────────────────────────────────────

/// The authenticated caller, extracted from the `Authorization: Bearer`
/// header. Handlers call [`Caller::require`] with the route's minimum
/// role.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub role: Role,
}

impl Caller {
    pub fn require(&self, required: Role) -> Result<(), (StatusCode, Json<Value>)> {
        if self.role.allows(required) {
            Ok(())
        } else {
            Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": format!("requires {:?} capability", required) })),
            ))
        }
    }

    /// For routes open to more than one role (e.g. heartbeats come from
    /// both collectors and validators).
    pub fn require_any(&self, required: &[Role]) -> Result<(), (StatusCode, Json<Value>)> {
        if required.iter().any(|&r| self.role.allows(r)) {
            Ok(())
        } else {
            Err((
                StatusCode::FORBIDDEN,
                Json(json!({ "error": format!("requires one of {:?}", required) })),
            ))
        }
    }
}

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = (StatusCode, Json<Value>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match state.auth.resolve(bearer) {
            Ok(role) => Ok(Caller { role }),
            Err(AuthRejection::Missing) => Err(unauthorized("missing bearer token")),
            Err(AuthRejection::Unknown) => Err(unauthorized("unknown token")),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens() -> AuthTokens {
        AuthTokens::from_config(&AuthConfig {
            admin_token: Some("adm".to_string()),
            writer_token: Some("wrt".to_string()),
            checker_token: Some("chk".to_string()),
            reader_token: Some("rdr".to_string()),
        })
    }

    #[test]
    fn test_role_lattice() {
        assert!(Role::Admin.allows(Role::Writer));
        assert!(Role::Admin.allows(Role::Checker));
        assert!(Role::Writer.allows(Role::Reader));
        assert!(Role::Checker.allows(Role::Reader));
        assert!(!Role::Writer.allows(Role::Checker));
        assert!(!Role::Checker.allows(Role::Writer));
        assert!(!Role::Reader.allows(Role::Writer));
        assert!(!Role::Reader.allows(Role::Admin));
    }

    #[test]
    fn test_token_resolution() {
        let tokens = tokens();
        assert_eq!(tokens.resolve(Some("adm")).unwrap(), Role::Admin);
        assert_eq!(tokens.resolve(Some("wrt")).unwrap(), Role::Writer);
        assert_eq!(tokens.resolve(Some("rdr")).unwrap(), Role::Reader);
        assert_eq!(tokens.resolve(Some("nope")), Err(AuthRejection::Unknown));
        assert_eq!(tokens.resolve(None), Err(AuthRejection::Missing));
    }

    #[test]
    fn test_open_mode_grants_admin() {
        let open = AuthTokens::from_config(&AuthConfig {
            admin_token: None,
            writer_token: None,
            checker_token: None,
            reader_token: None,
        });
        assert!(open.is_open());
        assert_eq!(open.resolve(None).unwrap(), Role::Admin);
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        let a = fingerprint("secret");
        assert_eq!(a, fingerprint("secret"));
        assert_ne!(a, fingerprint("other"));
        assert!(a.starts_with("sha256:"));
        assert!(!a.contains("secret"));
    }
}
