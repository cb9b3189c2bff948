//! Bearer-token verification.
//!
//! The auth provider is an external collaborator; this module only models
//! its contract (`AuthVerifier`) plus a file-backed implementation that maps
//! static tokens to staff identities. The verification engine trusts the
//! verified user's id as `verified_by` when an override occurs.

use anyhow::Result;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// A verified staff identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

/// Contract for the external token verifier.
pub trait AuthVerifier: Send + Sync {
    /// Verify a bearer token, returning the user it identifies.
    fn verify(&self, bearer_token: &str) -> Option<AuthUser>;
}

#[derive(Debug, Deserialize)]
struct StaffFile {
    #[serde(default)]
    tokens: HashMap<String, AuthUser>,
}

/// File-backed verifier: `staff.yaml` in the data directory maps each token
/// to the staff identity it belongs to.
#[derive(Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, AuthUser>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, AuthUser>) -> Self {
        Self { tokens }
    }

    /// Load tokens from a staff file. A missing file yields an empty
    /// verifier: every request is unauthenticated until tokens are
    /// provisioned.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Staff token file {} not found; overrides will be unavailable",
                path.display()
            );
            return Ok(Self::new(HashMap::new()));
        }

        let content = std::fs::read_to_string(path)?;
        let staff_file: StaffFile = serde_yaml::from_str(&content)?;
        info!("Loaded {} staff tokens", staff_file.tokens.len());
        Ok(Self::new(staff_file.tokens))
    }
}

impl AuthVerifier for StaticTokenVerifier {
    fn verify(&self, bearer_token: &str) -> Option<AuthUser> {
        self.tokens.get(bearer_token).cloned()
    }
}

/// Extract the bearer token from an Authorization header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn staff1() -> AuthUser {
        AuthUser {
            id: "staff1".to_string(),
            email: "staff1@church.example".to_string(),
            role: "staff".to_string(),
        }
    }

    #[test]
    fn test_static_verifier() {
        let mut tokens = HashMap::new();
        tokens.insert("secret-token".to_string(), staff1());
        let verifier = StaticTokenVerifier::new(tokens);

        assert_eq!(verifier.verify("secret-token"), Some(staff1()));
        assert_eq!(verifier.verify("wrong-token"), None);
    }

    #[test]
    fn test_load_from_yaml() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("staff.yaml");
        std::fs::write(
            &path,
            "tokens:\n  secret-token:\n    id: staff1\n    email: staff1@church.example\n    role: staff\n",
        )
        .unwrap();

        let verifier = StaticTokenVerifier::load(&path).unwrap();
        assert_eq!(verifier.verify("secret-token"), Some(staff1()));
    }

    #[test]
    fn test_load_missing_file_yields_empty_verifier() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let verifier = StaticTokenVerifier::load(temp_dir.path().join("staff.yaml")).unwrap();
        assert_eq!(verifier.verify("anything"), None);
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer secret-token".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("secret-token"));

        let mut bad = HeaderMap::new();
        bad.insert(AUTHORIZATION, "Basic dXNlcg==".parse().unwrap());
        assert_eq!(bearer_token(&bad), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
