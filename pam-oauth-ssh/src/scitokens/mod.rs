//! SciToken logins.
//!
//! SciTokens are JWTs. Signature checks are done by `jsonwebtoken` against
//! the issuer's published keys. This module decides whether a verified token
//! authorizes a login to the requested account.

pub mod jwks;
pub mod verify;

pub use verify::JwksVerifier;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authorization a SciToken must carry to log in.
pub const LOGIN_AUTHZ: &str = "login";

#[derive(Debug, Error)]
pub enum ScitokenError {
    #[error("Malformed SciToken: {0}")]
    Malformed(String),

    #[error("Issuer '{0}' is not trusted for SciToken logins")]
    UntrustedIssuer(String),

    #[error("Failed to obtain signing keys: {0}")]
    Keys(#[from] jwks::JwksError),

    #[error("SciToken verification failed: {0}")]
    Invalid(String),

    #[error("SciToken does not authorize login as '{0}'")]
    LoginNotAuthorized(String),
}

/// Verifies that a SciToken authorizes a login as `account`.
pub trait ScitokenVerifier {
    fn verify(&self, token: &str, account: &str) -> Result<(), ScitokenError>;
}

/// Tokens that look like JWTs are SciTokens; Globus Auth tokens are opaque
/// and never contain a `.`.
pub fn is_likely_scitoken(token: &str) -> bool {
    token.contains('.')
}

/// Handle audience as string or array
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

impl StringOrVec {
    pub fn contains(&self, value: &str) -> bool {
        match self {
            StringOrVec::String(s) => s == value,
            StringOrVec::Vec(v) => v.iter().any(|s| s == value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScitokenClaims {
    pub iss: String,
    #[serde(default)]
    pub sub: Option<String>,
    pub aud: StringOrVec,
    pub exp: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl ScitokenClaims {
    /// Parse claims without verifying the signature.
    ///
    /// Only used to choose which issuer's keys to verify with.
    pub fn unverified(token: &str) -> Result<Self, ScitokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(ScitokenError::Malformed("expected three segments".into()));
        }

        let payload = URL_SAFE_NO_PAD
            .decode(parts[1].trim_end_matches('='))
            .map_err(|e| ScitokenError::Malformed(e.to_string()))?;
        serde_json::from_slice(&payload).map_err(|e| ScitokenError::Malformed(e.to_string()))
    }

    /// Does the scope claim authorize logging in as `account`?
    ///
    /// `login` and `login:/` grant any account; `login:/<name>` grants `name`.
    pub fn authorizes_login(&self, account: &str) -> bool {
        let Some(ref scope) = self.scope else {
            return false;
        };

        scope.split_whitespace().any(|authz| {
            match authz.split_once(':') {
                None => authz == LOGIN_AUTHZ,
                Some((name, resource)) if name == LOGIN_AUTHZ => {
                    let resource = resource.trim_start_matches('/');
                    resource.is_empty() || resource == account
                }
                Some(_) => false,
            }
        })
    }
}
