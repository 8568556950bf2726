//! Signing key discovery for SciToken issuers.
//!
//! Keys are located through the issuer's OpenID discovery document and
//! fetched fresh for each verification.

use jsonwebtoken::jwk::{Jwk, JwkSet};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// HTTP request timeout
const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to fetch OIDC discovery document: {0}")]
    DiscoveryFetchError(String),

    #[error("Failed to parse OIDC discovery document: {0}")]
    DiscoveryParseError(String),

    #[error("Failed to fetch JWKS: {0}")]
    JwksFetchError(String),

    #[error("Failed to parse JWKS: {0}")]
    JwksParseError(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("No keys in JWKS")]
    NoKeys,

    #[error("Invalid issuer URL: {0}")]
    InvalidIssuer(String),
}

/// OIDC Discovery document (partial)
#[derive(Debug, Deserialize)]
struct OidcDiscovery {
    jwks_uri: String,
    issuer: String,
}

pub struct JwksClient {
    client: reqwest::blocking::Client,
}

impl JwksClient {
    pub fn new() -> Result<Self, JwksError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| JwksError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Fetch the key set published by `issuer`.
    pub fn key_set(&self, issuer: &str) -> Result<JwkSet, JwksError> {
        let issuer = issuer.trim_end_matches('/');
        let discovery = self.fetch_discovery(issuer)?;

        if discovery.issuer.trim_end_matches('/') != issuer {
            return Err(JwksError::InvalidIssuer(format!(
                "Discovery issuer '{}' doesn't match token issuer '{}'",
                discovery.issuer, issuer
            )));
        }

        self.fetch_jwks(&discovery.jwks_uri)
    }

    fn fetch_discovery(&self, issuer: &str) -> Result<OidcDiscovery, JwksError> {
        let discovery_url = discovery_url(issuer);

        let response = self
            .client
            .get(&discovery_url)
            .send()
            .map_err(|e| JwksError::DiscoveryFetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::DiscoveryFetchError(format!(
                "HTTP {}: {}",
                response.status(),
                discovery_url
            )));
        }

        response
            .json::<OidcDiscovery>()
            .map_err(|e| JwksError::DiscoveryParseError(e.to_string()))
    }

    fn fetch_jwks(&self, jwks_uri: &str) -> Result<JwkSet, JwksError> {
        let response = self
            .client
            .get(jwks_uri)
            .send()
            .map_err(|e| JwksError::JwksFetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::JwksFetchError(format!(
                "HTTP {}: {}",
                response.status(),
                jwks_uri
            )));
        }

        response
            .json::<JwkSet>()
            .map_err(|e| JwksError::JwksParseError(e.to_string()))
    }
}

fn discovery_url(issuer: &str) -> String {
    format!("{}/.well-known/openid-configuration", issuer)
}

/// Pick the key named by `kid`, or the first key when the token names none.
pub fn select_key(keys: &JwkSet, kid: Option<&str>) -> Result<Jwk, JwksError> {
    match kid {
        Some(kid) => keys
            .find(kid)
            .cloned()
            .ok_or_else(|| JwksError::KeyNotFound(kid.to_string())),
        None => keys.keys.first().cloned().ok_or(JwksError::NoKeys),
    }
}
