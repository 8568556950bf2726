//! Globus Auth resources and the service that fetches them.

pub mod client;
pub mod identities;
pub mod introspect;
pub mod transport;

pub use client::Client;
pub use identities::{Identity, IdentityProvider, IdentitySet, IdentityStatus};
pub use introspect::{Amr, Authentication, Introspect, SessionInfo};
pub use transport::{HttpTransport, Transport, TransportError};

use crate::decoder::{self, DecodeError};
use serde_json::Value;
use thiserror::Error;

/// Production Globus Auth host.
pub const DEFAULT_AUTH_HOST: &str = "auth.globus.org";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("An error occurred while talking with Globus Auth: {0}")]
    Rejected(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Select the Globus Auth host for a deployment environment name.
pub fn auth_host(environment: Option<&str>) -> &'static str {
    match environment.map(str::to_ascii_lowercase).as_deref() {
        Some("preview") => "auth.preview.globus.org",
        Some("staging") => "auth.staging.globuscs.info",
        Some("test") => "auth.test.globuscs.info",
        Some("integration") => "auth.integration.globuscs.info",
        Some("sandbox") => "auth.sandbox.globuscs.info",
        _ => DEFAULT_AUTH_HOST,
    }
}

/// Resources the login flow consumes from the identity provider.
pub trait AuthService {
    fn introspect(&self, token: &str) -> Result<Introspect, ServiceError>;

    /// The registration of the client this host authenticates as.
    fn client(&self) -> Result<Client, ServiceError>;

    fn identities(&self, ids: &[String]) -> Result<IdentitySet, ServiceError>;
}

pub struct GlobusAuth<T: Transport> {
    host: String,
    client_id: String,
    transport: T,
}

impl<T: Transport> GlobusAuth<T> {
    pub fn new(host: &str, client_id: &str, transport: T) -> Self {
        Self {
            host: host.to_string(),
            client_id: client_id.to_string(),
            transport,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn url(&self, path: &str) -> String {
        format!("https://{}{}", self.host, path)
    }

    /// Parse a reply body, turning an `errors` payload into a rejection.
    fn reply(&self, resource: &'static str, body: &str) -> Result<Value, ServiceError> {
        let value = decoder::parse(resource, body)?;
        if value.get("errors").is_some() {
            let err = ServiceError::Rejected(body.to_string());
            tracing::error!("{}", err);
            return Err(err);
        }
        Ok(value)
    }
}

impl<T: Transport> AuthService for GlobusAuth<T> {
    fn introspect(&self, token: &str) -> Result<Introspect, ServiceError> {
        let url = self.url("/v2/oauth2/token/introspect");
        let body = self.transport.post_form(
            &url,
            &[("token", token), ("include", "identities_set,session_info")],
        )?;
        let value = self.reply("Introspect", &body)?;
        Ok(Introspect::from_json(&value)?)
    }

    fn client(&self) -> Result<Client, ServiceError> {
        let url = self.url(&format!("/v2/api/clients/{}", self.client_id));
        let body = self.transport.get(&url, &[])?;
        let value = self.reply("Client", &body)?;
        Ok(Client::from_json(&value)?)
    }

    fn identities(&self, ids: &[String]) -> Result<IdentitySet, ServiceError> {
        let url = self.url("/v2/api/identities");
        let ids = ids.join(",");
        let body = self
            .transport
            .get(&url, &[("ids", ids.as_str()), ("include", "identity_provider")])?;
        let value = self.reply("Identities", &body)?;
        Ok(IdentitySet::from_json(&value)?)
    }
}
