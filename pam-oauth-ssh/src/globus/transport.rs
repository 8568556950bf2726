//! Blocking HTTP transport authenticated with the service's client credentials.

use std::time::Duration;
use thiserror::Error;

/// HTTP request timeout
const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

/// The calls the Globus Auth resource service needs from HTTP.
///
/// Implementations return the reply body whatever the status code; Globus
/// Auth reports failures inside the body.
pub trait Transport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, TransportError>;

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    client_id: String,
    client_secret: String,
}

impl HttpTransport {
    pub fn new(client_id: &str, client_secret: &str) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .user_agent(concat!("pam-oauth-ssh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    fn send(
        &self,
        url: &str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<String, TransportError> {
        let failed = |e: reqwest::Error| TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = request
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .send()
            .map_err(failed)?;

        let status = response.status();
        let body = response.text().map_err(failed)?;
        if !status.is_success() {
            tracing::debug!(%url, %status, "Globus Auth returned a non-success status");
        }
        Ok(body)
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<String, TransportError> {
        self.send(url, self.client.get(url).query(query))
    }

    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, TransportError> {
        self.send(url, self.client.post(url).form(form))
    }
}
