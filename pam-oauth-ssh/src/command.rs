//! Commands carried in the PAM password prompt.
//!
//! A client may answer the prompt with a base64 encoded JSON command instead
//! of a bare access token:
//!
//! ```json
//! {"command": {"op": "get_account_map", "access_token": "..."}}
//! ```
//!
//! Replies are JSON, base64 encoded once, and sent back as informational
//! messages. Anything that does not decode to a command is treated as an
//! access token and used to log in directly.

use crate::auth::{AuthError, Authorizer, Status};
use crate::config::Config;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

pub const OP_GET_SECURITY_POLICY: &str = "get_security_policy";
pub const OP_GET_ACCOUNT_MAP: &str = "get_account_map";
pub const OP_LOGIN: &str = "login";

#[derive(Debug, Deserialize)]
struct Envelope {
    command: Request,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Request {
    pub op: String,
    /// A non-string token counts as absent.
    #[serde(default, deserialize_with = "string_or_absent")]
    pub access_token: Option<String>,
}

fn string_or_absent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        _ => None,
    })
}

impl Request {
    /// Decode prompt input; `None` when it is not a command.
    pub fn decode(input: &str) -> Option<Self> {
        let bytes = STANDARD.decode(input.trim()).ok()?;
        let envelope: Envelope = serde_json::from_slice(&bytes).ok()?;
        Some(envelope.command)
    }
}

/// How the attempt ends at the PAM boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Status(Status),
    /// A query was answered; the attempt itself does not log anyone in.
    Informational,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub disposition: Disposition,
    /// Encoded reply for the client, if any.
    pub reply: Option<String>,
}

impl Outcome {
    fn status(status: Status) -> Self {
        Self {
            disposition: Disposition::Status(status),
            reply: None,
        }
    }

    fn replying(disposition: Disposition, body: Value) -> Self {
        Self {
            disposition,
            reply: Some(STANDARD.encode(body.to_string())),
        }
    }

    fn error(status: Status, code: &str, description: &str) -> Self {
        Self::replying(Disposition::Status(status), error_reply(code, description))
    }

    fn failed(e: &AuthError) -> Self {
        let status = e.status();
        Self::error(status, status.code(), status.description())
    }
}

pub fn error_reply(code: &str, description: &str) -> Value {
    json!({ "error": { "code": code, "description": description } })
}

pub fn security_policy_reply(config: &Config) -> Value {
    let idps = &config.policy.permitted_idps;
    json!({
        "policy": {
            "permitted_idps": if idps.is_empty() { Value::Null } else { json!(idps) },
            "authentication_timeout": config.policy.authentication_timeout,
        }
    })
}

/// Handle one prompt answer for a login as `account`.
pub fn process(authorizer: &Authorizer<'_>, input: &str, account: &str) -> Outcome {
    let Some(request) = Request::decode(input) else {
        return login_fallback(authorizer, input, account);
    };
    tracing::debug!(op = %request.op, "Command received");

    let outcome = match (request.op.as_str(), request.access_token.as_deref()) {
        (OP_GET_SECURITY_POLICY, _) => Outcome::replying(
            Disposition::Informational,
            security_policy_reply(authorizer.config()),
        ),
        (OP_GET_ACCOUNT_MAP, Some(token)) => match authorizer.account_map(token) {
            Ok(map) => Outcome::replying(
                Disposition::Informational,
                json!({ "account_map": { "permitted_accounts": map.permitted_accounts() } }),
            ),
            Err(e) => Outcome::failed(&e),
        },
        (OP_LOGIN, Some(token)) => match authorizer.login(token, account) {
            Ok(_) => Outcome::status(Status::Accepted),
            Err(e) => Outcome::failed(&e),
        },
        _ => Outcome::error(Status::Unavailable, "UNKNOWN_COMMAND", "Unknown command."),
    };

    tracing::debug!(reply = outcome.reply.as_deref().unwrap_or("NONE"), "Command handled");
    outcome
}

/// Pasted access token: log in without replying.
fn login_fallback(authorizer: &Authorizer<'_>, token: &str, account: &str) -> Outcome {
    match authorizer.login(token.trim(), account) {
        Ok(_) => Outcome::status(Status::Accepted),
        Err(e) => Outcome::status(e.status()),
    }
}
