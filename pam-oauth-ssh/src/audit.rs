//! Audit logging for authorization decisions.
//!
//! Every login attempt and every issued account map produces one JSON record
//! on the AUTH syslog facility, separate from diagnostic logging.

use crate::auth::Authorized;
use crate::logging;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum AuditEvent {
    #[serde(rename = "LOGIN_ACCEPTED")]
    LoginAccepted {
        timestamp: String,
        user: String,
        uid: Option<u32>,
        identity: Option<String>,
        method: String,
        source_ip: Option<String>,
        host: String,
    },

    #[serde(rename = "LOGIN_REJECTED")]
    LoginRejected {
        timestamp: String,
        user: String,
        source_ip: Option<String>,
        host: String,
        code: String,
        reason: String,
    },

    /// The permitted accounts were disclosed to the client.
    #[serde(rename = "ACCOUNT_MAP_ISSUED")]
    AccountMapIssued {
        timestamp: String,
        host: String,
        source_ip: Option<String>,
        accounts: Vec<String>,
    },
}

impl AuditEvent {
    pub fn login_accepted(authorized: &Authorized, source_ip: Option<&str>) -> Self {
        Self::LoginAccepted {
            timestamp: iso_timestamp(),
            user: authorized.account.clone(),
            uid: authorized.uid,
            identity: authorized.identity.clone(),
            method: authorized.method.as_str().to_string(),
            source_ip: source_ip.map(String::from),
            host: get_hostname(),
        }
    }

    pub fn login_rejected(user: &str, source_ip: Option<&str>, code: &str, reason: &str) -> Self {
        Self::LoginRejected {
            timestamp: iso_timestamp(),
            user: user.to_string(),
            source_ip: source_ip.map(String::from),
            host: get_hostname(),
            code: code.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn account_map_issued(accounts: &[String], source_ip: Option<&str>) -> Self {
        Self::AccountMapIssued {
            timestamp: iso_timestamp(),
            host: get_hostname(),
            source_ip: source_ip.map(String::from),
            accounts: accounts.to_vec(),
        }
    }

    pub fn log(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            logging::syslog_info(&json);
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::LoginAccepted { .. } => "LOGIN_ACCEPTED",
            Self::LoginRejected { .. } => "LOGIN_REJECTED",
            Self::AccountMapIssued { .. } => "ACCOUNT_MAP_ISSUED",
        }
    }
}

/// Current time in RFC 3339.
fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn get_hostname() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}
