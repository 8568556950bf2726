//! Session validity against the administrator's security policy.
//!
//! A session passes when a single authentication record meets every
//! configured constraint at once. Constraints met by different records do
//! not combine.

use crate::globus::{Authentication, IdentitySet, Introspect};
use thiserror::Error;

/// Session constraints from the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Identity provider ids or domains a qualifying authentication must use.
    pub permitted_idps: Vec<String>,
    /// Maximum age of a qualifying authentication, in minutes.
    pub authentication_timeout: Option<u64>,
    pub mfa: bool,
}

impl SessionPolicy {
    pub fn is_configured(&self) -> bool {
        !self.permitted_idps.is_empty() || self.authentication_timeout.is_some() || self.mfa
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionRejection {
    #[error("Session policy is configured but the token carries no authentication records")]
    MissingSessionInfo,

    #[error("No authentication in the session satisfies the security policy")]
    NoQualifyingAuthentication,
}

pub fn check_session(
    policy: &SessionPolicy,
    introspect: &Introspect,
    identities: &IdentitySet,
    now: i64,
) -> Result<(), SessionRejection> {
    if !policy.is_configured() {
        return Ok(());
    }

    let authentications = match introspect
        .session_info
        .as_ref()
        .and_then(|s| s.authentications.as_ref())
    {
        Some(a) => a,
        None => {
            let rejection = SessionRejection::MissingSessionInfo;
            tracing::info!("Session rejected: {}", rejection);
            return Err(rejection);
        }
    };

    if authentications
        .iter()
        .any(|a| satisfies(policy, a, identities, now))
    {
        return Ok(());
    }

    let rejection = SessionRejection::NoQualifyingAuthentication;
    tracing::info!(
        authentications = authentications.len(),
        "Session rejected: {}",
        rejection
    );
    Err(rejection)
}

fn satisfies(
    policy: &SessionPolicy,
    authentication: &Authentication,
    identities: &IdentitySet,
    now: i64,
) -> bool {
    if let Some(minutes) = policy.authentication_timeout {
        let limit = i64::try_from(minutes)
            .unwrap_or(i64::MAX)
            .saturating_mul(60);
        if now.saturating_sub(authentication.auth_time) > limit {
            tracing::debug!(identity = %authentication.identity_id, "Authentication is too old");
            return false;
        }
    }

    if policy.mfa && !authentication.amr.mfa {
        tracing::debug!(identity = %authentication.identity_id, "Authentication did not use MFA");
        return false;
    }

    if !policy.permitted_idps.is_empty() && !idp_permitted(policy, authentication, identities) {
        tracing::debug!(
            identity = %authentication.identity_id,
            idp = %authentication.idp,
            "Authentication is not from a permitted identity provider"
        );
        return false;
    }

    true
}

fn idp_permitted(
    policy: &SessionPolicy,
    authentication: &Authentication,
    identities: &IdentitySet,
) -> bool {
    let Some(provider) = identities.provider(&authentication.idp) else {
        return false;
    };

    policy
        .permitted_idps
        .iter()
        .any(|idp| *idp == provider.id || provider.domains.iter().any(|d| d == idp))
}
