//! Token validity: liveness, time window and the host's ssh scope.

use crate::globus::{Client, Introspect};
use crate::scope::{has_fqdn_scope, Scopes};
use thiserror::Error;

/// Scope suffix a token must carry to log in over ssh.
pub const SSH_SCOPE_SUFFIX: &str = "ssh";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("Token is not active")]
    Inactive,

    #[error("Token expired at {expiry}")]
    Expired { expiry: i64 },

    #[error("Token issued in the future (iat {issued_at}, now {now}); is the local clock correct?")]
    IssuedInFuture { issued_at: i64, now: i64 },

    #[error("Token is not valid before {not_before}")]
    NotYetValid { not_before: i64 },

    #[error("Token does not grant the ssh scope for any fqdn of this client")]
    MissingScope,
}

/// Check that `introspect` describes a live token scoped to this host.
pub fn check_token(introspect: &Introspect, client: &Client, now: i64) -> Result<(), TokenRejection> {
    let result = evaluate(introspect, client, now);
    if let Err(ref rejection) = result {
        match rejection {
            TokenRejection::IssuedInFuture { .. } => {
                tracing::info!(sub = %introspect.sub, "Clock skew detected: {}", rejection)
            }
            _ => tracing::info!(sub = %introspect.sub, "Token rejected: {}", rejection),
        }
    }
    result
}

fn evaluate(introspect: &Introspect, client: &Client, now: i64) -> Result<(), TokenRejection> {
    if !introspect.active {
        return Err(TokenRejection::Inactive);
    }

    if now >= introspect.expiry {
        return Err(TokenRejection::Expired {
            expiry: introspect.expiry,
        });
    }

    if introspect.issued_at > now {
        return Err(TokenRejection::IssuedInFuture {
            issued_at: introspect.issued_at,
            now,
        });
    }

    if introspect.not_before > now {
        return Err(TokenRejection::NotYetValid {
            not_before: introspect.not_before,
        });
    }

    if !has_fqdn_scope(
        &client.fqdns,
        Scopes::Claim(&introspect.scope),
        SSH_SCOPE_SUFFIX,
    ) {
        return Err(TokenRejection::MissingScope);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    fn token() -> Introspect {
        Introspect {
            active: true,
            scope: "openid https://auth.globus.org/scopes/ssh.example.com/ssh".into(),
            expiry: NOW + 3600,
            issued_at: NOW - 60,
            not_before: NOW - 60,
            ..Default::default()
        }
    }

    fn client() -> Client {
        Client {
            fqdns: vec!["ssh.example.com".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_token() {
        assert_eq!(check_token(&token(), &client(), NOW), Ok(()));
    }

    #[test]
    fn test_inactive_token() {
        assert_eq!(
            check_token(&Introspect::default(), &client(), NOW),
            Err(TokenRejection::Inactive)
        );
    }

    #[test]
    fn test_expiry_is_exclusive() {
        let mut t = token();
        t.expiry = NOW;
        assert_eq!(
            check_token(&t, &client(), NOW),
            Err(TokenRejection::Expired { expiry: NOW })
        );
        t.expiry = NOW + 1;
        assert_eq!(check_token(&t, &client(), NOW), Ok(()));
    }

    #[test]
    fn test_issued_in_future() {
        let mut t = token();
        t.issued_at = NOW + 5;
        assert!(matches!(
            check_token(&t, &client(), NOW),
            Err(TokenRejection::IssuedInFuture { .. })
        ));
        t.issued_at = NOW;
        assert_eq!(check_token(&t, &client(), NOW), Ok(()));
    }

    #[test]
    fn test_not_yet_valid() {
        let mut t = token();
        t.not_before = NOW + 1;
        assert_eq!(
            check_token(&t, &client(), NOW),
            Err(TokenRejection::NotYetValid { not_before: NOW + 1 })
        );
    }

    #[test]
    fn test_scope_for_other_host() {
        let mut c = client();
        c.fqdns = vec!["other.example.com".into()];
        assert_eq!(
            check_token(&token(), &c, NOW),
            Err(TokenRejection::MissingScope)
        );
    }

    #[test]
    fn test_client_without_fqdns() {
        assert_eq!(
            check_token(&token(), &Client::default(), NOW),
            Err(TokenRejection::MissingScope)
        );
    }
}
