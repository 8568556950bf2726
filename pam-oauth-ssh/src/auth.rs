//! Login authorization: from an access token to a permitted local account.
//!
//! A Globus Auth login walks these steps, stopping at the first failure:
//! introspect the token, check it against the client registration, fetch the
//! linked identities, check the session policy, resolve local accounts and
//! finally check the requested account. SciTokens are verified separately.

use crate::account_map::{AccountMap, AccountMapper, MappingError};
use crate::audit::AuditEvent;
use crate::config::{AuthMethod, Config};
use crate::globus::{AuthService, ServiceError};
use crate::nss::AccountDatabase;
use crate::policy::{check_session, check_token, SessionRejection, TokenRejection};
use crate::scitokens::{is_likely_scitoken, ScitokenError, ScitokenVerifier};
use thiserror::Error;
use tracing::Level;

/// Outcome of an attempt as reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Accepted,
    InvalidToken,
    SessionViolation,
    UnknownAccount,
    UnexpectedError,
    Unavailable,
}

impl Status {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::SessionViolation => "SESSION_VIOLATION",
            Self::UnknownAccount => "UNKNOWN_ACCOUNT",
            Self::UnexpectedError => "UNEXPECTED_ERROR",
            Self::Unavailable => "UNAVAILABLE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Accepted => "Login accepted.",
            Self::InvalidToken => "Invalid token.",
            Self::SessionViolation => "The access token does not meet session requirements.",
            Self::UnknownAccount => "You cannot use that local account.",
            Self::UnexpectedError => "An unexpected error occurred.",
            Self::Unavailable => "This authentication method is not available.",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Token rejected: {0}")]
    Token(#[from] TokenRejection),

    #[error("Session rejected: {0}")]
    Session(#[from] SessionRejection),

    #[error("Introspection response carries no linked identities")]
    NoIdentities,

    #[error("Account mapping failed: {0}")]
    Mapping(#[from] MappingError),

    #[error("Local account '{0}' is not permitted for this token")]
    AccountNotPermitted(String),

    #[error("Token received for {} but this module is not configured for it", .0.as_str())]
    MethodUnavailable(AuthMethod),

    #[error(transparent)]
    Scitoken(#[from] ScitokenError),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            Self::Service(_) | Self::NoIdentities | Self::Mapping(_) => Status::UnexpectedError,
            Self::Token(_) => Status::InvalidToken,
            Self::Session(_) => Status::SessionViolation,
            Self::AccountNotPermitted(_) => Status::UnknownAccount,
            Self::MethodUnavailable(_) => Status::Unavailable,
            Self::Scitoken(ScitokenError::Keys(_)) => Status::UnexpectedError,
            Self::Scitoken(ScitokenError::LoginNotAuthorized(_)) => Status::UnknownAccount,
            Self::Scitoken(_) => Status::InvalidToken,
        }
    }
}

/// A successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorized {
    pub account: String,
    pub uid: Option<u32>,
    /// Federated identity the account was mapped from (Globus Auth logins).
    pub identity: Option<String>,
    pub method: AuthMethod,
}

/// Severity of the outcome line for a failed attempt.
fn failure_level(e: &AuthError) -> Level {
    match e {
        // Already logged at error where they were detected.
        AuthError::Service(ServiceError::Decode(_) | ServiceError::Rejected(_)) => Level::DEBUG,
        _ if e.status() == Status::UnexpectedError => Level::ERROR,
        _ => Level::INFO,
    }
}

fn current_time() -> i64 {
    chrono::Utc::now().timestamp()
}

pub struct Authorizer<'a> {
    config: &'a Config,
    accounts: &'a dyn AccountDatabase,
    service: Option<&'a dyn AuthService>,
    scitokens: Option<&'a dyn ScitokenVerifier>,
    source_ip: Option<String>,
    clock: fn() -> i64,
}

impl<'a> Authorizer<'a> {
    pub fn new(config: &'a Config, accounts: &'a dyn AccountDatabase) -> Self {
        Self {
            config,
            accounts,
            service: None,
            scitokens: None,
            source_ip: None,
            clock: current_time,
        }
    }

    pub fn with_globus(mut self, service: &'a dyn AuthService) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_scitokens(mut self, verifier: &'a dyn ScitokenVerifier) -> Self {
        self.scitokens = Some(verifier);
        self
    }

    pub fn with_source_ip(mut self, source_ip: Option<&str>) -> Self {
        self.source_ip = source_ip.map(String::from);
        self
    }

    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &Config {
        self.config
    }

    /// Authorize a login as `account`.
    ///
    /// Logs one outcome line and emits one audit event.
    pub fn login(&self, token: &str, account: &str) -> Result<Authorized, AuthError> {
        let result = if is_likely_scitoken(token) {
            self.login_scitoken(token, account)
        } else {
            self.login_globus(token, account)
        };

        match &result {
            Ok(authorized) => {
                match authorized.identity {
                    Some(ref identity) => {
                        tracing::info!("Identity {} authorized as local user {}", identity, account)
                    }
                    None => tracing::info!("SciToken authorized as local user {}", account),
                }
                AuditEvent::login_accepted(authorized, self.source_ip.as_deref()).log();
            }
            Err(e) => {
                self.log_failure(e);
                AuditEvent::login_rejected(
                    account,
                    self.source_ip.as_deref(),
                    e.status().code(),
                    &e.to_string(),
                )
                .log();
            }
        }
        result
    }

    /// Resolve the accounts `token` may log in to.
    pub fn account_map(&self, token: &str) -> Result<AccountMap, AuthError> {
        let result = self.resolve_accounts(token);
        match &result {
            Ok(map) => {
                AuditEvent::account_map_issued(&map.permitted_accounts(), self.source_ip.as_deref())
                    .log()
            }
            Err(e) => self.log_failure(e),
        }
        result
    }

    fn log_failure(&self, e: &AuthError) {
        match failure_level(e) {
            Level::ERROR => tracing::error!("{}", e),
            Level::INFO => tracing::info!("{}", e),
            _ => tracing::debug!("{}", e),
        }
    }

    fn login_globus(&self, token: &str, account: &str) -> Result<Authorized, AuthError> {
        let map = self.resolve_accounts(token)?;

        let identity = match map.identity_for(account) {
            Some(identity) => identity.to_string(),
            None => return Err(AuthError::AccountNotPermitted(account.to_string())),
        };

        Ok(Authorized {
            account: account.to_string(),
            uid: self.accounts.user_info(account).ok().map(|u| u.uid),
            identity: Some(identity),
            method: AuthMethod::GlobusAuth,
        })
    }

    fn login_scitoken(&self, token: &str, account: &str) -> Result<Authorized, AuthError> {
        if !self.config.auth_method_enabled(AuthMethod::Scitokens) {
            return Err(AuthError::MethodUnavailable(AuthMethod::Scitokens));
        }
        let verifier = self
            .scitokens
            .ok_or(AuthError::MethodUnavailable(AuthMethod::Scitokens))?;

        verifier.verify(token, account)?;

        let info = self
            .accounts
            .user_info(account)
            .map_err(|_| AuthError::AccountNotPermitted(account.to_string()))?;

        Ok(Authorized {
            account: account.to_string(),
            uid: Some(info.uid),
            identity: None,
            method: AuthMethod::Scitokens,
        })
    }

    fn resolve_accounts(&self, token: &str) -> Result<AccountMap, AuthError> {
        if !self.config.auth_method_enabled(AuthMethod::GlobusAuth) {
            return Err(AuthError::MethodUnavailable(AuthMethod::GlobusAuth));
        }
        let service = self
            .service
            .ok_or(AuthError::MethodUnavailable(AuthMethod::GlobusAuth))?;

        let mapper = AccountMapper::from_config(self.config)?;

        let introspect = service.introspect(token)?;
        let client = service.client()?;
        let now = (self.clock)();

        check_token(&introspect, &client, now)?;

        let ids = match introspect.identities_set {
            Some(ref ids) if !ids.is_empty() => ids,
            _ => return Err(AuthError::NoIdentities),
        };
        let identities = service.identities(ids)?;

        check_session(&self.config.policy, &introspect, &identities, now)?;

        Ok(mapper.resolve(&identities, self.accounts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::globus::{Client, IdentitySet, Introspect};
    use crate::nss::user::tests::FixedAccounts;
    use crate::policy::SessionPolicy;
    use serde_json::json;
    use std::cell::Cell;

    const NOW: i64 = 1_700_000_000;

    fn fixed_clock() -> i64 {
        NOW
    }

    /// Canned Globus Auth resources.
    struct FakeService {
        introspect: serde_json::Value,
        identities: serde_json::Value,
        calls: Cell<usize>,
        identity_calls: Cell<usize>,
    }

    impl FakeService {
        fn new() -> Self {
            Self {
                introspect: json!({
                    "active": true,
                    "scope": "https://auth.globus.org/scopes/ssh.example.com/ssh",
                    "client_id": "cid",
                    "sub": "u1",
                    "username": "alice@example.com",
                    "iss": "https://auth.globus.org",
                    "email": "alice@example.com",
                    "exp": NOW + 3600,
                    "iat": NOW - 60,
                    "nbf": NOW - 60,
                    "aud": ["cid"],
                    "identities_set": ["u1"],
                    "session_info": {
                        "session_id": "s1",
                        "authentications": {
                            "u1": { "idp": "p1", "auth_time": NOW - 120, "amr": ["mfa"] }
                        }
                    }
                }),
                identities: json!({
                    "included": { "identity_providers": [
                        { "id": "p1", "name": "Example", "domains": ["example.com"], "alternative_names": [] }
                    ]},
                    "identities": [
                        { "id": "u1", "username": "alice@example.com", "status": "used", "identity_provider": "p1" }
                    ]
                }),
                calls: Cell::new(0),
                identity_calls: Cell::new(0),
            }
        }
    }

    impl AuthService for FakeService {
        fn introspect(&self, _token: &str) -> Result<Introspect, ServiceError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Introspect::from_json(&self.introspect)?)
        }

        fn client(&self) -> Result<Client, ServiceError> {
            self.calls.set(self.calls.get() + 1);
            Ok(Client {
                fqdns: vec!["ssh.example.com".into()],
                ..Default::default()
            })
        }

        fn identities(&self, _ids: &[String]) -> Result<IdentitySet, ServiceError> {
            self.calls.set(self.calls.get() + 1);
            self.identity_calls.set(self.identity_calls.get() + 1);
            Ok(IdentitySet::from_json(&self.identities)?)
        }
    }

    struct AllowAll;

    impl ScitokenVerifier for AllowAll {
        fn verify(&self, _token: &str, _account: &str) -> Result<(), ScitokenError> {
            Ok(())
        }
    }

    fn config() -> Config {
        "client_id cid\nclient_secret s\nidp_suffix example.com\n"
            .parse()
            .unwrap()
    }

    fn status(result: Result<Authorized, AuthError>) -> Status {
        match result {
            Ok(_) => Status::Accepted,
            Err(e) => e.status(),
        }
    }

    #[test]
    fn test_accepts_mapped_account() {
        let config = config();
        let service = FakeService::new();
        let db = FixedAccounts::new(&["alice", "bob"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        let authorized = authorizer.login("opaque-token", "alice").unwrap();
        assert_eq!(authorized.identity.as_deref(), Some("alice@example.com"));
        assert_eq!(authorized.uid, Some(1000));
        assert_eq!(authorized.method, AuthMethod::GlobusAuth);
    }

    #[test]
    fn test_unmapped_account_is_unknown() {
        let config = config();
        let service = FakeService::new();
        let db = FixedAccounts::new(&["alice", "bob"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        assert_eq!(status(authorizer.login("opaque-token", "bob")), Status::UnknownAccount);
        // Same status for an account the host does not have.
        assert_eq!(status(authorizer.login("opaque-token", "carol")), Status::UnknownAccount);
    }

    #[test]
    fn test_mapped_account_missing_on_host_is_unknown() {
        let config = config();
        let service = FakeService::new();
        let db = FixedAccounts::new(&["bob"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        assert_eq!(status(authorizer.login("opaque-token", "alice")), Status::UnknownAccount);
    }

    #[test]
    fn test_expired_token_is_invalid() {
        let config = config();
        let mut service = FakeService::new();
        service.introspect["exp"] = json!(NOW - 1);
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        assert_eq!(status(authorizer.login("opaque-token", "alice")), Status::InvalidToken);
        assert_eq!(service.identity_calls.get(), 0);
    }

    #[test]
    fn test_inactive_token_is_invalid() {
        let config = config();
        let mut service = FakeService::new();
        service.introspect = json!({ "active": false });
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        assert_eq!(status(authorizer.login("opaque-token", "alice")), Status::InvalidToken);
    }

    #[test]
    fn test_schema_violation_is_unexpected() {
        let config = config();
        let mut service = FakeService::new();
        service.introspect.as_object_mut().unwrap().remove("email");
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        let err = authorizer.login("opaque-token", "alice").unwrap_err();
        assert_eq!(err.status(), Status::UnexpectedError);
        assert_eq!(
            err.to_string(),
            "Introspect record is missing required key 'email'"
        );
    }

    #[test]
    fn test_missing_identities_set_is_unexpected() {
        let config = config();
        let mut service = FakeService::new();
        service.introspect["identities_set"] = json!(null);
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        assert!(matches!(
            authorizer.account_map("opaque-token"),
            Err(AuthError::NoIdentities)
        ));
    }

    #[test]
    fn test_session_policy_violation() {
        let mut config = config();
        config.policy = SessionPolicy {
            authentication_timeout: Some(1),
            ..Default::default()
        };
        let service = FakeService::new();
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        assert_eq!(
            status(authorizer.login("opaque-token", "alice")),
            Status::SessionViolation
        );

        config.policy.authentication_timeout = Some(5);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);
        assert_eq!(status(authorizer.login("opaque-token", "alice")), Status::Accepted);
    }

    #[test]
    fn test_bad_mapping_option_fails_before_any_request() {
        let config = Config {
            idp_suffix: Some("a@b".into()),
            ..config()
        };
        let service = FakeService::new();
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        let err = authorizer.login("opaque-token", "alice").unwrap_err();
        assert!(matches!(err, AuthError::Mapping(_)));
        assert_eq!(service.calls.get(), 0);
    }

    #[test]
    fn test_account_map() {
        let config = config();
        let service = FakeService::new();
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db)
            .with_globus(&service)
            .with_clock(fixed_clock);

        let map = authorizer.account_map("opaque-token").unwrap();
        assert_eq!(map.permitted_accounts(), vec!["alice"]);
    }

    #[test]
    fn test_globus_not_configured() {
        let config: Config = "auth_method scitokens\nissuers https://i.example.org"
            .parse()
            .unwrap();
        let db = FixedAccounts::new(&["alice"]);
        let authorizer = Authorizer::new(&config, &db);

        assert_eq!(status(authorizer.login("opaque-token", "alice")), Status::Unavailable);
    }

    #[test]
    fn test_scitoken_routing() {
        let db = FixedAccounts::new(&["alice"]);

        let globus_only = config();
        let authorizer = Authorizer::new(&globus_only, &db).with_scitokens(&AllowAll);
        assert_eq!(status(authorizer.login("a.b.c", "alice")), Status::Unavailable);

        let both: Config = "client_id cid\nclient_secret s\nidp_suffix example.com\n\
                            auth_method globus_auth scitokens\nissuers https://i.example.org"
            .parse()
            .unwrap();
        let authorizer = Authorizer::new(&both, &db).with_scitokens(&AllowAll);
        let authorized = authorizer.login("a.b.c", "alice").unwrap();
        assert_eq!(authorized.method, AuthMethod::Scitokens);
        assert_eq!(authorized.identity, None);

        assert_eq!(status(authorizer.login("a.b.c", "nobody")), Status::UnknownAccount);
    }

    #[test]
    fn test_failures_logged_once_at_error() {
        let decode = crate::decoder::DecodeError::NotAnObject {
            resource: "Introspect",
        };
        assert_eq!(failure_level(&AuthError::Service(decode.into())), Level::DEBUG);
        assert_eq!(
            failure_level(&AuthError::Service(ServiceError::Rejected("{}".into()))),
            Level::DEBUG
        );

        let transport = crate::globus::TransportError::Client("no tls".into());
        assert_eq!(failure_level(&AuthError::Service(transport.into())), Level::ERROR);
        assert_eq!(failure_level(&AuthError::NoIdentities), Level::ERROR);
        assert_eq!(
            failure_level(&AuthError::Token(TokenRejection::Inactive)),
            Level::INFO
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::UnknownAccount.code(), "UNKNOWN_ACCOUNT");
        assert_eq!(Status::InvalidToken.description(), "Invalid token.");
        assert_eq!(
            Status::UnexpectedError.description(),
            "An unexpected error occurred."
        );
    }
}
