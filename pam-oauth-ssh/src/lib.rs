//! PAM module authorizing SSH logins with Globus Auth access tokens and
//! SciTokens.
//!
//! The workflow is:
//! 1. The user answers the password prompt with an access token, or with a
//!    base64 encoded command (see [`command`])
//! 2. Globus Auth tokens are introspected and checked against this host's
//!    client registration and the configured session policy
//! 3. The token's linked identities are mapped to local accounts
//! 4. The login succeeds when the requested account is one of them
//!
//! SciTokens (JWTs) are verified against the configured issuers instead.
//!
//! ## Module arguments
//! - `debug`: log debug messages
//! - `environment=<name>`: talk to a non-production Globus Auth deployment

#![deny(unsafe_code)]

pub mod account_map;
pub mod audit;
pub mod auth;
pub mod command;
pub mod config;
pub mod decoder;
pub mod globus;
pub mod logging;
pub mod nss;
pub mod policy;
pub mod scitokens;
pub mod scope;

use auth::{Authorizer, Status};
use command::Disposition;
use config::{AuthMethod, Config};
use globus::{GlobusAuth, HttpTransport};
use nss::SystemAccounts;
use pamsm::{Pam, PamError, PamFlags, PamLibExt, PamMsgStyle, PamServiceModule};
use scitokens::JwksVerifier;

/// Password prompt shown to the client.
pub const TOKEN_PROMPT: &str = "Enter your OAuth token: ";

struct PamOauthSsh;
pamsm::pam_module!(PamOauthSsh);

impl PamServiceModule for PamOauthSsh {
    fn authenticate(pamh: Pam, _flags: PamFlags, args: Vec<String>) -> PamError {
        logging::init(args.iter().any(|a| a == "debug"));

        let mut config = match Config::load() {
            Ok(config) => config,
            Err(_) => return PamError::AUTHINFO_UNAVAIL,
        };
        config.apply_args(&args);

        // The user being logged in, already set by sshd
        let pam_user = match pamh.get_cached_user() {
            Ok(Some(user)) => user.to_string_lossy().to_string(),
            Ok(None) | Err(_) => match pamh.get_user(None) {
                Ok(Some(user)) => user.to_string_lossy().to_string(),
                _ => return PamError::USER_UNKNOWN,
            },
        };

        let source_ip: Option<String> = pamh
            .get_rhost()
            .ok()
            .flatten()
            .map(|s| s.to_string_lossy().to_string());

        let input = match pamh.conv(Some(TOKEN_PROMPT), PamMsgStyle::PROMPT_ECHO_OFF) {
            Ok(Some(input)) => input.to_string_lossy().to_string(),
            Ok(None) => return PamError::AUTH_ERR,
            Err(e) => {
                tracing::error!("Failed to read from the PAM conversation: {:?}", e);
                return PamError::AUTHINFO_UNAVAIL;
            }
        };

        let globus = match globus_service(&config) {
            Ok(globus) => globus,
            Err(e) => {
                tracing::error!("{}", e);
                return PamError::AUTHINFO_UNAVAIL;
            }
        };
        let verifier = match scitoken_verifier(&config) {
            Ok(verifier) => verifier,
            Err(e) => {
                tracing::error!("{}", e);
                return PamError::AUTHINFO_UNAVAIL;
            }
        };

        let accounts = SystemAccounts;
        let mut authorizer = Authorizer::new(&config, &accounts).with_source_ip(source_ip.as_deref());
        if let Some(ref globus) = globus {
            authorizer = authorizer.with_globus(globus);
        }
        if let Some(ref verifier) = verifier {
            authorizer = authorizer.with_scitokens(verifier);
        }

        let outcome = command::process(&authorizer, &input, &pam_user);

        if let Some(ref reply) = outcome.reply {
            if let Err(e) = pamh.conv(Some(reply.as_str()), PamMsgStyle::TEXT_INFO) {
                tracing::error!("Failed to send reply over the PAM conversation: {:?}", e);
            }
        }

        pam_status(outcome.disposition)
    }

    fn setcred(_pamh: Pam, _flags: PamFlags, _args: Vec<String>) -> PamError {
        PamError::SUCCESS
    }

    fn acct_mgmt(_pamh: Pam, _flags: PamFlags, _args: Vec<String>) -> PamError {
        PamError::SUCCESS
    }

    fn open_session(_pamh: Pam, _flags: PamFlags, _args: Vec<String>) -> PamError {
        PamError::SUCCESS
    }

    fn close_session(_pamh: Pam, _flags: PamFlags, _args: Vec<String>) -> PamError {
        PamError::SUCCESS
    }

    fn chauthtok(_pamh: Pam, _flags: PamFlags, _args: Vec<String>) -> PamError {
        PamError::SERVICE_ERR
    }
}

type GlobusService = GlobusAuth<HttpTransport>;

fn globus_service(config: &Config) -> Result<Option<GlobusService>, globus::TransportError> {
    if !config.auth_method_enabled(AuthMethod::GlobusAuth) {
        return Ok(None);
    }
    // Presence was checked when the configuration was loaded.
    let client_id = config.client_id.as_deref().unwrap_or_default();
    let secret = config.client_secret.as_deref().unwrap_or_default();

    let transport = HttpTransport::new(client_id, secret)?;
    Ok(Some(GlobusAuth::new(config.auth_host(), client_id, transport)))
}

fn scitoken_verifier(config: &Config) -> Result<Option<JwksVerifier>, scitokens::ScitokenError> {
    if !config.auth_method_enabled(AuthMethod::Scitokens) {
        return Ok(None);
    }
    JwksVerifier::for_host(&config.issuers).map(Some)
}

/// PAM return code for how an attempt ended.
fn pam_status(disposition: Disposition) -> PamError {
    match disposition {
        Disposition::Informational => PamError::MAXTRIES,
        Disposition::Status(Status::Accepted) => PamError::SUCCESS,
        Disposition::Status(
            Status::InvalidToken | Status::SessionViolation | Status::UnknownAccount,
        ) => PamError::AUTH_ERR,
        Disposition::Status(Status::UnexpectedError | Status::Unavailable) => {
            PamError::AUTHINFO_UNAVAIL
        }
    }
}
