//! Module configuration: the administrator's config file plus PAM arguments.

pub mod parser;

use crate::globus;
use crate::policy::SessionPolicy;
use parser::{parse_pairs, Directive};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/oauth_ssh/globus-ssh.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not open {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Multiple occurrences of '{0}'")]
    MultipleOccurrences(String),

    #[error("Missing value for '{0}'")]
    MissingValue(String),

    #[error("Too many values for '{0}'")]
    TooManyValues(String),

    #[error("Illegal value '{value}' for {key} configuration option")]
    InvalidValue { key: String, value: String },

    #[error("Unknown directive '{0}'")]
    UnknownDirective(String),

    #[error("Directive '{0}' is missing")]
    MissingDirective(&'static str),

    #[error("At least one of 'idp_suffix' or 'map_file' must be defined")]
    MissingMapping,

    #[error("At least one issuer must be defined in 'issuers' when scitokens is enabled")]
    MissingIssuers,
}

impl ConfigError {
    /// Directive the error is about, when it names one.
    pub fn directive(&self) -> Option<&str> {
        match self {
            Self::MultipleOccurrences(key)
            | Self::MissingValue(key)
            | Self::TooManyValues(key)
            | Self::UnknownDirective(key)
            | Self::InvalidValue { key, .. } => Some(key.as_str()),
            Self::MissingDirective(key) => Some(*key),
            Self::Read { .. } | Self::MissingMapping | Self::MissingIssuers => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    GlobusAuth,
    Scitokens,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GlobusAuth => "globus_auth",
            Self::Scitokens => "scitokens",
        }
    }
}

impl FromStr for AuthMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "globus_auth" => Ok(Self::GlobusAuth),
            "scitokens" => Ok(Self::Scitokens),
            other => Err(ConfigError::InvalidValue {
                key: "auth_method".into(),
                value: other.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub idp_suffix: Option<String>,
    pub map_files: Vec<PathBuf>,
    pub policy: SessionPolicy,
    pub auth_methods: Vec<AuthMethod>,
    pub issuers: Vec<String>,
    /// Deployment environment selecting the Globus Auth host.
    pub environment: Option<String>,
    pub debug: bool,
}

impl Config {
    /// Load from [`DEFAULT_CONFIG_PATH`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let result = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|text| text.parse());

        if let Err(ref e) = result {
            tracing::error!(directive = ?e.directive(), "{} in {}", e, path.display());
        }
        result
    }

    /// Apply PAM module arguments (`debug`, `environment=<name>`).
    pub fn apply_args<S: AsRef<str>>(&mut self, args: &[S]) {
        for arg in args {
            let arg = arg.as_ref();
            if arg == "debug" {
                self.debug = true;
            } else if let Some(env) = arg.strip_prefix("environment=") {
                if self.environment.is_none() {
                    self.environment = Some(env.to_string());
                }
            }
        }
    }

    pub fn auth_method_enabled(&self, method: AuthMethod) -> bool {
        self.auth_methods.contains(&method)
    }

    pub fn auth_host(&self) -> &'static str {
        globus::auth_host(self.environment.as_deref())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth_method_enabled(AuthMethod::GlobusAuth) {
            if self.client_id.is_none() {
                return Err(ConfigError::MissingDirective("client_id"));
            }
            if self.client_secret.is_none() {
                return Err(ConfigError::MissingDirective("client_secret"));
            }
            if self.idp_suffix.is_none() && self.map_files.is_empty() {
                return Err(ConfigError::MissingMapping);
            }
            if let Some(ref suffix) = self.idp_suffix {
                if suffix.contains('@') {
                    return Err(ConfigError::InvalidValue {
                        key: "idp_suffix".to_string(),
                        value: suffix.clone(),
                    });
                }
            }
        }

        if self.auth_method_enabled(AuthMethod::Scitokens) && self.issuers.is_empty() {
            return Err(ConfigError::MissingIssuers);
        }
        Ok(())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut config = Config::default();
        let mut timeout_set = false;
        let mut mfa_set = false;

        for directive in parse_pairs(text) {
            match directive.key.as_str() {
                "client_id" => set_once(&mut config.client_id, &directive)?,
                "client_secret" => set_once(&mut config.client_secret, &directive)?,
                "idp_suffix" => set_once(&mut config.idp_suffix, &directive)?,
                "authentication_timeout" => {
                    let value = single_value(&directive, &mut timeout_set)?;
                    let minutes: u64 = value.parse().map_err(|_| invalid(&directive, value))?;
                    config.policy.authentication_timeout = (minutes > 0).then_some(minutes);
                }
                "mfa" => {
                    let value = single_value(&directive, &mut mfa_set)?;
                    config.policy.mfa = match value.to_ascii_lowercase().as_str() {
                        "true" => true,
                        "false" => false,
                        _ => return Err(invalid(&directive, value)),
                    };
                }
                "map_file" => config
                    .map_files
                    .extend(directive.values.iter().map(PathBuf::from)),
                "permitted_idps" => config.policy.permitted_idps.extend(directive.values.iter().cloned()),
                "issuers" => config.issuers.extend(directive.values.iter().cloned()),
                "auth_method" => {
                    for value in &directive.values {
                        let method: AuthMethod = value.parse()?;
                        if !config.auth_methods.contains(&method) {
                            config.auth_methods.push(method);
                        }
                    }
                }
                other => return Err(ConfigError::UnknownDirective(other.to_string())),
            }
        }

        if config.auth_methods.is_empty() {
            config.auth_methods.push(AuthMethod::GlobusAuth);
        }

        config.validate()?;
        Ok(config)
    }
}

fn single_value<'d>(directive: &'d Directive, seen: &mut bool) -> Result<&'d str, ConfigError> {
    if *seen {
        return Err(ConfigError::MultipleOccurrences(directive.key.clone()));
    }
    *seen = true;

    match directive.values.as_slice() {
        [] => Err(ConfigError::MissingValue(directive.key.clone())),
        [value] => Ok(value),
        _ => Err(ConfigError::TooManyValues(directive.key.clone())),
    }
}

fn set_once(slot: &mut Option<String>, directive: &Directive) -> Result<(), ConfigError> {
    let mut seen = slot.is_some();
    let value = single_value(directive, &mut seen)?;
    *slot = Some(value.to_string());
    Ok(())
}

fn invalid(directive: &Directive, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: directive.key.clone(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = "client_id abc\nclient_secret s3cret\nidp_suffix example.com\n";

    #[test]
    fn test_minimal_config() {
        let config: Config = MINIMAL.parse().unwrap();
        assert_eq!(config.client_id.as_deref(), Some("abc"));
        assert_eq!(config.idp_suffix.as_deref(), Some("example.com"));
        assert_eq!(config.auth_methods, vec![AuthMethod::GlobusAuth]);
        assert!(!config.policy.is_configured());
    }

    #[test]
    fn test_full_config() {
        let text = format!(
            "{MINIMAL}\
             # policy\n\
             map_file /etc/a.map\n\
             map_file /etc/b.map, /etc/c.map\n\
             permitted_idps example.com\n\
             permitted_idps 00000000-0000-0000-0000-000000000001\n\
             authentication_timeout 30\n\
             mfa TRUE\n\
             auth_method globus_auth scitokens\n\
             issuers https://issuer.example.org\n"
        );
        let config: Config = text.parse().unwrap();
        assert_eq!(config.map_files.len(), 3);
        assert_eq!(config.policy.permitted_idps.len(), 2);
        assert_eq!(config.policy.authentication_timeout, Some(30));
        assert!(config.policy.mfa);
        assert!(config.auth_method_enabled(AuthMethod::Scitokens));
        assert_eq!(config.issuers, vec!["https://issuer.example.org"]);
    }

    #[test]
    fn test_single_valued_directives() {
        let err = format!("{MINIMAL}client_id again").parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::MultipleOccurrences(ref k) if k == "client_id"));

        let err = format!("{MINIMAL}mfa").parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::MissingValue(ref k) if k == "mfa"));

        let err = format!("{MINIMAL}authentication_timeout 1 2")
            .parse::<Config>()
            .unwrap_err();
        assert!(matches!(err, ConfigError::TooManyValues(ref k) if k == "authentication_timeout"));

        let err = format!("{MINIMAL}mfa true\nmfa false")
            .parse::<Config>()
            .unwrap_err();
        assert_eq!(err.to_string(), "Multiple occurrences of 'mfa'");
    }

    #[test]
    fn test_illegal_values() {
        let err = format!("{MINIMAL}mfa yes").parse::<Config>().unwrap_err();
        assert_eq!(err.to_string(), "Illegal value 'yes' for mfa configuration option");

        let err = format!("{MINIMAL}authentication_timeout -5")
            .parse::<Config>()
            .unwrap_err();
        assert_eq!(err.directive(), Some("authentication_timeout"));

        let err = format!("{MINIMAL}auth_method kerberos")
            .parse::<Config>()
            .unwrap_err();
        assert_eq!(err.directive(), Some("auth_method"));
    }

    #[test]
    fn test_idp_suffix_must_be_a_domain() {
        let err = "client_id c\nclient_secret s\nidp_suffix a@b"
            .parse::<Config>()
            .unwrap_err();
        assert_eq!(err.directive(), Some("idp_suffix"));
        assert_eq!(
            err.to_string(),
            "Illegal value 'a@b' for idp_suffix configuration option"
        );
    }

    #[test]
    fn test_unknown_directive_is_fatal() {
        let err = format!("{MINIMAL}allow_root yes").parse::<Config>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown directive 'allow_root'");
    }

    #[test]
    fn test_globus_auth_requirements() {
        let err = "client_secret s\nidp_suffix x".parse::<Config>().unwrap_err();
        assert_eq!(err.to_string(), "Directive 'client_id' is missing");

        let err = "client_id c\nidp_suffix x".parse::<Config>().unwrap_err();
        assert_eq!(err.to_string(), "Directive 'client_secret' is missing");

        let err = "client_id c\nclient_secret s".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::MissingMapping));

        assert!("client_id c\nclient_secret s\nmap_file /m"
            .parse::<Config>()
            .is_ok());
    }

    #[test]
    fn test_scitokens_only() {
        let config: Config = "auth_method scitokens\nissuers https://i.example.org"
            .parse()
            .unwrap();
        assert!(!config.auth_method_enabled(AuthMethod::GlobusAuth));
        assert!(config.client_id.is_none());

        let err = "auth_method scitokens".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::MissingIssuers));
    }

    #[test]
    fn test_zero_timeout_is_unset() {
        let config: Config = format!("{MINIMAL}authentication_timeout 0").parse().unwrap();
        assert_eq!(config.policy.authentication_timeout, None);
    }

    #[test]
    fn test_pam_args() {
        let mut config: Config = MINIMAL.parse().unwrap();
        config.apply_args(&["debug", "environment=sandbox", "environment=preview", "bogus"]);
        assert!(config.debug);
        assert_eq!(config.environment.as_deref(), Some("sandbox"));
        assert_eq!(config.auth_host(), "auth.sandbox.globuscs.info");
    }

    #[test]
    fn test_default_host() {
        let config: Config = MINIMAL.parse().unwrap();
        assert_eq!(config.auth_host(), "auth.globus.org");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{MINIMAL}mfa false\n").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.client_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load_from("/nonexistent/globus-ssh.conf").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().starts_with("Could not open /nonexistent/globus-ssh.conf"));
    }
}
