//! Implicit mapping of `local@domain` usernames from one identity provider.

use super::{MappingError, MappingStrategy};

pub struct IdpSuffix {
    suffix: String,
}

impl IdpSuffix {
    pub fn initialize(suffix: &str) -> Result<Self, MappingError> {
        let suffix = suffix.trim();
        if suffix.is_empty() || suffix.contains('@') {
            return Err(MappingError::InvalidOption {
                strategy: "idp_suffix",
                reason: format!("'{}' is not a domain", suffix),
            });
        }
        Ok(Self {
            suffix: suffix.to_string(),
        })
    }
}

impl MappingStrategy for IdpSuffix {
    fn name(&self) -> &'static str {
        "idp_suffix"
    }

    fn lookup(&self, key: &str) -> Vec<String> {
        match key.rsplit_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.eq_ignore_ascii_case(&self.suffix) => {
                vec![local.to_string()]
            }
            _ => Vec::new(),
        }
    }
}
