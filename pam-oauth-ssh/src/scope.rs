//! Scope matching for `https://auth.globus.org/scopes/<fqdn>/<suffix>` grants.
//!
//! Two matchers exist. The strict one requires the fqdn segment to be one of
//! the service's registered fqdns. The legacy one accepts any syntactically
//! valid fqdn of at least three labels.

use regex::Regex;
use thiserror::Error;

pub const SCOPE_PREFIX: &str = "https://auth.globus.org/scopes/";

/// A DNS label: alphanumerics with internal hyphens, at least one letter.
const LABEL: &str = r"(?:[[:alnum:]]+-*)*[[:alpha:]]+(?:-*[[:alnum:]]+)*";

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("Invalid scope pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Scopes carried by a token, either as a single claim string or a list.
#[derive(Debug, Clone, Copy)]
pub enum Scopes<'a> {
    Claim(&'a str),
    List(&'a [String]),
}

impl<'a> Scopes<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a str> {
        let (claim, list) = match *self {
            Scopes::Claim(s) => (Some(s), None),
            Scopes::List(l) => (None, Some(l)),
        };
        claim
            .into_iter()
            .flat_map(str::split_whitespace)
            .chain(list.into_iter().flatten().map(String::as_str))
    }
}

impl<'a> From<&'a str> for Scopes<'a> {
    fn from(s: &'a str) -> Self {
        Scopes::Claim(s)
    }
}

impl<'a> From<&'a [String]> for Scopes<'a> {
    fn from(l: &'a [String]) -> Self {
        Scopes::List(l)
    }
}

/// Does any scope grant `suffix`?
///
/// With `fqdns` the strict matcher is used, otherwise the legacy one.
pub fn scope_grants(
    suffix: &str,
    fqdns: Option<&[String]>,
    scopes: Scopes<'_>,
) -> Result<bool, ScopeError> {
    match fqdns {
        Some(fqdns) => Ok(has_fqdn_scope(fqdns, scopes, suffix)),
        None => has_scope_suffix(suffix, scopes),
    }
}

/// Strict match: the fqdn segment must equal one of `fqdns` exactly.
pub fn has_fqdn_scope(fqdns: &[String], scopes: Scopes<'_>, suffix: &str) -> bool {
    scopes.iter().any(|scope| {
        let Some((fqdn, rest)) = scope
            .strip_prefix(SCOPE_PREFIX)
            .and_then(|s| s.split_once('/'))
        else {
            return false;
        };
        rest == suffix && fqdns.iter().any(|f| f == fqdn)
    })
}

/// Legacy match: any valid fqdn of three or more labels followed by `suffix`
/// as the final path segment.
pub fn has_scope_suffix(suffix: &str, scopes: Scopes<'_>) -> Result<bool, ScopeError> {
    let pattern = format!(
        r"^{prefix}(?:{label}\.){{2,}}{label}/({suffix})$",
        prefix = regex::escape(SCOPE_PREFIX),
        label = LABEL,
        suffix = regex::escape(suffix),
    );
    let re = Regex::new(&pattern)?;

    Ok(scopes.iter().any(|scope| re.is_match(scope)))
}
