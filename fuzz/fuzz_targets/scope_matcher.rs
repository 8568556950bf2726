//! Fuzz target for scope matching
//!
//! Neither matcher may panic, and a scope built from the client's own fqdn
//! must always match.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pam_oauth_ssh::scope::{has_fqdn_scope, has_scope_suffix, Scopes, SCOPE_PREFIX};

#[derive(Arbitrary, Debug)]
struct FuzzScopeInput {
    suffix: String,
    fqdn: String,
    scopes: Vec<String>,
}

fuzz_target!(|input: FuzzScopeInput| {
    if input.suffix.len() > 100 || input.scopes.len() > 32 {
        return;
    }

    let fqdns = vec![input.fqdn.clone()];
    let _ = has_fqdn_scope(&fqdns, Scopes::List(&input.scopes), &input.suffix);
    let claim = input.scopes.join(" ");
    let _ = has_fqdn_scope(&fqdns, Scopes::Claim(&claim), &input.suffix);
    let _ = has_scope_suffix(&input.suffix, Scopes::List(&input.scopes));

    let built = format!("{}{}/{}", SCOPE_PREFIX, input.fqdn, input.suffix);
    let plain = |s: &str| !s.is_empty() && !s.contains(|c: char| c == '/' || c.is_whitespace());
    if plain(&input.fqdn) && plain(&input.suffix) {
        assert!(has_fqdn_scope(&fqdns, Scopes::List(&[built]), &input.suffix));
    }
});
