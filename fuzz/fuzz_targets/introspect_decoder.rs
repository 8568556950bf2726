//! Fuzz target for the Globus Auth resource decoders
//!
//! Arbitrary response bodies must decode or fail with an error, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pam_oauth_ssh::globus::{Client, IdentitySet, Introspect};

fuzz_target!(|data: &[u8]| {
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(introspect) = Introspect::from_json_str(body) {
        // An inactive record never carries data.
        if !introspect.active {
            assert_eq!(introspect, Introspect::default());
        }
    }

    if let Ok(identities) = IdentitySet::from_json_str(body) {
        for identity in &identities.identities {
            let _ = identities.provider(&identity.identity_provider);
        }
    }

    let _ = Client::from_json_str(body);
});
