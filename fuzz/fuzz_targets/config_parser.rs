//! Fuzz target for the configuration file parser

#![no_main]

use libfuzzer_sys::fuzz_target;
use pam_oauth_ssh::config::Config;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(config) = text.parse::<Config>() {
        // A parsed configuration always enables at least one method.
        assert!(!config.auth_methods.is_empty());
        for idp in &config.policy.permitted_idps {
            assert!(!idp.is_empty());
        }
    }
});
