//! Federated identity to local account mapping.
//!
//! Each configured [`MappingStrategy`] is asked about every identity, by id
//! and by username. Everything they return is merged per identity, then
//! accounts the host does not know are dropped in a single pass at the end.

pub mod idp_suffix;
pub mod map_file;

pub use idp_suffix::IdpSuffix;
pub use map_file::MapFile;

use crate::config::Config;
use crate::globus::IdentitySet;
use crate::nss::AccountDatabase;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Could not open {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid option for {strategy} mapping: {reason}")]
    InvalidOption {
        strategy: &'static str,
        reason: String,
    },
}

/// A source of candidate local accounts.
///
/// Strategies are built with their own `initialize(option)` constructor and
/// release their resources on drop.
pub trait MappingStrategy {
    fn name(&self) -> &'static str;

    /// Candidate accounts for an identity id or an identity username.
    fn lookup(&self, key: &str) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMapEntry {
    pub identity_id: String,
    pub username: String,
    pub accounts: BTreeSet<String>,
}

/// Permitted local accounts for one authentication attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountMap {
    entries: BTreeMap<String, AccountMapEntry>,
}

impl AccountMap {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AccountMapEntry> {
        self.entries.values()
    }

    /// Sorted, de-duplicated union of every entry's accounts.
    pub fn permitted_accounts(&self) -> Vec<String> {
        let all: BTreeSet<&String> = self.entries.values().flat_map(|e| &e.accounts).collect();
        all.into_iter().cloned().collect()
    }

    /// Username of the first identity mapped to `account`.
    pub fn identity_for(&self, account: &str) -> Option<&str> {
        self.entries
            .values()
            .find(|e| e.accounts.contains(account))
            .map(|e| e.username.as_str())
    }

    fn add(&mut self, identity_id: &str, username: &str, account: String) {
        self.entries
            .entry(identity_id.to_string())
            .or_insert_with(|| AccountMapEntry {
                identity_id: identity_id.to_string(),
                username: username.to_string(),
                accounts: BTreeSet::new(),
            })
            .accounts
            .insert(account);
    }

    fn retain_existing(&mut self, db: &dyn AccountDatabase) {
        for entry in self.entries.values_mut() {
            entry.accounts.retain(|account| {
                let exists = db.account_exists(account);
                if !exists {
                    tracing::debug!(%account, identity = %entry.username, "Mapped account does not exist on this host");
                }
                exists
            });
        }
        self.entries.retain(|_, e| !e.accounts.is_empty());
    }
}

/// The configured strategies, in query order.
#[derive(Default)]
pub struct AccountMapper {
    strategies: Vec<Box<dyn MappingStrategy>>,
}

impl AccountMapper {
    pub fn new(strategies: Vec<Box<dyn MappingStrategy>>) -> Self {
        Self { strategies }
    }

    /// Build the map-file strategies followed by the idp-suffix strategy.
    ///
    /// A map file that cannot be read is logged and skipped so the remaining
    /// mappings keep working.
    pub fn from_config(config: &Config) -> Result<Self, MappingError> {
        let mut strategies: Vec<Box<dyn MappingStrategy>> = Vec::new();

        for path in &config.map_files {
            match MapFile::initialize(path) {
                Ok(map) => strategies.push(Box::new(map)),
                Err(e) => tracing::error!("{}", e),
            }
        }

        if let Some(ref suffix) = config.idp_suffix {
            strategies.push(Box::new(IdpSuffix::initialize(suffix)?));
        }

        Ok(Self { strategies })
    }

    pub fn push(&mut self, strategy: Box<dyn MappingStrategy>) {
        self.strategies.push(strategy);
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Resolve the permitted accounts for every identity in `identities`.
    pub fn resolve(&self, identities: &IdentitySet, db: &dyn AccountDatabase) -> AccountMap {
        let mut map = AccountMap::default();

        for identity in &identities.identities {
            for strategy in &self.strategies {
                let mut candidates = strategy.lookup(&identity.id);
                if identity.username != identity.id {
                    candidates.extend(strategy.lookup(&identity.username));
                }
                for account in candidates {
                    tracing::debug!(
                        strategy = strategy.name(),
                        identity = %identity.username,
                        %account,
                        "Candidate account"
                    );
                    map.add(&identity.id, &identity.username, account);
                }
            }
        }

        map.retain_existing(db);
        map
    }
}
