//! Explicit `key account...` map files.

use super::{MappingError, MappingStrategy};
use crate::config::parser::parse_pairs;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct MapFile {
    path: PathBuf,
    entries: HashMap<String, Vec<String>>,
}

impl MapFile {
    /// Read and index `path`. Repeated keys accumulate their accounts.
    pub fn initialize(path: impl AsRef<Path>) -> Result<Self, MappingError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| MappingError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let mut entries: HashMap<String, Vec<String>> = HashMap::new();
        for directive in parse_pairs(&text) {
            let accounts = entries.entry(directive.key).or_default();
            for value in directive.values {
                if !accounts.contains(&value) {
                    accounts.push(value);
                }
            }
        }

        tracing::debug!(path = %path.display(), keys = entries.len(), "Loaded account map file");
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MappingStrategy for MapFile {
    fn name(&self) -> &'static str {
        "map_file"
    }

    fn lookup(&self, key: &str) -> Vec<String> {
        self.entries.get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_exact_lookup() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# identities").unwrap();
        writeln!(file, "alice@example.com alice, admin").unwrap();
        writeln!(file, "alice@example.com alice backup").unwrap();

        let map = MapFile::initialize(file.path()).unwrap();
        assert_eq!(map.path(), file.path());
        assert_eq!(map.lookup("alice@example.com"), vec!["alice", "admin", "backup"]);
        assert!(map.lookup("ALICE@example.com").is_empty());
        assert!(map.lookup("alice").is_empty());
    }

    #[test]
    fn test_unreadable_file() {
        assert!(matches!(
            MapFile::initialize("/nonexistent/map"),
            Err(MappingError::Unreadable { .. })
        ));
    }
}
