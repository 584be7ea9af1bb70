//! The status store: the last known good hash of each target, persisted
//! between runs as a JSON object of name to hash-or-null.

use anyhow::anyhow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Default)]
pub struct StatusStore {
    /// Where save() writes; None for a store that is never persisted.
    path: Option<PathBuf>,
    entries: BTreeMap<String, Option<String>>,
}

impl StatusStore {
    /// Load the store at path.  An absent or unparsable file is an empty
    /// store; the worst case is rebuilding everything.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let entries = match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "ignoring corrupt status file");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(anyhow!("read {}: {}", path.display(), err)),
        };
        Ok(StatusStore {
            path: Some(path.to_path_buf()),
            entries,
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).and_then(|h| h.as_deref())
    }

    /// Record a hash; None marks the target as needing re-examination.
    pub fn set(&mut self, name: &str, hash: Option<String>) {
        self.entries.insert(name.to_string(), hash);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// Write the whole store, replacing the previous file atomically.
    pub fn save(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        let json = serde_json::to_vec_pretty(&self.entries)?;
        std::fs::write(&tmp, json).map_err(|err| anyhow!("write {}: {}", tmp.display(), err))?;
        std::fs::rename(&tmp, path)
            .map_err(|err| anyhow!("rename {}: {}", path.display(), err))?;
        tracing::debug!(path = %path.display(), entries = self.entries.len(), "saved status");
        Ok(())
    }
}
