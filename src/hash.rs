//! Content hashes over a target's files, used to decide whether the target
//! is up to date.
//!
//! The hash is a left fold: each existing file's bytes are mixed into the
//! hex rendering of the previous digest, so it depends on both the contents
//! and the order of the files.  Missing files contribute nothing.

use crate::fs::FileSystem;
use crate::graph::TargetSpec;
use crate::status::StatusStore;
use sha2::{Digest, Sha256};

pub fn hash_files<'a>(
    fs: &dyn FileSystem,
    paths: impl IntoIterator<Item = &'a str>,
) -> std::io::Result<String> {
    fold_files(String::new(), fs, paths)
}

fn fold_files<'a>(
    mut digest: String,
    fs: &dyn FileSystem,
    paths: impl IntoIterator<Item = &'a str>,
) -> std::io::Result<String> {
    for path in paths {
        let Some(content) = fs.read(path)? else {
            continue;
        };
        let mut hasher = Sha256::new();
        hasher.update(digest.as_bytes());
        hasher.update(&content);
        digest = format!("{:x}", hasher.finalize());
    }
    Ok(digest)
}

/// Identify the running binary by the digest of its own bytes, falling back
/// to the package version when the executable can't be read.
pub fn tool_stamp() -> String {
    let exe = match std::env::current_exe().and_then(std::fs::read) {
        Ok(exe) => exe,
        Err(err) => {
            tracing::warn!(%err, "cannot read own executable, stamping by version");
            return format!("hashmake {}", env!("CARGO_PKG_VERSION"));
        }
    };
    format!("{:x}", Sha256::digest(&exe))
}

/// Computes target hashes and compares them against the status store.
pub struct Oracle<'a> {
    fs: &'a dyn FileSystem,
    /// Files mixed into every non-virtual target, after its output.
    config_files: &'a [String],
    tool_stamp: &'a str,
}

impl<'a> Oracle<'a> {
    pub fn new(fs: &'a dyn FileSystem, config_files: &'a [String], tool_stamp: &'a str) -> Self {
        Oracle {
            fs,
            config_files,
            tool_stamp,
        }
    }

    /// The current hash of a target, or None for virtual targets.
    pub fn hash(&self, spec: &TargetSpec) -> std::io::Result<Option<String>> {
        if spec.is_virtual {
            return Ok(None);
        }
        let paths = std::iter::once(spec.out.as_str())
            .chain(self.config_files.iter().map(String::as_str))
            .chain(spec.sources.iter().map(String::as_str));
        fold_files(self.tool_stamp.to_string(), self.fs, paths).map(Some)
    }

    pub fn is_stale(&self, spec: &TargetSpec, store: &StatusStore) -> std::io::Result<bool> {
        let hash = self.hash(spec)?;
        Ok(hash.as_deref() != store.get(&spec.name))
    }
}
