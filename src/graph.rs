//! The target graph: one immutable spec per declared target, looked up by
//! name or by dense id.

use crate::command::Token;
use crate::densemap::{self, DenseMap};
use crate::require::Requirement;
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TargetId(u32);

impl densemap::Index for TargetId {
    fn index(&self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for TargetId {
    fn from(u: usize) -> TargetId {
        TargetId(u as u32)
    }
}

/// A source location, for error messages.
#[derive(Debug, Clone)]
pub struct FileLoc {
    pub filename: Arc<PathBuf>,
    pub line: usize,
}

impl std::fmt::Display for FileLoc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.filename.display(), self.line)
    }
}

/// What a target does when it is rebuilt.
#[derive(Debug, Clone, Default)]
pub struct Action {
    /// Process invocation; empty when the target runs no process.
    pub command: Vec<Token>,
    /// Files whose contents are concatenated into the process's stdin.
    pub stdin: Vec<String>,
    /// Clear the status store as soon as the task starts.
    pub invalidate_cache: bool,
}

impl Action {
    pub fn is_empty(&self) -> bool {
        self.command.is_empty() && !self.invalidate_cache
    }
}

#[derive(Debug)]
pub struct TargetSpec {
    pub name: String,
    pub location: FileLoc,
    pub doc: Option<String>,
    /// Output path whose contents lead the target's hash.
    pub out: String,
    pub sources: Vec<String>,
    /// Hard dependencies: a missing one makes this target missing.
    pub deps: Vec<TargetId>,
    /// Aggregate members: built when possible, silently dropped otherwise.
    pub members: Vec<TargetId>,
    pub is_virtual: bool,
    pub requirements: Vec<Requirement>,
    pub action: Action,
}

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("{loc}: duplicate target {name:?}")]
    Duplicate { name: String, loc: FileLoc },
    #[error("{loc}: {target:?} refers to unknown target {name:?}")]
    UnknownReference {
        target: String,
        name: String,
        loc: FileLoc,
    },
    #[error("unknown target {0:?}")]
    UnknownTarget(String),
    #[error("dependency cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("unknown mode {name:?}, known modes: {}", .known.join(" "))]
    UnknownMode { name: String, known: Vec<String> },
}

#[derive(Default)]
pub struct Graph {
    targets: DenseMap<TargetId, TargetSpec>,
    by_name: FxHashMap<String, TargetId>,
    /// Build configuration files, hashed into every non-virtual target so
    /// that editing the manifest invalidates everything.
    pub config_files: Vec<String>,
    /// Identity of the hashmake build itself, seeding every non-virtual
    /// target's hash so that a new binary invalidates everything.
    pub tool_stamp: String,
}

impl Graph {
    /// Add a target.  Dependency ids must already have been assigned in
    /// declaration order, matching the ids this returns.
    pub fn add_target(&mut self, spec: TargetSpec) -> Result<TargetId, GraphError> {
        if self.by_name.contains_key(&spec.name) {
            return Err(GraphError::Duplicate {
                name: spec.name,
                loc: spec.location,
            });
        }
        let name = spec.name.clone();
        let id = self.targets.push(spec);
        self.by_name.insert(name, id);
        Ok(id)
    }

    pub fn target(&self, id: TargetId) -> &TargetSpec {
        &self.targets[id]
    }

    pub fn lookup(&self, name: &str) -> Option<TargetId> {
        self.by_name.get(name).copied()
    }

    pub fn id(&self, name: &str) -> Result<TargetId, GraphError> {
        self.lookup(name)
            .ok_or_else(|| GraphError::UnknownTarget(name.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = TargetId> {
        self.targets.ids()
    }

    pub fn targets(&self) -> impl Iterator<Item = (TargetId, &TargetSpec)> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
