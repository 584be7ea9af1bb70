//! Requirement predicates: planning-time gates that mark a target Missing
//! when an optional dependency of the build is unavailable.

use crate::fs::FileSystem;
use rustc_hash::FxHashMap;
use std::process::{Command, Stdio};

#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    /// The path exists.
    Exists(String),
    /// The program exits successfully, e.g. `pkg-config --exists libpcap`.
    Succeeds(Vec<String>),
    /// The active mode is the named one.
    Mode(String),
    NotMode(String),
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Requirement::Exists(path) => write!(f, "exists {}", path),
            Requirement::Succeeds(argv) => write!(f, "succeeds {}", argv.join(" ")),
            Requirement::Mode(mode) => write!(f, "mode {}", mode),
            Requirement::NotMode(mode) => write!(f, "not-mode {}", mode),
        }
    }
}

/// Evaluates requirements, running each distinct probe program once per run.
#[derive(Default)]
pub struct Probes {
    results: FxHashMap<Vec<String>, bool>,
}

impl Probes {
    pub fn check(&mut self, fs: &dyn FileSystem, req: &Requirement, mode: &str) -> bool {
        match req {
            Requirement::Exists(path) => fs.exists(path),
            Requirement::Succeeds(argv) => {
                if let Some(&ok) = self.results.get(argv) {
                    return ok;
                }
                let ok = probe(argv);
                self.results.insert(argv.clone(), ok);
                ok
            }
            Requirement::Mode(name) => name == mode,
            Requirement::NotMode(name) => name != mode,
        }
    }

    /// Number of distinct probe programs run so far.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn probe(argv: &[String]) -> bool {
    let Some((prog, args)) = argv.split_first() else {
        return false;
    };
    let status = Command::new(prog)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) => {
            tracing::debug!(probe = %argv.join(" "), %status, "probe finished");
            status.success()
        }
        Err(err) => {
            tracing::warn!(probe = %argv.join(" "), %err, "probe failed to start");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::RealFileSystem;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn mode_predicates() {
        let fs = RealFileSystem::new();
        let mut probes = Probes::default();
        let release = Requirement::Mode("release".into());
        let not_portable = Requirement::NotMode("portable".into());
        assert!(probes.check(&fs, &release, "release"));
        assert!(!probes.check(&fs, &release, "debug"));
        assert!(probes.check(&fs, &not_portable, "debug"));
        assert!(!probes.check(&fs, &not_portable, "portable"));
        assert_eq!(not_portable.to_string(), "not-mode portable");
    }

    #[cfg(unix)]
    #[test]
    fn probes_are_memoized() {
        let fs = RealFileSystem::new();
        let mut probes = Probes::default();
        let yes = Requirement::Succeeds(argv(&["true"]));
        let no = Requirement::Succeeds(argv(&["false"]));
        let absent = Requirement::Succeeds(argv(&["no-such-probe-program"]));
        assert!(probes.check(&fs, &yes, "debug"));
        assert!(probes.check(&fs, &yes, "release"));
        assert!(!probes.check(&fs, &no, "debug"));
        assert!(!probes.check(&fs, &absent, "debug"));
        assert_eq!(probes.len(), 3);
    }

    #[test]
    fn exists_checks_path() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let fs = RealFileSystem::new();
        let mut probes = Probes::default();
        let here = Requirement::Exists(dir.path().to_string_lossy().into_owned());
        let gone = Requirement::Exists(dir.path().join("gone").to_string_lossy().into_owned());
        assert!(probes.check(&fs, &here, "debug"));
        assert!(!probes.check(&fs, &gone, "debug"));
        Ok(())
    }
}
