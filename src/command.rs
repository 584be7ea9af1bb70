//! Builds the argument list of a target's action process.
//!
//! Tokens are resolved lazily, when the task starts: globs see the files
//! that earlier actions produced, and helper programs only run for targets
//! that actually rebuild.

use crate::graph::TargetSpec;
use crate::mode::ModeRegistry;
use anyhow::{anyhow, bail};
use std::process::Stdio;

/// One entry of a command template.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Literal(String),
    /// The active mode's tokens.
    Mode,
    /// Expands to the matching paths, possibly none.
    Glob(String),
    /// Runs a helper and splices its whitespace-split stdout.
    Run(Vec<String>),
}

pub struct CommandBuilder<'a> {
    modes: &'a ModeRegistry,
}

impl<'a> CommandBuilder<'a> {
    pub fn new(modes: &'a ModeRegistry) -> Self {
        CommandBuilder { modes }
    }

    /// The process invocation for a target in a given mode.  Empty if the
    /// target has no command.
    pub fn args(&self, spec: &TargetSpec, mode: &str) -> anyhow::Result<Vec<String>> {
        let mut args = Vec::new();
        for token in &spec.action.command {
            self.expand(token, mode, &mut args)?;
        }
        Ok(args)
    }

    fn expand(&self, token: &Token, mode: &str, args: &mut Vec<String>) -> anyhow::Result<()> {
        match token {
            Token::Literal(s) => args.push(s.clone()),
            Token::Mode => {
                let tokens = self
                    .modes
                    .get(mode)
                    .ok_or_else(|| anyhow!("unknown mode {:?}", mode))?;
                for token in tokens {
                    if *token == Token::Mode {
                        bail!("mode {:?} refers to $mode", mode);
                    }
                    self.expand(token, mode, args)?;
                }
            }
            Token::Glob(pattern) => args.extend(expand_glob(pattern)?),
            Token::Run(argv) => args.extend(run_helper(argv)?),
        }
        Ok(())
    }
}

pub fn expand_glob(pattern: &str) -> anyhow::Result<Vec<String>> {
    let paths = glob::glob(pattern).map_err(|err| anyhow!("glob {:?}: {}", pattern, err))?;
    let mut matched = Vec::new();
    for entry in paths {
        let path = entry.map_err(|err| anyhow!("glob {:?}: {}", pattern, err))?;
        matched.push(path.to_string_lossy().into_owned());
    }
    Ok(matched)
}

/// Run a flag-discovery helper such as `pkg-config --libs foo`.
pub fn run_helper(argv: &[String]) -> anyhow::Result<Vec<String>> {
    let (prog, rest) = argv
        .split_first()
        .ok_or_else(|| anyhow!("empty helper command"))?;
    let output = std::process::Command::new(prog)
        .args(rest)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .map_err(|err| anyhow!("run {}: {}", prog, err))?;
    if !output.status.success() {
        tracing::warn!(helper = %argv.join(" "), status = %output.status, "helper failed");
    }
    Ok(String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .map(str::to_string)
        .collect())
}
