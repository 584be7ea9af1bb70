//! Runs one action process.  Output streams are inherited so build output
//! appears live; stdin is a pipe carrying the action's feed files, if any.

use anyhow::anyhow;
use std::io::Write;
use std::process::{Command, ExitStatus, Stdio};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Success,
    Interrupted,
    /// Exit code, or 128 + signal number for processes killed by a signal.
    Failure(i32),
}

impl Termination {
    pub fn exit_code(self) -> i32 {
        match self {
            Termination::Success => 0,
            Termination::Interrupted => 128 + 2,
            Termination::Failure(code) => code,
        }
    }
}

fn termination(status: ExitStatus) -> Termination {
    if status.success() {
        return Termination::Success;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return match sig {
                libc::SIGINT => Termination::Interrupted,
                _ => Termination::Failure(128 + sig),
            };
        }
    }
    Termination::Failure(status.code().unwrap_or(1))
}

/// Run a process to completion.  Returns an Err() if it could not be run at
/// all, e.g. because the program does not exist.
pub fn run_command(args: &[String], stdin: &[u8]) -> anyhow::Result<Termination> {
    let (prog, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("empty command"))?;
    let mut child = Command::new(prog)
        .args(rest)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|err| anyhow!("spawn {}: {}", prog, err))?;

    // Dropping the pipe closes it, so readers see end of input.
    let fed = match child.stdin.take() {
        Some(mut pipe) => pipe.write_all(stdin),
        None => Ok(()),
    };
    let status = child
        .wait()
        .map_err(|err| anyhow!("wait {}: {}", prog, err))?;
    match fed {
        Err(err) if err.kind() != std::io::ErrorKind::BrokenPipe => {
            Err(anyhow!("write stdin of {}: {}", prog, err))
        }
        _ => Ok(termination(status)),
    }
}
