//! Build progress reporting, for the purpose of display to the user.

use crate::process::Termination;
use crate::task::TaskResult;
use std::io::Write;

/// Trait for build progress notifications.
pub trait Progress {
    /// Called when a target is first visited during planning.
    fn planned(&mut self, name: &str);

    /// Called when a target's action process starts.
    fn task_started(&mut self, name: &str, args: &[String]);

    /// Called when a target's action process completes.
    fn task_finished(&mut self, name: &str, args: &[String], result: &TaskResult);

    /// Log a line of output.
    fn log(&mut self, msg: &str);
}

/// Compute the line printed when a task starts.
pub fn start_message(name: &str, args: &[String], verbose: bool) -> String {
    if verbose {
        args.join(" ")
    } else {
        format!("build {}", name)
    }
}

/// Compute the lines printed when a task finishes, if any.
pub fn finish_message(name: &str, args: &[String], result: &TaskResult) -> Option<String> {
    let mut msg = match result.termination {
        Termination::Success => return None,
        Termination::Interrupted => format!("interrupted: {}", name),
        Termination::Failure(_) => format!("failed: {}\n{}", name, args.join(" ")),
    };
    if let Some(detail) = &result.message {
        msg.push('\n');
        msg.push_str(detail);
    }
    Some(msg)
}

/// Progress implementation that prints plain lines to stdout.
#[derive(Default)]
pub struct ConsoleProgress {
    /// Whether to print command lines of started programs.
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool) -> Self {
        ConsoleProgress { verbose }
    }
}

impl Progress for ConsoleProgress {
    fn planned(&mut self, name: &str) {
        self.log(&format!("plan {}", name));
    }

    fn task_started(&mut self, name: &str, args: &[String]) {
        self.log(&start_message(name, args, self.verbose));
    }

    fn task_finished(&mut self, name: &str, args: &[String], result: &TaskResult) {
        if let Some(msg) = finish_message(name, args, result) {
            self.log(&msg);
        }
    }

    fn log(&mut self, msg: &str) {
        let mut stdout = std::io::stdout().lock();
        // Output is best effort; a closed stdout must not stop the build.
        let _ = writeln!(stdout, "{}", msg);
        let _ = stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> Vec<String> {
        vec!["cc".to_string(), "-o".to_string(), "bin/x".to_string()]
    }

    #[test]
    fn start_lines() {
        assert_eq!(start_message("bin/x", &args(), false), "build bin/x");
        assert_eq!(start_message("bin/x", &args(), true), "cc -o bin/x");
    }

    #[test]
    fn finish_lines() {
        let ok = TaskResult {
            termination: Termination::Success,
            message: None,
        };
        assert_eq!(finish_message("bin/x", &args(), &ok), None);

        let failed = TaskResult {
            termination: Termination::Failure(1),
            message: Some("spawn cc: No such file or directory".to_string()),
        };
        assert_eq!(
            finish_message("bin/x", &args(), &failed).as_deref(),
            Some("failed: bin/x\ncc -o bin/x\nspawn cc: No such file or directory")
        );

        let interrupted = TaskResult {
            termination: Termination::Interrupted,
            message: None,
        };
        assert_eq!(
            finish_message("bin/x", &args(), &interrupted).as_deref(),
            Some("interrupted: bin/x")
        );
    }
}
