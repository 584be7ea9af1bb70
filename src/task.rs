//! Runs action processes, potentially in parallel.
//! Unaware of the build graph; just command execution under a slot limit.
//!
//! Each running process is waited on by its own thread, which reports back
//! over a channel.  The threads are cheap because they only block on the
//! subprocess.

use crate::graph::TargetId;
use crate::process::{self, Termination};
use anyhow::anyhow;
use std::sync::mpsc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Default,
    /// Process started and not yet reaped.
    Pending,
    Rebuilt,
    Failure,
}

/// The runtime handle of one target's build action.
#[derive(Debug, Default)]
pub struct Task {
    pub state: TaskState,
    /// The argument list the process was started with.
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
}

impl Task {
    pub fn finish(&mut self, code: i32) {
        self.state = if code == 0 {
            TaskState::Rebuilt
        } else {
            TaskState::Failure
        };
        self.exit_code = Some(code);
    }
}

pub struct FinishedTask {
    /// A (faked) "thread id", used to put different finished builds in different
    /// tracks in a performance trace.
    pub tid: usize,
    pub id: TargetId,
    pub span: (Instant, Instant),
    pub result: TaskResult,
}

/// The result of executing a build step.
#[derive(Debug)]
pub struct TaskResult {
    pub termination: Termination,
    /// Set when the process could not be run at all.
    pub message: Option<String>,
}

/// Tracks faked "thread ids" -- integers assigned to build tasks to track
/// parallelism in perf trace output.
#[derive(Default)]
struct ThreadIds {
    /// An entry is true when claimed, false or nonexistent otherwise.
    slots: Vec<bool>,
}

impl ThreadIds {
    fn claim(&mut self) -> usize {
        match self.slots.iter().position(|&used| !used) {
            Some(idx) => {
                self.slots[idx] = true;
                idx
            }
            None => {
                self.slots.push(true);
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, slot: usize) {
        self.slots[slot] = false;
    }
}

pub struct Runner {
    finished_send: mpsc::Sender<FinishedTask>,
    finished_recv: mpsc::Receiver<FinishedTask>,
    running: usize,
    /// Highest number of simultaneously running processes seen.
    peak: usize,
    tids: ThreadIds,
    parallelism: usize,
}

impl Runner {
    pub fn new(parallelism: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        Runner {
            finished_send: tx,
            finished_recv: rx,
            running: 0,
            peak: 0,
            tids: ThreadIds::default(),
            parallelism: parallelism.max(1),
        }
    }

    pub fn can_start_more(&self) -> bool {
        self.running < self.parallelism
    }

    pub fn is_running(&self) -> bool {
        self.running > 0
    }

    pub fn peak(&self) -> usize {
        self.peak
    }

    pub fn start(&mut self, id: TargetId, args: Vec<String>, stdin: Vec<u8>) {
        let tid = self.tids.claim();
        let tx = self.finished_send.clone();
        std::thread::spawn(move || {
            let start = Instant::now();
            let result = match process::run_command(&args, &stdin) {
                Ok(termination) => TaskResult {
                    termination,
                    message: None,
                },
                Err(err) => TaskResult {
                    termination: Termination::Failure(1),
                    message: Some(err.to_string()),
                },
            };
            let finish = Instant::now();

            let task = FinishedTask {
                tid,
                id,
                span: (start, finish),
                result,
            };
            // The send will only fail if the receiver disappeared, e.g. due to shutting down.
            let _ = tx.send(task);
        });
        self.running += 1;
        self.peak = self.peak.max(self.running);
    }

    /// Block until a running task completes.
    pub fn wait(&mut self) -> anyhow::Result<FinishedTask> {
        let task = self
            .finished_recv
            .recv()
            .map_err(|_| anyhow!("task runner channel closed"))?;
        self.tids.release(task.tid);
        self.running -= 1;
        Ok(task)
    }
}
