//! Build runner: plans requested targets, runs their actions under the
//! concurrency limit, and records the resulting hashes.

use crate::command::CommandBuilder;
use crate::fs::FileSystem;
use crate::graph::{Graph, GraphError, TargetId};
use crate::hash::Oracle;
use crate::mode::ModeRegistry;
use crate::plan::{NodeState, Nodes, Planner};
use crate::progress::Progress;
use crate::require::Probes;
use crate::status::StatusStore;
use crate::task::{FinishedTask, Runner, TaskState};
use crate::trace;
use anyhow::{anyhow, bail};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Options {
    pub mode: String,
    /// Maximum number of simultaneously running actions.
    pub parallelism: usize,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BuildStats {
    /// Action processes started.
    pub spawned: usize,
    /// Targets that reached Rebuilt, with or without a process.
    pub rebuilt: usize,
    pub peak_running: usize,
}

/// Execution bookkeeping for the subgraph under one root.
#[derive(Default)]
struct Schedule {
    /// Count of unfinished pending children per node.
    remaining: FxHashMap<TargetId, usize>,
    dependents: FxHashMap<TargetId, Vec<TargetId>>,
    /// Nodes whose children are all done, in post-order.
    ready: VecDeque<TargetId>,
}

pub struct Work<'a> {
    graph: &'a Graph,
    fs: &'a dyn FileSystem,
    store: &'a mut StatusStore,
    modes: &'a ModeRegistry,
    progress: &'a mut dyn Progress,
    options: Options,
    nodes: Nodes,
    probes: Probes,
    roots: Vec<TargetId>,
    runner: Runner,
    /// Set once any task fails; no further task starts afterwards.
    failed: bool,
    stats: BuildStats,
}

impl<'a> Work<'a> {
    pub fn new(
        graph: &'a Graph,
        fs: &'a dyn FileSystem,
        store: &'a mut StatusStore,
        modes: &'a ModeRegistry,
        progress: &'a mut dyn Progress,
        options: Options,
    ) -> anyhow::Result<Self> {
        if !modes.contains(&options.mode) {
            return Err(GraphError::UnknownMode {
                name: options.mode.clone(),
                known: modes.names().map(str::to_string).collect(),
            }
            .into());
        }
        Ok(Work {
            graph,
            fs,
            store,
            modes,
            progress,
            nodes: Nodes::new(graph),
            probes: Probes::default(),
            roots: Vec::new(),
            runner: Runner::new(options.parallelism),
            options,
            failed: false,
            stats: BuildStats::default(),
        })
    }

    /// Plan a requested target and add it to the roots to build.
    pub fn want(&mut self, name: &str) -> anyhow::Result<TargetId> {
        let id = self.graph.id(name)?;
        self.want_id(id)?;
        Ok(id)
    }

    pub fn want_id(&mut self, id: TargetId) -> anyhow::Result<()> {
        let mut planner = Planner::new(
            self.graph,
            self.fs,
            &*self.store,
            &mut self.probes,
            &mut *self.progress,
        );
        planner.plan(&mut self.nodes, id, &self.options.mode)?;
        self.roots.push(id);
        Ok(())
    }

    pub fn state(&self, id: TargetId) -> NodeState {
        self.nodes[id].state()
    }

    pub fn state_of(&self, name: &str) -> Result<NodeState, GraphError> {
        Ok(self.state(self.graph.id(name)?))
    }

    pub fn stats(&self) -> BuildStats {
        BuildStats {
            peak_running: self.runner.peak(),
            ..self.stats
        }
    }

    /// Build every root in order, then record and save hashes.  Returns the
    /// bitwise OR of the roots' exit codes.
    pub fn run(&mut self) -> anyhow::Result<i32> {
        let mut code = 0;
        let roots = self.roots.clone();
        for root in roots {
            trace::scope("execute", || self.execute(root))?;
            code |= self.nodes[root].state().exit_code();
        }
        trace::scope("sync", || self.sync());
        self.store.save()?;
        Ok(code)
    }

    /// Collect the unfinished nodes under id, children before parents.
    fn collect(&self, id: TargetId, seen: &mut FxHashSet<TargetId>, order: &mut Vec<TargetId>) {
        if self.nodes[id].state() != NodeState::Pending || !seen.insert(id) {
            return;
        }
        for &child in &self.nodes[id].pending {
            self.collect(child, seen, order);
        }
        order.push(id);
    }

    fn execute(&mut self, root: TargetId) -> anyhow::Result<()> {
        let mut order = Vec::new();
        self.collect(root, &mut FxHashSet::default(), &mut order);

        let mut sched = Schedule::default();
        for &id in &order {
            let mut waiting = 0;
            let mut failure = None;
            for &child in &self.nodes[id].pending {
                match self.nodes[child].state() {
                    NodeState::Pending => {
                        waiting += 1;
                        sched.dependents.entry(child).or_default().push(id);
                    }
                    NodeState::Failure(code) => failure = failure.or(Some(code)),
                    _ => {}
                }
            }
            if let Some(code) = failure {
                // A child failed under an earlier root.  Nothing under this
                // root depends on id yet, as children are visited first.
                self.set_failure(id, code);
                continue;
            }
            if waiting == 0 {
                sched.ready.push_back(id);
            }
            sched.remaining.insert(id, waiting);
        }

        loop {
            while self.runner.can_start_more() {
                let Some(id) = sched.ready.pop_front() else {
                    break;
                };
                self.start(&mut sched, id)?;
            }
            if !self.runner.is_running() {
                if sched.ready.is_empty() {
                    break;
                }
                continue;
            }
            let task = self.runner.wait()?;
            self.task_finished(&mut sched, task);
        }

        debug_assert!(order.iter().all(|&id| self.nodes[id].state().is_terminal()));
        Ok(())
    }

    fn start(&mut self, sched: &mut Schedule, id: TargetId) -> anyhow::Result<()> {
        let graph = self.graph;
        let spec = graph.target(id);
        if self.failed {
            tracing::debug!(target = %spec.name, "not starting after earlier failure");
            self.finish(sched, id, NodeState::Failure(1));
            return Ok(());
        }
        if spec.action.invalidate_cache {
            tracing::debug!(target = %spec.name, entries = self.store.len(), "clearing status");
            self.store.clear();
        }

        let mode = self.nodes[id]
            .mode
            .clone()
            .unwrap_or_else(|| self.options.mode.clone());
        let args = match CommandBuilder::new(self.modes).args(spec, &mode) {
            Ok(args) => args,
            Err(err) => {
                self.progress.log(&format!("failed: {}\n{}", spec.name, err));
                self.finish(sched, id, NodeState::Failure(1));
                return Ok(());
            }
        };
        if args.is_empty() {
            self.finish(sched, id, NodeState::Rebuilt);
            return Ok(());
        }
        let stdin = match self.read_stdin(&spec.action.stdin) {
            Ok(stdin) => stdin,
            Err(err) => {
                self.progress.log(&format!("failed: {}\n{}", spec.name, err));
                self.finish(sched, id, NodeState::Failure(1));
                return Ok(());
            }
        };

        self.progress.task_started(&spec.name, &args);
        if let Some(task) = &mut self.nodes[id].task {
            task.state = TaskState::Pending;
            task.args = args.clone();
        }
        self.runner.start(id, args, stdin);
        self.stats.spawned += 1;
        Ok(())
    }

    /// Concatenate the files fed to an action's stdin.
    fn read_stdin(&self, paths: &[String]) -> anyhow::Result<Vec<u8>> {
        let mut stdin = Vec::new();
        for path in paths {
            match self.fs.read(path) {
                Ok(Some(content)) => stdin.extend_from_slice(&content),
                Ok(None) => bail!("stdin file {} missing", path),
                Err(err) => return Err(anyhow!("read {}: {}", path, err)),
            }
        }
        Ok(stdin)
    }

    fn task_finished(&mut self, sched: &mut Schedule, task: FinishedTask) {
        let graph = self.graph;
        let spec = graph.target(task.id);
        trace::write_complete(&spec.name, task.tid, task.span.0, task.span.1);
        let args = match &self.nodes[task.id].task {
            Some(t) => t.args.as_slice(),
            None => &[],
        };
        self.progress.task_finished(&spec.name, args, &task.result);
        let code = task.result.termination.exit_code();
        let state = if code == 0 {
            NodeState::Rebuilt
        } else {
            NodeState::Failure(code)
        };
        self.finish(sched, task.id, state);
    }

    /// Move a started (or refused) node to its final state and update the
    /// nodes waiting on it.
    fn finish(&mut self, sched: &mut Schedule, id: TargetId, state: NodeState) {
        let code = state.exit_code();
        if let Some(task) = &mut self.nodes[id].task {
            task.finish(code);
        }
        let dependents = sched.dependents.remove(&id).unwrap_or_default();
        match state {
            NodeState::Failure(code) => {
                self.set_failure(id, code);
                let mut stack = dependents;
                while let Some(dep) = stack.pop() {
                    if self.nodes[dep].state() != NodeState::Pending {
                        continue;
                    }
                    self.set_failure(dep, code);
                    stack.extend(sched.dependents.remove(&dep).unwrap_or_default());
                }
            }
            _ => {
                self.nodes[id].set_state(state);
                self.stats.rebuilt += 1;
                for dep in dependents {
                    let Some(remaining) = sched.remaining.get_mut(&dep) else {
                        continue;
                    };
                    *remaining -= 1;
                    if *remaining == 0 && self.nodes[dep].state() == NodeState::Pending {
                        sched.ready.push_back(dep);
                    }
                }
            }
        }
    }

    fn set_failure(&mut self, id: TargetId, code: i32) {
        tracing::debug!(target = %self.graph.target(id).name, code, "failed");
        let node = &mut self.nodes[id];
        if let Some(task) = &mut node.task {
            if task.state != TaskState::Failure {
                task.finish(code);
            }
        }
        node.set_state(NodeState::Failure(code));
        self.failed = true;
    }

    /// Write the run's results into the status store: fresh hashes for
    /// rebuilt targets, null for failed ones and for rebuilt ones that can no
    /// longer be hashed.
    fn sync(&mut self) {
        let graph = self.graph;
        let oracle = Oracle::new(self.fs, &graph.config_files, &graph.tool_stamp);
        let rebuilt: Vec<TargetId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.state() == NodeState::Rebuilt)
            .map(|(id, _)| id)
            .collect();
        let hashes: Vec<(TargetId, Option<String>)> = rebuilt
            .par_iter()
            .map(|&id| {
                let spec = graph.target(id);
                let hash = oracle.hash(spec).unwrap_or_else(|err| {
                    tracing::warn!(target = %spec.name, %err, "cannot hash rebuilt target");
                    None
                });
                (id, hash)
            })
            .collect();
        for (id, hash) in hashes {
            self.store.set(&graph.target(id).name, hash);
        }
        for (id, node) in self.nodes.iter() {
            if let NodeState::Failure(_) = node.state() {
                self.store.set(&graph.target(id).name, None);
            }
        }
    }
}
