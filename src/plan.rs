//! Per-run target nodes and the planning pass that decides, for each node
//! reachable from a requested target, whether it is missing, up to date, or
//! must be rebuilt.

use crate::densemap::DenseMap;
use crate::fs::FileSystem;
use crate::graph::{Graph, GraphError, TargetId};
use crate::hash::Oracle;
use crate::progress::Progress;
use crate::require::Probes;
use crate::status::StatusStore;
use crate::task::Task;
use anyhow::anyhow;

/// Planning and execution state of a node.  Default is initial; Missing,
/// Skipped, Rebuilt and Failure are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Default,
    /// A requirement, or the requirement of a hard dependency, is unmet.
    Missing,
    /// Up to date.
    Skipped,
    /// Must be rebuilt; waiting for dependencies or its action.
    Pending,
    Rebuilt,
    /// Carries the exit code reported for the node.
    Failure(i32),
}

impl NodeState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NodeState::Default | NodeState::Pending)
    }

    /// Exit status contributed by a requested target in this state.
    pub fn exit_code(self) -> i32 {
        match self {
            NodeState::Failure(code) => code,
            _ => 0,
        }
    }

    fn can_become(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (
                NodeState::Default,
                NodeState::Missing | NodeState::Skipped | NodeState::Pending
            ) | (NodeState::Pending, NodeState::Rebuilt | NodeState::Failure(_))
        )
    }
}

#[derive(Debug)]
pub struct Node {
    state: NodeState,
    /// Build mode, fixed at the first planning visit.
    pub mode: Option<String>,
    /// Hard dependencies and aggregate members that must finish first.
    pub pending: Vec<TargetId>,
    pub task: Option<Task>,
}

impl Node {
    fn new() -> Self {
        Node {
            state: NodeState::Default,
            mode: None,
            pending: Vec::new(),
            task: None,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn set_state(&mut self, state: NodeState) {
        debug_assert!(
            self.state.can_become(state),
            "bad transition {:?} -> {:?}",
            self.state,
            state
        );
        self.state = state;
    }
}

/// One node per target, indexed in parallel with the graph's specs.
pub struct Nodes(DenseMap<TargetId, Node>);

impl Nodes {
    pub fn new(graph: &Graph) -> Self {
        Nodes(graph.ids().map(|_| Node::new()).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = (TargetId, &Node)> {
        self.0.iter()
    }
}

impl std::ops::Index<TargetId> for Nodes {
    type Output = Node;
    fn index(&self, id: TargetId) -> &Node {
        &self.0[id]
    }
}

impl std::ops::IndexMut<TargetId> for Nodes {
    fn index_mut(&mut self, id: TargetId) -> &mut Node {
        &mut self.0[id]
    }
}

pub struct Planner<'a> {
    graph: &'a Graph,
    fs: &'a dyn FileSystem,
    oracle: Oracle<'a>,
    store: &'a StatusStore,
    probes: &'a mut Probes,
    progress: &'a mut dyn Progress,
    /// Targets whose planning is in progress, for cycle detection.
    visiting: Vec<TargetId>,
}

impl<'a> Planner<'a> {
    pub fn new(
        graph: &'a Graph,
        fs: &'a dyn FileSystem,
        store: &'a StatusStore,
        probes: &'a mut Probes,
        progress: &'a mut dyn Progress,
    ) -> Self {
        Planner {
            graph,
            fs,
            oracle: Oracle::new(fs, &graph.config_files, &graph.tool_stamp),
            store,
            probes,
            progress,
            visiting: Vec::new(),
        }
    }

    /// Plan a target and, recursively, everything it depends on.  A node that
    /// was already planned is left as is.
    pub fn plan(&mut self, nodes: &mut Nodes, id: TargetId, mode: &str) -> anyhow::Result<()> {
        if let Some(pos) = self.visiting.iter().position(|&v| v == id) {
            let mut cycle: Vec<String> = self.visiting[pos..]
                .iter()
                .map(|&v| self.graph.target(v).name.clone())
                .collect();
            cycle.push(self.graph.target(id).name.clone());
            return Err(GraphError::Cycle(cycle).into());
        }
        if nodes[id].state != NodeState::Default {
            return Ok(());
        }
        self.visiting.push(id);
        let result = self.plan_node(nodes, id, mode);
        self.visiting.pop();
        result
    }

    fn plan_node(&mut self, nodes: &mut Nodes, id: TargetId, mode: &str) -> anyhow::Result<()> {
        let graph = self.graph;
        let spec = graph.target(id);
        nodes[id].mode = Some(mode.to_string());
        self.progress.planned(&spec.name);

        for req in &spec.requirements {
            if !self.probes.check(self.fs, req, mode) {
                tracing::debug!(target = %spec.name, requirement = %req, "requirement unmet");
                nodes[id].set_state(NodeState::Missing);
                return Ok(());
            }
        }

        let mut rebuild = if spec.is_virtual {
            !spec.action.is_empty()
        } else {
            self.oracle
                .is_stale(spec, self.store)
                .map_err(|err| anyhow!("hash {}: {}", spec.name, err))?
        };

        let mut pending = Vec::new();
        for &dep in &spec.deps {
            self.plan(nodes, dep, mode)?;
            match nodes[dep].state {
                NodeState::Missing => {
                    tracing::debug!(target = %spec.name, dep = %graph.target(dep).name, "dependency missing");
                    nodes[id].set_state(NodeState::Missing);
                    return Ok(());
                }
                NodeState::Skipped => {}
                _ => {
                    rebuild = true;
                    pending.push(dep);
                }
            }
        }

        for &member in &spec.members {
            self.plan(nodes, member, mode)?;
            match nodes[member].state {
                NodeState::Missing | NodeState::Skipped => {}
                _ => {
                    rebuild = true;
                    pending.push(member);
                }
            }
        }

        let node = &mut nodes[id];
        if rebuild {
            node.pending = pending;
            node.task = Some(Task::default());
            node.set_state(NodeState::Pending);
        } else {
            node.set_state(NodeState::Skipped);
        }
        Ok(())
    }
}
