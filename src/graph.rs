//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! The task dependency graph: construction, trimming, transitive reduction,
//! and status bookkeeping.

use std::collections::{HashMap, HashSet, VecDeque};

use daggy::petgraph::visit::EdgeRef;
use daggy::petgraph::Direction;
use daggy::{Dag, NodeIndex};

use crate::context::Context;
use crate::error::{KrakenError, Result};
use crate::task::{StatusKind, TaskHandle, TaskKind, TaskStatus};

/// Edge metadata: `strict` means "must run before"; `implicit` marks edges
/// introduced by capability-implicit relationships (e.g. group membership)
/// rather than an explicit user-declared one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EdgeMeta {
    pub strict: bool,
    pub implicit: bool,
}

type Ix = u32;

pub struct TaskGraph {
    dag: Dag<TaskHandle, EdgeMeta, Ix>,
    index: HashMap<String, NodeIndex<Ix>>,
    status: HashMap<String, TaskStatus>,
    /// `(member, group)` pairs contributed by a `GroupTask`'s own
    /// capability, as opposed to an ordinary (possibly also implicit-tagged)
    /// edge produced by unfurling. The source of truth for "is this node a
    /// member of that group", kept separate from `EdgeMeta.implicit` so that
    /// unfurl-generated edges are never mistaken for membership on a later
    /// `add_task` call.
    membership: HashSet<(NodeIndex<Ix>, NodeIndex<Ix>)>,
}

impl TaskGraph {
    pub fn new() -> Self {
        TaskGraph { dag: Dag::new(), index: HashMap::new(), status: HashMap::new(), membership: HashSet::new() }
    }

    fn node_of(&self, path: &str) -> Option<NodeIndex<Ix>> {
        self.index.get(path).copied()
    }

    fn ensure_node(&mut self, task: &TaskHandle) -> NodeIndex<Ix> {
        if let Some(&idx) = self.index.get(&task.path()) {
            idx
        } else {
            let idx = self.dag.add_node(task.clone());
            self.index.insert(task.path(), idx);
            idx
        }
    }

    /// Inserts `task` and, recursively, every task it relates to, adding an
    /// edge for each relationship oriented by its `inverse` flag. Once the
    /// whole reachable set has been inserted, unfurls cross-group
    /// relationships into implicit edges (see
    /// [`TaskGraph::unfurl_group_dependencies`]).
    pub fn add_task(&mut self, context: &Context, task: TaskHandle) -> Result<()> {
        if self.index.contains_key(&task.path()) {
            return Ok(());
        }
        self.add_task_inner(context, task)?;
        self.unfurl_group_dependencies()
    }

    fn add_task_inner(&mut self, context: &Context, task: TaskHandle) -> Result<()> {
        if self.index.contains_key(&task.path()) {
            return Ok(());
        }
        self.ensure_node(&task);

        // Relationships this task's capability itself contributes (group
        // membership) are tracked separately so `unfurl_group_dependencies`
        // can tell them apart from ordinary dependency edges later.
        let capability_paths: HashSet<String> = task.capability_relationships().iter().map(|(t, _, _)| t.path()).collect();

        for (other, strict, inverse) in task.get_relationships(context)? {
            self.add_task_inner(context, other.clone())?;
            let (predecessor, successor) = if inverse { (task.clone(), other.clone()) } else { (other.clone(), task.clone()) };
            let is_membership = !inverse && capability_paths.contains(&other.path());
            self.add_edge(predecessor.clone(), successor.clone(), EdgeMeta { strict, implicit: is_membership })?;
            if is_membership {
                let member_idx = self.ensure_node(&predecessor);
                let group_idx = self.ensure_node(&successor);
                self.membership.insert((member_idx, group_idx));
            }
        }
        Ok(())
    }

    /// Every direct member of `group`, recursively unfurled through nested
    /// groups into real leaf tasks.
    fn group_leaves(&self, group: NodeIndex<Ix>) -> Vec<NodeIndex<Ix>> {
        let mut out = Vec::new();
        for &(member, g) in &self.membership {
            if g != group {
                continue;
            }
            if self.is_group(member) {
                out.extend(self.group_leaves(member));
            } else {
                out.push(member);
            }
        }
        out
    }

    fn is_group(&self, idx: NodeIndex<Ix>) -> bool {
        self.dag.node_weight(idx).map(|t| t.kind() == TaskKind::Group).unwrap_or(false)
    }

    /// §4.4 construction rule: when a non-member group depends on another
    /// group (or a member of one), the real, executable tasks involved must
    /// honor that ordering too — not just the bookkeeping group nodes. Two
    /// passes over every non-membership edge `pred -> succ`:
    ///
    /// - if `succ` is a group, add an implicit edge from `pred` (or, if
    ///   `pred` is itself a group, its unfurled leaves) to every one of
    ///   `succ`'s unfurled members;
    /// - if `pred` is a member of some enclosing group that doesn't already
    ///   contain `succ`, add an implicit edge from that whole group to
    ///   `succ`, so depending on one member of a group is treated as
    ///   depending on the group as a whole.
    ///
    /// Both passes carry over the originating edge's `strict` flag and mark
    /// the new edge `implicit`. A candidate that would introduce a cycle is
    /// dropped rather than erroring: these are inferred ordering hints, not
    /// user-declared constraints.
    fn unfurl_group_dependencies(&mut self) -> Result<()> {
        let base_edges: Vec<(NodeIndex<Ix>, NodeIndex<Ix>, EdgeMeta)> = self
            .dag
            .node_indices()
            .flat_map(|idx| {
                self.dag
                    .edges_directed(idx, Direction::Outgoing)
                    .map(move |e| (idx, e.target(), *e.weight()))
                    .collect::<Vec<_>>()
            })
            .filter(|(pred, succ, _)| !self.membership.contains(&(*pred, *succ)))
            .collect();

        let mut to_add: Vec<(NodeIndex<Ix>, NodeIndex<Ix>, EdgeMeta)> = Vec::new();

        for &(pred, succ, meta) in &base_edges {
            if self.is_group(succ) {
                let pred_leaves = if self.is_group(pred) { self.group_leaves(pred) } else { vec![pred] };
                let succ_members = self.group_leaves(succ);
                for &pl in &pred_leaves {
                    for &sm in &succ_members {
                        if pl != sm {
                            to_add.push((pl, sm, EdgeMeta { strict: meta.strict, implicit: true }));
                        }
                    }
                }
            }

            for &(member, group) in &self.membership {
                if member != pred || group == succ {
                    continue;
                }
                if self.group_leaves(group).contains(&succ) {
                    continue;
                }
                to_add.push((group, succ, EdgeMeta { strict: meta.strict, implicit: true }));
            }
        }

        for (from, to, meta) in to_add {
            let predecessor = self.dag.node_weight(from).expect("valid index").clone();
            let successor = self.dag.node_weight(to).expect("valid index").clone();
            // Best-effort: an inferred edge that would create a cycle is
            // dropped instead of failing the whole build.
            let _ = self.add_edge(predecessor, successor, meta);
        }
        Ok(())
    }

    fn add_edge(&mut self, predecessor: TaskHandle, successor: TaskHandle, meta: EdgeMeta) -> Result<()> {
        let from = self.ensure_node(&predecessor);
        let to = self.ensure_node(&successor);
        if let Some(edge) = self.dag.find_edge(from, to) {
            let existing = self.dag.edge_weight(edge).copied().unwrap_or(meta);
            let merged = EdgeMeta { strict: existing.strict || meta.strict, implicit: existing.implicit && meta.implicit };
            if let Some(w) = self.dag.edge_weight_mut(edge) {
                *w = merged;
            }
            return Ok(());
        }
        if self.dag.add_edge(from, to, meta).is_err() {
            let path = self.find_path(to, from).unwrap_or_else(|| vec![predecessor.path(), successor.path()]);
            return Err(KrakenError::Cycle { path });
        }
        Ok(())
    }

    fn find_path(&self, from: NodeIndex<Ix>, to: NodeIndex<Ix>) -> Option<Vec<String>> {
        let mut queue = VecDeque::new();
        let mut came_from: HashMap<NodeIndex<Ix>, NodeIndex<Ix>> = HashMap::new();
        queue.push_back(from);
        came_from.insert(from, from);
        while let Some(node) = queue.pop_front() {
            if node == to {
                let mut path = vec![node];
                let mut cur = node;
                while cur != from {
                    cur = came_from[&cur];
                    path.push(cur);
                }
                path.reverse();
                return Some(path.into_iter().filter_map(|n| self.dag.node_weight(n).map(|t| t.path())).collect());
            }
            for edge in self.dag.edges_directed(node, Direction::Outgoing) {
                let next = edge.target();
                if !came_from.contains_key(&next) {
                    came_from.insert(next, node);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    pub fn contains(&self, task: &TaskHandle) -> bool {
        self.index.contains_key(&task.path())
    }

    pub fn all_tasks(&self) -> Vec<TaskHandle> {
        self.dag.node_weights().cloned().collect()
    }

    pub fn task_by_path(&self, path: &str) -> Option<TaskHandle> {
        self.node_of(path).and_then(|idx| self.dag.node_weight(idx)).cloned()
    }

    /// Every edge as `(predecessor_path, successor_path, meta)`, for
    /// serialization.
    pub fn edges(&self) -> Vec<(String, String, EdgeMeta)> {
        let mut out = Vec::new();
        for idx in self.dag.node_indices() {
            for edge in self.dag.edges_directed(idx, Direction::Outgoing) {
                let from = self.dag.node_weight(idx).expect("valid index").path();
                let to = self.dag.node_weight(edge.target()).expect("valid index").path();
                out.push((from, to, *edge.weight()));
            }
        }
        out
    }

    /// Overwrites recorded statuses from `statuses` (force-assigning), used
    /// when replaying a loaded snapshot onto a freshly constructed graph.
    pub fn apply_statuses(&mut self, statuses: &HashMap<String, TaskStatus>) {
        for (path, status) in statuses {
            if self.index.contains_key(path) {
                self.status.insert(path.clone(), status.clone());
            }
        }
    }

    /// Every direct successor of `task` (used by the executor to track when
    /// a background task has no non-torn-down successor left).
    pub fn successors(&self, task: &TaskHandle) -> Vec<TaskHandle> {
        let Some(idx) = self.node_of(&task.path()) else { return Vec::new() };
        self.dag
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| self.dag.node_weight(e.target()).expect("edge endpoint exists").clone())
            .collect()
    }

    /// Every strict/non-strict predecessor, direct, of `task`.
    pub fn predecessors(&self, task: &TaskHandle) -> Vec<(TaskHandle, EdgeMeta)> {
        let Some(idx) = self.node_of(&task.path()) else { return Vec::new() };
        self.dag
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (self.dag.node_weight(e.source()).expect("edge endpoint exists").clone(), *e.weight()))
            .collect()
    }

    /// Returns a new graph containing only the transitive strict-predecessor
    /// closure of `goals` (plus the goals themselves), keeping every edge
    /// (strict or not) between two kept nodes.
    pub fn trim(&self, goals: &[TaskHandle]) -> Result<TaskGraph> {
        let mut keep: HashSet<NodeIndex<Ix>> = HashSet::new();
        let mut stack: Vec<NodeIndex<Ix>> = goals.iter().filter_map(|t| self.node_of(&t.path())).collect();
        for &idx in &stack {
            keep.insert(idx);
        }
        while let Some(node) = stack.pop() {
            for edge in self.dag.edges_directed(node, Direction::Incoming) {
                if !edge.weight().strict {
                    continue;
                }
                let pred = edge.source();
                if keep.insert(pred) {
                    stack.push(pred);
                }
            }
        }
        self.subgraph(&keep)
    }

    /// Returns a new graph with `bare` tasks (and, for `with_successors`,
    /// every strict successor reachable from them) removed, along with any
    /// edge touching a removed node. Backs the CLI's `-x`/`-X` flags: a bare
    /// exclusion drops only that task (its successors lose the strict
    /// predecessor requirement it carried), while an `-X` exclusion also
    /// drops everything that strictly depends on it, since running those
    /// without the excluded dependency would be meaningless.
    pub fn exclude(&self, bare: &[TaskHandle], with_successors: &[TaskHandle]) -> TaskGraph {
        let mut drop: HashSet<NodeIndex<Ix>> = HashSet::new();
        for task in bare {
            if let Some(idx) = self.node_of(&task.path()) {
                drop.insert(idx);
            }
        }
        for task in with_successors {
            let Some(seed) = self.node_of(&task.path()) else { continue };
            let mut stack = vec![seed];
            while let Some(node) = stack.pop() {
                if drop.insert(node) {
                    for edge in self.dag.edges_directed(node, Direction::Outgoing) {
                        stack.push(edge.target());
                    }
                }
            }
        }
        let keep: HashSet<NodeIndex<Ix>> = self.dag.node_indices().filter(|idx| !drop.contains(idx)).collect();
        self.subgraph(&keep).expect("removing nodes from a DAG cannot introduce a cycle")
    }

    /// Standard transitive reduction: an edge `(u, v)` is dropped if there is
    /// another path from `u` to `v` of length >= 2, unless `keep_explicit` is
    /// set and the edge is non-implicit.
    pub fn reduce(&self, keep_explicit: bool) -> TaskGraph {
        let all: Vec<NodeIndex<Ix>> = self.dag.node_indices().collect();
        let mut keep_edges: HashSet<(NodeIndex<Ix>, NodeIndex<Ix>)> = HashSet::new();
        for &u in &all {
            for edge in self.dag.edges_directed(u, Direction::Outgoing) {
                let v = edge.target();
                let meta = *edge.weight();
                if keep_explicit && !meta.implicit {
                    keep_edges.insert((u, v));
                    continue;
                }
                if !self.has_indirect_path(u, v) {
                    keep_edges.insert((u, v));
                }
            }
        }
        let keep_nodes: HashSet<NodeIndex<Ix>> = all.into_iter().collect();
        self.subgraph_with_edges(&keep_nodes, |u, v| keep_edges.contains(&(u, v)))
            .expect("reduce never removes a node, so it cannot introduce a cycle")
    }

    fn has_indirect_path(&self, u: NodeIndex<Ix>, v: NodeIndex<Ix>) -> bool {
        for edge in self.dag.edges_directed(u, Direction::Outgoing) {
            let mid = edge.target();
            if mid == v {
                continue;
            }
            if self.reaches(mid, v) {
                return true;
            }
        }
        false
    }

    fn reaches(&self, from: NodeIndex<Ix>, to: NodeIndex<Ix>) -> bool {
        let mut visited = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            for edge in self.dag.edges_directed(node, Direction::Outgoing) {
                stack.push(edge.target());
            }
        }
        false
    }

    fn subgraph(&self, keep: &HashSet<NodeIndex<Ix>>) -> Result<TaskGraph> {
        self.subgraph_with_edges(keep, |_, _| true)
    }

    fn subgraph_with_edges(&self, keep: &HashSet<NodeIndex<Ix>>, keep_edge: impl Fn(NodeIndex<Ix>, NodeIndex<Ix>) -> bool) -> Result<TaskGraph> {
        let mut out = TaskGraph::new();
        let mut remap: HashMap<NodeIndex<Ix>, NodeIndex<Ix>> = HashMap::new();
        for &old in keep {
            let task = self.dag.node_weight(old).expect("kept index is valid").clone();
            let new_idx = out.ensure_node(&task);
            remap.insert(old, new_idx);
            if let Some(status) = self.status.get(&task.path()) {
                out.status.insert(task.path(), status.clone());
            }
        }
        for &old in keep {
            for edge in self.dag.edges_directed(old, Direction::Outgoing) {
                let target = edge.target();
                if !keep.contains(&target) || !keep_edge(old, target) {
                    continue;
                }
                out.dag
                    .add_edge(remap[&old], remap[&target], *edge.weight())
                    .map_err(|_| KrakenError::Cycle { path: vec![] })?;
                if self.membership.contains(&(old, target)) {
                    out.membership.insert((remap[&old], remap[&target]));
                }
            }
        }
        Ok(out)
    }

    /// Per-invariant-4: a status may only be (re)assigned if the task has no
    /// recorded status, or its current status is `STARTED`, unless `force`.
    pub fn set_status(&mut self, task: &TaskHandle, status: TaskStatus, force: bool) -> Result<()> {
        if !force {
            if let Some(existing) = self.status.get(&task.path()) {
                if existing.kind != StatusKind::Started {
                    return Err(KrakenError::StatusLocked { task: task.path(), current: existing.to_string() });
                }
            }
        }
        self.status.insert(task.path(), status);
        Ok(())
    }

    pub fn status(&self, task: &TaskHandle) -> Option<&TaskStatus> {
        self.status.get(&task.path())
    }

    pub fn completed(&self) -> HashSet<String> {
        self.status.iter().filter(|(_, s)| s.is_ok()).map(|(p, _)| p.clone()).collect()
    }

    pub fn background(&self) -> HashSet<String> {
        self.status.iter().filter(|(_, s)| s.kind == StatusKind::Started).map(|(p, _)| p.clone()).collect()
    }

    pub fn is_complete(&self) -> bool {
        let completed = self.completed();
        self.dag.node_weights().all(|t| completed.contains(&t.path()))
    }

    /// Tasks with no recorded status and no unsatisfied strict predecessor.
    pub fn ready(&self) -> Vec<TaskHandle> {
        let completed = self.completed();
        self.dag
            .node_indices()
            .filter(|&idx| {
                let task = self.dag.node_weight(idx).expect("valid index");
                if self.status.contains_key(&task.path()) {
                    return false;
                }
                self.dag
                    .edges_directed(idx, Direction::Incoming)
                    .filter(|e| e.weight().strict)
                    .all(|e| completed.contains(&self.dag.node_weight(e.source()).expect("valid index").path()))
            })
            .map(|idx| self.dag.node_weight(idx).expect("valid index").clone())
            .collect()
    }

    /// Topological sort. `all=false` restricts to the current ready set
    /// (still internally ordered so non-strict edges among ready tasks are
    /// respected where possible).
    pub fn execution_order(&self, all: bool) -> Result<Vec<TaskHandle>> {
        if all {
            daggy::petgraph::algo::toposort(&*self.dag, None)
                .map(|order| {
                    order
                        .into_iter()
                        .map(|idx| self.dag.node_weight(idx).expect("valid index").clone())
                        .collect()
                })
                .map_err(|cycle| KrakenError::Cycle {
                    path: vec![self.dag.node_weight(cycle.node_id()).expect("valid index").path()],
                })
        } else {
            Ok(self.ready())
        }
    }

    pub fn tasks(&self, goals: Option<&[TaskHandle]>, pending: bool, failed: bool) -> Vec<TaskHandle> {
        let base: Vec<TaskHandle> = match goals {
            Some(g) => g.to_vec(),
            None => self.all_tasks(),
        };
        base.into_iter()
            .filter(|t| {
                let status = self.status(t);
                if pending && !matches!(status, None | Some(TaskStatus { kind: StatusKind::Pending, .. })) {
                    return false;
                }
                if failed && !matches!(status, Some(TaskStatus { kind: StatusKind::Failed, .. })) {
                    return false;
                }
                true
            })
            .collect()
    }

    /// For each task present in `other`, take the not-ok status if the two
    /// disagree, else keep either (preferring `other`'s).
    pub fn results_from(&mut self, other: &TaskGraph) {
        for (path, other_status) in &other.status {
            let merged = match self.status.get(path) {
                Some(mine) if mine.is_ok() && !other_status.is_ok() => other_status.clone(),
                Some(mine) if !mine.is_ok() && other_status.is_ok() => mine.clone(),
                _ => other_status.clone(),
            };
            self.status.insert(path.clone(), merged);
        }
    }

    /// Clears the status of every background task that is a direct
    /// predecessor of any still-pending task; it must rerun before those can
    /// execute.
    pub fn resume(&mut self) {
        let background = self.background();
        let pending_nodes: Vec<NodeIndex<Ix>> = self
            .dag
            .node_indices()
            .filter(|&idx| !self.status.contains_key(&self.dag.node_weight(idx).expect("valid index").path()))
            .collect();
        let mut to_clear = HashSet::new();
        for idx in pending_nodes {
            for edge in self.dag.edges_directed(idx, Direction::Incoming) {
                let pred_path = self.dag.node_weight(edge.source()).expect("valid index").path();
                if background.contains(&pred_path) {
                    to_clear.insert(pred_path);
                }
            }
        }
        for path in to_clear {
            self.status.remove(&path);
        }
    }

    pub fn restart(&mut self) {
        self.status.clear();
    }
}

impl Default for TaskGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::group::GroupCapability;
    use crate::task::void::VoidCapability;
    use crate::task::TaskKind;

    struct Noop;
    impl crate::task::TaskCapability for Noop {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
            Ok(TaskStatus::succeeded())
        }
    }

    fn linear_chain() -> (Context, TaskHandle, TaskHandle, TaskHandle) {
        let context = Context::for_testing();
        let root = context.root_project();
        let a = root.add_task("a", TaskKind::Plain, Box::new(Noop)).unwrap();
        let b = root.add_task("b", TaskKind::Plain, Box::new(Noop)).unwrap();
        let c = root.add_task("c", TaskKind::Plain, Box::new(Noop)).unwrap();
        b.add_relationship(crate::task::RelationshipTarget::Task(a.clone()), true, false);
        c.add_relationship(crate::task::RelationshipTarget::Task(b.clone()), true, false);
        (context, a, b, c)
    }

    #[test]
    fn ready_set_advances_through_linear_chain() {
        let (context, a, b, c) = linear_chain();
        let mut graph = TaskGraph::new();
        graph.add_task(&context, c.clone()).unwrap();

        assert_eq!(graph.ready().iter().map(TaskHandle::path).collect::<Vec<_>>(), vec![a.path()]);
        graph.set_status(&a, TaskStatus::succeeded(), false).unwrap();
        assert_eq!(graph.ready().iter().map(TaskHandle::path).collect::<Vec<_>>(), vec![b.path()]);
        graph.set_status(&b, TaskStatus::succeeded(), false).unwrap();
        assert_eq!(graph.ready().iter().map(TaskHandle::path).collect::<Vec<_>>(), vec![c.path()]);
        graph.set_status(&c, TaskStatus::succeeded(), false).unwrap();
        assert!(graph.ready().is_empty());
        assert!(graph.is_complete());
    }

    #[test]
    fn parallel_with_failure_blocks_downstream() {
        let context = Context::for_testing();
        let root = context.root_project();
        let a = root.add_task("a", TaskKind::Plain, Box::new(Noop)).unwrap();
        let b = root.add_task("b", TaskKind::Plain, Box::new(Noop)).unwrap();
        let c = root.add_task("c", TaskKind::Plain, Box::new(Noop)).unwrap();
        let d = root.add_task("d", TaskKind::Plain, Box::new(Noop)).unwrap();
        c.add_relationship(crate::task::RelationshipTarget::Task(a.clone()), true, false);
        d.add_relationship(crate::task::RelationshipTarget::Task(b.clone()), true, false);
        d.add_relationship(crate::task::RelationshipTarget::Task(c.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, d.clone()).unwrap();
        graph.set_status(&a, TaskStatus::succeeded(), false).unwrap();
        graph.set_status(&b, TaskStatus::failed("boom"), false).unwrap();
        graph.set_status(&c, TaskStatus::succeeded(), false).unwrap();

        assert!(graph.ready().is_empty());
        assert!(!graph.is_complete());
    }

    #[test]
    fn cycle_is_rejected() {
        let context = Context::for_testing();
        let root = context.root_project();
        let a = root.add_task("a", TaskKind::Plain, Box::new(Noop)).unwrap();
        let b = root.add_task("b", TaskKind::Plain, Box::new(Noop)).unwrap();
        a.add_relationship(crate::task::RelationshipTarget::Task(b.clone()), true, false);
        b.add_relationship(crate::task::RelationshipTarget::Task(a.clone()), true, false);

        let mut graph = TaskGraph::new();
        assert!(graph.add_task(&context, a).is_err());
    }

    #[test]
    fn trim_keeps_only_strict_predecessor_closure() {
        let context = Context::for_testing();
        let root = context.root_project();
        let goal = root.add_task("goal", TaskKind::Plain, Box::new(Noop)).unwrap();
        let needed = root.add_task("needed", TaskKind::Plain, Box::new(Noop)).unwrap();
        let unrelated = root.add_task("unrelated", TaskKind::Plain, Box::new(Noop)).unwrap();
        goal.add_relationship(crate::task::RelationshipTarget::Task(needed.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, goal.clone()).unwrap();
        graph.add_task(&context, unrelated.clone()).unwrap();

        let trimmed = graph.trim(&[goal.clone()]).unwrap();
        assert!(trimmed.contains(&goal));
        assert!(trimmed.contains(&needed));
        assert!(!trimmed.contains(&unrelated));
    }

    #[test]
    fn group_dependency_propagates_to_members() {
        let context = Context::for_testing();
        let root = context.root_project();
        let ta1 = root.add_task("ta1", TaskKind::Plain, Box::new(Noop)).unwrap();
        let ta2 = root.add_task("ta2", TaskKind::Plain, Box::new(Noop)).unwrap();
        let group_a = root
            .add_task("groupA", TaskKind::Group, Box::new(GroupCapability::new(vec![ta1.clone(), ta2.clone()])))
            .unwrap();
        let tb1 = root.add_task("tb1", TaskKind::Plain, Box::new(Noop)).unwrap();
        let group_b = root
            .add_task("groupB", TaskKind::Group, Box::new(GroupCapability::new(vec![tb1.clone()])))
            .unwrap();
        group_b.add_relationship(crate::task::RelationshipTarget::Task(group_a.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, group_b.clone()).unwrap();
        let order = graph.execution_order(true).unwrap();
        let pos = |p: &str| order.iter().position(|t| t.path() == p).unwrap();
        assert!(pos(&ta1.path()) < pos(&tb1.path()));
        assert!(pos(&ta2.path()) < pos(&tb1.path()));
    }

    #[test]
    fn group_with_non_member_dependency_unfurls_to_the_whole_group() {
        let context = Context::for_testing();
        let root = context.root_project();
        let python_install = root.add_task("pythonInstall", TaskKind::Plain, Box::new(Noop)).unwrap();
        let build = root.add_task("build", TaskKind::Plain, Box::new(Noop)).unwrap();
        let jtd_python = root.add_task("jtd.python", TaskKind::Plain, Box::new(Noop)).unwrap();
        let pytest = root.add_task("pytest", TaskKind::Plain, Box::new(Noop)).unwrap();
        let gen = root
            .add_task("gen", TaskKind::Group, Box::new(GroupCapability::new(vec![build.clone(), jtd_python.clone()])))
            .unwrap();

        pytest.add_relationship(crate::task::RelationshipTarget::Task(python_install.clone()), true, false);
        pytest.add_relationship(crate::task::RelationshipTarget::Task(build.clone()), false, false);
        jtd_python.add_relationship(crate::task::RelationshipTarget::Task(python_install.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, pytest.clone()).unwrap();
        graph.add_task(&context, gen.clone()).unwrap();

        let order = graph.execution_order(true).unwrap();
        let pos = |p: &str| order.iter().position(|t| t.path() == p).unwrap();
        assert!(pos(&python_install.path()) < pos(&jtd_python.path()));
        assert!(pos(&jtd_python.path()) < pos(&gen.path()));
        assert!(pos(&gen.path()) < pos(&pytest.path()));

        // The unfurled edge from `gen` to `pytest` is non-strict (it came
        // from pytest's non-strict relationship to `build`): it influences
        // the reported order above but never blocks readiness, so pytest can
        // become ready as soon as its one strict predecessor is done.
        graph.set_status(&python_install, TaskStatus::succeeded(), false).unwrap();
        assert!(graph.ready().iter().any(|t| t.path() == pytest.path()));
    }

    #[test]
    fn exclude_bare_drops_only_the_named_task() {
        let context = Context::for_testing();
        let root = context.root_project();
        let a = root.add_task("a", TaskKind::Plain, Box::new(Noop)).unwrap();
        let b = root.add_task("b", TaskKind::Plain, Box::new(Noop)).unwrap();
        b.add_relationship(crate::task::RelationshipTarget::Task(a.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, b.clone()).unwrap();
        let excluded = graph.exclude(&[a.clone()], &[]);
        assert!(!excluded.contains(&a));
        assert!(excluded.contains(&b));
        assert!(excluded.ready().iter().any(|t| t.path() == b.path()));
    }

    #[test]
    fn exclude_subgraph_also_drops_successors() {
        let context = Context::for_testing();
        let root = context.root_project();
        let a = root.add_task("a", TaskKind::Plain, Box::new(Noop)).unwrap();
        let b = root.add_task("b", TaskKind::Plain, Box::new(Noop)).unwrap();
        b.add_relationship(crate::task::RelationshipTarget::Task(a.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, b.clone()).unwrap();
        let excluded = graph.exclude(&[], &[a.clone()]);
        assert!(!excluded.contains(&a));
        assert!(!excluded.contains(&b));
    }

    #[test]
    fn void_task_skips_and_never_executes() {
        let task = VoidCapability::new_task("noop", ":");
        let status = task.prepare().unwrap();
        assert!(status.is_skipped());
    }
}
