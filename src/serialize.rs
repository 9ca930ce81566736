//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Snapshot persistence for `--resume`.
//!
//! A snapshot captures a [`TaskGraph`]'s node set, edge set, and status map
//! as self-describing JSON — diffable on disk, unlike a bincode blob,
//! matching why the rest of this workspace already carries `serde_json` for
//! its own on-disk records.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{KrakenError, Result};
use crate::graph::{EdgeMeta, TaskGraph};
use crate::task::TaskStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotEdge {
    pub from: String,
    pub to: String,
    pub strict: bool,
    pub implicit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub nodes: Vec<String>,
    pub edges: Vec<SnapshotEdge>,
    pub status: HashMap<String, TaskStatus>,
}

impl Snapshot {
    pub fn capture(graph: &TaskGraph) -> Self {
        let mut nodes: Vec<String> = graph.all_tasks().iter().map(|t| t.path()).collect();
        nodes.sort();
        let mut edges: Vec<SnapshotEdge> = graph
            .edges()
            .into_iter()
            .map(|(from, to, EdgeMeta { strict, implicit })| SnapshotEdge { from, to, strict, implicit })
            .collect();
        edges.sort();
        let status = graph
            .all_tasks()
            .iter()
            .filter_map(|t| graph.status(t).map(|s| (t.path(), s.clone())))
            .collect();
        Snapshot { captured_at: Utc::now(), nodes, edges, status }
    }

    /// Applies the statuses recorded in this snapshot onto a freshly built
    /// graph (whose node/edge set comes from re-running the loader), the way
    /// `--resume` reconstructs a graph on a fresh process.
    pub fn apply_to(&self, graph: &mut TaskGraph) {
        graph.apply_statuses(&self.status);
    }

    /// Folds `other`'s statuses into `self`'s per `TaskGraph::results_from`:
    /// the not-ok status wins on disagreement, else either (preferring
    /// `other`'s); node/edge sets are unioned.
    pub fn merge(mut self, other: &Snapshot) -> Self {
        self.captured_at = self.captured_at.max(other.captured_at);
        for node in &other.nodes {
            if !self.nodes.contains(node) {
                self.nodes.push(node.clone());
            }
        }
        for edge in &other.edges {
            if !self.edges.contains(edge) {
                self.edges.push(edge.clone());
            }
        }
        for (path, other_status) in &other.status {
            let merged = match self.status.get(path) {
                Some(mine) if mine.is_ok() && !other_status.is_ok() => other_status.clone(),
                Some(mine) if !mine.is_ok() && other_status.is_ok() => mine.clone(),
                _ => other_status.clone(),
            };
            self.status.insert(path.clone(), merged);
        }
        self.nodes.sort();
        self.edges.sort();
        self
    }
}

fn snapshot_file_name() -> String {
    let id = &uuid::Uuid::new_v4().simple().to_string()[..7];
    format!("state-{id}.json")
}

/// Writes `snapshot` under a freshly generated `state-<7-hex>.json` name,
/// re-rolling the id on collision with an existing file.
pub fn save(state_dir: &Path, snapshot: &Snapshot) -> Result<PathBuf> {
    fs::create_dir_all(state_dir).map_err(|e| KrakenError::TaskPanic { task: "serialize::save".to_string(), source: e.into() })?;
    loop {
        let path = state_dir.join(snapshot_file_name());
        if path.exists() {
            continue;
        }
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| KrakenError::TaskPanic { task: "serialize::save".to_string(), source: e.into() })?;
        fs::write(&path, json).map_err(|e| KrakenError::TaskPanic { task: "serialize::save".to_string(), source: e.into() })?;
        return Ok(path);
    }
}

pub fn load(path: &Path) -> Result<Snapshot> {
    let json = fs::read_to_string(path).map_err(|e| KrakenError::TaskPanic { task: "serialize::load".to_string(), source: e.into() })?;
    serde_json::from_str(&json).map_err(|e| KrakenError::TaskPanic { task: "serialize::load".to_string(), source: e.into() })
}

/// Loads every `state-*.json` file from `state_dir` and folds them pairwise
/// via [`Snapshot::merge`].
pub fn load_all(state_dir: &Path) -> Result<Option<Snapshot>> {
    if !state_dir.exists() {
        return Ok(None);
    }
    let mut paths: Vec<PathBuf> = fs::read_dir(state_dir)
        .map_err(|e| KrakenError::TaskPanic { task: "serialize::load_all".to_string(), source: e.into() })?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.file_name().and_then(|n| n.to_str()).map(|n| n.starts_with("state-") && n.ends_with(".json")).unwrap_or(false))
        .collect();
    paths.sort();

    let mut merged: Option<Snapshot> = None;
    for path in &paths {
        let snapshot = load(path)?;
        merged = Some(match merged {
            Some(existing) => existing.merge(&snapshot),
            None => snapshot,
        });
    }
    Ok(merged)
}

/// Removes every `state-*.json` file in `state_dir` other than `keep`.
pub fn prune_other_snapshots(state_dir: &Path, keep: &Path) -> Result<()> {
    if !state_dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(state_dir).map_err(|e| KrakenError::TaskPanic { task: "serialize::prune".to_string(), source: e.into() })? {
        let path = entry.map_err(|e| KrakenError::TaskPanic { task: "serialize::prune".to_string(), source: e.into() })?.path();
        let is_snapshot = path.file_name().and_then(|n| n.to_str()).map(|n| n.starts_with("state-") && n.ends_with(".json")).unwrap_or(false);
        if is_snapshot && path != keep {
            let _ = fs::remove_file(&path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::task::{TaskCapability, TaskHandle, TaskKind, TaskStatus as TStatus};

    struct Noop;
    impl TaskCapability for Noop {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TStatus> {
            Ok(TStatus::succeeded())
        }
    }

    #[test]
    fn round_trip_preserves_nodes_edges_and_status() {
        let context = Context::for_testing();
        let root = context.root_project();
        let a = root.add_task("a", TaskKind::Plain, Box::new(Noop)).unwrap();
        let b = root.add_task("b", TaskKind::Plain, Box::new(Noop)).unwrap();
        b.add_relationship(crate::task::RelationshipTarget::Task(a.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, b.clone()).unwrap();
        graph.set_status(&a, TaskStatus::succeeded(), false).unwrap();

        let snapshot = Snapshot::capture(&graph);
        let nonce = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        let dir = std::env::temp_dir().join(format!("kraken-core-test-{nonce}"));
        let path = save(&dir, &snapshot).unwrap();
        let loaded = load(&path).unwrap();

        assert_eq!(snapshot.nodes, loaded.nodes);
        assert_eq!(snapshot.edges, loaded.edges);
        assert_eq!(snapshot.status, loaded.status);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn merge_prefers_not_ok_status() {
        let mut a = Snapshot { captured_at: Utc::now(), nodes: vec![":t".into()], edges: vec![], status: HashMap::new() };
        a.status.insert(":t".into(), TStatus::succeeded());
        let mut b = Snapshot { captured_at: Utc::now(), nodes: vec![":t".into()], edges: vec![], status: HashMap::new() };
        b.status.insert(":t".into(), TStatus::failed("boom"));

        let merged = a.merge(&b);
        assert!(merged.status[":t"].is_failed());
    }
}
