//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Domain error types for the orchestration engine.
//!
//! Most call sites in this crate return `anyhow::Result` and attach context
//! with `.context(...)`, the way the rest of this workspace does; the
//! variants below exist so that callers who need to distinguish *why*
//! something failed (the executor, the CLI summary, tests) can match on a
//! concrete error kind instead of string-sniffing an `anyhow::Error`.

use std::path::PathBuf;

/// Errors raised by the property/supplier, task, project, graph and
/// executor subsystems.
#[derive(Debug, thiserror::Error)]
pub enum KrakenError {
    /// A [`crate::supplier::Supplier`] or [`crate::property::Property`] was read while empty.
    #[error("{}", message.as_deref().map(|m| format!("{m} ({label})")).unwrap_or_else(|| format!("empty supplier ({label})")))]
    Empty { label: String, message: Option<String> },

    /// A value did not satisfy any branch of a property's declared item-type.
    #[error("value does not satisfy item-type {expected}: {reason}")]
    TypeMismatch { expected: String, reason: String },

    /// `set`/`setmap`/`clear` was called on a property that has been finalized.
    #[error("property {0:?} is finalized and cannot be modified")]
    Finalized(String),

    /// A task selector did not match any task and was not marked optional.
    #[error("no tasks matched selector {0:?}")]
    SelectorNoMatch(String),

    /// An intermediate project component named in a selector does not exist.
    #[error("project {0:?} does not exist")]
    ProjectNotFound(String),

    /// `TaskGraph::trim` (or construction) found a cycle among strict edges.
    #[error("cycle detected in task graph: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A project already has a member (task or child project) with this name.
    #[error("project {project:?} already has a member named {name:?}")]
    DuplicateMember { project: String, name: String },

    /// A task's `execute`/`prepare`/`teardown` panicked or returned an
    /// unhandled error.
    ///
    /// `anyhow::Error` doesn't implement `std::error::Error` itself (so it
    /// can't be `#[source]`), but it does implement `Display`, which is all
    /// the format string below needs.
    #[error("unhandled exception in task {task:?}: {source}")]
    TaskPanic { task: String, source: anyhow::Error },

    /// `TaskGraph::set_status` was called on a task that already has a
    /// terminal (non-`STARTED`) status, without `_force`.
    #[error("task {task:?} already has a terminal status {current} and cannot be reassigned without force")]
    StatusLocked { task: String, current: String },

    /// The graph executor was interrupted (Ctrl-C or similar) mid-execution.
    #[error("build was interrupted")]
    Interrupted,

    /// A directory did not contain a loadable project script.
    #[error("no project script found in {}", .0.display())]
    NoScriptFound(PathBuf),
}

/// Raised by [`crate::context::Context::execute`] when one or more goal tasks
/// did not complete successfully.
#[derive(Debug, thiserror::Error)]
#[error("{}", render_failed_tasks(failed_tasks))]
pub struct BuildError {
    pub failed_tasks: Vec<String>,
}

fn render_failed_tasks(failed_tasks: &[String]) -> String {
    match failed_tasks {
        [one] => format!("task {one:?} failed"),
        many => {
            let joined = many.iter().map(|t| format!("{t:?}")).collect::<Vec<_>>().join(", ");
            format!("tasks {joined} failed")
        }
    }
}

pub type Result<T> = std::result::Result<T, KrakenError>;
