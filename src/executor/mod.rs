//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Scheduling: orders the ready set, invokes `prepare`/`execute`/`teardown`,
//! and handles background-task teardown and interruption.
//!
//! A concurrent scheduler might thread a `done` callback through
//! `TaskExecutor` to support out-of-order completion; this crate's scheduler
//! is single-threaded cooperative, so [`TaskExecutor`] simply returns the
//! status instead of taking a callback.

pub mod default;
pub mod rememberer;

pub use default::{DefaultGraphExecutor, DefaultPrintingExecutorObserver, DefaultTaskExecutor};
pub use rememberer::Rememberer;

use crate::context::Context;
use crate::graph::TaskGraph;
use crate::task::{TaskHandle, TaskStatus};

/// Executes individual tasks. The default implementation runs them inline;
/// an alternative backend (e.g. sandboxed or remote) implements this trait.
pub trait TaskExecutor {
    fn execute_task(&self, task: &TaskHandle) -> TaskStatus;
    fn teardown_task(&self, task: &TaskHandle) -> TaskStatus;
}

/// Observer hooks fired around graph and task execution: a trait object
/// invoked synchronously on the executor's thread.
#[allow(unused_variables)]
pub trait GraphExecutorObserver {
    fn before_execute_graph(&self, graph: &TaskGraph) {}
    fn after_execute_graph(&self, graph: &TaskGraph) {}
    fn before_prepare_task(&self, task: &TaskHandle) {}
    fn after_prepare_task(&self, task: &TaskHandle, status: &TaskStatus) {}
    fn before_execute_task(&self, task: &TaskHandle, status: &TaskStatus) {}
    fn after_execute_task(&self, task: &TaskHandle, status: &TaskStatus) {}
    fn before_teardown_task(&self, task: &TaskHandle) {}
    fn after_teardown_task(&self, task: &TaskHandle, status: &TaskStatus) {}
}

/// Drives a [`TaskGraph`] to completion (or interruption).
pub trait GraphExecutor {
    fn execute(&self, context: &Context, graph: &mut TaskGraph);
}
