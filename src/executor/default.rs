//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! The straightforward executor pairing: `DefaultTaskExecutor` runs tasks
//! inline, `DefaultGraphExecutor` drives the graph, and
//! `DefaultPrintingExecutorObserver` reports progress to the terminal.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;

use colored::Colorize;
use tracing::{debug, warn};

use super::{GraphExecutor, GraphExecutorObserver, Rememberer, TaskExecutor};
use crate::context::Context;
use crate::graph::TaskGraph;
use crate::task::{TaskHandle, TaskKind, TaskStatus};

/// Runs `prepare`/`execute`/`teardown` inline, catching panics and
/// converting them to `Failed`.
pub struct DefaultTaskExecutor;

impl DefaultTaskExecutor {
    fn call(task: &TaskHandle, f: impl FnOnce(&TaskHandle) -> anyhow::Result<TaskStatus>) -> TaskStatus {
        match catch_unwind(AssertUnwindSafe(|| f(task))) {
            Ok(Ok(status)) => status,
            Ok(Err(error)) => TaskStatus::failed(format!("unhandled exception: {error}")),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "panic with non-string payload".to_string());
                TaskStatus::failed(format!("unhandled exception: {message}"))
            }
        }
    }
}

impl TaskExecutor for DefaultTaskExecutor {
    fn execute_task(&self, task: &TaskHandle) -> TaskStatus {
        Self::call(task, |t| t.execute())
    }

    fn teardown_task(&self, task: &TaskHandle) -> TaskStatus {
        Self::call(task, |t| t.teardown())
    }
}

/// The cooperative scheduling loop driving a [`TaskGraph`] to completion.
pub struct DefaultGraphExecutor {
    task_executor: Box<dyn TaskExecutor>,
    observer: Box<dyn GraphExecutorObserver>,
}

impl DefaultGraphExecutor {
    pub fn new() -> Self {
        DefaultGraphExecutor { task_executor: Box::new(DefaultTaskExecutor), observer: Box::new(DefaultPrintingExecutorObserver::new()) }
    }

    pub fn with(task_executor: Box<dyn TaskExecutor>, observer: Box<dyn GraphExecutorObserver>) -> Self {
        DefaultGraphExecutor { task_executor, observer }
    }
}

impl Default for DefaultGraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphExecutor for DefaultGraphExecutor {
    fn execute(&self, _context: &Context, graph: &mut TaskGraph) {
        let mut rememberer = Rememberer::new();
        let mut interrupted = false;

        self.observer.before_execute_graph(graph);

        while !graph.is_complete() && !interrupted {
            let batch = graph.ready();
            if batch.is_empty() {
                break;
            }
            for task in &batch {
                if interrupted {
                    break;
                }
                self.observer.before_prepare_task(task);
                let status = match task.prepare() {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(task = %task.path(), error = %e, "prepare() failed, treating task as failed");
                        TaskStatus::failed(format!("unhandled exception in prepare: {e}"))
                    }
                };
                self.observer.after_prepare_task(task, &status);

                if status.is_pending() {
                    self.observer.before_execute_task(task, &status);
                    let status = self.task_executor.execute_task(task);
                    self.observer.after_execute_task(task, &status);
                    if status.is_started() {
                        let successors: HashSet<String> = graph.successors(task).into_iter().map(|t| t.path()).collect();
                        graph.set_status(task, status, false).expect("fresh status assignment");
                        rememberer.remember(task.clone(), successors);
                    } else {
                        if status.is_interrupted() {
                            interrupted = true;
                        }
                        graph.set_status(task, status, false).expect("fresh status assignment");
                        for done in rememberer.done(task) {
                            self.teardown_one(graph, &mut rememberer, &done, &mut interrupted);
                        }
                    }
                } else {
                    graph.set_status(task, status, false).expect("fresh status assignment");
                }
            }
        }

        for task in rememberer.forget_all() {
            self.teardown_one(graph, &mut rememberer, &task, &mut interrupted);
        }
        self.observer.after_execute_graph(graph);
    }
}

impl DefaultGraphExecutor {
    fn teardown_one(&self, graph: &mut TaskGraph, rememberer: &mut Rememberer, task: &TaskHandle, interrupted: &mut bool) {
        self.observer.before_teardown_task(task);
        let status = self.task_executor.teardown_task(task);
        if status.is_interrupted() {
            *interrupted = true;
        }
        graph.set_status(task, status.clone(), true).expect("teardown always force-updates");
        self.observer.after_teardown_task(task, &status);
        for done in rememberer.done(task) {
            self.teardown_one(graph, rememberer, &done, interrupted);
        }
    }
}

/// Prints a live trace during execution and a final summary table, skipping
/// skipped `Group`/`Void` tasks from the summary the way the original does
/// (they carry no information a user would act on).
pub struct DefaultPrintingExecutorObserver {
    execute_prefix: &'static str,
    teardown_prefix: &'static str,
    status: std::cell::RefCell<Vec<(String, TaskStatus)>>,
    started: std::cell::RefCell<std::collections::HashMap<String, Instant>>,
    duration: std::cell::RefCell<std::collections::HashMap<String, std::time::Duration>>,
}

impl DefaultPrintingExecutorObserver {
    pub fn new() -> Self {
        DefaultPrintingExecutorObserver {
            execute_prefix: ">",
            teardown_prefix: "X",
            status: std::cell::RefCell::new(Vec::new()),
            started: std::cell::RefCell::new(std::collections::HashMap::new()),
            duration: std::cell::RefCell::new(std::collections::HashMap::new()),
        }
    }

    fn should_report(task: &TaskHandle, status: &TaskStatus) -> bool {
        !(matches!(task.kind(), TaskKind::Group | TaskKind::Void) && status.is_skipped())
    }

    fn colored_status(status: &TaskStatus) -> colored::ColoredString {
        let text = status.to_string();
        if status.is_ok() {
            text.green()
        } else if status.is_failed() || status.is_interrupted() {
            text.red()
        } else if status.is_started() {
            text.cyan()
        } else {
            text.normal()
        }
    }

    fn record(&self, task: &TaskHandle, status: TaskStatus) {
        let path = task.path();
        if let Some(start) = self.started.borrow_mut().remove(&path) {
            self.duration.borrow_mut().insert(path.clone(), start.elapsed());
        }
        self.status.borrow_mut().push((path, status));
    }
}

impl Default for DefaultPrintingExecutorObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphExecutorObserver for DefaultPrintingExecutorObserver {
    fn before_execute_graph(&self, _graph: &TaskGraph) {
        println!("\nStart build\n");
    }

    fn after_execute_graph(&self, _graph: &TaskGraph) {
        println!("\nBuild summary\n");
        for (path, status) in self.status.borrow().iter() {
            let duration = self
                .duration
                .borrow()
                .get(path)
                .map(|d| format!(" [{}]", humantime::format_duration(std::time::Duration::from_secs(d.as_secs()))))
                .unwrap_or_default();
            println!("  {path} {}{duration}", Self::colored_status(status));
        }
        println!();
    }

    fn before_execute_task(&self, task: &TaskHandle, status: &TaskStatus) {
        debug!(task = %task.path(), %status, "executing");
        println!("{} {} {}", self.execute_prefix, task.path(), Self::colored_status(status));
        self.started.borrow_mut().insert(task.path(), Instant::now());
    }

    fn after_execute_task(&self, task: &TaskHandle, status: &TaskStatus) {
        if Self::should_report(task, status) {
            println!("{} {} {}", self.execute_prefix, task.path(), Self::colored_status(status));
        }
        self.record(task, status.clone());
    }

    fn before_teardown_task(&self, task: &TaskHandle) {
        println!("{} {}", self.teardown_prefix, task.path());
    }

    fn after_teardown_task(&self, task: &TaskHandle, status: &TaskStatus) {
        println!("{} {} {}", self.teardown_prefix, task.path(), Self::colored_status(status));
        self.record(task, status.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskCapability, TaskKind as Kind};

    struct Succeeds;
    impl TaskCapability for Succeeds {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
            Ok(TaskStatus::succeeded())
        }
    }

    struct Boom;
    impl TaskCapability for Boom {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
            anyhow::bail!("boom")
        }
    }

    struct Panics;
    impl TaskCapability for Panics {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
            panic!("kaboom")
        }
    }

    #[test]
    fn execute_task_succeeds() {
        let task = TaskHandle::new("t", ":", Kind::Plain, Box::new(Succeeds));
        let status = DefaultTaskExecutor.execute_task(&task);
        assert!(status.is_ok());
    }

    #[test]
    fn execute_task_converts_error_to_failed() {
        let task = TaskHandle::new("t", ":", Kind::Plain, Box::new(Boom));
        let status = DefaultTaskExecutor.execute_task(&task);
        assert!(status.is_failed());
    }

    #[test]
    fn execute_task_converts_panic_to_failed() {
        let task = TaskHandle::new("t", ":", Kind::Plain, Box::new(Panics));
        let status = DefaultTaskExecutor.execute_task(&task);
        assert!(status.is_failed());
    }

    #[test]
    fn linear_chain_runs_to_completion() {
        let context = Context::for_testing();
        let root = context.root_project();
        let a = root.add_task("a", Kind::Plain, Box::new(Succeeds)).unwrap();
        let b = root.add_task("b", Kind::Plain, Box::new(Succeeds)).unwrap();
        b.add_relationship(crate::task::RelationshipTarget::Task(a.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, b.clone()).unwrap();
        let executor = DefaultGraphExecutor::new();
        executor.execute(&context, &mut graph);

        assert!(graph.is_complete());
        assert!(graph.status(&a).unwrap().is_ok());
        assert!(graph.status(&b).unwrap().is_ok());
    }

    #[test]
    fn background_task_is_torn_down_after_last_successor() {
        let context = Context::for_testing();
        let root = context.root_project();
        struct Server;
        impl TaskCapability for Server {
            fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
                Ok(TaskStatus::started())
            }
            fn teardown(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
                Ok(TaskStatus::succeeded())
            }
        }
        let server = root.add_task("server", Kind::Background, Box::new(Server)).unwrap();
        let leaf = root.add_task("leaf", Kind::Plain, Box::new(Succeeds)).unwrap();
        leaf.add_relationship(crate::task::RelationshipTarget::Task(server.clone()), true, false);

        let mut graph = TaskGraph::new();
        graph.add_task(&context, leaf.clone()).unwrap();
        let executor = DefaultGraphExecutor::new();
        executor.execute(&context, &mut graph);

        assert!(graph.is_complete());
        assert!(graph.status(&leaf).unwrap().is_ok());
        assert!(graph.status(&server).unwrap().is_ok());
        assert!(!graph.status(&server).unwrap().is_started());
    }
}
