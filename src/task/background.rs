//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Background tasks: `execute` returns `Started` and `teardown` is invoked
//! later, once no outgoing successor remains.

use super::{TaskCapability, TaskHandle, TaskStatus};

/// A scoped cleanup region, modeled after Python's `contextlib.ExitStack`:
/// callbacks registered with [`defer`](Self::defer) run in LIFO order when
/// the scope is [`close`](Self::close)d.
#[derive(Default)]
pub struct TeardownScope {
    callbacks: Vec<Box<dyn FnOnce()>>,
}

impl TeardownScope {
    pub fn new() -> Self {
        TeardownScope { callbacks: Vec::new() }
    }

    pub fn defer(&mut self, callback: impl FnOnce() + 'static) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn close(mut self) {
        while let Some(callback) = self.callbacks.pop() {
            callback();
        }
    }
}

/// Implemented by background task types; `start_background_task` receives
/// the scope so it can register cleanup before returning `Started`.
pub trait BackgroundWork {
    fn start_background_task(&self, task: &TaskHandle, scope: &mut TeardownScope) -> anyhow::Result<TaskStatus>;
}

/// The [`TaskCapability`] wrapping a [`BackgroundWork`] implementation.
///
/// `execute` opens a scope, invokes the hook, and on a normal `Started`
/// return keeps the scope open (installed on the task for later
/// `teardown`); any other status or error closes it immediately.
/// `teardown` closes whatever scope is still installed.
pub struct BackgroundCapability<W> {
    work: W,
}

impl<W: BackgroundWork> BackgroundCapability<W> {
    pub fn new(work: W) -> Self {
        BackgroundCapability { work }
    }
}

impl<W: BackgroundWork> TaskCapability for BackgroundCapability<W> {
    fn execute(&self, task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        let mut scope = TeardownScope::new();
        match self.work.start_background_task(task, &mut scope) {
            Ok(status) if status.is_started() => {
                task.install_teardown_scope(scope);
                Ok(status)
            }
            Ok(status) => {
                scope.close();
                Ok(status)
            }
            Err(e) => {
                scope.close();
                Err(e)
            }
        }
    }

    fn teardown(&self, task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        if let Some(scope) = task.take_teardown_scope() {
            scope.close();
        }
        Ok(TaskStatus::succeeded())
    }
}
