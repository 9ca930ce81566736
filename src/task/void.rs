//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! A trivial task that is skipped unless explicitly told not to.

use super::{TaskCapability, TaskHandle, TaskStatus};
use crate::property::Value;

pub struct VoidCapability;

impl VoidCapability {
    /// Builds a new void task: a task handle whose capability declares the
    /// `skip` (default `true`) and `message` properties, backed by this
    /// capability. Two-phase because the properties need an existing task
    /// handle (for their owner path) before the capability that reads them
    /// can itself be constructed.
    pub fn new_task(name: impl Into<String>, project_path: impl Into<String>) -> TaskHandle {
        struct Placeholder;
        impl TaskCapability for Placeholder {
            fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
                Ok(TaskStatus::succeeded())
            }
        }

        let task = TaskHandle::new(name, project_path, super::TaskKind::Void, Box::new(Placeholder));
        let skip = task.declare_property("skip", false, vec!["bool"]);
        skip.setdefault(Value::Bool(true)).expect("fresh property is never finalized");
        task.declare_property("message", false, vec!["string"]);
        task.set_capability(Box::new(VoidCapability));
        task
    }
}

impl TaskCapability for VoidCapability {
    fn prepare(&self, task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        let skip = task
            .property("skip")
            .and_then(|p| p.get().ok())
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        if skip {
            let message = task
                .property("message")
                .and_then(|p| p.get().ok())
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            Ok(TaskStatus::skipped(message))
        } else {
            Ok(TaskStatus::pending())
        }
    }

    fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        Ok(TaskStatus::succeeded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_by_default() {
        let task = VoidCapability::new_task("noop", ":");
        let status = task.prepare().unwrap();
        assert!(status.is_skipped());
    }

    #[test]
    fn runs_when_skip_is_false() {
        let task = VoidCapability::new_task("noop", ":");
        task.property("skip").unwrap().clear().unwrap();
        task.property("skip").unwrap().set(Value::Bool(false)).unwrap();
        let status = task.prepare().unwrap();
        assert!(status.is_pending());
        assert!(task.execute().unwrap().is_ok());
    }
}
