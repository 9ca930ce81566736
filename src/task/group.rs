//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Groups aggregate other tasks as strict predecessors without performing
//! any work of their own.

use super::{TaskCapability, TaskHandle, TaskStatus};

pub struct GroupCapability {
    members: Vec<TaskHandle>,
}

impl GroupCapability {
    pub fn new(members: Vec<TaskHandle>) -> Self {
        GroupCapability { members }
    }

    pub fn members(&self) -> &[TaskHandle] {
        &self.members
    }

    pub fn add_member(&mut self, task: TaskHandle) {
        self.members.push(task);
    }
}

impl TaskCapability for GroupCapability {
    fn prepare(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        Ok(TaskStatus::skipped("is a GroupTask"))
    }

    fn execute(&self, task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        // `prepare` always returns a non-pending status for a group, so the
        // executor never calls `execute` on one; reaching this is a misuse.
        Err(anyhow::anyhow!("GroupTask {:?} must not be executed directly", task.path()))
    }

    fn implicit_relationships(&self, _task: &TaskHandle) -> Vec<(TaskHandle, bool, bool)> {
        self.members.iter().map(|m| (m.clone(), true, false)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskKind;

    struct Noop;
    impl TaskCapability for Noop {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
            Ok(TaskStatus::succeeded())
        }
    }

    #[test]
    fn prepare_is_always_skipped() {
        let member = TaskHandle::new("a", ":", TaskKind::Plain, Box::new(Noop));
        let group = TaskHandle::new(
            "g",
            ":",
            TaskKind::Group,
            Box::new(GroupCapability::new(vec![member.clone()])),
        );
        let status = group.prepare().unwrap();
        assert!(status.is_skipped());
    }

    #[test]
    fn members_become_implicit_relationships() {
        let member = TaskHandle::new("a", ":", TaskKind::Plain, Box::new(Noop));
        let group = TaskHandle::new(
            "g",
            ":",
            TaskKind::Group,
            Box::new(GroupCapability::new(vec![member.clone()])),
        );
        let rels = group.get_relationships(&crate::context::Context::for_testing()).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].0.path(), member.path());
        assert!(rels[0].1);
        assert!(!rels[0].2);
    }
}
