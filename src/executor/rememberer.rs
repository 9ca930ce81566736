//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Defers background-task teardown until no outgoing successor remains.

use std::collections::{HashMap, HashSet};

use crate::task::TaskHandle;

#[derive(Default)]
pub struct Rememberer {
    waiting: HashMap<String, (TaskHandle, HashSet<String>)>,
}

impl Rememberer {
    pub fn new() -> Self {
        Rememberer { waiting: HashMap::new() }
    }

    /// Registers `task` (which returned `Started`) to be torn down once
    /// every one of `successors` has itself finished.
    pub fn remember(&mut self, task: TaskHandle, successors: HashSet<String>) {
        self.waiting.insert(task.path(), (task, successors));
    }

    /// Call with every task as soon as it finishes (execute or teardown).
    /// Returns the remembered tasks for which `finished` was their last
    /// outstanding successor.
    pub fn done(&mut self, finished: &TaskHandle) -> Vec<TaskHandle> {
        for (_, successors) in self.waiting.values_mut() {
            successors.remove(&finished.path());
        }
        let ready: Vec<String> = self
            .waiting
            .iter()
            .filter(|(_, (_, successors))| successors.is_empty())
            .map(|(path, _)| path.clone())
            .collect();
        ready.into_iter().filter_map(|path| self.waiting.remove(&path)).map(|(task, _)| task).collect()
    }

    /// Drains every remaining remembered task regardless of its successor
    /// set; used once graph execution stops (normally or by interruption).
    pub fn forget_all(&mut self) -> Vec<TaskHandle> {
        self.waiting.drain().map(|(_, (task, _))| task).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskCapability, TaskKind, TaskStatus};

    struct Noop;
    impl TaskCapability for Noop {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
            Ok(TaskStatus::succeeded())
        }
    }

    #[test]
    fn task_is_released_once_every_successor_is_done() {
        let mut rememberer = Rememberer::new();
        let server = TaskHandle::new("server", ":", TaskKind::Background, Box::new(Noop));
        let a = TaskHandle::new("a", ":", TaskKind::Plain, Box::new(Noop));
        let b = TaskHandle::new("b", ":", TaskKind::Plain, Box::new(Noop));
        rememberer.remember(server.clone(), [a.path(), b.path()].into_iter().collect());

        assert!(rememberer.done(&a).is_empty());
        let released = rememberer.done(&b);
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].path(), server.path());
    }

    #[test]
    fn forget_all_releases_regardless_of_pending_successors() {
        let mut rememberer = Rememberer::new();
        let server = TaskHandle::new("server", ":", TaskKind::Background, Box::new(Noop));
        rememberer.remember(server.clone(), ["a".to_string()].into_iter().collect());
        let released = rememberer.forget_all();
        assert_eq!(released.len(), 1);
        assert_eq!(released[0].path(), server.path());
    }
}
