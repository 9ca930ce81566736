//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! The hierarchical project namespace.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};

use crate::error::{KrakenError, Result};
use crate::task::{TaskCapability, TaskHandle, TaskKind};
use crate::task::group::GroupCapability;

/// Standard groups pre-created under every project, with their (non-strict,
/// order-only) inter-group ordering: `depends_on` names groups that, if
/// present, are ordered before this one. `lint` running before `build` is
/// the one ordering fixed by convention; the full chain is this crate's own
/// resolution of the rest.
pub const STANDARD_GROUPS: &[(&str, &[&str])] = &[
    ("fmt", &[]),
    ("lint", &["fmt"]),
    ("build", &["lint"]),
    ("check", &["build"]),
    ("test", &["check"]),
    ("integrationTest", &["test"]),
    ("apply", &["build"]),
    ("publish", &["integrationTest", "apply"]),
    ("deploy", &["publish"]),
];

pub enum Member {
    Task(TaskHandle),
    Project(ProjectHandle),
}

struct ProjectData {
    name: String,
    directory: PathBuf,
    parent: Option<Weak<ProjectData>>,
    members: RefCell<Vec<(String, Member)>>,
    metadata: RefCell<Vec<Rc<dyn Any>>>,
}

/// A handle to a project. Cheaply cloneable; equality and hashing are by
/// [`path`](Self::path).
#[derive(Clone)]
pub struct ProjectHandle(Rc<ProjectData>);

impl ProjectHandle {
    /// Creates the root project (`path() == ":"`) and pre-creates the
    /// standard groups.
    pub fn new_root(directory: impl Into<PathBuf>) -> Self {
        Self::new_internal(String::new(), directory.into(), None)
    }

    /// Creates a child project under `self` and pre-creates the standard
    /// groups. Fails with [`KrakenError::DuplicateMember`] if `self` already
    /// has a member with this name.
    pub fn add_child(&self, name: impl Into<String>, directory: impl Into<PathBuf>) -> Result<Self> {
        let name = name.into();
        self.check_name_free(&name)?;
        let child = Self::new_internal(name.clone(), directory.into(), Some(Rc::downgrade(&self.0)));
        self.0.members.borrow_mut().push((name, Member::Project(child.clone())));
        Ok(child)
    }

    fn new_internal(name: String, directory: PathBuf, parent: Option<Weak<ProjectData>>) -> Self {
        let project = ProjectHandle(Rc::new(ProjectData {
            name,
            directory,
            parent,
            members: RefCell::new(Vec::new()),
            metadata: RefCell::new(Vec::new()),
        }));
        for (group_name, depends_on) in STANDARD_GROUPS {
            let group = project
                .add_task(group_name.to_string(), TaskKind::Group, Box::new(GroupCapability::new(Vec::new())))
                .expect("standard group names never collide on a fresh project");
            for dep_name in *depends_on {
                if let Some(Member::Task(dep)) = project.0.members.borrow().iter().find(|(n, _)| n == dep_name).map(|(_, m)| m) {
                    group.add_relationship(
                        crate::task::RelationshipTarget::Task(dep.clone()),
                        false,
                        false,
                    );
                }
            }
        }
        project
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn directory(&self) -> &Path {
        &self.0.directory
    }

    pub fn parent(&self) -> Option<ProjectHandle> {
        self.0.parent.as_ref().and_then(Weak::upgrade).map(ProjectHandle)
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    /// `parent.path() + ":" + name`, with the root project's own path being
    /// `":"`.
    pub fn path(&self) -> String {
        match self.parent() {
            None => ":".to_string(),
            Some(parent) => format!("{}:{}", parent.path(), self.0.name),
        }
    }

    fn check_name_free(&self, name: &str) -> Result<()> {
        if self.0.members.borrow().iter().any(|(n, _)| n == name) {
            return Err(KrakenError::DuplicateMember { project: self.path(), name: name.to_string() });
        }
        Ok(())
    }

    /// Registers a new task owned by this project.
    pub fn add_task(&self, name: impl Into<String>, kind: TaskKind, capability: Box<dyn TaskCapability>) -> Result<TaskHandle> {
        let name = name.into();
        self.check_name_free(&name)?;
        let task = TaskHandle::new(name.clone(), self.path(), kind, capability);
        self.0.members.borrow_mut().push((name, Member::Task(task.clone())));
        Ok(task)
    }

    /// Registers an already-constructed task (e.g. from [`crate::task::void::VoidCapability::new_task`]).
    pub fn adopt_task(&self, task: TaskHandle) -> Result<()> {
        self.check_name_free(task.name())?;
        self.0.members.borrow_mut().push((task.name().to_string(), Member::Task(task)));
        Ok(())
    }

    pub fn tasks(&self) -> Vec<TaskHandle> {
        self.0
            .members
            .borrow()
            .iter()
            .filter_map(|(_, m)| match m {
                Member::Task(t) => Some(t.clone()),
                Member::Project(_) => None,
            })
            .collect()
    }

    pub fn task(&self, name: &str) -> Option<TaskHandle> {
        self.0.members.borrow().iter().find_map(|(n, m)| match m {
            Member::Task(t) if n == name => Some(t.clone()),
            _ => None,
        })
    }

    pub fn children(&self) -> Vec<ProjectHandle> {
        self.0
            .members
            .borrow()
            .iter()
            .filter_map(|(_, m)| match m {
                Member::Project(p) => Some(p.clone()),
                Member::Task(_) => None,
            })
            .collect()
    }

    pub fn child(&self, name: &str) -> Option<ProjectHandle> {
        self.0.members.borrow().iter().find_map(|(n, m)| match m {
            Member::Project(p) if n == name => Some(p.clone()),
            _ => None,
        })
    }

    pub fn default_tasks(&self) -> Vec<TaskHandle> {
        self.tasks().into_iter().filter(|t| t.is_default()).collect()
    }

    pub fn add_metadata(&self, value: Rc<dyn Any>) {
        self.0.metadata.borrow_mut().push(value);
    }

    pub fn metadata_of<T: 'static>(&self) -> Vec<Rc<T>> {
        self.0
            .metadata
            .borrow()
            .iter()
            .filter_map(|m| Rc::clone(m).downcast::<T>().ok())
            .collect()
    }

    /// Depth-first iteration over this project and all descendants.
    pub fn iter_projects(&self) -> Vec<ProjectHandle> {
        let mut out = vec![self.clone()];
        for child in self.children() {
            out.extend(child.iter_projects());
        }
        out
    }
}

impl fmt::Debug for ProjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project({:?})", self.path())
    }
}

impl PartialEq for ProjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for ProjectHandle {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_path_is_single_colon() {
        let root = ProjectHandle::new_root(".");
        assert_eq!(root.path(), ":");
    }

    #[test]
    fn child_path_is_prefixed() {
        let root = ProjectHandle::new_root(".");
        let sub = root.add_child("sub", "./sub").unwrap();
        assert_eq!(sub.path(), ":sub");
        let grand = sub.add_child("grand", "./sub/grand").unwrap();
        assert_eq!(grand.path(), ":sub:grand");
    }

    #[test]
    fn duplicate_member_name_fails() {
        let root = ProjectHandle::new_root(".");
        root.add_child("sub", "./sub").unwrap();
        let err = root.add_child("sub", "./other").unwrap_err();
        assert!(matches!(err, KrakenError::DuplicateMember { .. }));
    }

    #[test]
    fn standard_groups_are_pre_created() {
        let root = ProjectHandle::new_root(".");
        for (name, _) in STANDARD_GROUPS {
            assert!(root.task(name).is_some(), "missing standard group {name}");
        }
    }

    #[test]
    fn lint_is_ordered_before_build() {
        let root = ProjectHandle::new_root(".");
        let build = root.task("build").unwrap();
        let lint = root.task("lint").unwrap();
        let rels = build.get_relationships(&crate::context::Context::for_testing()).unwrap();
        assert!(rels.iter().any(|(t, strict, inverse)| t.path() == lint.path() && !strict && !inverse));
    }
}
