//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! The task model: a unit of work with a property schema, a status
//! lifecycle, and relationships to other tasks.
//!
//! A shallow `Task` → `GroupTask`/`VoidTask`/`BackgroundTask` class
//! hierarchy is replaced here with a single [`TaskHandle`] carrying a
//! `kind` tag plus a boxed [`TaskCapability`] trait object: a closed
//! capability set, grounded in `assemble-rs`'s `ExecutableTask`/`FullTask`
//! trait split.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::Result;
use crate::property::{Property, Value};
use crate::selector;

pub mod background;
pub mod group;
pub mod status;
pub mod void;

pub use background::{BackgroundCapability, TeardownScope};
pub use group::GroupCapability;
pub use status::{StatusKind, TaskStatus};
pub use void::VoidCapability;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Plain,
    Group,
    Void,
    Background,
}

/// The target of a [`Relationship`]: either a resolved task, or a selector
/// string resolved lazily against the owning project.
pub enum RelationshipTarget {
    Task(TaskHandle),
    Selector(String),
}

pub struct Relationship {
    pub target: RelationshipTarget,
    pub strict: bool,
    pub inverse: bool,
}

/// User-implementable task behavior. Third-party task types implement this
/// trait; `execute` is the only required method.
pub trait TaskCapability {
    /// A cheap, non-blocking check performed on the main thread.
    fn prepare(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        Ok(TaskStatus::pending())
    }

    /// Perform the work. May take arbitrarily long.
    fn execute(&self, task: &TaskHandle) -> anyhow::Result<TaskStatus>;

    /// Invoked once all direct successors have finished, only if the
    /// task's recorded status is `Started`.
    fn teardown(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        Ok(TaskStatus::succeeded())
    }

    /// Gives the task a chance to update its configuration before the
    /// graph is built. The default finalizes all non-output properties.
    fn finalize(&self, task: &TaskHandle) -> anyhow::Result<()> {
        task.finalize_properties_default();
        Ok(())
    }

    /// Relationships implied by this capability beyond property lineage and
    /// explicit [`TaskHandle::add_relationship`] calls (e.g. group
    /// membership).
    fn implicit_relationships(&self, _task: &TaskHandle) -> Vec<(TaskHandle, bool, bool)> {
        Vec::new()
    }
}

struct TaskData {
    name: String,
    project_path: String,
    default: Cell<bool>,
    description: RefCell<Option<String>>,
    properties: RefCell<Vec<Rc<Property>>>,
    relationships: RefCell<Vec<Relationship>>,
    capability: RefCell<Box<dyn TaskCapability>>,
    kind: TaskKind,
    teardown_scope: RefCell<Option<TeardownScope>>,
    metadata: RefCell<Vec<Rc<dyn Any>>>,
}

/// A handle to a task. Cheaply cloneable (reference-counted); equality and
/// hashing are by [`path`](Self::path).
#[derive(Clone)]
pub struct TaskHandle(Rc<TaskData>);

impl TaskHandle {
    pub fn new(
        name: impl Into<String>,
        project_path: impl Into<String>,
        kind: TaskKind,
        capability: Box<dyn TaskCapability>,
    ) -> Self {
        TaskHandle(Rc::new(TaskData {
            name: name.into(),
            project_path: project_path.into(),
            default: Cell::new(true),
            description: RefCell::new(None),
            properties: RefCell::new(Vec::new()),
            relationships: RefCell::new(Vec::new()),
            capability: RefCell::new(capability),
            kind,
            teardown_scope: RefCell::new(None),
            metadata: RefCell::new(Vec::new()),
        }))
    }

    /// `":" + project.path + ":" + name`, with the root project (whose own
    /// path is `":"`) special-cased to avoid a doubled colon.
    pub fn path(&self) -> String {
        if self.0.project_path == ":" {
            format!(":{}", self.0.name)
        } else {
            format!("{}:{}", self.0.project_path, self.0.name)
        }
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn project_path(&self) -> &str {
        &self.0.project_path
    }

    pub fn kind(&self) -> TaskKind {
        self.0.kind
    }

    pub fn is_default(&self) -> bool {
        self.0.default.get()
    }

    pub fn set_default(&self, value: bool) {
        self.0.default.set(value)
    }

    pub fn description(&self) -> Option<String> {
        self.0.description.borrow().clone()
    }

    pub fn set_description(&self, description: impl Into<String>) {
        *self.0.description.borrow_mut() = Some(description.into());
    }

    /// Declare a property in this task's schema: an explicit call in place
    /// of class-level field annotations, so a task's property set is a
    /// plain runtime list rather than something derived by reflection.
    pub fn declare_property(
        &self,
        name: impl Into<String>,
        is_output: bool,
        item_type: Vec<&'static str>,
    ) -> Rc<Property> {
        let property = Property::new(self.path(), name, is_output, item_type);
        self.0.properties.borrow_mut().push(Rc::clone(&property));
        property
    }

    /// Declare a property whose item-type is a list of `element_type` (see
    /// [`Property::new_list`]).
    pub fn declare_list_property(&self, name: impl Into<String>, is_output: bool, element_type: &'static str) -> Rc<Property> {
        let property = Property::new_list(self.path(), name, is_output, element_type);
        self.0.properties.borrow_mut().push(Rc::clone(&property));
        property
    }

    pub fn property(&self, name: &str) -> Option<Rc<Property>> {
        self.0.properties.borrow().iter().find(|p| p.name() == name).cloned()
    }

    pub fn properties(&self) -> Vec<Rc<Property>> {
        self.0.properties.borrow().clone()
    }

    pub fn add_relationship(&self, target: RelationshipTarget, strict: bool, inverse: bool) {
        self.0.relationships.borrow_mut().push(Relationship { target, strict, inverse });
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

    /// Default `finalize()` behavior: finalize every non-output (input)
    /// property so it can no longer be `set`.
    pub fn finalize_properties_default(&self) {
        for property in self.0.properties.borrow().iter() {
            if property.is_input() {
                property.finalize();
            }
        }
    }

    pub fn finalize(&self) -> anyhow::Result<()> {
        self.0.capability.borrow().finalize(self)
    }

    pub fn prepare(&self) -> anyhow::Result<TaskStatus> {
        self.0.capability.borrow().prepare(self)
    }

    pub fn execute(&self) -> anyhow::Result<TaskStatus> {
        self.0.capability.borrow().execute(self)
    }

    pub fn teardown(&self) -> anyhow::Result<TaskStatus> {
        self.0.capability.borrow().teardown(self)
    }

    /// Replace this task's capability object. Used by capability
    /// constructors (e.g. [`VoidCapability`]) that need the task handle to
    /// exist (to declare properties on it) before the capability itself can
    /// be built.
    pub(crate) fn set_capability(&self, capability: Box<dyn TaskCapability>) {
        *self.0.capability.borrow_mut() = capability;
    }

    pub(crate) fn take_teardown_scope(&self) -> Option<TeardownScope> {
        self.0.teardown_scope.borrow_mut().take()
    }

    pub(crate) fn install_teardown_scope(&self, scope: TeardownScope) {
        *self.0.teardown_scope.borrow_mut() = Some(scope);
    }

    /// The relationships contributed directly by this task's capability
    /// (e.g. a `GroupTask`'s members), without property lineage or explicit
    /// relationships mixed in. Used by [`crate::graph::TaskGraph`] to tell
    /// genuine group-membership edges apart from ordinary dependency edges
    /// when it unfurls cross-group relationships.
    pub fn capability_relationships(&self) -> Vec<(TaskHandle, bool, bool)> {
        self.0.capability.borrow().implicit_relationships(self)
    }

    /// Derive this task's relationships:
    /// (a) property lineage to other tasks' output properties, (b)
    /// capability-implicit relationships (group membership), (c) explicit
    /// relationships, with selector strings resolved against the owning
    /// project.
    pub fn get_relationships(&self, context: &Context) -> Result<Vec<(TaskHandle, bool, bool)>> {
        let mut out = Vec::new();

        for property in self.0.properties.borrow().iter() {
            for path in property.derived_task_paths() {
                if let Some(other) = context.find_task(&path) {
                    out.push((other, true, false));
                }
            }
        }

        out.extend(self.0.capability.borrow().implicit_relationships(self));

        for rel in self.0.relationships.borrow().iter() {
            match &rel.target {
                RelationshipTarget::Task(t) => out.push((t.clone(), rel.strict, rel.inverse)),
                RelationshipTarget::Selector(sel) => {
                    let owning_project = context
                        .find_project(&enclosing_project_path(&self.path()))
                        .unwrap_or_else(|| context.root_project());
                    let resolved = selector::resolve(context, &[sel.clone()], Some(&owning_project))?;
                    for t in resolved {
                        out.push((t, rel.strict, rel.inverse));
                    }
                }
            }
        }

        Ok(out)
    }

    /// Default description formatting: `{property_name}` placeholders are
    /// substituted with the property's current value, rendering `Path`
    /// properties relative to the current working directory when possible
    /// and unset properties as `<empty>`.
    pub fn get_description(&self) -> Option<String> {
        self.0
            .description
            .borrow()
            .as_ref()
            .map(|template| format_description(template, &self.0.properties.borrow()))
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({:?})", self.path())
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.path() == other.path()
    }
}

impl Eq for TaskHandle {}

fn enclosing_project_path(task_path: &str) -> String {
    match task_path.rfind(':') {
        Some(idx) if idx > 0 => task_path[..idx].to_string(),
        _ => ":".to_string(),
    }
}

fn format_description(template: &str, properties: &[Rc<Property>]) -> String {
    let mut out = String::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(rel_end) = template[i..].find('}') {
                let name = &template[i + 1..i + rel_end];
                let rendered = properties
                    .iter()
                    .find(|p| p.name() == name)
                    .map(render_property_value)
                    .unwrap_or_else(|| format!("{{{name}}}"));
                out.push_str(&rendered);
                i += rel_end + 1;
                continue;
            }
        }
        let ch = template[i..].chars().next().expect("valid utf-8 boundary");
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

fn render_property_value(property: &Rc<Property>) -> String {
    match property.get() {
        Ok(Value::Path(path)) => std::env::current_dir()
            .ok()
            .and_then(|cwd| path.strip_prefix(&cwd).ok().map(|rel| rel.display().to_string()))
            .unwrap_or_else(|| path.display().to_string()),
        Ok(Value::String(s)) => s,
        Ok(Value::Int(i)) => i.to_string(),
        Ok(Value::Bool(b)) => b.to_string(),
        Ok(Value::List(items)) => format!("{items:?}"),
        Err(_) => "<empty>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopCapability;
    impl TaskCapability for NoopCapability {
        fn execute(&self, _task: &TaskHandle) -> anyhow::Result<TaskStatus> {
            Ok(TaskStatus::succeeded())
        }
    }

    #[test]
    fn path_for_root_project_task() {
        let t = TaskHandle::new("build", ":", TaskKind::Plain, Box::new(NoopCapability));
        assert_eq!(t.path(), ":build");
    }

    #[test]
    fn path_for_nested_project_task() {
        let t = TaskHandle::new("build", ":sub", TaskKind::Plain, Box::new(NoopCapability));
        assert_eq!(t.path(), ":sub:build");
    }

    #[test]
    fn description_substitutes_properties() {
        let t = TaskHandle::new("build", ":", TaskKind::Plain, Box::new(NoopCapability));
        let p = t.declare_property("name", false, vec!["string"]);
        p.set(Value::String("widget".into())).unwrap();
        t.set_description("Build {name}");
        assert_eq!(t.get_description().unwrap(), "Build widget");
    }

    #[test]
    fn description_renders_unset_as_empty() {
        let t = TaskHandle::new("build", ":", TaskKind::Plain, Box::new(NoopCapability));
        t.declare_property("name", false, vec!["string"]);
        t.set_description("Build {name}");
        assert_eq!(t.get_description().unwrap(), "Build <empty>");
    }
}
