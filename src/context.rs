//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! The root of a build invocation: owns the project tree, runs the
//! finalize/build/execute pipeline, and dispatches lifecycle events.

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{BuildError, KrakenError, Result};
use crate::executor::{DefaultGraphExecutor, GraphExecutor};
use crate::graph::TaskGraph;
use crate::loader::ProjectLoader;
use crate::project::ProjectHandle;
use crate::task::TaskHandle;

/// Lifecycle events fired during loading and finalization.
#[derive(Clone)]
pub enum ContextEvent {
    ProjectInit(ProjectHandle),
    ProjectLoaded(ProjectHandle),
    ProjectBeginFinalize(ProjectHandle),
    ProjectFinalized(ProjectHandle),
    ContextBeginFinalize,
    ContextFinalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    ProjectInit,
    ProjectLoaded,
    ProjectBeginFinalize,
    ProjectFinalized,
    ContextBeginFinalize,
    ContextFinalized,
}

impl ContextEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ContextEvent::ProjectInit(_) => EventKind::ProjectInit,
            ContextEvent::ProjectLoaded(_) => EventKind::ProjectLoaded,
            ContextEvent::ProjectBeginFinalize(_) => EventKind::ProjectBeginFinalize,
            ContextEvent::ProjectFinalized(_) => EventKind::ProjectFinalized,
            ContextEvent::ContextBeginFinalize => EventKind::ContextBeginFinalize,
            ContextEvent::ContextFinalized => EventKind::ContextFinalized,
        }
    }
}

type Listener = Box<dyn Fn(&ContextEvent)>;

struct ContextData {
    build_directory: PathBuf,
    root_project: ProjectHandle,
    project_loader: Option<Rc<dyn ProjectLoader>>,
    graph_executor: Box<dyn GraphExecutor>,
    listeners: std::cell::RefCell<Vec<(Option<EventKind>, Listener)>>,
    finalized: Cell<bool>,
}

/// The context is cheaply cloneable (reference-counted) so it can be handed
/// to loaders, task capabilities, and the executor without lifetime
/// gymnastics: no thread-local/global lookup, the context travels as an
/// explicit value.
#[derive(Clone)]
pub struct Context(Rc<ContextData>);

/// Builds a [`Context`], the way `butido`'s `OrchestratorSetup` is a
/// `#[derive(TypedBuilder)]` object consumed once via `.build_context()`.
/// Every field is a plain required setter, `butido`-style: callers that want
/// the common case (no loader, [`DefaultGraphExecutor`]) go through
/// [`Context::new`] instead of this builder directly.
#[derive(typed_builder::TypedBuilder)]
pub struct ContextSetup {
    build_directory: PathBuf,
    root_directory: PathBuf,
    project_loader: Option<Rc<dyn ProjectLoader>>,
    graph_executor: Box<dyn GraphExecutor>,
}

impl ContextSetup {
    pub fn build_context(self) -> Context {
        Context(Rc::new(ContextData {
            build_directory: self.build_directory,
            root_project: ProjectHandle::new_root(self.root_directory),
            project_loader: self.project_loader,
            graph_executor: self.graph_executor,
            listeners: std::cell::RefCell::new(Vec::new()),
            finalized: Cell::new(false),
        }))
    }
}

impl Context {
    /// Shorthand for [`ContextSetup::builder`] with no loader and the
    /// default executor; use `ContextSetup` directly to configure either.
    pub fn new(build_directory: impl Into<PathBuf>, root_directory: impl Into<PathBuf>) -> Self {
        ContextSetup::builder()
            .build_directory(build_directory.into())
            .root_directory(root_directory.into())
            .project_loader(None)
            .graph_executor(Box::new(DefaultGraphExecutor::new()))
            .build()
            .build_context()
    }

    /// A minimal context suitable for unit tests that only need a root
    /// project and don't go through a loader.
    pub fn for_testing() -> Self {
        Self::new(".", ".")
    }

    pub fn build_directory(&self) -> &Path {
        &self.0.build_directory
    }

    /// The configured project loader, if one was set on [`ContextSetup`].
    pub fn project_loader(&self) -> Option<&Rc<dyn ProjectLoader>> {
        self.0.project_loader.as_ref()
    }

    pub fn root_project(&self) -> ProjectHandle {
        self.0.root_project.clone()
    }

    pub fn is_finalized(&self) -> bool {
        self.0.finalized.get()
    }

    pub fn add_listener(&self, kind: Option<EventKind>, callback: impl Fn(&ContextEvent) + 'static) {
        self.0.listeners.borrow_mut().push((kind, Box::new(callback)));
    }

    pub fn emit(&self, event: ContextEvent) {
        for (kind, callback) in self.0.listeners.borrow().iter() {
            if kind.is_none() || *kind == Some(event.kind()) {
                callback(&event);
            }
        }
    }

    /// Finds a project by its `path()` (`":"`, `":sub"`, `":sub:grand"`, ...).
    pub fn find_project(&self, path: &str) -> Option<ProjectHandle> {
        if path == ":" || path.is_empty() {
            return Some(self.root_project());
        }
        let mut project = self.root_project();
        for segment in path.trim_start_matches(':').split(':') {
            project = project.child(segment)?;
        }
        Some(project)
    }

    /// Finds a task by its `path()` (e.g. `":build"`, `":sub:build"`).
    pub fn find_task(&self, path: &str) -> Option<TaskHandle> {
        let (project_path, name) = path.rsplit_once(':')?;
        let project_path = if project_path.is_empty() { ":" } else { project_path };
        self.find_project(project_path)?.task(name)
    }

    /// Calls `task.finalize()` on every task across the project tree,
    /// dispatching the `on_project_begin_finalize`/`on_project_finalized`
    /// events per project and `on_context_begin_finalize`/
    /// `on_context_finalized` around the whole pass.
    pub fn finalize(&self) -> Result<()> {
        self.emit(ContextEvent::ContextBeginFinalize);
        for project in self.root_project().iter_projects() {
            self.emit(ContextEvent::ProjectBeginFinalize(project.clone()));
            for task in project.tasks() {
                task.finalize().map_err(|source| KrakenError::TaskPanic { task: task.path(), source })?;
            }
            self.emit(ContextEvent::ProjectFinalized(project));
        }
        self.0.finalized.set(true);
        self.emit(ContextEvent::ContextFinalized);
        Ok(())
    }

    /// Builds a fresh [`TaskGraph`] containing exactly the transitive
    /// strict-predecessor closure of `goals`.
    pub fn get_build_graph(&self, goals: &[TaskHandle]) -> Result<TaskGraph> {
        let mut graph = TaskGraph::new();
        for goal in goals {
            graph.add_task(self, goal.clone())?;
        }
        Ok(graph)
    }

    /// Drives an already-built [`TaskGraph`] to completion with this
    /// context's configured [`GraphExecutor`] (the [`DefaultGraphExecutor`]
    /// unless [`ContextSetup`] was given another). Lets callers that need to
    /// tweak the graph first (exclusions, resuming a snapshot) still go
    /// through the configured executor instead of constructing their own.
    pub fn run_graph(&self, graph: &mut TaskGraph) {
        self.0.graph_executor.execute(self, graph);
    }

    /// Builds the graph for `goals` and drives it to completion with this
    /// context's configured [`GraphExecutor`] (the [`DefaultGraphExecutor`]
    /// unless [`ContextSetup`] was given another), returning [`BuildError`]
    /// if any goal did not complete successfully.
    pub fn execute(&self, goals: &[TaskHandle]) -> std::result::Result<(), BuildError> {
        let mut graph = self.get_build_graph(goals).map_err(|e| BuildError { failed_tasks: vec![e.to_string()] })?;
        self.run_graph(&mut graph);

        let failed: Vec<String> = goals
            .iter()
            .filter(|t| !graph.status(t).map(|s| s.is_ok()).unwrap_or(false))
            .map(|t| t.path())
            .collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(BuildError { failed_tasks: failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::group::GroupCapability;
    use crate::task::TaskKind;

    #[test]
    fn find_project_walks_nested_children() {
        let ctx = Context::for_testing();
        let sub = ctx.root_project().add_child("sub", "./sub").unwrap();
        sub.add_child("grand", "./sub/grand").unwrap();
        assert!(ctx.find_project(":sub:grand").is_some());
        assert!(ctx.find_project(":sub:missing").is_none());
    }

    #[test]
    fn find_task_resolves_root_and_nested_paths() {
        let ctx = Context::for_testing();
        assert!(ctx.find_task(":build").is_some());
        let sub = ctx.root_project().add_child("sub", "./sub").unwrap();
        sub.add_task("custom", TaskKind::Group, Box::new(GroupCapability::new(Vec::new()))).unwrap();
        assert!(ctx.find_task(":sub:custom").is_some());
    }

    #[test]
    fn finalize_sets_flag_and_fires_events() {
        let ctx = Context::for_testing();
        let seen = Rc::new(Cell::new(false));
        let seen_clone = Rc::clone(&seen);
        ctx.add_listener(Some(EventKind::ContextFinalized), move |_| seen_clone.set(true));
        ctx.finalize().unwrap();
        assert!(ctx.is_finalized());
        assert!(seen.get());
    }

    struct RecordingExecutor {
        ran: Rc<Cell<bool>>,
    }

    impl GraphExecutor for RecordingExecutor {
        fn execute(&self, context: &Context, graph: &mut TaskGraph) {
            self.ran.set(true);
            DefaultGraphExecutor::new().execute(context, graph);
        }
    }

    #[test]
    fn execute_uses_the_executor_configured_on_context_setup() {
        let ran = Rc::new(Cell::new(false));
        let ctx = ContextSetup::builder()
            .build_directory(PathBuf::from("."))
            .root_directory(PathBuf::from("."))
            .project_loader(None)
            .graph_executor(Box::new(RecordingExecutor { ran: Rc::clone(&ran) }))
            .build()
            .build_context();
        ctx.finalize().unwrap();

        let build = ctx.find_task(":build").unwrap();
        ctx.execute(&[build]).unwrap();
        assert!(ran.get());
    }

    #[test]
    fn project_loader_round_trips_through_context_setup() {
        struct NoopLoader;
        impl ProjectLoader for NoopLoader {
            fn load(&self, _context: &Context, _project: &ProjectHandle, _script_dir: &Path) -> Result<()> {
                Ok(())
            }
        }

        let ctx = ContextSetup::builder()
            .build_directory(PathBuf::from("."))
            .root_directory(PathBuf::from("."))
            .project_loader(Some(Rc::new(NoopLoader)))
            .graph_executor(Box::new(DefaultGraphExecutor::new()))
            .build()
            .build_context();
        assert!(ctx.project_loader().is_some());
        assert!(Context::for_testing().project_loader().is_none());
    }
}
