//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! An in-memory project tree used by this crate's own tests and doc
//! examples. Real deployments supply their own [`ProjectLoader`] reading
//! whatever build-description format they choose; this one just builds a
//! small, representative task graph directly in Rust.

use kraken_core::loader::ProjectLoader;
use kraken_core::property::Value;
use kraken_core::task::{RelationshipTarget, TaskCapability, TaskHandle, TaskKind, TaskStatus};
use kraken_core::{Context, ProjectHandle};

/// Wraps a plain closure as a [`TaskCapability`], for demo tasks that don't
/// need `prepare`/`teardown`/finalize customization.
pub struct ClosureCapability<F> {
    work: F,
}

impl<F> ClosureCapability<F>
where
    F: Fn(&TaskHandle) -> anyhow::Result<TaskStatus>,
{
    pub fn new(work: F) -> Self {
        ClosureCapability { work }
    }
}

impl<F> TaskCapability for ClosureCapability<F>
where
    F: Fn(&TaskHandle) -> anyhow::Result<TaskStatus>,
{
    fn execute(&self, task: &TaskHandle) -> anyhow::Result<TaskStatus> {
        (self.work)(task)
    }
}

/// A [`ProjectLoader`] that ignores the script directory entirely and
/// populates a fixed demo project tree instead. Only meant for this crate's
/// own tests and the `example_build` binary.
pub struct ExampleProjectLoader;

impl ProjectLoader for ExampleProjectLoader {
    fn load(&self, context: &Context, project: &ProjectHandle, _script_dir: &std::path::Path) -> kraken_core::Result<()> {
        populate(context, project);
        Ok(())
    }
}

/// Builds a small "app" project with a compile/test/package pipeline and a
/// background dev server, wired into the standard `build`/`test`/`deploy`
/// groups.
pub fn populate(_context: &Context, root: &ProjectHandle) {
    let app = root.add_child("app", "app").expect("fresh root has no \"app\" child yet");

    let compile = app
        .add_task(
            "compile",
            TaskKind::Plain,
            Box::new(ClosureCapability::new(|task: &TaskHandle| -> anyhow::Result<TaskStatus> {
                let artifact = task.property("artifact").expect("declared below");
                artifact.set(Value::Path("app/target/app.bin".into()))?;
                Ok(TaskStatus::succeeded())
            })),
        )
        .expect("fresh project has no \"compile\" task yet");
    compile.declare_property("artifact", true, vec!["Path"]);
    compile.set_description("compile {artifact}");

    let test = app
        .add_task(
            "test",
            TaskKind::Plain,
            Box::new(ClosureCapability::new(|task: &TaskHandle| -> anyhow::Result<TaskStatus> {
                let binary = task.property("binary").expect("declared below");
                binary.get()?;
                Ok(TaskStatus::succeeded())
            })),
        )
        .expect("fresh project has no \"test\" task yet");
    let binary_in = test.declare_property("binary", false, vec!["Path"]);
    binary_in.set_from(&compile.property("artifact").unwrap()).expect("fresh property is never finalized");

    let package = app
        .add_task(
            "package",
            TaskKind::Plain,
            Box::new(ClosureCapability::new(|_task: &TaskHandle| -> anyhow::Result<TaskStatus> {
                Ok(TaskStatus::succeeded())
            })),
        )
        .expect("fresh project has no \"package\" task yet");
    package.add_relationship(RelationshipTarget::Task(test.clone()), true, false);

    let devserver = app
        .add_task(
            "devserver",
            TaskKind::Background,
            Box::new(kraken_core::task::background::BackgroundCapability::new(DevServer)),
        )
        .expect("fresh project has no \"devserver\" task yet");
    devserver.set_default(false);

    if let Some(build) = root.task("build") {
        build.add_relationship(RelationshipTarget::Task(package.clone()), true, false);
    }
    if let Some(test_group) = root.task("test") {
        test_group.add_relationship(RelationshipTarget::Task(test.clone()), true, false);
    }
    if let Some(deploy) = root.task("deploy") {
        deploy.add_relationship(RelationshipTarget::Task(devserver.clone()), false, false);
    }
}

struct DevServer;

impl kraken_core::task::background::BackgroundWork for DevServer {
    fn start_background_task(
        &self,
        _task: &TaskHandle,
        scope: &mut kraken_core::task::background::TeardownScope,
    ) -> anyhow::Result<TaskStatus> {
        scope.defer(|| tracing::info!("dev server stopped"));
        tracing::info!("dev server started");
        Ok(TaskStatus::started())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_wires_the_demo_pipeline_into_standard_groups() {
        let context = Context::for_testing();
        populate(&context, &context.root_project());
        context.finalize().unwrap();

        let build = context.find_task(":build").unwrap();
        let goals = vec![build];
        let graph = context.get_build_graph(&goals).unwrap();
        assert!(graph.contains(&context.find_task(":app:compile").unwrap()));
        assert!(graph.contains(&context.find_task(":app:test").unwrap()));
        assert!(graph.contains(&context.find_task(":app:package").unwrap()));
    }

    #[test]
    fn test_task_binary_property_is_derived_from_compile() {
        let context = Context::for_testing();
        populate(&context, &context.root_project());
        context.finalize().unwrap();

        let test_task = context.find_task(":app:test").unwrap();
        let rels = test_task.get_relationships(&context).unwrap();
        assert!(rels.iter().any(|(t, strict, _)| t.path() == ":app:compile" && *strict));
    }
}
