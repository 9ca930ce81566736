//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! The script-loader contract and the "current context" scoped-acquisition
//! mechanism, which replaces a global `current()` lookup with an explicit
//! thread-local guard installed around script evaluation.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::{KrakenError, Result};
use crate::project::ProjectHandle;

thread_local! {
    static CURRENT: RefCell<Option<(Context, ProjectHandle)>> = const { RefCell::new(None) };
}

/// Releases the installed current-context on drop, on every exit path
/// (including unwinding), restoring whatever was current before.
pub struct CurrentGuard {
    previous: Option<(Context, ProjectHandle)>,
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        CURRENT.with(|cell| *cell.borrow_mut() = self.previous.take());
    }
}

/// Installs `(context, project)` as current for this thread until the
/// returned guard drops.
pub fn enter_current(context: &Context, project: &ProjectHandle) -> CurrentGuard {
    let previous = CURRENT.with(|cell| cell.borrow_mut().replace((context.clone(), project.clone())));
    CurrentGuard { previous }
}

/// The ambient context/project installed by the innermost [`enter_current`]
/// guard still alive on this thread, if any.
pub fn current() -> Option<(Context, ProjectHandle)> {
    CURRENT.with(|cell| cell.borrow().clone())
}

/// Runs `f` with `(context, project)` installed as current, guaranteeing
/// release when `f` returns or panics.
pub fn scoped<R>(context: &Context, project: &ProjectHandle, f: impl FnOnce() -> R) -> R {
    let _guard = enter_current(context, project);
    f()
}

/// Populates one project by evaluating whatever script lives in its
/// directory. Implementations must install the current-context guard
/// (typically via [`scoped`]) around script evaluation exactly once, and
/// must not mutate `project`'s parent.
pub trait ProjectLoader {
    fn load(&self, context: &Context, project: &ProjectHandle, script_dir: &Path) -> Result<()>;
}

/// A [`ProjectLoader`] that locates one of a fixed set of script file names
/// in the project directory and hands it, with the current-context guard
/// already installed, to an `apply` closure.
pub struct DirectoryProjectLoader<F> {
    script_names: Vec<&'static str>,
    apply: F,
}

impl<F> DirectoryProjectLoader<F>
where
    F: Fn(&Context, &ProjectHandle, &Path) -> Result<()>,
{
    pub fn new(script_names: Vec<&'static str>, apply: F) -> Self {
        DirectoryProjectLoader { script_names, apply }
    }

    fn find_script(&self, dir: &Path) -> Result<PathBuf> {
        self.script_names
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| KrakenError::NoScriptFound(dir.to_path_buf()))
    }
}

impl<F> ProjectLoader for DirectoryProjectLoader<F>
where
    F: Fn(&Context, &ProjectHandle, &Path) -> Result<()>,
{
    fn load(&self, context: &Context, project: &ProjectHandle, script_dir: &Path) -> Result<()> {
        let script = self.find_script(script_dir)?;
        scoped(context, project, || (self.apply)(context, project, &script))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_none_outside_any_scope() {
        assert!(current().is_none());
    }

    #[test]
    fn scoped_installs_and_releases_current() {
        let context = Context::for_testing();
        let project = context.root_project();
        scoped(&context, &project, || {
            let (_, current_project) = current().expect("installed inside scope");
            assert_eq!(current_project.path(), project.path());
        });
        assert!(current().is_none());
    }

    #[test]
    fn nested_scopes_restore_the_outer_one() {
        let context = Context::for_testing();
        let root = context.root_project();
        let sub = root.add_child("sub", "./sub").unwrap();
        scoped(&context, &root, || {
            scoped(&context, &sub, || {
                assert_eq!(current().unwrap().1.path(), sub.path());
            });
            assert_eq!(current().unwrap().1.path(), root.path());
        });
    }

    #[test]
    fn missing_script_is_an_error() {
        let context = Context::for_testing();
        let project = context.root_project();
        let loader = DirectoryProjectLoader::new(vec!["build.kraken"], |_, _, _| Ok(()));
        let dir = std::env::temp_dir().join("kraken-core-loader-test-missing");
        std::fs::create_dir_all(&dir).unwrap();
        let err = loader.load(&context, &project, &dir).unwrap_err();
        assert!(matches!(err, KrakenError::NoScriptFound(_)));
        std::fs::remove_dir_all(&dir).ok();
    }
}
