//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Task-selector grammar resolution: turns `:project:task` style strings
//! into the [`TaskHandle`]s they name.

use itertools::Itertools;

use crate::context::Context;
use crate::error::{KrakenError, Result};
use crate::project::ProjectHandle;
use crate::task::TaskHandle;

/// Resolves every selector in `selectors` against `reference_project`
/// (defaulting to the context's root project), returning the union of
/// matched tasks in encounter order, deduplicated by path.
pub fn resolve(context: &Context, selectors: &[String], reference_project: Option<&ProjectHandle>) -> Result<Vec<TaskHandle>> {
    let reference = reference_project.cloned().unwrap_or_else(|| context.root_project());
    let mut out: Vec<TaskHandle> = Vec::new();
    for raw in selectors {
        out.extend(resolve_one(context, raw, &reference)?);
    }
    Ok(out.into_iter().unique_by(TaskHandle::path).collect())
}

/// `null` targets (no selectors given): every default task across the
/// project tree.
pub fn resolve_default(context: &Context) -> Vec<TaskHandle> {
    context
        .root_project()
        .iter_projects()
        .into_iter()
        .flat_map(|p| p.default_tasks())
        .collect()
}

fn resolve_one(context: &Context, raw: &str, reference: &ProjectHandle) -> Result<Vec<TaskHandle>> {
    let optional = raw.ends_with('?');
    let selector = if optional { &raw[..raw.len() - 1] } else { raw };

    if !selector.contains(':') {
        let matches: Vec<TaskHandle> = context
            .root_project()
            .iter_projects()
            .into_iter()
            .flat_map(|p| p.tasks())
            .filter(|t| t.name() == selector)
            .collect();
        if matches.is_empty() && !optional {
            return Err(KrakenError::SelectorNoMatch(raw.to_string()));
        }
        return Ok(matches);
    }

    let (mut project, mut segments): (ProjectHandle, Vec<&str>) = if let Some(rest) = selector.strip_prefix(':') {
        (context.root_project(), rest.split(':').collect())
    } else {
        (reference.clone(), selector.split(':').collect())
    };

    // Greedily descend into child projects named by leading segments. The
    // trailing empty segment from a `:proj:` selector (or the sole `""`
    // segment from a bare `:`) is never a child name, so it naturally stops
    // the walk without being consumed.
    while let Some(&first) = segments.first() {
        match project.child(first) {
            Some(child) => {
                project = child;
                segments.remove(0);
            }
            None => break,
        }
    }

    // Nothing left to resolve as a task name: either every segment named a
    // child project (possibly a single one, e.g. `:sub`), or the selector
    // ended in `:` (or was `:` alone) — either way, the trailing-`:` form
    // resolves to the matched project's default tasks.
    if segments.is_empty() || (segments.len() == 1 && segments[0].is_empty()) {
        return Ok(project.default_tasks());
    }

    if segments.len() == 1 {
        return match project.task(segments[0]) {
            Some(task) => Ok(vec![task]),
            None => {
                if optional {
                    Ok(Vec::new())
                } else {
                    Err(KrakenError::SelectorNoMatch(raw.to_string()))
                }
            }
        };
    }

    // More than one segment remains and none of them named a child project:
    // the intermediate project does not exist.
    if optional {
        Ok(Vec::new())
    } else {
        Err(KrakenError::SelectorNoMatch(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::group::GroupCapability;
    use crate::task::TaskKind;

    #[test]
    fn bare_name_matches_across_tree() {
        let ctx = Context::for_testing();
        let resolved = resolve(&ctx, &["build".to_string()], None).unwrap();
        assert!(resolved.iter().any(|t| t.name() == "build"));
    }

    #[test]
    fn absolute_path_resolves_single_task() {
        let ctx = Context::for_testing();
        let resolved = resolve(&ctx, &[":build".to_string()], None).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path(), ":build");
    }

    #[test]
    fn trailing_colon_resolves_default_tasks() {
        let ctx = Context::for_testing();
        let root = ctx.root_project();
        root.task("build").unwrap().set_default(false);
        let resolved = resolve(&ctx, &[":".to_string()], None).unwrap();
        assert!(!resolved.iter().any(|t| t.path() == ":build"));
    }

    #[test]
    fn missing_task_is_an_error_unless_optional() {
        let ctx = Context::for_testing();
        assert!(resolve(&ctx, &[":nope".to_string()], None).is_err());
        assert!(resolve(&ctx, &[":nope?".to_string()], None).unwrap().is_empty());
    }

    #[test]
    fn trailing_colon_on_child_project_resolves_its_default_tasks() {
        let ctx = Context::for_testing();
        let root = ctx.root_project();
        let sub = root.add_child("sub", "./sub").unwrap();
        sub.add_task("custom", TaskKind::Group, Box::new(GroupCapability::new(Vec::new()))).unwrap();
        let resolved = resolve(&ctx, &[":sub:".to_string()], None).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path(), ":sub:custom");
    }

    #[test]
    fn single_segment_naming_a_child_project_resolves_its_default_tasks() {
        let ctx = Context::for_testing();
        let root = ctx.root_project();
        let sub = root.add_child("sub", "./sub").unwrap();
        sub.add_task("custom", TaskKind::Group, Box::new(GroupCapability::new(Vec::new()))).unwrap();
        let resolved = resolve(&ctx, &[":sub".to_string()], None).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path(), ":sub:custom");
    }

    #[test]
    fn nested_project_path_resolves() {
        let ctx = Context::for_testing();
        let root = ctx.root_project();
        let sub = root.add_child("sub", "./sub").unwrap();
        sub.add_task("custom", TaskKind::Group, Box::new(GroupCapability::new(Vec::new()))).unwrap();
        let resolved = resolve(&ctx, &[":sub:custom".to_string()], None).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].path(), ":sub:custom");
    }
}
