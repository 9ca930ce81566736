//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! `kraken query ls|describe|visualize|env|is-up-to-date`.

use std::path::Path;

use kraken_core::{serialize, Context, TaskHandle, TaskKind};

use crate::cli::VisualizeArgs;

/// `query ls`: every task reachable from `goals` (or the whole project tree
/// when `goals` is empty), grouped into non-group and group tasks.
pub fn ls(context: &Context, goals: &[String]) -> anyhow::Result<()> {
    let tasks = tasks_in_scope(context, goals)?;
    let (groups, plain): (Vec<_>, Vec<_>) = tasks.into_iter().partition(|t| t.kind() == TaskKind::Group);

    println!("Tasks:");
    for task in sorted_by_path(plain) {
        println!("  {}", task.path());
    }
    println!("\nGroups:");
    for task in sorted_by_path(groups) {
        println!("  {}", task.path());
    }
    Ok(())
}

/// `query describe`: path, declared kind, relationships, and property
/// values (or `<unset>`) per task.
pub fn describe(context: &Context, goals: &[String]) -> anyhow::Result<()> {
    for task in sorted_by_path(tasks_in_scope(context, goals)?) {
        println!("{}", task.path());
        println!("  kind: {:?}", task.kind());
        if let Some(description) = task.get_description() {
            println!("  description: {description}");
        }

        let relationships = task.get_relationships(context)?;
        if relationships.is_empty() {
            println!("  relationships: (none)");
        } else {
            println!("  relationships:");
            for (other, strict, inverse) in relationships {
                let arrow = if inverse { "->" } else { "<-" };
                let kind = if strict { "strict" } else { "order-only" };
                println!("    {arrow} {} ({kind})", other.path());
            }
        }

        let properties = task.properties();
        if properties.is_empty() {
            println!("  properties: (none)");
        } else {
            println!("  properties:");
            for property in properties {
                let direction = if property.is_output() { "output" } else { "input" };
                let value = match property.get() {
                    Ok(v) => format!("{v:?}"),
                    Err(_) => "<unset>".to_string(),
                };
                println!("    {} [{direction}] = {value}", property.name());
            }
        }
        println!();
    }
    Ok(())
}

/// `query visualize`: emits a DOT digraph with a legend subgraph and a build
/// subgraph, node styles `{default, selected, group, goal}`, and dashed
/// non-strict edges.
pub fn visualize(context: &Context, args: &VisualizeArgs) -> anyhow::Result<()> {
    let goals = crate::commands::resolve_goals(context, &args.goals)?;

    let mut graph = if args.all {
        let mut g = kraken_core::TaskGraph::new();
        for project in context.root_project().iter_projects() {
            for task in project.tasks() {
                g.add_task(context, task)?;
            }
        }
        g
    } else {
        context.get_build_graph(&goals)?
    };

    if args.reduce {
        graph = graph.reduce(args.keep_explicit);
    }

    let goal_paths: std::collections::HashSet<String> = goals.iter().map(|t| t.path()).collect();

    println!("digraph kraken {{");
    println!("  subgraph cluster_legend {{");
    println!("    label = \"legend\";");
    println!("    legend_default [label=\"default\"];");
    println!("    legend_selected [label=\"selected\", style=filled];");
    println!("    legend_group [label=\"group\", shape=box];");
    println!("    legend_goal [label=\"goal\", peripheries=2];");
    println!("  }}");
    println!("  subgraph cluster_build {{");
    println!("    label = \"build\";");
    for task in graph.all_tasks() {
        let mut attrs = Vec::new();
        if task.kind() == TaskKind::Group {
            attrs.push("shape=box".to_string());
        }
        if args.selected && goal_paths.contains(&task.path()) {
            attrs.push("peripheries=2".to_string());
        }
        if let Some(status) = graph.status(&task) {
            if status.is_ok() {
                attrs.push("style=filled".to_string());
            }
        }
        let attr_str = if attrs.is_empty() { String::new() } else { format!(" [{}]", attrs.join(", ")) };
        println!("    {:?}{attr_str};", task.path());
    }
    for (from, to, meta) in graph.edges() {
        let style = if meta.strict { "" } else { " [style=dashed]" };
        println!("    {from:?} -> {to:?}{style};");
    }
    println!("  }}");
    println!("}}");
    Ok(())
}

/// `query env`: the wrapper's active-runtime-distribution list. The wrapper
/// itself lives outside this crate; this always reports an empty list.
pub fn env() -> anyhow::Result<()> {
    println!("[]");
    Ok(())
}

/// `query is-up-to-date`: exit 0 iff every selected goal's last persisted
/// status is `UP_TO_DATE` or `SKIPPED`.
pub fn is_up_to_date(context: &Context, build_dir: &Path, goals: &[String], legend: bool) -> anyhow::Result<i32> {
    let resolved = crate::commands::resolve_goals(context, goals)?;
    let dir = build_dir.join(".kraken").join("buildenv");
    let snapshot = serialize::load_all(&dir)?;

    let mut all_up_to_date = true;
    for task in &resolved {
        let status = snapshot.as_ref().and_then(|s| s.status.get(&task.path()));
        let up_to_date = matches!(status, Some(s) if s.is_up_to_date() || s.is_skipped());
        if legend {
            println!("{} {}", task.path(), if up_to_date { "up-to-date" } else { "stale" });
        }
        all_up_to_date &= up_to_date;
    }
    Ok(if all_up_to_date { 0 } else { 1 })
}

fn tasks_in_scope(context: &Context, goals: &[String]) -> anyhow::Result<Vec<TaskHandle>> {
    if goals.is_empty() {
        Ok(context.root_project().iter_projects().into_iter().flat_map(|p| p.tasks()).collect())
    } else {
        let resolved = crate::commands::resolve_goals(context, goals)?;
        Ok(context.get_build_graph(&resolved)?.all_tasks())
    }
}

fn sorted_by_path(mut tasks: Vec<TaskHandle>) -> Vec<TaskHandle> {
    tasks.sort_by_key(|t| t.path());
    tasks
}
