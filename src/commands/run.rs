//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! `kraken run`: build the ready-graph for the selected goals and execute
//! it, honoring `--resume`/`--restart`/`--no-save`/exclusions.

use std::path::Path;

use kraken_core::{serialize, Context};

use crate::cli::RunArgs;

/// Where `--resume`/snapshot-saving reads and writes:
/// `<build_dir>/.kraken/buildenv/`.
fn state_dir(build_dir: &Path) -> std::path::PathBuf {
    build_dir.join(".kraken").join("buildenv")
}

/// Runs `args`, returning the process exit code (0 success, 1 failure).
pub fn run(context: &Context, args: &RunArgs) -> anyhow::Result<i32> {
    let goals = crate::commands::resolve_goals(context, &args.goals)?;

    if goals.is_empty() {
        if args.allow_no_tasks {
            tracing::info!("no goals selected, nothing to do");
            return Ok(0);
        } else {
            eprintln!("no tasks selected and -0/--allow-no-tasks was not given");
            return Ok(1);
        }
    }

    let exclude = crate::commands::resolve_goals(context, &args.exclude)?;
    let exclude_subgraph = crate::commands::resolve_goals(context, &args.exclude_subgraph)?;

    let mut graph = context.get_build_graph(&goals)?;
    if !exclude.is_empty() || !exclude_subgraph.is_empty() {
        graph = graph.exclude(&exclude, &exclude_subgraph);
    }

    let dir = state_dir(context.build_directory());
    if args.resume {
        if let Some(snapshot) = serialize::load_all(&dir)? {
            snapshot.apply_to(&mut graph);
            graph.resume();
        }
    }
    if args.restart.as_deref() == Some("all") {
        graph.restart();
    }

    if args.simulate {
        println!("Execution plan for {}:", goals.iter().map(|t| t.path()).collect::<Vec<_>>().join(", "));
        for task in graph.execution_order(true)? {
            println!("  {}", task.path());
        }
        return Ok(0);
    }

    context.run_graph(&mut graph);

    if !args.no_save {
        let snapshot = serialize::Snapshot::capture(&graph);
        let path = serialize::save(&dir, &snapshot)?;
        serialize::prune_other_snapshots(&dir, &path)?;
    }

    let failed: Vec<String> = goals.iter().filter(|t| !graph.status(t).map(|s| s.is_ok()).unwrap_or(false)).map(|t| t.path()).collect();
    if failed.is_empty() {
        Ok(0)
    } else {
        eprintln!("build failed: {}", failed.join(", "));
        Ok(1)
    }
}
