//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! The `kraken` binary: wires the core engine to a command-line interface
//! and a project loader.

mod cli;
mod commands;

#[path = "../demos/example_project.rs"]
mod example_project;

use std::io;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use kraken_core::loader::ProjectLoader;
use kraken_core::Context;

use cli::{Cli, Command, QueryCommand};

fn main() -> ExitCode {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code as u8),
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    if let Command::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "kraken", &mut io::stdout());
        return Ok(0);
    }

    let context = Context::new(&cli.build_dir, &cli.project_dir);

    // No real project-description format is wired up yet: every invocation
    // populates the same in-memory demo project. A production deployment
    // swaps this `ExampleProjectLoader` for one that reads its own format.
    let loader = example_project::ExampleProjectLoader;
    loader.load(&context, &context.root_project(), &cli.project_dir)?;
    context.finalize()?;

    match &cli.command {
        Command::Run(args) => commands::run::run(&context, args),
        Command::Query { command } => run_query(&context, &cli.build_dir, command),
        Command::Completions { .. } => unreachable!("handled above"),
    }
}

fn run_query(context: &Context, build_dir: &std::path::Path, command: &QueryCommand) -> anyhow::Result<i32> {
    match command {
        QueryCommand::Ls { goals } => {
            commands::query::ls(context, goals)?;
            Ok(0)
        }
        QueryCommand::Describe { goals } => {
            commands::query::describe(context, goals)?;
            Ok(0)
        }
        QueryCommand::Visualize(args) => {
            commands::query::visualize(context, args)?;
            Ok(0)
        }
        QueryCommand::Env => {
            commands::query::env()?;
            Ok(0)
        }
        QueryCommand::IsUpToDate { goals, legend } => commands::query::is_up_to_date(context, build_dir, goals, *legend),
    }
}
