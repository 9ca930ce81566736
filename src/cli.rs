//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Command-line surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "kraken", author, version, about = "Build-orchestration engine: projects, tasks, a dependency graph, and a cooperative executor")]
pub struct Cli {
    /// Build output/state directory.
    #[arg(short = 'b', long = "build-dir", global = true, default_value = "build")]
    pub build_dir: PathBuf,

    /// Root project directory.
    #[arg(short = 'p', long = "project-dir", global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Raise log verbosity (repeatable).
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Lower log verbosity (repeatable).
    #[arg(short = 'q', action = clap::ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build the ready-graph for the given goals and execute it.
    Run(RunArgs),

    /// Inspect the project/task tree without executing anything.
    Query {
        #[command(subcommand)]
        command: QueryCommand,
    },

    /// Generate shell completion scripts.
    Completions { shell: clap_complete::Shell },
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Task selectors naming the build goals; none selects every default task.
    pub goals: Vec<String>,

    /// Print what would run without executing anything.
    #[arg(short = 's', long = "simulate")]
    pub simulate: bool,

    /// Allow running with zero goals selected (exit 0 instead of 1).
    #[arg(short = '0', long = "allow-no-tasks")]
    pub allow_no_tasks: bool,

    /// Exclude this task from the build (repeatable).
    #[arg(short = 'x', long = "exclude")]
    pub exclude: Vec<String>,

    /// Exclude this task and its strict successors from the build (repeatable).
    #[arg(short = 'X', long = "exclude-subgraph")]
    pub exclude_subgraph: Vec<String>,

    /// Resume from the most recent snapshot(s) in the state directory.
    #[arg(long = "resume")]
    pub resume: bool,

    /// Discard all persisted status before running (only "all" is recognized).
    #[arg(long = "restart")]
    pub restart: Option<String>,

    /// Don't write a snapshot on exit.
    #[arg(long = "no-save")]
    pub no_save: bool,
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Dump all tasks, grouped by non-group/group.
    Ls { goals: Vec<String> },

    /// Per-task: path, declared type, relationships, property values.
    Describe { goals: Vec<String> },

    /// Emit a DOT graph.
    Visualize(VisualizeArgs),

    /// Emit the JSON list of active runtime distributions for the wrapper.
    Env,

    /// Exit 0 iff every goal is `UP_TO_DATE` or `SKIPPED`.
    IsUpToDate {
        goals: Vec<String>,
        #[arg(long = "legend")]
        legend: bool,
    },
}

#[derive(clap::Args, Debug)]
pub struct VisualizeArgs {
    /// Show every task, not only those reachable from the selected goals.
    #[arg(short = 'a', long = "all")]
    pub all: bool,

    /// Mark the selected goals distinctly from their dependency closure.
    #[arg(short = 's', long = "selected")]
    pub selected: bool,

    /// Goals to root the visualization at; empty selects every default task.
    pub goals: Vec<String>,

    /// Apply the standard transitive reduction before rendering.
    #[arg(short = 'R', long = "reduce")]
    pub reduce: bool,

    /// Keep explicit (non-implicit) edges even when `--reduce` would drop them.
    #[arg(short = 'r', long = "keep-explicit")]
    pub keep_explicit: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Cli {
    /// Net verbosity after folding repeated `-v`/`-q`, defaulting to `Info`.
    pub fn log_level(&self) -> tracing::Level {
        let net = i16::from(self.verbose) - i16::from(self.quiet);
        match net {
            i16::MIN..=-2 => tracing::Level::ERROR,
            -1 => tracing::Level::WARN,
            0 => tracing::Level::INFO,
            1 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_goals_and_flags() {
        let cli = Cli::parse_from(["kraken", "run", ":build", "-0", "--resume"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.goals, vec![":build".to_string()]);
                assert!(args.allow_no_tasks);
                assert!(args.resume);
            }
            other => panic!("expected Run, got {other:?}"),
        }
    }

    #[test]
    fn verbosity_folds_to_a_log_level() {
        let mut cli = Cli::parse_from(["kraken", "run"]);
        assert_eq!(cli.log_level(), tracing::Level::INFO);
        cli.verbose = 2;
        assert_eq!(cli.log_level(), tracing::Level::TRACE);
        cli.verbose = 0;
        cli.quiet = 1;
        assert_eq!(cli.log_level(), tracing::Level::WARN);
    }
}
