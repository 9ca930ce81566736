//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! Demonstrates the engine end to end: populate a project tree, finalize
//! it, and run the `build` goal, without going through the CLI at all.
//!
//! Run with `cargo run --example example_build`.

#[path = "example_project.rs"]
mod example_project;

use kraken_core::Context;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let context = Context::new("build", ".");
    example_project::populate(&context, &context.root_project());
    context.finalize()?;

    let build = context.find_task(":build").expect("standard group is always present");
    context.execute(&[build])?;

    println!("build succeeded");
    Ok(())
}
