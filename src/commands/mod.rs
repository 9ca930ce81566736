//
// Copyright (c) 2020-2021 science+computing ag and other contributors
//
// This program and the accompanying materials are made
// available under the terms of the Eclipse Public License 2.0
// which is available at https://www.eclipse.org/legal/epl-2.0/
//
// SPDX-License-Identifier: EPL-2.0
//

//! One module per CLI subcommand family, mirroring the one-file-per-subcommand
//! layout of `butido::commands`.

pub mod query;
pub mod run;

/// Resolves `selectors` against `context`'s root project, falling back to
/// every default task across the project tree when `selectors` is empty.
pub fn resolve_goals(context: &kraken_core::Context, selectors: &[String]) -> anyhow::Result<Vec<kraken_core::TaskHandle>> {
    if selectors.is_empty() {
        Ok(kraken_core::selector::resolve_default(context))
    } else {
        Ok(kraken_core::selector::resolve(context, selectors, None)?)
    }
}
