// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Deps command - dependency closure queries

use crate::inventory::Inventory;
use anyhow::{bail, Result};
use std::path::Path;

/// Run the deps command: print the requested dependency closure of `name`.
pub fn run(path: &Path, name: &str, reverse: bool, build: bool, depth: i32) -> Result<()> {
    if depth == 0 {
        bail!("dependency depth can't be zero");
    }

    let inventory = Inventory::new(path)?;

    let closure = match (build, reverse) {
        (false, false) => inventory.requires_components(name, depth),
        (false, true) => inventory.required_by_components(name, depth),
        (true, false) => inventory.build_requires_components(name, depth),
        (true, true) => inventory.build_required_by_components(name, depth),
    };

    if closure.is_empty() {
        println!("No dependencies found for {name}");
        return Ok(());
    }

    let mut sorted: Vec<String> = closure.into_iter().collect();
    sorted.sort();
    for dep in sorted {
        println!("{dep}");
    }

    Ok(())
}
