// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! List command - read-only component listing

use crate::inventory::Inventory;
use anyhow::Result;
use std::path::Path;

/// Run the list command over the source tree at `path`.
pub fn run(path: &Path, kind: Option<&str>) -> Result<()> {
    let inventory = Inventory::new(path)?;

    let mut names: Vec<String> = inventory
        .components_map()
        .to_list()
        .into_iter()
        .filter(|c| kind.map_or(true, |k| c.kind() == k))
        .map(|c| c.name().to_string())
        .collect();
    names.sort();

    if names.is_empty() {
        println!("No components found");
        return Ok(());
    }

    for name in names {
        let Some(component) = inventory.components_map().get(&name) else {
            continue;
        };
        let version = component.version().unwrap_or_default();
        if version.is_empty() {
            println!("{name}");
        } else {
            println!("{name} ({version})");
        }
    }

    Ok(())
}
