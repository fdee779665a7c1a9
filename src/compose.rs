// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Compose manifest lookup - package descriptors for a domain directory

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest file expected at the root of a domain directory.
pub const COMPOSE_FILE: &str = "plasma-compose.yaml";

/// Default target when a dependency names none.
pub const DEFAULT_TARGET: &str = "latest";

#[derive(Debug, Deserialize)]
struct ComposeManifest {
    #[serde(default)]
    dependencies: Vec<ComposeDependency>,
}

#[derive(Debug, Deserialize)]
struct ComposeDependency {
    name: String,
    #[serde(default)]
    source: ComposeSource,
}

#[derive(Debug, Default, Deserialize)]
struct ComposeSource {
    #[serde(default)]
    target: Option<String>,
}

/// A package referenced by the compose manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Package name, used as the namespace key.
    pub name: String,
    /// Checkout target under the package directory.
    pub target: String,
}

impl PackageDescriptor {
    /// Filesystem path of the package checkout under `packages_dir`.
    #[must_use]
    pub fn path(&self, packages_dir: &Path) -> PathBuf {
        packages_dir.join(&self.name).join(&self.target)
    }
}

/// Read the compose manifest of `domain_dir` and return its package
/// descriptors in declaration order. A missing or malformed manifest is a
/// configuration error.
pub fn lookup(domain_dir: &Path) -> Result<Vec<PackageDescriptor>> {
    let manifest_path = domain_dir.join(COMPOSE_FILE);
    let data = fs::read(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;

    let manifest: ComposeManifest = serde_yaml::from_slice(&data)
        .with_context(|| format!("{}", manifest_path.display()))?;

    let mut descriptors = Vec::with_capacity(manifest.dependencies.len());
    for dep in manifest.dependencies {
        if dep.name.is_empty() {
            bail!("compose dependency with empty name in {}", manifest_path.display());
        }
        descriptors.push(PackageDescriptor {
            name: dep.name,
            target: dep
                .source
                .target
                .unwrap_or_else(|| DEFAULT_TARGET.to_string()),
        });
    }

    Ok(descriptors)
}
