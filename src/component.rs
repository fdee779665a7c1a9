// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Component model - a `layer.kind.role` unit defined by its metadata file

use anyhow::{bail, Context, Result};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Component kinds whose version may receive a propagated update.
pub const UPDATABLE_KINDS: &[&str] = &[
    "applications",
    "services",
    "softwares",
    "executors",
    "flows",
    "skills",
    "functions",
    "libraries",
    "entities",
];

/// Whether a component kind is eligible for version propagation.
#[must_use]
pub fn is_updatable_kind(kind: &str) -> bool {
    UPDATABLE_KINDS.contains(&kind)
}

/// A platform component rooted at `<prefix>/<layer>/<kind>/<role>/`.
#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    path_prefix: PathBuf,
    layer: String,
    kind: String,
    role: String,
}

impl Component {
    /// Build a component from its dotted name (`layer.kind.role`) and the
    /// source-tree prefix rooting it on disk.
    pub fn new(name: &str, prefix: impl Into<PathBuf>) -> Result<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            bail!("invalid component name {name:?} (expected: layer.kind.role)");
        }

        Ok(Self {
            name: name.to_string(),
            path_prefix: prefix.into(),
            layer: parts[0].to_string(),
            kind: parts[1].to_string(),
            role: parts[2].to_string(),
        })
    }

    /// Build a component from a source-relative file path, taking the first
    /// three path segments as `layer/kind/role`. Returns `None` for paths too
    /// shallow to name a component or for candidates without metadata.
    #[must_use]
    pub fn from_path(rel_path: &Path, prefix: &Path) -> Option<Self> {
        let mut segments = rel_path
            .components()
            .filter_map(|c| c.as_os_str().to_str());

        let layer = segments.next()?;
        let kind = segments.next()?;
        let role = segments.next()?;
        if layer.is_empty() || kind.is_empty() || role.is_empty() {
            return None;
        }

        let component = Self::new(&format!("{layer}.{kind}.{role}"), prefix).ok()?;
        if !component.is_valid() {
            return None;
        }
        Some(component)
    }

    /// Full dotted name `layer.kind.role`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer part of the name.
    #[must_use]
    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Kind part of the name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Role part of the name.
    #[must_use]
    pub fn role(&self) -> &str {
        &self.role
    }

    /// Source-tree prefix this component is rooted at.
    #[must_use]
    pub fn path_prefix(&self) -> &Path {
        &self.path_prefix
    }

    /// Repo-relative path of the metadata file.
    #[must_use]
    pub fn meta_path(&self) -> PathBuf {
        [&self.layer, &self.kind, &self.role, "meta", "plasma.yaml"]
            .iter()
            .collect()
    }

    /// Absolute (prefix-joined) path of the metadata file.
    #[must_use]
    pub fn real_meta_path(&self) -> PathBuf {
        self.path_prefix.join(self.meta_path())
    }

    /// A component is valid iff its metadata file exists.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.real_meta_path().is_file()
    }

    /// Read the component version from its metadata. A missing `plasma`
    /// block or `version` key yields an empty string, not an error.
    pub fn version(&self) -> Result<String> {
        let meta_file = self.real_meta_path();
        let data = fs::read(&meta_file)
            .with_context(|| format!("failed to get component version ({})", meta_file.display()))?;
        let meta: Value = serde_yaml::from_slice(&data)
            .with_context(|| format!("failed to get component version ({})", meta_file.display()))?;

        let version = meta_version(&meta);
        if version.is_empty() {
            debug!(
                "empty version in meta file {}, returning empty string",
                meta_file.display()
            );
        }

        Ok(version)
    }

    /// Read the version split into its base half (before the first `-`)
    /// alongside the full string.
    pub fn base_version(&self) -> Result<(String, String)> {
        let version = self.version()?;
        if version.split('-').count() > 2 {
            debug!("component {} has incorrect version format {}", self.name, version);
        }

        let base = version.split('-').next().unwrap_or_default().to_string();
        Ok((base, version))
    }

    /// Rewrite the metadata file with a new version, preserving every other
    /// field. The file is written with 2-space indentation and mode 0600.
    pub fn update_version(&self, version: &str) -> Result<()> {
        let meta_file = self.real_meta_path();
        let data = fs::read(&meta_file).with_context(|| {
            format!("failed to update component version ({})", meta_file.display())
        })?;
        let mut meta: Value = serde_yaml::from_slice(&data).with_context(|| {
            format!("failed to update component version ({})", meta_file.display())
        })?;

        let mapping = meta.as_mapping_mut().with_context(|| {
            format!("metadata is not a mapping ({})", meta_file.display())
        })?;

        let plasma_key = Value::from("plasma");
        match mapping.get_mut(&plasma_key).and_then(Value::as_mapping_mut) {
            Some(plasma) => {
                plasma.insert(Value::from("version"), Value::from(version));
            }
            None => {
                let mut plasma = serde_yaml::Mapping::new();
                plasma.insert(Value::from("version"), Value::from(version));
                mapping.insert(plasma_key, Value::Mapping(plasma));
            }
        }

        let out = serde_yaml::to_string(&meta).with_context(|| {
            format!("failed to update component version ({})", meta_file.display())
        })?;
        fs::write(&meta_file, out).with_context(|| {
            format!("failed to update component version ({})", meta_file.display())
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&meta_file, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

/// Extract the version string from parsed metadata (`plasma.version`).
/// Missing pieces yield an empty string; non-string scalars are rendered.
#[must_use]
pub fn meta_version(meta: &Value) -> String {
    let Some(version) = meta.get("plasma").and_then(|p| p.get("version")) else {
        return String::new();
    };

    match version {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Compose a new version from the current one and the propagated hash.
/// A propagated value that is already compound wins outright; otherwise the
/// current base is kept and the propagated hash becomes the second half.
#[must_use]
pub fn compose_version(old: &str, new: &str) -> String {
    if new.contains('-') {
        return new.to_string();
    }

    let base = old.split('-').next().unwrap_or_default();
    format!("{base}-{new}")
}
