// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Variables - group_vars values, their fingerprints and component usage

use crate::component::Component;
use crate::crawler::CRAWL_EXCLUDED;
use crate::ordered_map::OrderedMap;
use anyhow::{Context, Result};
use regex::Regex;
use serde_yaml::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

/// Marker prefix of Ansible-vault encrypted payloads.
pub const VAULT_HEADER: &[u8] = b"$ANSIBLE_VAULT";

/// Errors surfaced by the vault decryption collaborator.
#[derive(Debug, Error)]
pub enum VaultError {
    /// No password was provided.
    #[error("empty vault password")]
    EmptyPassword,
    /// The password does not match the payload.
    #[error("invalid password")]
    WrongPassword,
    /// The payload is not a valid vault envelope.
    #[error("malformed vault payload")]
    Malformed,
}

/// External vault decryption collaborator. The crate never bundles a cipher;
/// callers provide an implementation, tests install fakes.
pub trait VaultDecrypt: Send + Sync {
    /// Decrypt `data` with `password`, returning plaintext YAML bytes.
    fn decrypt(&self, password: &str, data: &[u8]) -> Result<Vec<u8>, VaultError>;
}

/// Whether file content is a vault envelope.
#[must_use]
pub fn is_vault_encrypted(data: &[u8]) -> bool {
    data.starts_with(VAULT_HEADER)
}

/// A single variable defined in a `group_vars` file.
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    platform: String,
    path: PathBuf,
    hash: String,
    vault: bool,
}

impl Variable {
    /// Create a variable record.
    pub fn new(
        name: impl Into<String>,
        platform: impl Into<String>,
        path: impl Into<PathBuf>,
        hash: impl Into<String>,
        vault: bool,
    ) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
            path: path.into(),
            hash: hash.into(),
            vault,
        }
    }

    /// Variable name (top-level YAML key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Platform (layer) owning the defining file.
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Source-relative path of the defining file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fingerprint of the variable value.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Whether the variable comes from a vault file.
    #[must_use]
    pub fn is_vault(&self) -> bool {
        self.vault
    }
}

/// Fingerprint of a YAML value: sha256 over its serialised form.
#[must_use]
pub fn variable_hash(value: &Value) -> String {
    let serialised = serde_yaml::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialised.as_bytes());
    hex::encode(hasher.finalize())
}

/// Parse a vars file into its top-level `name -> value` mapping.
/// An empty file is an empty mapping; a non-mapping document is an error.
pub fn parse_vars_file(data: &[u8]) -> Result<BTreeMap<String, Value>> {
    let doc: Value = serde_yaml::from_slice(data).context("invalid YAML")?;
    match doc {
        Value::Null => Ok(BTreeMap::new()),
        Value::Mapping(mapping) => {
            let mut vars = BTreeMap::new();
            for (key, value) in mapping {
                if let Value::String(name) = key {
                    vars.insert(name, value);
                }
            }
            Ok(vars)
        }
        _ => anyhow::bail!("vars file is not a mapping"),
    }
}

/// Find `group_vars/*/vars.yaml` and `vault.yaml` files under `source_dir`,
/// returned as sorted source-relative paths.
pub fn collect_group_vars_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(source_dir).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("error walking directory: {err}");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .unwrap_or(entry.path())
            .to_path_buf();

        let rel_str = rel.to_string_lossy();
        if CRAWL_EXCLUDED.iter().any(|d| rel_str.contains(d)) {
            continue;
        }

        let name = entry.file_name();
        if name != OsStr::new("vars.yaml") && name != OsStr::new("vault.yaml") {
            continue;
        }

        if rel.components().any(|c| c.as_os_str() == OsStr::new("group_vars")) {
            files.push(rel);
        }
    }

    Ok(files)
}

/// Variable registry with the variable-to-components usage relation.
#[derive(Debug, Default)]
pub struct VariablesUsage {
    variables: OrderedMap<Variable>,
    components_by_variable: HashMap<(String, String), Vec<String>>,
}

impl VariablesUsage {
    /// All discovered variables, keyed by `platform:name`.
    #[must_use]
    pub fn variables(&self) -> &OrderedMap<Variable> {
        &self.variables
    }

    /// Components consuming a variable (directly or through variables whose
    /// values reference it), sorted by name. Empty when unknown.
    #[must_use]
    pub fn components_for(&self, name: &str, platform: &str) -> &[String] {
        self.components_by_variable
            .get(&(platform.to_string(), name.to_string()))
            .map_or(&[], Vec::as_slice)
    }
}

/// Build the usage registry: discover variables under `source_dir`, scan
/// component files for `{{ … }}` references and resolve variable-in-variable
/// references transitively.
pub fn build_usage(
    source_dir: &Path,
    components: &OrderedMap<Component>,
    vault_pass: &str,
    vault: Option<&dyn VaultDecrypt>,
) -> Result<VariablesUsage> {
    let mut usage = VariablesUsage::default();

    // Discover variables and remember their raw value text for the
    // variable-in-variable pass.
    let mut value_text: HashMap<(String, String), String> = HashMap::new();
    for rel in collect_group_vars_files(source_dir)? {
        let path = source_dir.join(&rel);
        let data =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;

        let encrypted = is_vault_encrypted(&data);
        let data = if encrypted {
            let Some(vault) = vault else {
                warn!("skipping vault file {} (no decryptor configured)", rel.display());
                continue;
            };
            vault
                .decrypt(vault_pass, &data)
                .with_context(|| format!("failed to decrypt {}", rel.display()))?
        } else {
            data
        };

        let platform = rel
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .unwrap_or_default()
            .to_string();

        let vars =
            parse_vars_file(&data).with_context(|| format!("{}", path.display()))?;
        for (name, value) in vars {
            let key = (platform.clone(), name.clone());
            value_text.insert(
                key,
                serde_yaml::to_string(&value).unwrap_or_default(),
            );
            usage.variables.set(
                format!("{platform}:{name}"),
                Variable::new(&name, &platform, &rel, variable_hash(&value), encrypted),
            );
        }
    }

    if usage.variables.is_empty() {
        return Ok(usage);
    }

    let expr = Regex::new(r"\{\{[^}]*\}\}").context("template expression regex")?;
    let word = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").context("identifier regex")?;

    // Direct usage: a component consumes a variable of its own layer when the
    // variable name appears inside a template expression in its files.
    let mut direct: HashMap<(String, String), HashSet<String>> = HashMap::new();
    for component in components.to_list() {
        let tokens = component_tokens(component, &expr, &word)?;
        for key in usage.variables.keys() {
            let Some(variable) = usage.variables.get(&key) else {
                continue;
            };
            if variable.platform() == component.layer() && tokens.contains(variable.name()) {
                direct
                    .entry((variable.platform().to_string(), variable.name().to_string()))
                    .or_default()
                    .insert(component.name().to_string());
            }
        }
    }

    // Variable-in-variable: a change to B reaches consumers of every A whose
    // value references B, transitively within the same platform.
    let mut referenced_by: HashMap<(String, String), Vec<(String, String)>> = HashMap::new();
    for key_a in usage.variables.keys() {
        let Some(var_a) = usage.variables.get(&key_a) else {
            continue;
        };
        let text = value_text
            .get(&(var_a.platform().to_string(), var_a.name().to_string()))
            .cloned()
            .unwrap_or_default();
        for m in expr.find_iter(&text) {
            for token in word.find_iter(m.as_str()) {
                let key_b = (var_a.platform().to_string(), token.as_str().to_string());
                if key_b.1 != var_a.name() && value_text.contains_key(&key_b) {
                    referenced_by
                        .entry(key_b)
                        .or_default()
                        .push((var_a.platform().to_string(), var_a.name().to_string()));
                }
            }
        }
    }

    for key in usage.variables.keys() {
        let Some(variable) = usage.variables.get(&key) else {
            continue;
        };
        let root = (variable.platform().to_string(), variable.name().to_string());
        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut stack = vec![root.clone()];
        let mut names: HashSet<String> = HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(components) = direct.get(&current) {
                names.extend(components.iter().cloned());
            }
            if let Some(consumers) = referenced_by.get(&current) {
                stack.extend(consumers.iter().cloned());
            }
        }
        let mut sorted: Vec<String> = names.into_iter().collect();
        sorted.sort();
        usage.components_by_variable.insert(root, sorted);
    }

    Ok(usage)
}

/// Collect identifier tokens appearing inside template expressions in a
/// component's YAML and template files.
fn component_tokens(
    component: &Component,
    expr: &Regex,
    word: &Regex,
) -> Result<HashSet<String>> {
    let mut tokens = HashSet::new();
    let root = component
        .path_prefix()
        .join(component.layer())
        .join(component.kind())
        .join(component.role());

    for entry in WalkDir::new(&root).follow_links(false).sort_by_file_name() {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }

        let matches_ext = entry
            .path()
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| matches!(ext, "yaml" | "yml" | "j2"));
        if !matches_ext {
            continue;
        }

        let Ok(text) = fs::read_to_string(entry.path()) else {
            continue;
        };
        for m in expr.find_iter(&text) {
            for token in word.find_iter(m.as_str()) {
                tokens.insert(token.as_str().to_string());
            }
        }
    }

    Ok(tokens)
}
