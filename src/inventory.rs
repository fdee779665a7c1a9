// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Inventory - component discovery, dependency graph and usage queries

use crate::component::Component;
use crate::crawler::{CrawlEntry, FilesCrawler};
use crate::ordered_map::OrderedMap;
use crate::variables::{self, VariablesUsage, VaultDecrypt};
use anyhow::{anyhow, bail, Context, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the synthetic root node seeding the topological sort.
pub const ROOT_PLATFORM: &str = "platform";

/// Roster playbook consulted by the component-usage calculation.
pub const PLATFORM_PLAYBOOK: &str = "platform/platform.yaml";

/// Dependency relation map: component name to an ordered set of names.
pub type DependencyMap = BTreeMap<String, OrderedMap<bool>>;

/// Source-tree inventory: discovered components, the two dependency
/// relations in both directions, and the topological component order.
#[derive(Debug)]
pub struct Inventory {
    source_dir: PathBuf,

    components_map: OrderedMap<Component>,
    required_by: DependencyMap,
    requires: DependencyMap,
    build_required_by: DependencyMap,
    build_requires: DependencyMap,
    top_order: Vec<String>,

    used_components: Option<HashSet<String>>,
    variables_usage: Option<VariablesUsage>,
}

impl Inventory {
    /// Discover components under `source_dir` and build the dependency
    /// graph, topologically sorted from the `platform` root.
    pub fn new(source_dir: impl Into<PathBuf>) -> Result<Self> {
        let source_dir = source_dir.into();
        let mut inventory = Self {
            source_dir: source_dir.clone(),
            components_map: OrderedMap::new(),
            required_by: BTreeMap::new(),
            requires: BTreeMap::new(),
            build_required_by: BTreeMap::new(),
            build_requires: BTreeMap::new(),
            top_order: Vec::new(),
            used_components: None,
            variables_usage: None,
        };

        inventory
            .build_components_graph()
            .with_context(|| format!("inventory init error ({})", source_dir.display()))?;

        Ok(inventory)
    }

    fn build_components_graph(&mut self) -> Result<()> {
        let crawler = FilesCrawler::new(&self.source_dir);
        for entry in crawler.crawl()? {
            match entry {
                CrawlEntry::Meta { path } => {
                    let Some(component) = Component::from_path(&path, &self.source_dir) else {
                        continue;
                    };
                    self.components_map.set(component.name().to_string(), component);
                }
                CrawlEntry::Tasks { path, roles, semantic } => {
                    let Some(component) = Component::from_path(&path, &self.source_dir) else {
                        continue;
                    };
                    let name = component.name().to_string();
                    if !self.components_map.contains_key(&name) {
                        self.components_map.set(name.clone(), component);
                    }

                    let (requires, required_by) = if semantic {
                        (&mut self.requires, &mut self.required_by)
                    } else {
                        (&mut self.build_requires, &mut self.build_required_by)
                    };

                    requires.entry(name.clone()).or_default();
                    for dep in roles {
                        required_by
                            .entry(dep.clone())
                            .or_default()
                            .set(name.clone(), true);
                        requires
                            .entry(name.clone())
                            .or_default()
                            .set(dep, true);
                    }
                }
            }
        }

        // Seed the sort: platform requires every component that is required
        // by something yet requires nothing itself.
        let mut platform_items = OrderedMap::new();
        for name in self.required_by.keys() {
            if !self.requires.contains_key(name) {
                platform_items.set(name.clone(), true);
            }
        }
        self.required_by
            .insert(ROOT_PLATFORM.to_string(), platform_items);

        self.top_order = self.sort_semantic_graph()?;
        self.components_map.order_by(&self.top_order);

        Ok(())
    }

    /// Topologically sort the semantic DAG rooted at `platform`; only nodes
    /// reachable from the root enter the order. Cycles are fatal.
    fn sort_semantic_graph(&self) -> Result<Vec<String>> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();

        for (from, members) in &self.required_by {
            let from_idx = *nodes
                .entry(from.clone())
                .or_insert_with(|| graph.add_node(from.clone()));
            for to in members.keys() {
                let to_idx = *nodes
                    .entry(to.clone())
                    .or_insert_with(|| graph.add_node(to.clone()));
                graph.add_edge(from_idx, to_idx, ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            anyhow!(
                "semantic dependency cycle detected at {}",
                graph[cycle.node_id()]
            )
        })?;

        let Some(&root) = nodes.get(ROOT_PLATFORM) else {
            return Ok(vec![ROOT_PLATFORM.to_string()]);
        };

        let mut reachable = HashSet::new();
        let mut dfs = Dfs::new(&graph, root);
        while let Some(idx) = dfs.next(&graph) {
            reachable.insert(idx);
        }

        Ok(order
            .into_iter()
            .filter(|idx| reachable.contains(idx))
            .map(|idx| graph[idx].clone())
            .collect())
    }

    /// Source directory this inventory was built from.
    #[must_use]
    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// All discovered components in topological order.
    #[must_use]
    pub fn components_map(&self) -> &OrderedMap<Component> {
        &self.components_map
    }

    /// Component names in topological order, `platform` first.
    #[must_use]
    pub fn components_order(&self) -> &[String] {
        &self.top_order
    }

    /// Semantic `required by` relation.
    #[must_use]
    pub fn required_by_map(&self) -> &DependencyMap {
        &self.required_by
    }

    /// Semantic `requires` relation.
    #[must_use]
    pub fn requires_map(&self) -> &DependencyMap {
        &self.requires
    }

    /// Build `required by` relation.
    #[must_use]
    pub fn build_required_by_map(&self) -> &DependencyMap {
        &self.build_required_by
    }

    /// Build `requires` relation.
    #[must_use]
    pub fn build_requires_map(&self) -> &DependencyMap {
        &self.build_requires
    }

    /// Components that semantically depend on `name`, up to `depth` hops
    /// (`depth < 0` unbounded).
    #[must_use]
    pub fn required_by_components(&self, name: &str, depth: i32) -> HashSet<String> {
        lookup_dependencies(&self.required_by, name, depth)
    }

    /// Components that `name` semantically depends on, up to `depth` hops.
    #[must_use]
    pub fn requires_components(&self, name: &str, depth: i32) -> HashSet<String> {
        lookup_dependencies(&self.requires, name, depth)
    }

    /// Components that build-depend on `name`, up to `depth` hops.
    #[must_use]
    pub fn build_required_by_components(&self, name: &str, depth: i32) -> HashSet<String> {
        lookup_dependencies(&self.build_required_by, name, depth)
    }

    /// Components that `name` build-depends on, up to `depth` hops.
    #[must_use]
    pub fn build_requires_components(&self, name: &str, depth: i32) -> HashSet<String> {
        lookup_dependencies(&self.build_requires, name, depth)
    }

    /// Parse the platform roster playbook and record the set of components
    /// actually used by the platform, closed over semantic dependencies.
    pub fn calculate_components_usage(&mut self) -> Result<()> {
        let playbook_path = self.source_dir.join(PLATFORM_PLAYBOOK);
        let data = match fs::read(&playbook_path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                bail!("{PLATFORM_PLAYBOOK} playbook doesn't exist");
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", playbook_path.display()))
            }
        };

        let plays = parse_plays(&data, &playbook_path)?;

        let mut roles: HashSet<String> = HashSet::new();
        let mut playbooks: Vec<PathBuf> = Vec::new();

        for play in &plays {
            let Some(mapping) = play.as_mapping() else { continue };
            for (key, value) in mapping {
                let Some(key) = key.as_str() else { continue };
                if key == "import_playbook" {
                    if let Some(name) = value.as_str() {
                        // parent-dir tokens are stripped before joining
                        let clean = name.replace("../", "");
                        playbooks.push(self.source_dir.join(clean));
                    }
                }
                extract_playbook_roles(&mut roles, key, value);
            }
        }

        for playbook in &playbooks {
            let data = fs::read(playbook)
                .with_context(|| format!("failed to read {}", playbook.display()))?;
            let plays = parse_plays(&data, playbook)?;
            for play in &plays {
                let Some(mapping) = play.as_mapping() else { continue };
                for (key, value) in mapping {
                    let Some(key) = key.as_str() else { continue };
                    extract_playbook_roles(&mut roles, key, value);
                }
            }
        }

        let mut used = HashSet::new();
        for role in &roles {
            used.insert(role.clone());
            used.extend(self.requires_components(role, -1));
        }

        self.used_components = Some(used);
        Ok(())
    }

    /// The set recorded by [`Self::calculate_components_usage`].
    ///
    /// # Panics
    /// Panics when usage has not been calculated.
    #[must_use]
    pub fn used_components(&self) -> &HashSet<String> {
        self.used_components
            .as_ref()
            .expect("call calculate_components_usage first")
    }

    /// Discover variables and build the variable-to-components usage maps.
    pub fn calculate_variables_usage(
        &mut self,
        vault_pass: &str,
        vault: Option<&dyn VaultDecrypt>,
    ) -> Result<()> {
        let usage =
            variables::build_usage(&self.source_dir, &self.components_map, vault_pass, vault)?;
        self.variables_usage = Some(usage);
        Ok(())
    }

    /// Components consuming a variable. Empty when variables usage has not
    /// been calculated or the variable is unknown.
    #[must_use]
    pub fn variable_components(&self, name: &str, platform: &str) -> &[String] {
        self.variables_usage
            .as_ref()
            .map_or(&[], |usage| usage.components_for(name, platform))
    }

    /// The variables registry, when calculated.
    #[must_use]
    pub fn variables_usage(&self) -> Option<&VariablesUsage> {
        self.variables_usage.as_ref()
    }
}

/// Transitive closure over one dependency direction with a hop limit.
fn lookup_dependencies(map: &DependencyMap, name: &str, limit: i32) -> HashSet<String> {
    let mut result = HashSet::new();
    if let Some(members) = map.get(name) {
        for item in members.keys() {
            result.insert(item.clone());
            lookup_recursively(map, &item, &mut result, 1, limit);
        }
    }
    result
}

fn lookup_recursively(
    map: &DependencyMap,
    name: &str,
    result: &mut HashSet<String>,
    depth: i32,
    limit: i32,
) {
    if depth == limit {
        return;
    }

    if let Some(members) = map.get(name) {
        for item in members.keys() {
            // only descend on first sight so build-map back-edges terminate
            if result.insert(item.clone()) {
                lookup_recursively(map, &item, result, depth + 1, limit);
            }
        }
    }
}

/// Parse a playbook document into its plays; an empty file has none.
fn parse_plays(data: &[u8], path: &Path) -> Result<Vec<Value>> {
    let doc: Value =
        serde_yaml::from_slice(data).with_context(|| format!("{}", path.display()))?;
    match doc {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(plays) => Ok(plays),
        _ => bail!("{}: playbook is not a sequence of plays", path.display()),
    }
}

fn extract_playbook_roles(result: &mut HashSet<String>, key: &str, value: &Value) {
    if key != "roles" {
        return;
    }

    let Some(entries) = value.as_sequence() else { return };
    for entry in entries {
        if let Some(role) = entry.as_str() {
            result.insert(role.to_string());
        } else if let Some(role) = entry.get("role").and_then(Value::as_str) {
            result.insert(role.to_string());
        }
    }
}
