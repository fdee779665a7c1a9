// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Propagation engine - cascades bumped versions through the dependency graph

use crate::component::{compose_version, is_updatable_kind, meta_version, Component};
use crate::compose;
use crate::history::{self, Probe};
use crate::inventory::Inventory;
use crate::ordered_map::OrderedMap;
use crate::repository::{self, commit_author, commit_time, file_at, short_hash, CommitsGroup};
use crate::timeline::{ComponentsItem, SortOrder, Timeline, TimelineItem, VariablesItem};
use crate::variables::{self, is_vault_encrypted, Variable, VaultDecrypt};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use git2::{Oid, Repository};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Namespace key of the domain directory; always last in priority order.
pub const DOMAIN_NAMESPACE: &str = "domain";

/// Marker author for timeline entries recorded under `allow_override`.
pub const OVERRIDE_AUTHOR: &str = "override";

/// Engine options, supplied by the caller.
#[derive(Debug, Clone)]
pub struct PropagationOptions {
    /// Composed build tree the inventory is built from and updates are
    /// written to.
    pub build_dir: PathBuf,
    /// Directory holding package checkouts referenced by the manifest.
    pub packages_dir: PathBuf,
    /// Domain directory carrying the compose manifest.
    pub domain_dir: PathBuf,
    /// Log intended updates without writing.
    pub dry_run: bool,
    /// Accept components whose in-tree version disagrees with HEAD.
    pub allow_override: bool,
    /// Restrict propagation to components used by the platform roster.
    pub filter_by_component_usage: bool,
    /// History cutoff: stop scanning at the first commit strictly older.
    pub time_depth: Option<NaiveDate>,
    /// Vault password handed to the decryption collaborator.
    pub vault_pass: String,
    /// Render progress bars.
    pub show_progress: bool,
}

/// One planned (or applied) metadata update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentUpdate {
    /// Component name.
    pub name: String,
    /// Version before the update.
    pub from: String,
    /// Version written.
    pub to: String,
}

/// Outcome summary of a propagation run.
#[derive(Debug, Default)]
pub struct PropagationReport {
    /// Updates applied (or planned, in dry-run mode), in write order.
    pub updated: Vec<ComponentUpdate>,
    /// Components skipped because their base already matched.
    pub skipped_identical: Vec<String>,
    /// Number of timeline items the run was driven by.
    pub timeline_items: usize,
}

struct AnchorInfo {
    hash: String,
    time: DateTime<FixedOffset>,
    author: String,
}

type NamespaceComponents = BTreeMap<String, OrderedMap<Component>>;
type NamespacePaths = BTreeMap<String, PathBuf>;

/// The propagation engine. One instance drives one run.
pub struct Propagation {
    opts: PropagationOptions,
    vault: Option<Arc<dyn VaultDecrypt>>,
}

impl Propagation {
    /// Create an engine with no vault decryptor; encrypted variable files
    /// will be skipped with a warning.
    #[must_use]
    pub fn new(opts: PropagationOptions) -> Self {
        Self { opts, vault: None }
    }

    /// Install a vault decryption collaborator.
    #[must_use]
    pub fn with_vault(mut self, vault: Arc<dyn VaultDecrypt>) -> Self {
        self.vault = Some(vault);
        self
    }

    /// Run the full five-phase propagation pipeline.
    pub fn execute(&self) -> Result<PropagationReport> {
        info!("initializing build inventory");
        let mut inventory = Inventory::new(&self.opts.build_dir)?;

        if self.opts.filter_by_component_usage {
            info!("calculating components usage");
            inventory
                .calculate_components_usage()
                .context("calculate components usage")?;
        }

        info!("calculating variables usage");
        inventory
            .calculate_variables_usage(&self.opts.vault_pass, self.vault.as_deref())
            .context("calculate variables usage")?;

        let timeline = self.build_timeline(&inventory).context("building timeline")?;
        if timeline.is_empty() {
            warn!("no components were found for propagation");
            return Ok(PropagationReport::default());
        }

        let timeline_items = timeline.len();
        let (to_sync, version_map) = self
            .build_propagation_map(&inventory, timeline)
            .context("building propagation map")?;

        let mut report = self
            .update_components(&to_sync, &version_map)
            .context("propagate")?;
        report.timeline_items = timeline_items;

        Ok(report)
    }

    fn build_timeline(&self, inventory: &Inventory) -> Result<Timeline> {
        info!("gathering domain and packages components");
        let (components_maps, package_paths) = self
            .namespace_components(inventory)
            .context("build component map")?;

        let timeline = Mutex::new(Timeline::new());

        info!("populating timeline with components");
        self.populate_timeline_components(&components_maps, &package_paths, &timeline)
            .context("iterating components")?;

        info!("populating timeline with variables");
        self.populate_timeline_variables(&package_paths, &timeline)
            .context("iterating variables")?;

        Ok(timeline.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Phase 2: per-namespace component maps with conflict resolution.
    fn namespace_components(
        &self,
        build_inv: &Inventory,
    ) -> Result<(NamespaceComponents, NamespacePaths)> {
        let descriptors = compose::lookup(&self.opts.domain_dir)?;

        let mut package_paths: NamespacePaths = BTreeMap::new();
        let mut priority_order: Vec<String> = Vec::new();
        for descriptor in descriptors {
            package_paths.insert(
                descriptor.name.clone(),
                descriptor.path(&self.opts.packages_dir),
            );
            priority_order.push(descriptor.name);
        }
        package_paths.insert(DOMAIN_NAMESPACE.to_string(), self.opts.domain_dir.clone());
        priority_order.push(DOMAIN_NAMESPACE.to_string());

        let pairs: Vec<(String, PathBuf)> = package_paths
            .iter()
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect();

        let gathered: Result<Vec<(String, OrderedMap<Component>)>> = pairs
            .par_iter()
            .map(|(name, path)| {
                let inventory = Inventory::new(path)?;
                let mut components = inventory.components_map().clone();
                components.sort_keys_alphabetically();
                Ok((name.clone(), components))
            })
            .collect();
        let mut components_maps: NamespaceComponents = gathered?.into_iter().collect();

        if self.opts.filter_by_component_usage {
            let used = build_inv.used_components();
            if used.is_empty() {
                // nothing is used by the platform: the run becomes a no-op
                warn!("no components are used in the build");
                return Ok((BTreeMap::new(), BTreeMap::new()));
            }

            let mut used_sorted: Vec<&String> = used.iter().collect();
            used_sorted.sort();
            debug!("used components: {used_sorted:?}");

            for (namespace, components) in &mut components_maps {
                for key in components.keys() {
                    if !used.contains(&key) {
                        debug!("unused component {key} removed from namespace {namespace}");
                        components.unset(&key);
                    }
                }
            }
        }

        // Conflict resolution: a component claimed by several namespaces is
        // kept where its base matches the build, preferring the namespace
        // latest in priority order (domain wins, then later packages).
        for name in build_inv.components_map().keys() {
            let conflicts: Vec<String> = components_maps
                .iter()
                .filter(|(_, components)| components.contains_key(&name))
                .map(|(namespace, _)| namespace.clone())
                .collect();
            if conflicts.len() < 2 {
                continue;
            }

            let build_component = Component::new(&name, &self.opts.build_dir)?;
            let build_version = build_component.version()?;

            let mut same_version: Vec<String> = Vec::new();
            for namespace in &conflicts {
                let Some(prefix) = package_paths.get(namespace) else {
                    continue;
                };
                let entity = Component::new(&name, prefix)?;
                let (base, _) = entity.base_version()?;

                if base != build_version {
                    debug!(
                        component = name.as_str(),
                        namespace = namespace.as_str(),
                        version = base.as_str(),
                        build_version = build_version.as_str(),
                        "removing component from namespace because of composition strategy"
                    );
                    if let Some(components) = components_maps.get_mut(namespace) {
                        components.unset(&name);
                    }
                } else {
                    same_version.push(namespace.clone());
                }
            }

            if same_version.len() > 1 {
                debug!("resolving additional strategies conflict for component {name}");
                let keeper = priority_order
                    .iter()
                    .rev()
                    .find(|namespace| same_version.contains(*namespace))
                    .cloned();

                for namespace in &same_version {
                    if Some(namespace) != keeper.as_ref() {
                        if let Some(components) = components_maps.get_mut(namespace) {
                            components.unset(&name);
                        }
                    }
                }
            }
        }

        Ok((components_maps, package_paths))
    }

    /// Phase 3: resolve every component's anchor commit, in parallel.
    fn populate_timeline_components(
        &self,
        components_maps: &NamespaceComponents,
        package_paths: &NamespacePaths,
        timeline: &Mutex<Timeline>,
    ) -> Result<()> {
        let namespaces: Vec<(&String, &PathBuf)> = package_paths
            .iter()
            .filter(|(name, _)| {
                components_maps
                    .get(*name)
                    .is_some_and(|components| !components.is_empty())
            })
            .collect();

        let progress = if self.opts.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        namespaces.par_iter().try_for_each(|(name, path)| {
            let Some(components) = components_maps.get(*name) else {
                return Ok(());
            };

            let bar = progress.add(progress_bar(
                components.len() as u64,
                &format!("collecting components from {name}"),
            ));
            let result = self.namespace_change_times(path, components, timeline, &bar);
            bar.finish_and_clear();
            result.with_context(|| format!("processing namespace {name}"))
        })
    }

    fn namespace_change_times(
        &self,
        path: &Path,
        components: &OrderedMap<Component>,
        timeline: &Mutex<Timeline>,
        bar: &ProgressBar,
    ) -> Result<()> {
        let repo = repository::open(path)?;
        let (groups, commits_index) =
            repository::collect_commits_groups(&repo, self.opts.time_depth)
                .context("collect components commits")?;
        drop(repo);

        // git2 repositories are not Sync; each worker opens its own handle
        let keys = components.keys();
        keys.par_iter().try_for_each_init(
            || repository::open(path),
            |repo, key| {
                let repo = match repo.as_ref() {
                    Ok(repo) => repo,
                    Err(err) => bail!("{err:#}"),
                };
                let Some(component) = components.get(key) else {
                    return Ok(());
                };
                let result =
                    self.process_component(component, &groups, &commits_index, repo, timeline);
                bar.inc(1);
                result
            },
        )
    }

    /// Correlate one component's in-tree version with the repository's
    /// history and add its timeline entry.
    fn process_component(
        &self,
        component: &Component,
        groups: &OrderedMap<CommitsGroup>,
        commits_index: &HashMap<String, repository::CommitIndexEntry>,
        repo: &Repository,
        timeline: &Mutex<Timeline>,
    ) -> Result<()> {
        let build_component = Component::new(component.name(), &self.opts.build_dir)?;
        let current_version = build_component.version()?;

        let head_commit = repo
            .head()
            .context("can't get HEAD ref")?
            .peel_to_commit()
            .context("can't get HEAD commit object")?;

        let meta_path = component.meta_path();
        let head_file = file_at(repo, &head_commit, &meta_path)?.with_context(|| {
            format!(
                "opening file {} in commit {}",
                meta_path.display(),
                head_commit.id()
            )
        })?;

        let head_meta: Value = serde_yaml::from_slice(&head_file.data)
            .with_context(|| format!("YAML load commit {}", head_commit.id()))?;
        let head_version = meta_version(&head_meta);
        let original_hash = head_file.blob_id;

        let anchor;
        if current_version != head_version {
            let msg = format!(
                "version of `{}` doesn't match HEAD commit",
                component.name()
            );
            if !self.opts.allow_override {
                bail!(msg);
            }
            warn!("{msg}");
            anchor = AnchorInfo {
                hash: head_commit.id().to_string(),
                time: commit_time(&head_commit),
                author: OVERRIDE_AUTHOR.to_string(),
            };
        } else {
            let index_entry = commits_index.get(current_version.as_str());
            if index_entry.is_none() {
                warn!(
                    "latest version of `{}` doesn't match any existing commit",
                    component.name()
                );
            }

            let mut probe = match index_entry {
                Some(entry) => match groups.get(&entry.section) {
                    Some(group) if entry.section != repository::HEAD_GROUP => {
                        history::process_bump_section(
                            repo,
                            group,
                            &meta_path,
                            &current_version,
                            &original_hash,
                        )?
                    }
                    // head-section and unresolvable sections funnel into the
                    // unknown-section recovery path
                    _ => history::process_unknown_section(
                        repo,
                        groups,
                        &meta_path,
                        &current_version,
                        &original_hash,
                    )?,
                },
                None => history::process_unknown_section(
                    repo,
                    groups,
                    &meta_path,
                    &current_version,
                    &original_hash,
                )?,
            };

            if probe == Probe::Brute {
                probe = history::process_all_sections(
                    repo,
                    groups,
                    &meta_path,
                    &current_version,
                    &original_hash,
                )?;
            }

            let Probe::Anchor(oid) = probe else {
                bail!("couldn't find version commit for {}", component.name());
            };

            let commit = repo
                .find_commit(oid)
                .with_context(|| format!("can't get commit object {oid}"))?;
            anchor = AnchorInfo {
                hash: oid.to_string(),
                time: commit_time(&commit),
                author: commit_author(&commit),
            };
        }

        debug!(
            component = component.name(),
            commit = anchor.hash.as_str(),
            version = current_version.as_str(),
            date = %anchor.time,
            "add component to timeline"
        );

        if anchor.author != repository::AUTHOR && anchor.author != OVERRIDE_AUTHOR {
            warn!(
                "latest commit of {} is not a bump commit",
                component.name()
            );
        }

        let mut item = ComponentsItem::new(&current_version, &anchor.hash, anchor.time);
        item.add_component(component.clone());

        let mut timeline = timeline.lock().unwrap_or_else(PoisonError::into_inner);
        timeline.add(TimelineItem::Components(item));

        Ok(())
    }

    /// Phase 4: record variable changes found in each namespace's history.
    fn populate_timeline_variables(
        &self,
        package_paths: &NamespacePaths,
        timeline: &Mutex<Timeline>,
    ) -> Result<()> {
        for (namespace, path) in package_paths {
            self.namespace_variable_changes(path, timeline)
                .with_context(|| format!("processing namespace {namespace}"))?;
        }
        Ok(())
    }

    fn namespace_variable_changes(
        &self,
        path: &Path,
        timeline: &Mutex<Timeline>,
    ) -> Result<()> {
        let files = variables::collect_group_vars_files(path)?;
        if files.is_empty() {
            return Ok(());
        }

        let repo = repository::open(path)?;
        let (groups, _) = repository::collect_commits_groups(&repo, self.opts.time_depth)
            .context("collect variables commits")?;

        // flatten the partitioned window back into first-parent order
        let mut sequence: Vec<String> = Vec::new();
        for key in groups.keys() {
            let Some(group) = groups.get(&key) else { continue };
            if group.name != repository::HEAD_GROUP {
                sequence.push(group.commit.clone());
            }
            sequence.extend(group.items.iter().cloned());
        }

        for rel in &files {
            self.variable_file_changes(&repo, &sequence, rel, timeline)
                .with_context(|| format!("{}", rel.display()))?;
        }

        Ok(())
    }

    fn variable_file_changes(
        &self,
        repo: &Repository,
        sequence: &[String],
        rel: &Path,
        timeline: &Mutex<Timeline>,
    ) -> Result<()> {
        let platform = rel
            .components()
            .next()
            .and_then(|c| c.as_os_str().to_str())
            .unwrap_or_default()
            .to_string();

        for pair in sequence.windows(2) {
            let newer_commit = repo.find_commit(Oid::from_str(&pair[0])?)?;
            let older_commit = repo.find_commit(Oid::from_str(&pair[1])?)?;

            let Some(newer_file) = file_at(repo, &newer_commit, rel)? else {
                continue;
            };
            let older_file = file_at(repo, &older_commit, rel)?;

            if older_file
                .as_ref()
                .is_some_and(|older| older.blob_id == newer_file.blob_id)
            {
                continue;
            }

            let encrypted = is_vault_encrypted(&newer_file.data);
            let decrypt = |data: &[u8]| -> Result<Option<Vec<u8>>> {
                if !is_vault_encrypted(data) {
                    return Ok(Some(data.to_vec()));
                }
                let Some(vault) = self.vault.as_deref() else {
                    return Ok(None);
                };
                Ok(Some(vault.decrypt(&self.opts.vault_pass, data)?))
            };

            let Some(newer_data) = decrypt(&newer_file.data)? else {
                warn!(
                    "skipping vault file {} (no decryptor configured)",
                    rel.display()
                );
                return Ok(());
            };
            let newer_vars = variables::parse_vars_file(&newer_data)?;

            let older_vars = match &older_file {
                Some(older) => match decrypt(&older.data)? {
                    Some(data) => variables::parse_vars_file(&data)?,
                    None => {
                        warn!(
                            "skipping vault file {} (no decryptor configured)",
                            rel.display()
                        );
                        return Ok(());
                    }
                },
                None => BTreeMap::new(),
            };

            let mut item = VariablesItem::new(
                short_hash(&pair[0]),
                pair[0].as_str(),
                commit_time(&newer_commit),
            );

            for (name, value) in &newer_vars {
                let hash = variables::variable_hash(value);
                let changed = older_vars
                    .get(name)
                    .map_or(true, |old| variables::variable_hash(old) != hash);
                if changed {
                    item.add_variable(Variable::new(name, &platform, rel, hash, encrypted));
                }
            }

            if !item.variables().is_empty() {
                debug!(
                    commit = pair[0].as_str(),
                    file = %rel.display(),
                    "add variables to timeline"
                );
                let mut timeline = timeline.lock().unwrap_or_else(PoisonError::into_inner);
                timeline.add(TimelineItem::Variables(item));
            }
        }

        Ok(())
    }

    /// Phase 5: walk the timeline newest-first and derive the propagation
    /// map under the single-assignment discipline.
    fn build_propagation_map(
        &self,
        inventory: &Inventory,
        mut timeline: Timeline,
    ) -> Result<(OrderedMap<Component>, HashMap<String, String>)> {
        let mut component_version_map: HashMap<String, String> = HashMap::new();
        let mut to_sync: OrderedMap<Component> = OrderedMap::new();
        let mut processed: HashSet<String> = HashSet::new();
        let components_map = inventory.components_map();

        timeline.sort(SortOrder::Desc);

        let used_components: HashSet<String> = if self.opts.filter_by_component_usage {
            inventory.used_components().clone()
        } else {
            HashSet::new()
        };

        info!("iterating timeline");
        for item in timeline.iter() {
            match item {
                TimelineItem::Components(components_item) => {
                    let mut members = components_item.components().clone();
                    members.sort_keys_alphabetically();

                    let mut to_process: Vec<String> = Vec::new();
                    for key in members.keys() {
                        if processed.contains(&key) {
                            continue;
                        }
                        let Some(member) = members.get(&key) else {
                            bail!("unknown key {key} detected during timeline iteration");
                        };
                        if !is_updatable_kind(member.kind()) {
                            warn!("{key} is not allowed to propagate");
                            continue;
                        }
                        to_process.push(key);
                    }

                    if to_process.is_empty() {
                        continue;
                    }

                    for key in &to_process {
                        processed.insert(key.clone());

                        let mut dependents =
                            inventory.required_by_components(key, -1);
                        if self.opts.filter_by_component_usage {
                            dependents.retain(|name| used_components.contains(name));
                        }

                        let mut dependents: Vec<String> = dependents.into_iter().collect();
                        dependents.sort();

                        for dependent in dependents {
                            let Some(dep_component) = components_map.get(&dependent) else {
                                continue;
                            };
                            if !processed.insert(dependent.clone()) {
                                continue;
                            }
                            if !is_updatable_kind(dep_component.kind()) {
                                warn!("{dependent} is not allowed to propagate");
                                continue;
                            }

                            to_sync.set(dependent.clone(), dep_component.clone());
                            component_version_map
                                .insert(dependent, item.version().to_string());
                        }
                    }

                    // directly changed members are the change source, not a
                    // propagation target
                    for key in &to_process {
                        to_sync.unset(key);
                        component_version_map.remove(key);
                    }
                }
                TimelineItem::Variables(variables_item) => {
                    let mut members = variables_item.variables().clone();
                    members.sort_keys_alphabetically();

                    let mut consumers: Vec<String> = Vec::new();
                    for key in members.keys() {
                        let Some(variable) = members.get(&key) else { continue };
                        let components = inventory
                            .variable_components(variable.name(), variable.platform());
                        if used_components.is_empty() {
                            consumers.extend(components.iter().cloned());
                        } else {
                            consumers.extend(
                                components
                                    .iter()
                                    .filter(|name| used_components.contains(*name))
                                    .cloned(),
                            );
                        }
                    }

                    consumers.sort();
                    consumers.dedup();

                    let to_process: Vec<String> = consumers
                        .into_iter()
                        .filter(|name| !processed.contains(name))
                        .collect();

                    for name in &to_process {
                        let Some(main_component) = components_map.get(name) else {
                            warn!("skipping not valid component {name} (direct vars dependency)");
                            continue;
                        };

                        processed.insert(name.clone());

                        if is_updatable_kind(main_component.kind()) {
                            to_sync.set(name.clone(), main_component.clone());
                            component_version_map
                                .insert(name.clone(), item.version().to_string());
                        }

                        let mut dependents = inventory.required_by_components(name, -1);
                        if self.opts.filter_by_component_usage {
                            dependents.retain(|dep| used_components.contains(dep));
                        }
                        let mut dependents: Vec<String> = dependents.into_iter().collect();
                        dependents.sort();

                        for dependent in dependents {
                            let Some(dep_component) = components_map.get(&dependent) else {
                                warn!(
                                    "skipping not valid component {dependent} (dependency of {name})"
                                );
                                continue;
                            };
                            if !processed.insert(dependent.clone()) {
                                continue;
                            }
                            if !is_updatable_kind(dep_component.kind()) {
                                warn!("{dependent} is not allowed to propagate");
                                continue;
                            }

                            to_sync.set(dependent.clone(), dep_component.clone());
                            component_version_map
                                .insert(dependent, item.version().to_string());
                        }
                    }
                }
            }
        }

        Ok((to_sync, component_version_map))
    }

    /// Compute final versions and write them, alphabetically, serially.
    fn update_components(
        &self,
        to_sync: &OrderedMap<Component>,
        component_version_map: &HashMap<String, String>,
    ) -> Result<PropagationReport> {
        let mut report = PropagationReport::default();
        let mut update_map: HashMap<String, (String, String)> = HashMap::new();
        let mut sort_list: Vec<String> = Vec::new();
        let mut stop_propagation = false;

        info!("sorting components before update");
        for key in to_sync.keys() {
            let Some(component) = to_sync.get(&key) else {
                bail!("unidentified component found during update {key}");
            };
            let (base_version, current_version) = component.base_version()?;

            if current_version.is_empty() {
                warn!("component {} has no version", component.name());
                stop_propagation = true;
            }

            let propagated = component_version_map
                .get(&key)
                .with_context(|| format!("unidentified component found during update {key}"))?;

            let new_version = compose_version(&current_version, propagated);
            if base_version == *propagated || new_version == current_version {
                debug!(
                    base = base_version.as_str(),
                    current = current_version.as_str(),
                    propagated = propagated.as_str(),
                    "skip identical"
                );
                warn!("- skip {} (identical versions)", component.name());
                report.skipped_identical.push(key);
                continue;
            }

            update_map.insert(key.clone(), (current_version, new_version));
            sort_list.push(key);
        }

        if stop_propagation {
            bail!("empty version has been detected, please check log");
        }

        if update_map.is_empty() {
            info!("no version to propagate");
            return Ok(report);
        }

        sort_list.sort();
        info!("propagating versions");

        let bar = if self.opts.show_progress {
            let bar = ProgressBar::new(sort_list.len() as u64);
            bar.set_style(progress_style());
            bar.set_message("updating components");
            bar
        } else {
            ProgressBar::hidden()
        };

        for key in sort_list {
            bar.inc(1);

            let Some((current_version, new_version)) = update_map.get(&key) else {
                continue;
            };
            let Some(component) = to_sync.get(&key) else {
                bail!("unidentified component found during update {key}");
            };

            info!("{} from {} to {}", key, current_version, new_version);
            if !self.opts.dry_run {
                component.update_version(new_version)?;
            }

            report.updated.push(ComponentUpdate {
                name: key,
                from: current_version.clone(),
                to: new_version.clone(),
            });
        }

        bar.finish_and_clear();
        Ok(report)
    }
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:30}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn progress_bar(len: u64, message: &str) -> ProgressBar {
    let bar = ProgressBar::new(len);
    bar.set_style(progress_style());
    bar.set_message(message.to_string());
    bar
}
