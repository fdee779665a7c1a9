// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Bump command - writes fresh commit hashes into changed components

use crate::component::Component;
use crate::ordered_map::OrderedMap;
use crate::repository::{short_hash, Bumper};
use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Files whose changes never trigger a version bump.
const UNVERSIONED_FILES: &[&str] = &["README.md", "README.svg"];

/// Run the bump command over the repository at `path`.
pub fn run(path: &Path, last: bool, dry_run: bool) -> Result<()> {
    info!("bumping updated components");

    let bumper = Bumper::open(path)?;
    if bumper.is_own_commit()? {
        println!("skipping bump, as the latest commit is already by the bumper tool");
        return Ok(());
    }

    let commits = bumper.commits(last)?;
    let components = collect_components(path, &commits);
    if components.is_empty() {
        println!("No component to update");
        return Ok(());
    }

    println!("Updating versions:");
    for key in components.keys() {
        let Some((component, version)) = components.get(&key) else {
            continue;
        };
        let current = component.version()?;
        println!("- {key} from {current} to {version}");
        if !dry_run {
            component.update_version(version)?;
        }
    }

    if dry_run {
        return Ok(());
    }

    let hash = bumper.commit_bump()?;
    info!("created bump commit {hash}");
    Ok(())
}

/// Map changed files to their components, first touching commit wins per
/// component. Unversioned files and component `actions/` dirs are ignored.
fn collect_components(
    prefix: &Path,
    commits: &[crate::repository::ChangedCommit],
) -> OrderedMap<(Component, String)> {
    let mut components: OrderedMap<(Component, String)> = OrderedMap::new();
    let mut assigned: HashMap<String, String> = HashMap::new();

    for commit in commits {
        let version = short_hash(&commit.hash).to_string();
        for file in &commit.files {
            let Some(component) = changed_component(prefix, file) else {
                continue;
            };
            if assigned.contains_key(component.name()) {
                continue;
            }

            debug!("processing component {}", component.name());
            assigned.insert(component.name().to_string(), version.clone());
            components.set(
                component.name().to_string(),
                (component, version.clone()),
            );
        }
    }

    components
}

fn changed_component(prefix: &Path, file: &Path) -> Option<Component> {
    let name = file.file_name()?.to_str()?;
    if UNVERSIONED_FILES.contains(&name) {
        return None;
    }

    let component = Component::from_path(file, prefix)?;

    // changes under a component's actions dir don't version it
    let actions_dir: std::path::PathBuf = [
        component.layer(),
        component.kind(),
        component.role(),
        "actions",
    ]
    .iter()
    .collect();
    if file.starts_with(&actions_dir) {
        return None;
    }

    Some(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::ChangedCommit;
    use std::fs;
    use tempfile::TempDir;

    fn write_meta(root: &Path, name: &str) {
        let c = Component::new(name, root).unwrap();
        let meta = c.real_meta_path();
        fs::create_dir_all(meta.parent().unwrap()).unwrap();
        fs::write(meta, "plasma:\n  version: old\n").unwrap();
    }

    #[test]
    fn first_touching_commit_wins_per_component() {
        let tmp = TempDir::new().unwrap();
        write_meta(tmp.path(), "l.services.a");

        let commits = vec![
            ChangedCommit {
                hash: "1111111111111111111111111111111111111111".into(),
                files: vec!["l/services/a/tasks/main.yaml".into()],
            },
            ChangedCommit {
                hash: "2222222222222222222222222222222222222222".into(),
                files: vec!["l/services/a/defaults/main.yaml".into()],
            },
        ];

        let components = collect_components(tmp.path(), &commits);
        assert_eq!(components.len(), 1);
        let (_, version) = components.get("l.services.a").unwrap();
        assert_eq!(version, "1111111111111");
    }

    #[test]
    fn unversioned_and_actions_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        write_meta(tmp.path(), "l.services.a");

        let commits = vec![ChangedCommit {
            hash: "3333333333333333333333333333333333333333".into(),
            files: vec![
                "l/services/a/README.md".into(),
                "l/services/a/actions/run.yaml".into(),
            ],
        }];

        let components = collect_components(tmp.path(), &commits);
        assert!(components.is_empty());
    }
}
