// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! History correlation - locating the commit that introduced a version

use crate::component::meta_version;
use crate::ordered_map::OrderedMap;
use crate::repository::{file_at, CommitsGroup, HEAD_GROUP};
use anyhow::{Context, Result};
use git2::{Commit, Oid, Repository};
use serde_yaml::Value;
use std::path::Path;

/// Outcome of probing commit groups for a component's anchor commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// The anchor commit was located.
    Anchor(Oid),
    /// The probe hit an anomaly; fall back to the brute-force scan.
    Brute,
    /// Every group was examined without a match.
    Exhausted,
}

fn group_commit<'r>(repo: &'r Repository, group: &CommitsGroup) -> Result<Commit<'r>> {
    let oid = Oid::from_str(&group.commit)
        .with_context(|| format!("can't parse group commit id {}", group.commit))?;
    repo.find_commit(oid)
        .with_context(|| format!("can't get group commit object {}", group.commit))
}

fn item_commit<'r>(repo: &'r Repository, item: &str) -> Result<Commit<'r>> {
    let oid =
        Oid::from_str(item).with_context(|| format!("can't parse item commit id {item}"))?;
    repo.find_commit(oid)
        .with_context(|| format!("can't get item commit object {item}"))
}

fn version_from_bytes(data: &[u8], commit: &Commit<'_>, path: &Path) -> Result<String> {
    let meta: Value = serde_yaml::from_slice(data)
        .with_context(|| format!("YAML load {} at commit {}", path.display(), commit.id()))?;
    Ok(meta_version(&meta))
}

/// Validate that a known group's bump commit anchors `current_version`.
///
/// The bump commit must carry the metadata with the in-tree blob hash, and
/// the newest pre-bump commit must differ in both blob and version. Any
/// other shape requests the brute-force scan.
pub fn process_bump_section(
    repo: &Repository,
    group: &CommitsGroup,
    meta_path: &Path,
    current_version: &str,
    original_hash: &str,
) -> Result<Probe> {
    if group.name == HEAD_GROUP || group.items.is_empty() {
        // a version can't originate from the unbumped head group
        return Ok(Probe::Brute);
    }

    let section_commit = group_commit(repo, group)?;
    let Some(section_file) = file_at(repo, &section_commit, meta_path)? else {
        return Ok(Probe::Brute);
    };
    if section_file.blob_id != original_hash {
        return Ok(Probe::Brute);
    }

    let first_item = item_commit(repo, &group.items[0])?;
    let Some(item_file) = file_at(repo, &first_item, meta_path)? else {
        return Ok(Probe::Brute);
    };

    if item_file.blob_id == original_hash {
        // file hashes match when they shouldn't
        return Ok(Probe::Brute);
    }

    let item_version = version_from_bytes(&item_file.data, &first_item, meta_path)?;
    if item_version == current_version {
        // version matches when it shouldn't
        return Ok(Probe::Brute);
    }

    Ok(Probe::Anchor(section_commit.id()))
}

/// Locate the anchor when the version maps to no known group: probe groups
/// in reverse insertion order for a bump commit carrying the in-tree blob.
/// Reaching the head group hands over to the brute-force scan.
pub fn process_unknown_section(
    repo: &Repository,
    groups: &OrderedMap<CommitsGroup>,
    meta_path: &Path,
    current_version: &str,
    original_hash: &str,
) -> Result<Probe> {
    let keys = groups.keys();
    for key in keys.iter().rev() {
        let Some(group) = groups.get(key) else { continue };

        if group.name == HEAD_GROUP {
            // the version may predate every bump; only the brute scan can
            // attest where the content actually appeared
            return Ok(Probe::Brute);
        }

        let section_commit = group_commit(repo, group)?;
        let Some(section_file) = file_at(repo, &section_commit, meta_path)? else {
            continue;
        };
        if section_file.blob_id != original_hash {
            continue;
        }

        if group.items.is_empty() {
            return Ok(Probe::Brute);
        }

        let first_item = item_commit(repo, &group.items[0])?;
        let Some(item_file) = file_at(repo, &first_item, meta_path)? else {
            return Ok(Probe::Brute);
        };

        if item_file.blob_id == original_hash {
            return Ok(Probe::Brute);
        }

        let item_version = version_from_bytes(&item_file.data, &first_item, meta_path)?;
        if item_version == current_version {
            return Ok(Probe::Brute);
        }

        return Ok(Probe::Anchor(section_commit.id()));
    }

    Ok(Probe::Exhausted)
}

/// Brute-force scan: probe every group in reverse insertion order. Bump
/// groups qualify when their anchor's metadata version equals
/// `current_version`; the head group qualifies unconditionally with HEAD as
/// the starting anchor. Within the qualifying group, follow item commits
/// while the metadata content stays identical, stopping when it diverges or
/// the recorded version changes.
pub fn process_all_sections(
    repo: &Repository,
    groups: &OrderedMap<CommitsGroup>,
    meta_path: &Path,
    current_version: &str,
    original_hash: &str,
) -> Result<Probe> {
    let keys = groups.keys();
    for key in keys.iter().rev() {
        let Some(group) = groups.get(key) else { continue };

        let section_commit = group_commit(repo, group)?;
        let mut anchor = section_commit.id();
        let mut file_hash;

        if group.name == HEAD_GROUP {
            // final line of defence: anchor at HEAD and walk downwards
            file_hash = original_hash.to_string();
        } else {
            let Some(section_file) = file_at(repo, &section_commit, meta_path)? else {
                continue;
            };
            let section_version =
                version_from_bytes(&section_file.data, &section_commit, meta_path)?;
            if section_version != current_version {
                continue;
            }
            file_hash = section_file.blob_id;
        }

        for item in &group.items {
            let commit = item_commit(repo, item)?;
            let Some(item_file) = file_at(repo, &commit, meta_path)? else {
                // the file was created in a later commit
                break;
            };

            if item_file.blob_id == file_hash {
                anchor = commit.id();
                continue;
            }

            let item_version = version_from_bytes(&item_file.data, &commit, meta_path)?;
            if item_version != current_version {
                break;
            }

            file_hash = item_file.blob_id;
            anchor = commit.id();
        }

        return Ok(Probe::Anchor(anchor));
    }

    Ok(Probe::Exhausted)
}
