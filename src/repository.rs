// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Git collaborator - repository access, bump identity, commit partitioning

use crate::ordered_map::OrderedMap;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use git2::{Commit, ErrorCode, Repository, Signature};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Author name identifying commits made by the bump tool.
pub const AUTHOR: &str = "Bumper";
/// Author email used when the bump tool commits.
pub const AUTHOR_EMAIL: &str = "no-reply@plasma.sh";
/// Commit message used by the bump tool.
pub const BUMP_MESSAGE: &str = "versions bump";
/// Width of the short commit hash stored as a component version.
pub const VERSION_HASH_LEN: usize = 13;
/// Sentinel group name for commits above the most recent bump commit.
pub const HEAD_GROUP: &str = "head";

/// Open a repository at `path`, following worktree indirection.
pub fn open(path: &Path) -> Result<Repository> {
    Repository::open(path).with_context(|| format!("{}", path.display()))
}

/// Truncate a full hash to the version-hash width.
#[must_use]
pub fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(VERSION_HASH_LEN)]
}

/// Commit author timestamp, offset preserved as recorded.
#[must_use]
pub fn commit_time(commit: &Commit<'_>) -> DateTime<FixedOffset> {
    let when = commit.author().when();
    let tz = FixedOffset::east_opt(when.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
    DateTime::from_timestamp(when.seconds(), 0)
        .unwrap_or(DateTime::UNIX_EPOCH)
        .with_timezone(&tz)
}

/// Commit author name, empty when unset.
#[must_use]
pub fn commit_author(commit: &Commit<'_>) -> String {
    commit.author().name().unwrap_or_default().to_string()
}

/// A file as stored at a specific commit.
#[derive(Debug, Clone)]
pub struct CommitFile {
    /// Stable blob id of the content.
    pub blob_id: String,
    /// File content bytes.
    pub data: Vec<u8>,
}

/// Look up a path in a commit's tree. `None` when the file does not exist
/// at that commit.
pub fn file_at(repo: &Repository, commit: &Commit<'_>, path: &Path) -> Result<Option<CommitFile>> {
    let tree = commit.tree()?;
    let entry = match tree.get_path(path) {
        Ok(entry) => entry,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("can't read {} from commit {}", path.display(), commit.id())
            })
        }
    };

    let blob = repo
        .find_blob(entry.id())
        .with_context(|| format!("can't read blob {} ({})", entry.id(), path.display()))?;

    Ok(Some(CommitFile {
        blob_id: entry.id().to_string(),
        data: blob.content().to_vec(),
    }))
}

/// A contiguous span of first-parent history delimited by bump commits.
///
/// `commit` is the anchor (the bump commit, or HEAD for the head group);
/// `items` are the non-bump commits below the anchor, newest first.
#[derive(Debug, Clone)]
pub struct CommitsGroup {
    /// Group name: the anchor hash, or [`HEAD_GROUP`] when no bump commit
    /// has been seen yet.
    pub name: String,
    /// Anchor commit hash.
    pub commit: String,
    /// Anchor author date.
    pub date: DateTime<FixedOffset>,
    /// Non-bump commit hashes belonging to the group, newest first.
    pub items: Vec<String>,
}

/// Index entry mapping a short version hash to its commit and group.
#[derive(Debug, Clone)]
pub struct CommitIndexEntry {
    /// Full commit hash.
    pub original: String,
    /// Key of the group the commit belongs to; [`HEAD_GROUP`] for the HEAD
    /// commit of an unbumped tip, empty for bump commits themselves.
    pub section: String,
}

/// Partition first-parent history from HEAD into bump-delimited groups.
///
/// Returns the groups keyed by anchor hash in discovery (newest-first)
/// order, plus a short-hash index over every commit in the window. A
/// duplicate short hash within the window is a fatal error. With a cutoff
/// date, iteration stops at the first commit strictly older than it.
pub fn collect_commits_groups(
    repo: &Repository,
    before: Option<NaiveDate>,
) -> Result<(OrderedMap<CommitsGroup>, HashMap<String, CommitIndexEntry>)> {
    let head = repo.head().context("can't get HEAD ref")?;
    let head_oid = head
        .target()
        .context("HEAD is not pointing at a commit")?;

    let cutoff: Option<DateTime<Utc>> = before.and_then(|d| {
        d.and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
    });

    let mut revwalk = repo.revwalk().context("git log error")?;
    revwalk.push(head_oid).context("git log error")?;
    revwalk.simplify_first_parent().context("git log error")?;

    let mut groups: OrderedMap<CommitsGroup> = OrderedMap::new();
    let mut index: HashMap<String, CommitIndexEntry> = HashMap::new();

    let mut section = String::new();
    let mut section_name = String::new();
    let mut section_date = DateTime::UNIX_EPOCH.fixed_offset();
    let mut items: Vec<String> = Vec::new();
    let mut seen_head = false;

    for oid in revwalk {
        let oid = oid.context("git log error")?;
        let commit = repo
            .find_commit(oid)
            .with_context(|| format!("can't get commit object {oid}"))?;

        let when = commit_time(&commit);
        if let Some(cutoff) = cutoff {
            if when < cutoff {
                break;
            }
        }

        let full = oid.to_string();
        let short = short_hash(&full).to_string();
        if index.contains_key(&short) {
            bail!("duplicate version hash {short} during commits iteration");
        }

        let author = commit_author(&commit);
        let is_bump = author == AUTHOR;

        if !seen_head {
            seen_head = true;
            section_date = when;
            section.clone_from(&full);
            if is_bump {
                section_name.clone_from(&full);
                index.insert(
                    short,
                    CommitIndexEntry {
                        original: full,
                        section: section_name.clone(),
                    },
                );
            } else {
                section_name = HEAD_GROUP.to_string();
                index.insert(
                    short,
                    CommitIndexEntry {
                        original: full.clone(),
                        section: HEAD_GROUP.to_string(),
                    },
                );
                items.push(full);
            }
            continue;
        }

        if is_bump {
            // close the accumulated group and open a new one at this commit
            groups.set(
                section.clone(),
                CommitsGroup {
                    name: section_name.clone(),
                    commit: section.clone(),
                    date: section_date,
                    items: std::mem::take(&mut items),
                },
            );

            index.insert(
                short,
                CommitIndexEntry {
                    original: full.clone(),
                    section: String::new(),
                },
            );
            section = full.clone();
            section_name = full;
            section_date = when;
        } else {
            index.insert(
                short,
                CommitIndexEntry {
                    original: full.clone(),
                    section: section.clone(),
                },
            );
            items.push(full);
        }
    }

    if seen_head && !groups.contains_key(&section) {
        groups.set(
            section.clone(),
            CommitsGroup {
                name: section_name,
                commit: section,
                date: section_date,
                items,
            },
        );
    }

    Ok((groups, index))
}

/// A commit together with the files it touched, used by the bump action.
#[derive(Debug, Clone)]
pub struct ChangedCommit {
    /// Full commit hash.
    pub hash: String,
    /// Paths changed relative to the first parent.
    pub files: Vec<PathBuf>,
}

/// Bump-action access to the repository at the working directory.
pub struct Bumper {
    repo: Repository,
}

impl Bumper {
    /// Discover and open the repository containing `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path)
            .with_context(|| format!("no git repository at {}", path.display()))?;
        Ok(Self { repo })
    }

    /// Whether HEAD is already a bump commit.
    pub fn is_own_commit(&self) -> Result<bool> {
        let head = self.repo.head()?.peel_to_commit()?;
        Ok(commit_author(&head) == AUTHOR)
    }

    /// Commits since the previous bump commit (exclusive), newest first,
    /// each with its changed files. With `last_only`, just the HEAD commit.
    pub fn commits(&self, last_only: bool) -> Result<Vec<ChangedCommit>> {
        let head = self.repo.head()?.peel_to_commit()?;

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(head.id())?;
        revwalk.simplify_first_parent()?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let oid = oid?;
            let commit = self.repo.find_commit(oid)?;
            if commit_author(&commit) == AUTHOR {
                break;
            }

            commits.push(ChangedCommit {
                hash: oid.to_string(),
                files: self.changed_files(&commit)?,
            });

            if last_only {
                break;
            }
        }

        Ok(commits)
    }

    fn changed_files(&self, commit: &Commit<'_>) -> Result<Vec<PathBuf>> {
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

        let mut files = Vec::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }

    /// Stage everything and create the bump commit with the bump identity.
    pub fn commit_bump(&self) -> Result<String> {
        let mut git_index = self.repo.index()?;
        git_index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        git_index.write()?;

        let tree_id = git_index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let head = self.repo.head()?.peel_to_commit()?;
        let signature = Signature::now(AUTHOR, AUTHOR_EMAIL)?;

        let oid = self.repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            BUMP_MESSAGE,
            &tree,
            &[&head],
        )?;

        Ok(oid.to_string())
    }
}
