// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Files crawler - walks a source tree and classifies component files

use anyhow::{Context, Result};
use serde_yaml::Value;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Paths containing any of these fragments are excluded from the crawl.
pub const CRAWL_EXCLUDED: &[&str] = &[
    ".git",
    ".plasma",
    ".plasmactl",
    ".gitlab-ci.yml",
    "ansible_collections",
    "scripts/ci/.gitlab-ci.platform.yaml",
    "venv",
    "__pycache__",
];

/// The semantic-dependency declaration file inside a component's `tasks/`.
pub const DEPENDENCIES_FILE: &str = "dependencies.yaml";

/// One classified file reported by the crawler. Paths are source-relative.
#[derive(Debug, Clone)]
pub enum CrawlEntry {
    /// A `meta/plasma.yaml` file: asserts the enclosing candidate is valid.
    Meta {
        /// Source-relative path of the metadata file.
        path: PathBuf,
    },
    /// A `tasks/*.yaml` file with its extracted role inclusions.
    Tasks {
        /// Source-relative path of the task file.
        path: PathBuf,
        /// `include_role.name` values found in the file, in order.
        roles: Vec<String>,
        /// True for `tasks/dependencies.yaml` (semantic edges), false for
        /// every other task file (build edges).
        semantic: bool,
    },
}

impl CrawlEntry {
    /// Source-relative path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Meta { path } | Self::Tasks { path, .. } => path,
        }
    }
}

/// Recursive walker yielding component candidates and dependency sources.
#[derive(Debug)]
pub struct FilesCrawler {
    source_dir: PathBuf,
}

impl FilesCrawler {
    /// Create a crawler over `source_dir`.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    /// Walk the tree and return classified entries in deterministic
    /// (sorted directory listing) order. Symlinks are skipped, not followed.
    pub fn crawl(&self) -> Result<Vec<CrawlEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.source_dir)
            .follow_links(false)
            .sort_by_file_name()
        {
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
                .strip_prefix(&self.source_dir)
                .unwrap_or(entry.path())
                .to_path_buf();

            let rel_str = rel.to_string_lossy();
            if CRAWL_EXCLUDED.iter().any(|d| rel_str.contains(d)) {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_lowercase();
            if !file_name.ends_with(".yaml") && !file_name.ends_with(".yml") {
                continue;
            }

            let parent = rel.parent().and_then(Path::file_name);
            let in_meta = parent == Some(OsStr::new("meta"));
            let in_tasks = parent == Some(OsStr::new("tasks"));

            if in_meta && file_name == "plasma.yaml" {
                entries.push(CrawlEntry::Meta { path: rel });
            } else if in_tasks {
                let roles = self.extract_roles(&rel)?;
                let semantic = file_name == DEPENDENCIES_FILE;
                entries.push(CrawlEntry::Tasks {
                    path: rel,
                    roles,
                    semantic,
                });
            }
        }

        Ok(entries)
    }

    /// Parse a task file and collect its `include_role.name` strings.
    fn extract_roles(&self, rel: &Path) -> Result<Vec<String>> {
        let path = self.source_dir.join(rel);
        let data =
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let doc: Value = serde_yaml::from_slice(&data)
            .with_context(|| format!("{}", path.display()))?;

        // an empty task file contributes nothing
        let tasks = match doc {
            Value::Null => Vec::new(),
            Value::Sequence(tasks) => tasks,
            _ => anyhow::bail!("{}: task file is not a sequence", path.display()),
        };

        let mut roles = Vec::new();
        for task in &tasks {
            if let Some(name) = task
                .get("include_role")
                .and_then(|r| r.get("name"))
                .and_then(Value::as_str)
            {
                if !name.is_empty() {
                    roles.push(name.to_string());
                }
            }
        }

        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn classifies_meta_and_tasks_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "l/k/r/meta/plasma.yaml", "plasma:\n  version: a\n");
        write(
            tmp.path(),
            "l/k/r/tasks/dependencies.yaml",
            "- include_role:\n    name: l.k.other\n",
        );
        write(
            tmp.path(),
            "l/k/r/tasks/main.yaml",
            "- include_role:\n    name: l.k.build\n- debug:\n    msg: hi\n",
        );

        let entries = FilesCrawler::new(tmp.path()).crawl().unwrap();
        assert_eq!(entries.len(), 3);

        let meta: Vec<_> = entries
            .iter()
            .filter(|e| matches!(e, CrawlEntry::Meta { .. }))
            .collect();
        assert_eq!(meta.len(), 1);

        for entry in &entries {
            if let CrawlEntry::Tasks { path, roles, semantic } = entry {
                if path.ends_with("dependencies.yaml") {
                    assert!(*semantic);
                    assert_eq!(roles, &["l.k.other"]);
                } else {
                    assert!(!*semantic);
                    assert_eq!(roles, &["l.k.build"]);
                }
            }
        }
    }

    #[test]
    fn excluded_paths_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".plasma/l/k/r/meta/plasma.yaml", "plasma: {}\n");
        write(tmp.path(), "venv/l/k/r/meta/plasma.yaml", "plasma: {}\n");
        write(
            tmp.path(),
            "l/k/r/__pycache__/meta/plasma.yaml",
            "plasma: {}\n",
        );
        write(tmp.path(), "l/k/r/meta/plasma.yaml", "plasma: {}\n");

        let entries = FilesCrawler::new(tmp.path()).crawl().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path(), Path::new("l/k/r/meta/plasma.yaml"));
    }

    #[test]
    fn only_yaml_in_meta_or_tasks_dirs_is_reported() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "l/k/r/meta/plasma.yaml", "plasma: {}\n");
        write(tmp.path(), "l/k/r/meta/notes.txt", "text\n");
        write(tmp.path(), "l/k/r/templates/config.yaml", "a: b\n");
        write(tmp.path(), "l/k/r/defaults/main.yaml", "a: b\n");

        let entries = FilesCrawler::new(tmp.path()).crawl().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn malformed_task_file_aborts_with_path() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "l/k/r/tasks/main.yaml", "not: [a, list\n");

        let err = FilesCrawler::new(tmp.path()).crawl().unwrap_err();
        assert!(format!("{err:#}").contains("main.yaml"));
    }

    #[test]
    fn walk_order_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "b/k/r/meta/plasma.yaml", "plasma: {}\n");
        write(tmp.path(), "a/k/r/meta/plasma.yaml", "plasma: {}\n");

        let first = FilesCrawler::new(tmp.path()).crawl().unwrap();
        let second = FilesCrawler::new(tmp.path()).crawl().unwrap();
        let paths: Vec<_> = first.iter().map(|e| e.path().to_path_buf()).collect();
        let paths2: Vec<_> = second.iter().map(|e| e.path().to_path_buf()).collect();
        assert_eq!(paths, paths2);
        assert_eq!(paths[0], PathBuf::from("a/k/r/meta/plasma.yaml"));
    }
}
