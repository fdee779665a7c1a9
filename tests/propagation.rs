// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! End-to-end propagation scenarios against real git repositories

use git2::{IndexAddOption, Repository, Signature};
use plasmasync::component::Component;
use plasmasync::propagation::{Propagation, PropagationOptions, PropagationReport};
use plasmasync::repository::{short_hash, AUTHOR};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

// =============================================================================
// Test Helpers
// =============================================================================

const APP: &str = "core.applications.app";
const API: &str = "core.services.api";
const BASE: &str = "core.libraries.base";

const APP_V: &str = "aaaaaaaaaaaaa";
const API_V: &str = "bbbbbbbbbbbbb";
const BASE_V: &str = "ccccccccccccc";
const BASE_OLD_V: &str = "cc1cc1cc1cc1c";

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn meta_rel(name: &str) -> String {
    let parts: Vec<&str> = name.split('.').collect();
    format!("{}/{}/{}/meta/plasma.yaml", parts[0], parts[1], parts[2])
}

fn deps_rel(name: &str) -> String {
    let parts: Vec<&str> = name.split('.').collect();
    format!(
        "{}/{}/{}/tasks/dependencies.yaml",
        parts[0], parts[1], parts[2]
    )
}

fn write_meta(root: &Path, name: &str, version: &str) {
    write(
        root,
        &meta_rel(name),
        &format!("plasma:\n  version: \"{version}\"\n"),
    );
}

fn write_deps(root: &Path, name: &str, dep: &str) {
    write(
        root,
        &deps_rel(name),
        &format!("- include_role:\n    name: {dep}\n"),
    );
}

fn commit_all(repo: &Repository, author: &str, secs: i64, message: &str) -> git2::Oid {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"], IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::new(author, "test@test.com", &git2::Time::new(secs, 0)).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// Copy a working tree, leaving `.git` behind.
fn copy_tree(src: &Path, dst: &Path) {
    for entry in WalkDir::new(src) {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(src).unwrap();
        if rel.components().any(|c| c.as_os_str() == ".git") {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).unwrap();
        } else if entry.file_type().is_file() {
            fs::create_dir_all(target.parent().unwrap()).unwrap();
            fs::copy(entry.path(), &target).unwrap();
        }
    }
}

struct Fixture {
    domain: TempDir,
    packages: TempDir,
    build: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            domain: TempDir::new().unwrap(),
            packages: TempDir::new().unwrap(),
            build: TempDir::new().unwrap(),
        }
    }

    fn domain_path(&self) -> &Path {
        self.domain.path()
    }

    fn compose_build(&self) {
        copy_tree(self.domain.path(), self.build.path());
    }

    fn options(&self) -> PropagationOptions {
        PropagationOptions {
            build_dir: self.build.path().to_path_buf(),
            packages_dir: self.packages.path().to_path_buf(),
            domain_dir: self.domain.path().to_path_buf(),
            dry_run: false,
            allow_override: false,
            filter_by_component_usage: false,
            time_depth: None,
            vault_pass: String::new(),
            show_progress: false,
        }
    }

    fn run(&self) -> anyhow::Result<PropagationReport> {
        Propagation::new(self.options()).execute()
    }

    fn build_version(&self, name: &str) -> String {
        Component::new(name, self.build.path())
            .unwrap()
            .version()
            .unwrap()
    }
}

/// Chain fixture: app requires api requires base. History: an initial
/// developer commit with empty versions, a bump commit recording the given
/// versions, then a developer commit editing base's metadata to `BASE_V`.
fn chain_fixture(app_version: &str, api_version: &str) -> Fixture {
    let fixture = Fixture::new();
    let root = fixture.domain_path();
    let repo = Repository::init(root).unwrap();

    write(root, "plasma-compose.yaml", "dependencies: []\n");
    write_meta(root, APP, "");
    write_meta(root, API, "");
    write_meta(root, BASE, "");
    write_deps(root, APP, API);
    write_deps(root, API, BASE);
    commit_all(&repo, "Developer", 1000, "add components");

    write_meta(root, APP, app_version);
    write_meta(root, API, api_version);
    write_meta(root, BASE, BASE_OLD_V);
    commit_all(&repo, AUTHOR, 2000, "versions bump");

    write_meta(root, BASE, BASE_V);
    commit_all(&repo, "Developer", 3000, "update base");

    fixture.compose_build();
    fixture
}

// =============================================================================
// Scenarios
// =============================================================================

// S1: a change to the leaf propagates compound versions to every
// transitive dependent, but never back to the change source itself.
#[test]
fn trivial_bump_propagation() {
    let fixture = chain_fixture(APP_V, API_V);
    let report = fixture.run().unwrap();

    let names: Vec<&str> = report.updated.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec![APP, API], "update order is alphabetical");

    assert_eq!(fixture.build_version(APP), format!("{APP_V}-{BASE_V}"));
    assert_eq!(fixture.build_version(API), format!("{API_V}-{BASE_V}"));
    // the change source keeps its own version
    assert_eq!(fixture.build_version(BASE), BASE_V);
}

// S2: an existing compound version keeps only its base; the stale
// propagated half is discarded.
#[test]
fn compound_version_passthrough() {
    let fixture = chain_fixture(APP_V, &format!("{API_V}-zzzzzzzzzzzzz"));
    fixture.run().unwrap();

    assert_eq!(fixture.build_version(API), format!("{API_V}-{BASE_V}"));
}

// S3: a dependent already carrying the propagated version is skipped.
#[test]
fn identical_version_skip() {
    let fixture = chain_fixture(&format!("{APP_V}-{BASE_V}"), API_V);
    let before = fs::read_to_string(fixture.build.path().join(meta_rel(APP))).unwrap();

    let report = fixture.run().unwrap();

    assert_eq!(report.skipped_identical, vec![APP]);
    assert!(!report.updated.iter().any(|u| u.name == APP));

    let after = fs::read_to_string(fixture.build.path().join(meta_rel(APP))).unwrap();
    assert_eq!(before, after, "skipped component must be left untouched");

    // the rest of the chain still propagates
    assert_eq!(fixture.build_version(API), format!("{API_V}-{BASE_V}"));
}

// S4: components of non-updatable kinds are skipped while the rest of the
// closure still receives the propagation.
#[test]
fn non_updatable_kind_is_skipped() {
    let fixture = Fixture::new();
    let root = fixture.domain_path();
    let repo = Repository::init(root).unwrap();

    write(root, "plasma-compose.yaml", "dependencies: []\n");
    write_meta(root, APP, "");
    write_meta(root, API, "");
    write_meta(root, BASE, "");
    write_meta(root, "core.other.helper", "");
    write_deps(root, APP, API);
    write_deps(root, API, BASE);
    write_deps(root, "core.other.helper", BASE);
    commit_all(&repo, "Developer", 1000, "add components");

    write_meta(root, APP, APP_V);
    write_meta(root, API, API_V);
    write_meta(root, BASE, BASE_OLD_V);
    write_meta(root, "core.other.helper", "ddddddddddddd");
    commit_all(&repo, AUTHOR, 2000, "versions bump");

    write_meta(root, BASE, BASE_V);
    commit_all(&repo, "Developer", 3000, "update base");

    fixture.compose_build();
    let report = fixture.run().unwrap();

    let names: Vec<&str> = report.updated.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec![APP, API]);
    assert_eq!(fixture.build_version("core.other.helper"), "ddddddddddddd");
}

// S5 / property 7: when two namespaces claim a component with the same base
// version, the domain copy wins and the package copy is dropped. A surviving
// package copy would abort the run with a version mismatch.
#[test]
fn namespace_conflict_domain_wins() {
    let fixture = Fixture::new();
    let root = fixture.domain_path();
    let repo = Repository::init(root).unwrap();

    write(
        root,
        "plasma-compose.yaml",
        "dependencies:\n  - name: pkg\n    source:\n      target: main\n",
    );
    write_meta(root, APP, "");
    write_meta(root, API, "");
    write_meta(root, BASE, "");
    write_deps(root, APP, API);
    write_deps(root, API, BASE);
    commit_all(&repo, "Developer", 1000, "add components");

    write_meta(root, APP, APP_V);
    write_meta(root, API, API_V);
    write_meta(root, BASE, BASE_OLD_V);
    commit_all(&repo, AUTHOR, 2000, "versions bump");

    write_meta(root, BASE, BASE_V);
    commit_all(&repo, "Developer", 3000, "update base");

    // package checkout carries api with the same base but a stale
    // propagated half; its HEAD disagrees with the build on purpose
    let pkg_root = fixture.packages.path().join("pkg/main");
    fs::create_dir_all(&pkg_root).unwrap();
    let pkg_repo = Repository::init(&pkg_root).unwrap();
    write_meta(&pkg_root, API, &format!("{API_V}-ppppppppppppp"));
    commit_all(&pkg_repo, AUTHOR, 1500, "versions bump");

    fixture.compose_build();
    let report = fixture.run().unwrap();

    // the domain copy drove the timeline; propagation still reaches app/api
    assert_eq!(fixture.build_version(API), format!("{API_V}-{BASE_V}"));
    assert_eq!(fixture.build_version(APP), format!("{APP_V}-{BASE_V}"));
    assert_eq!(report.updated.len(), 2);
}

// S6: a component whose in-tree version disagrees with HEAD aborts the run
// unless override is allowed, in which case HEAD anchors the change.
#[test]
fn version_mismatch_without_override_aborts() {
    let fixture = chain_fixture(APP_V, API_V);
    // desynchronize the build from the domain HEAD
    write_meta(fixture.build.path(), BASE, "deadbeef00000");

    let err = fixture.run().unwrap_err();
    let rendered = format!("{err:#}");
    assert!(rendered.contains("doesn't match HEAD"), "got: {rendered}");
    assert!(rendered.contains(BASE), "error must name the component");
}

#[test]
fn version_mismatch_with_override_proceeds() {
    let fixture = chain_fixture(APP_V, API_V);
    write_meta(fixture.build.path(), BASE, "deadbeef00000");

    let mut options = fixture.options();
    options.allow_override = true;
    Propagation::new(options).execute().unwrap();

    // the overridden component's build version is what propagates
    assert_eq!(
        fixture.build_version(API),
        format!("{API_V}-deadbeef00000")
    );
    assert_eq!(
        fixture.build_version(APP),
        format!("{APP_V}-deadbeef00000")
    );
}

// Known-section fast path: versions recorded by bump commits resolve
// through their commit group without brute force.
#[test]
fn bump_section_resolution() {
    let fixture = Fixture::new();
    let root = fixture.domain_path();
    let repo = Repository::init(root).unwrap();

    write(root, "plasma-compose.yaml", "dependencies: []\n");
    write_meta(root, API, "");
    write_meta(root, APP, "");
    write_deps(root, APP, API);
    write(root, "core/services/api/tasks/main.yaml", "- debug:\n    msg: one\n");
    let c1 = commit_all(&repo, "Developer", 1000, "add components");

    write_meta(root, API, short_hash(&c1.to_string()));
    write_meta(root, APP, short_hash(&c1.to_string()));
    commit_all(&repo, AUTHOR, 2000, "versions bump");

    write(root, "core/services/api/tasks/main.yaml", "- debug:\n    msg: two\n");
    let c3 = commit_all(&repo, "Developer", 3000, "update api");

    write_meta(root, API, short_hash(&c3.to_string()));
    commit_all(&repo, AUTHOR, 4000, "versions bump");

    fixture.compose_build();
    let report = fixture.run().unwrap();

    // app follows api's fresh version; api itself is the change source
    let c1_short = short_hash(&c1.to_string()).to_string();
    let c3_short = short_hash(&c3.to_string()).to_string();
    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.updated[0].name, APP);
    assert_eq!(
        fixture.build_version(APP),
        format!("{c1_short}-{c3_short}")
    );
    assert_eq!(fixture.build_version(API), c3_short);
}

// Variable changes propagate to the consuming component itself and to its
// transitive dependents.
#[test]
fn variable_change_propagation() {
    let fixture = Fixture::new();
    let root = fixture.domain_path();
    let repo = Repository::init(root).unwrap();

    write(root, "plasma-compose.yaml", "dependencies: []\n");
    write_meta(root, API, "");
    write_meta(root, APP, "");
    write_deps(root, APP, API);
    write(
        root,
        "core/services/api/templates/config.j2",
        "port={{ db_port }}\n",
    );
    write(root, "core/group_vars/all/vars.yaml", "db_port: 5432\n");
    commit_all(&repo, "Developer", 1000, "add components");

    write_meta(root, API, "zzzzzzzzzzzzz");
    write_meta(root, APP, "wwwwwwwwwwwww");
    commit_all(&repo, AUTHOR, 2000, "versions bump");

    write(root, "core/group_vars/all/vars.yaml", "db_port: 6543\n");
    let c3 = commit_all(&repo, "Developer", 3000, "change db port");

    fixture.compose_build();
    let report = fixture.run().unwrap();

    let c3_short = short_hash(&c3.to_string()).to_string();
    let names: Vec<&str> = report.updated.iter().map(|u| u.name.as_str()).collect();
    assert_eq!(names, vec![APP, API]);
    // unlike component changes, the variable's direct consumer is updated too
    assert_eq!(
        fixture.build_version(API),
        format!("zzzzzzzzzzzzz-{c3_short}")
    );
    assert_eq!(
        fixture.build_version(APP),
        format!("wwwwwwwwwwwww-{c3_short}")
    );
}

// Property 5: two runs from the same source state produce byte-identical
// metadata.
#[test]
fn propagation_is_deterministic_across_rebuilds() {
    let fixture = chain_fixture(APP_V, API_V);
    fixture.run().unwrap();

    let first: Vec<(PathBuf, String)> = [APP, API, BASE]
        .iter()
        .map(|name| {
            let rel = PathBuf::from(meta_rel(name));
            let text = fs::read_to_string(fixture.build.path().join(&rel)).unwrap();
            (rel, text)
        })
        .collect();

    // fresh build from the unchanged domain, run again
    let rebuild = TempDir::new().unwrap();
    copy_tree(fixture.domain_path(), rebuild.path());
    let mut options = fixture.options();
    options.build_dir = rebuild.path().to_path_buf();
    Propagation::new(options).execute().unwrap();

    for (rel, expected) in first {
        let text = fs::read_to_string(rebuild.path().join(&rel)).unwrap();
        assert_eq!(text, expected, "{} must be byte-identical", rel.display());
    }
}

// Property 6: every propagated component receives exactly one version and
// change sources are never assigned one.
#[test]
fn single_assignment_discipline() {
    let fixture = chain_fixture(APP_V, API_V);
    let report = fixture.run().unwrap();

    let mut names: Vec<&str> = report
        .updated
        .iter()
        .map(|u| u.name.as_str())
        .chain(report.skipped_identical.iter().map(String::as_str))
        .collect();
    let total = names.len();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), total, "no component may be assigned twice");
    assert!(!names.contains(&BASE), "change source is never a target");
}

// A dry run plans the same updates without touching the build tree.
#[test]
fn dry_run_writes_nothing() {
    let fixture = chain_fixture(APP_V, API_V);
    let mut options = fixture.options();
    options.dry_run = true;

    let report = Propagation::new(options).execute().unwrap();
    assert_eq!(report.updated.len(), 2);

    assert_eq!(fixture.build_version(APP), APP_V);
    assert_eq!(fixture.build_version(API), API_V);
}

// An empty version on a propagation target fails the whole run after
// planning, leaving a clear error.
#[test]
fn empty_version_aborts_the_run() {
    let fixture = Fixture::new();
    let root = fixture.domain_path();
    let repo = Repository::init(root).unwrap();

    write(root, "plasma-compose.yaml", "dependencies: []\n");
    // app never received a version at all
    write_meta(root, APP, "");
    write_meta(root, API, "");
    write_meta(root, BASE, "");
    write_deps(root, APP, API);
    write_deps(root, API, BASE);
    commit_all(&repo, "Developer", 1000, "add components");

    write_meta(root, API, API_V);
    write_meta(root, BASE, BASE_OLD_V);
    commit_all(&repo, AUTHOR, 2000, "versions bump");

    write_meta(root, BASE, BASE_V);
    commit_all(&repo, "Developer", 3000, "update base");

    fixture.compose_build();
    let err = fixture.run().unwrap_err();
    assert!(format!("{err:#}").contains("empty version"));
}
