// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Propagate command - runs the propagation engine

use crate::keyring::{Keyring, KeyringError, VAULTPASS_KEY};
use crate::propagation::{Propagation, PropagationOptions};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::info;

/// Arguments collected from the CLI.
#[derive(Debug)]
pub struct PropagateArgs {
    /// Composed build directory.
    pub build_dir: PathBuf,
    /// Package checkouts directory.
    pub packages_dir: PathBuf,
    /// Domain directory.
    pub domain_dir: PathBuf,
    /// Log without writing.
    pub dry_run: bool,
    /// Accept HEAD mismatches.
    pub allow_override: bool,
    /// Apply the platform-usage filter.
    pub filter_by_component_usage: bool,
    /// History cutoff (`YYYY-MM-DD`).
    pub time_depth: Option<String>,
    /// Vault password override.
    pub vault_pass: Option<String>,
    /// Render progress bars.
    pub progress: bool,
}

/// Run the propagate command.
pub fn run(args: PropagateArgs) -> Result<()> {
    info!("processing propagation");

    let time_depth = args
        .time_depth
        .as_deref()
        .map(|raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .with_context(|| format!("can't parse date {raw}, format should be YYYY-MM-DD"))
        })
        .transpose()?;

    let vault_pass = ensure_vault_pass(args.vault_pass)?;

    let options = PropagationOptions {
        build_dir: args.build_dir,
        packages_dir: args.packages_dir,
        domain_dir: args.domain_dir,
        dry_run: args.dry_run,
        allow_override: args.allow_override,
        filter_by_component_usage: args.filter_by_component_usage,
        time_depth,
        vault_pass,
        show_progress: args.progress,
    };

    let report = Propagation::new(options).execute()?;

    if report.updated.is_empty() {
        println!("No version to propagate");
    } else {
        for update in &report.updated {
            println!("- {} from {} to {}", update.name, update.from, update.to);
        }
    }

    info!("propagation has been finished");
    Ok(())
}

/// Source the vault password: explicit flag first, then the keyring. A flag
/// value is persisted for the next run.
fn ensure_vault_pass(flag: Option<String>) -> Result<String> {
    let mut keyring = Keyring::open_default()?;

    match keyring.get(VAULTPASS_KEY) {
        Ok(stored) => {
            if let Some(pass) = flag {
                if pass != stored {
                    keyring.set(VAULTPASS_KEY, pass.clone());
                    keyring.save()?;
                }
                return Ok(pass);
            }
            Ok(stored.to_string())
        }
        Err(KeyringError::NotFound) => {
            let Some(pass) = flag else {
                // vault files are simply skipped without a password
                return Ok(String::new());
            };
            keyring.set(VAULTPASS_KEY, pass.clone());
            keyring.save()?;
            Ok(pass)
        }
        Err(KeyringError::EmptyPassword) => bail!(KeyringError::EmptyPassword),
        Err(err) => bail!("the keyring is malformed or wrong passphrase provided: {err}"),
    }
}
