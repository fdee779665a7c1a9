// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Completions command - shell completion generation

use anyhow::Result;
use clap_complete::Shell;

/// Generate completions for the given shell on stdout. The command
/// definition is owned by the binary and passed in.
pub fn run(shell: Shell, cmd: &mut clap::Command) -> Result<()> {
    clap_complete::generate(shell, cmd, "plasmasync", &mut std::io::stdout());
    Ok(())
}
