// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Plasmasync CLI - propagate component versions across a platform tree

use anyhow::Result;
use clap::{Parser, Subcommand};

use plasmasync::commands;

#[derive(Parser)]
#[command(name = "plasmasync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Propagate bumped versions to every transitive dependent
    Propagate {
        /// Composed build directory the updates are written to
        #[arg(long, env = "PLASMASYNC_BUILD_DIR", default_value = ".plasma/build")]
        build_dir: std::path::PathBuf,

        /// Directory holding package checkouts
        #[arg(long, env = "PLASMASYNC_PACKAGES_DIR", default_value = ".plasma/packages")]
        packages_dir: std::path::PathBuf,

        /// Domain directory carrying the compose manifest
        #[arg(long, env = "PLASMASYNC_DOMAIN_DIR", default_value = ".")]
        domain_dir: std::path::PathBuf,

        /// Log intended updates without writing
        #[arg(long)]
        dry_run: bool,

        /// Accept components whose version disagrees with HEAD
        #[arg(long)]
        allow_override: bool,

        /// Restrict propagation to components used by the platform roster
        #[arg(long)]
        filter_by_component_usage: bool,

        /// History cutoff date (YYYY-MM-DD)
        #[arg(long)]
        time_depth: Option<String>,

        /// Vault password (falls back to the keyring)
        #[arg(long, env = "PLASMASYNC_VAULT_PASS")]
        vault_pass: Option<String>,

        /// Render progress bars
        #[arg(long)]
        progress: bool,
    },

    /// Write fresh commit hashes into components changed since the last bump
    Bump {
        /// Only consider the latest commit
        #[arg(long)]
        last: bool,

        /// Log intended updates without writing or committing
        #[arg(long)]
        dry_run: bool,

        /// Repository path
        #[arg(default_value = ".")]
        path: std::path::PathBuf,
    },

    /// List components discovered in a source tree
    List {
        /// Source tree to inventory
        #[arg(default_value = ".")]
        path: std::path::PathBuf,

        /// Filter by component kind
        #[arg(long)]
        kind: Option<String>,
    },

    /// Show a component's dependency closure
    Deps {
        /// Component name (layer.kind.role)
        name: String,

        /// Source tree to inventory
        #[arg(long, default_value = ".")]
        path: std::path::PathBuf,

        /// Reverse direction: list dependents instead of dependencies
        #[arg(long)]
        reverse: bool,

        /// Use build dependencies instead of semantic ones
        #[arg(long)]
        build: bool,

        /// Maximum dependency depth (negative = unbounded)
        #[arg(long, default_value_t = -1)]
        depth: i32,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => tracing::Level::ERROR,
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Propagate {
            build_dir,
            packages_dir,
            domain_dir,
            dry_run,
            allow_override,
            filter_by_component_usage,
            time_depth,
            vault_pass,
            progress,
        } => {
            let args = commands::propagate::PropagateArgs {
                build_dir,
                packages_dir,
                domain_dir,
                dry_run,
                allow_override,
                filter_by_component_usage,
                time_depth,
                vault_pass,
                progress,
            };
            commands::propagate::run(args)
        }
        Commands::Bump { last, dry_run, path } => commands::bump::run(&path, last, dry_run),
        Commands::List { path, kind } => commands::list::run(&path, kind.as_deref()),
        Commands::Deps {
            name,
            path,
            reverse,
            build,
            depth,
        } => commands::deps::run(&path, &name, reverse, build, depth),
        Commands::Completions { shell } => {
            use clap::CommandFactory;
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
