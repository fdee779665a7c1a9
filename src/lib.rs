// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Plasmasync library - version propagation for platform components
//!
//! This crate discovers `layer.kind.role` components in a source tree,
//! builds their semantic and build dependency graphs, correlates each
//! component's recorded version with git history, and cascades fresh
//! versions through every transitive dependent.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod commands;
pub mod component;
pub mod compose;
pub mod crawler;
pub mod history;
pub mod inventory;
pub mod keyring;
pub mod ordered_map;
pub mod propagation;
pub mod repository;
pub mod timeline;
pub mod variables;

/// Prelude for common imports
pub mod prelude {
    pub use crate::component::Component;
    pub use crate::inventory::Inventory;
    pub use crate::ordered_map::OrderedMap;
    pub use crate::propagation::{Propagation, PropagationOptions, PropagationReport};
    pub use anyhow::{Context, Result};
}
