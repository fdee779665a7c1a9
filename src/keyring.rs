// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Keyring store - key/value persistence for the vault password

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

/// Key under which the vault password is stored.
pub const VAULTPASS_KEY: &str = "vaultpass";

/// Environment variable overriding the keyring file location.
pub const KEYRING_PATH_ENV: &str = "PLASMASYNC_KEYRING";

/// Typed keyring failures.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// The requested key is not stored.
    #[error("keyring item not found")]
    NotFound,
    /// The key exists but holds an empty value.
    #[error("empty keyring password")]
    EmptyPassword,
    /// The keyring file cannot be parsed.
    #[error("the keyring is malformed: {0}")]
    Corrupt(String),
}

/// File-backed key→value store.
#[derive(Debug)]
pub struct Keyring {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl Keyring {
    /// Open the keyring at its default location: `$PLASMASYNC_KEYRING` or
    /// the project data directory.
    pub fn open_default() -> Result<Self> {
        let path = match std::env::var_os(KEYRING_PATH_ENV) {
            Some(path) => PathBuf::from(path),
            None => directories::ProjectDirs::from("sh", "plasma", "plasmasync")
                .map(|dirs| dirs.data_dir().join("keyring.yaml"))
                .unwrap_or_else(|| PathBuf::from(".plasmasync/keyring.yaml")),
        };

        Self::open(path).map_err(Into::into)
    }

    /// Open a keyring file. A missing file yields an empty store; a file
    /// that fails to parse is corrupt.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, KeyringError> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(data) => serde_yaml::from_slice(&data)
                .map_err(|err| KeyringError::Corrupt(err.to_string()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(KeyringError::Corrupt(err.to_string())),
        };

        Ok(Self { path, entries })
    }

    /// Fetch a value. A missing key is [`KeyringError::NotFound`], an empty
    /// value is [`KeyringError::EmptyPassword`].
    pub fn get(&self, key: &str) -> Result<&str, KeyringError> {
        match self.entries.get(key) {
            None => Err(KeyringError::NotFound),
            Some(value) if value.is_empty() => Err(KeyringError::EmptyPassword),
            Some(value) => Ok(value),
        }
    }

    /// Insert or replace a value. Call [`Self::save`] to persist.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Write the store to disk with restrictive permissions.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let data = serde_yaml::to_string(&self.entries).context("failed to encode keyring")?;
        fs::write(&self.path, data)
            .with_context(|| format!("failed to write {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_opens_empty() {
        let tmp = TempDir::new().unwrap();
        let keyring = Keyring::open(tmp.path().join("keyring.yaml")).unwrap();
        assert!(matches!(keyring.get("anything"), Err(KeyringError::NotFound)));
    }

    #[test]
    fn round_trips_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keyring.yaml");

        let mut keyring = Keyring::open(&path).unwrap();
        keyring.set(VAULTPASS_KEY, "secret");
        keyring.save().unwrap();

        let reopened = Keyring::open(&path).unwrap();
        assert_eq!(reopened.get(VAULTPASS_KEY).unwrap(), "secret");
    }

    #[test]
    fn empty_value_is_a_typed_error() {
        let tmp = TempDir::new().unwrap();
        let mut keyring = Keyring::open(tmp.path().join("k.yaml")).unwrap();
        keyring.set(VAULTPASS_KEY, "");
        assert!(matches!(
            keyring.get(VAULTPASS_KEY),
            Err(KeyringError::EmptyPassword)
        ));
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("keyring.yaml");
        fs::write(&path, "- not\n- a\n- mapping\n").unwrap();
        assert!(matches!(Keyring::open(&path), Err(KeyringError::Corrupt(_))));
    }
}
