// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Stored accounts and defaults.
//!
//! Credentials for Atlassian Cloud sites are kept in a small JSON file,
//! `<config dir>/atlassian/config.json`, alongside free-form default values
//! that commands may consult. The file is written with owner-only
//! permissions since it holds API tokens.
//!
//! ```json
//! {
//!   "active_account": "work",
//!   "accounts": {
//!     "work": { "site": "acme.atlassian.net", "email": "me@acme.test", "token": "..." }
//!   },
//!   "defaults": { "project": "OPS" }
//! }
//! ```

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Error type for loading, saving and editing the configuration.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// The platform has no per-user configuration directory.
    #[snafu(display("could not determine the user configuration directory"))]
    NoConfigDir,

    /// The config file exists but could not be read.
    #[snafu(display("failed to read {}: {source}", path.display()))]
    Read {
        /// The config file path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid JSON of the expected shape.
    #[snafu(display("failed to parse {}: {source}", path.display()))]
    Parse {
        /// The config file path.
        path: PathBuf,
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The config could not be encoded.
    #[snafu(display("failed to encode config: {source}"))]
    Encode {
        /// The underlying JSON error.
        source: serde_json::Error,
    },

    /// The config file or its directory could not be written.
    #[snafu(display("failed to write {}: {source}", path.display()))]
    Write {
        /// The path being written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A command needs an account but none is active.
    #[snafu(display("no active account set"))]
    NoActiveAccount,

    /// The named account does not exist.
    #[snafu(display("account '{name}' not found"))]
    AccountNotFound {
        /// The requested account name.
        name: String,
    },

    /// The key is managed through the `auth` commands.
    #[snafu(display("'{key}' cannot be set directly, use 'atl auth' commands"))]
    ReadOnlyKey {
        /// The rejected key.
        key: String,
    },

    /// Neither a special key nor a stored default.
    #[snafu(display("configuration key '{key}' not found"))]
    KeyNotFound {
        /// The requested key.
        key: String,
    },
}

/// Credentials for one Atlassian Cloud site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Site host, e.g. `acme.atlassian.net`.
    pub site: String,
    /// Login email used for Basic Auth.
    pub email: String,
    /// API token used for Basic Auth.
    pub token: String,
    /// Cloud id of the site, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<String>,
}

impl Account {
    /// Returns the token with everything but the last four characters
    /// hidden. Tokens too short to spare four characters are hidden entirely.
    #[must_use]
    pub fn masked_token(&self) -> String {
        let count = self.token.chars().count();
        let visible = if count > MASK_MIN_LEN { 4 } else { 0 };
        self.token
            .chars()
            .enumerate()
            .map(|(i, c)| if i < count - visible { '*' } else { c })
            .collect()
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Name of the account commands use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_account: Option<String>,

    /// Stored accounts by name.
    #[serde(default)]
    pub accounts: BTreeMap<String, Account>,

    /// Free-form default values, e.g. a default project key.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, String>,
}

/// Tokens up to this length are masked completely.
const MASK_MIN_LEN: usize = 8;

/// Keys that `get` resolves from the active account.
const ACCOUNT_KEYS: [&str; 4] = ["active-account", "site", "email", "cloud-id"];

impl Config {
    /// Returns the default config file location.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no configuration directory.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = dirs::config_dir().context(NoConfigDirSnafu)?;
        Ok(dir.join("atlassian").join("config.json"))
    }

    /// Loads the config at `path`; a missing file is an empty config.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no config at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let json = std::fs::read_to_string(path).context(ReadSnafu { path })?;
        let config = serde_json::from_str(&json).context(ParseSnafu { path })?;
        log::debug!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Writes the config to `path` as pretty JSON, creating parent
    /// directories as needed.
    ///
    /// The file is owner-only before any content is written to it, and new
    /// directories are owner-only too.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_private_dir(parent).context(WriteSnafu { path: parent })?;
        }

        let json = serde_json::to_string_pretty(self).context(EncodeSnafu)?;
        let mut file = create_private_file(path).context(WriteSnafu { path })?;
        file.write_all(json.as_bytes())
            .context(WriteSnafu { path })?;

        log::debug!("saved config to {}", path.display());
        Ok(())
    }

    /// Returns the active account.
    ///
    /// # Errors
    ///
    /// Returns an error if no account is active or it no longer exists.
    pub fn active_account(&self) -> Result<&Account, ConfigError> {
        let name = self.active_account.as_deref().context(NoActiveAccountSnafu)?;
        self.accounts
            .get(name)
            .context(AccountNotFoundSnafu { name })
    }

    fn active_account_mut(&mut self) -> Result<&mut Account, ConfigError> {
        let name = self.active_account.as_deref().context(NoActiveAccountSnafu)?;
        self.accounts
            .get_mut(name)
            .context(AccountNotFoundSnafu { name })
    }

    /// Adds or replaces an account. The first account stored becomes active.
    pub fn set_account(&mut self, name: &str, account: Account) {
        self.accounts.insert(name.to_owned(), account);
        if self.active_account.is_none() {
            self.active_account = Some(name.to_owned());
        }
    }

    /// Makes `name` the active account.
    ///
    /// # Errors
    ///
    /// Returns an error if no such account exists.
    pub fn use_account(&mut self, name: &str) -> Result<(), ConfigError> {
        ensure!(
            self.accounts.contains_key(name),
            AccountNotFoundSnafu { name }
        );
        self.active_account = Some(name.to_owned());
        Ok(())
    }

    /// Removes an account, clearing the active account if it was this one.
    ///
    /// # Errors
    ///
    /// Returns an error if no such account exists.
    pub fn remove_account(&mut self, name: &str) -> Result<Account, ConfigError> {
        let account = self
            .accounts
            .remove(name)
            .context(AccountNotFoundSnafu { name })?;
        if self.active_account.as_deref() == Some(name) {
            self.active_account = None;
        }
        Ok(account)
    }

    /// Looks up a key: `active-account`, `site`, `email` and `cloud-id`
    /// come from the active account, anything else from the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the key has no value.
    pub fn get(&self, key: &str) -> Result<String, ConfigError> {
        match key {
            "active-account" => self.active_account.clone().context(NoActiveAccountSnafu),
            "site" => Ok(self.active_account()?.site.clone()),
            "email" => Ok(self.active_account()?.email.clone()),
            "cloud-id" => self
                .active_account()?
                .cloud_id
                .clone()
                .context(KeyNotFoundSnafu { key }),
            _ => self
                .defaults
                .get(key)
                .cloned()
                .context(KeyNotFoundSnafu { key }),
        }
    }

    /// Sets a key. `cloud-id` is stored on the active account; credential
    /// keys are rejected; anything else becomes a default.
    ///
    /// # Errors
    ///
    /// Returns an error for read-only keys, or for `cloud-id` without an
    /// active account.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "cloud-id" => self.active_account_mut()?.cloud_id = Some(value.to_owned()),
            "token" => return ReadOnlyKeySnafu { key }.fail(),
            _ if ACCOUNT_KEYS.contains(&key) => return ReadOnlyKeySnafu { key }.fail(),
            _ => {
                self.defaults.insert(key.to_owned(), value.to_owned());
            }
        }
        Ok(())
    }

    /// Removes a default value and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if no default is stored under `key`.
    pub fn unset(&mut self, key: &str) -> Result<String, ConfigError> {
        self.defaults.remove(key).context(KeyNotFoundSnafu { key })
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

/// Opens `path` for writing, truncated and readable by the owner only.
///
/// `mode` only applies when the file is created, so an existing file is
/// also narrowed before anything is written to it.
#[cfg(unix)]
fn create_private_file(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_private_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
