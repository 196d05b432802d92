//! # Reasons Configuration
//!
//! Decides which repository backend is wired up, how long a tracked unit of
//! work lives, and where storage lives.
//!
//! ## Sources
//!
//! - [`ReasonsConfig::builder()`] for programmatic setup and tests
//! - [`ReasonsConfig::from_json_str`] / [`ReasonsConfig::from_json_file`] for an
//!   `appsettings.json` shaped document:
//!
//! ```json
//! {
//!   "ConnectionStrings": { "DefaultConnection": "sqlite:reasons.db" },
//!   "Reasons": { "RepositoryMode": "MappedQuery", "ContextLifetime": "Scoped" }
//! }
//! ```
//!
//! - [`ReasonsConfig::from_env`] for `ConnectionStrings__<Name>`,
//!   `Reasons__RepositoryMode` and `Reasons__ContextLifetime` variables.
//!
//! Every source ends in [`ReasonsConfig::validate`], so a bad mode name or a
//! missing `DefaultConnection` fails at startup rather than on first use.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{ReasonsConfig, RepositoryMode};
//!
//! let config = ReasonsConfig::builder()
//!     .default_connection("sqlite:reasons.db")
//!     .repository_mode(RepositoryMode::DirectCommand)
//!     .build()?;
//!
//! assert_eq!(config.default_connection(), Some("sqlite:reasons.db"));
//! # Ok::<(), core_runtime::Error>(())
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name of the connection string used when a call does not override it.
pub const DEFAULT_CONNECTION_NAME: &str = "DefaultConnection";

const CONNECTION_STRINGS_PREFIX: &str = "ConnectionStrings__";
const REPOSITORY_MODE_KEY: &str = "Reasons__RepositoryMode";
const CONTEXT_LIFETIME_KEY: &str = "Reasons__ContextLifetime";

// =============================================================================
// Backend selection
// =============================================================================

/// Which executor implements the repository contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum RepositoryMode {
    /// Change-tracking unit of work with push-down paging.
    #[default]
    TrackedContext,
    /// Named-parameter statements with automatic row mapping.
    MappedQuery,
    /// Hand-written positional statements over the storage bridge.
    DirectCommand,
}

impl RepositoryMode {
    pub const ALL: [RepositoryMode; 3] = [
        RepositoryMode::TrackedContext,
        RepositoryMode::MappedQuery,
        RepositoryMode::DirectCommand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepositoryMode::TrackedContext => "TrackedContext",
            RepositoryMode::MappedQuery => "MappedQuery",
            RepositoryMode::DirectCommand => "DirectCommand",
        }
    }
}

impl fmt::Display for RepositoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepositoryMode {
    type Err = Error;

    /// Case-insensitive; `-` and `_` separators are ignored.
    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "trackedcontext" => Ok(RepositoryMode::TrackedContext),
            "mappedquery" => Ok(RepositoryMode::MappedQuery),
            "directcommand" => Ok(RepositoryMode::DirectCommand),
            _ => Err(Error::UnknownSetting {
                setting: "repository mode",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for RepositoryMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// How long a tracked unit of work and its connection live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum ContextLifetime {
    /// A dedicated connection per context.
    #[default]
    Transient,
    /// Contexts created from one scope share a pool; each scope gets its own.
    Scoped,
    /// Every context shares one pool for the life of the process.
    Singleton,
}

impl ContextLifetime {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextLifetime::Transient => "Transient",
            ContextLifetime::Scoped => "Scoped",
            ContextLifetime::Singleton => "Singleton",
        }
    }
}

impl fmt::Display for ContextLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextLifetime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match normalize(s).as_str() {
            "transient" => Ok(ContextLifetime::Transient),
            "scoped" => Ok(ContextLifetime::Scoped),
            "singleton" => Ok(ContextLifetime::Singleton),
            _ => Err(Error::UnknownSetting {
                setting: "context lifetime",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for ContextLifetime {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

fn normalize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|c| *c != '-' && *c != '_')
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// =============================================================================
// Connection string lookup
// =============================================================================

/// Named connection string lookup.
///
/// The tracked-context factory falls back to this when no connection string
/// was registered explicitly.
pub trait ConnectionStringSource: Send + Sync {
    /// Returns the connection string registered under `name`, if any.
    fn connection_string(&self, name: &str) -> Option<String>;
}

impl ConnectionStringSource for HashMap<String, String> {
    fn connection_string(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

// =============================================================================
// ReasonsConfig
// =============================================================================

/// Settings for the reason repositories. Build with [`ReasonsConfig::builder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonsConfig {
    connection_strings: HashMap<String, String>,
    pub repository_mode: RepositoryMode,
    pub context_lifetime: ContextLifetime,
}

impl ReasonsConfig {
    pub fn builder() -> ReasonsConfigBuilder {
        ReasonsConfigBuilder::default()
    }

    /// The `DefaultConnection` string.
    pub fn default_connection(&self) -> Option<&str> {
        self.connection_strings
            .get(DEFAULT_CONNECTION_NAME)
            .map(String::as_str)
    }

    /// Parse an `appsettings.json` shaped document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawSettings = serde_json::from_str(json)?;
        let mut builder = Self::builder();
        for (name, value) in raw.connection_strings {
            builder = builder.connection_string(name, value);
        }
        if let Some(section) = raw.reasons {
            if let Some(mode) = section.repository_mode {
                builder = builder.repository_mode(mode);
            }
            if let Some(lifetime) = section.context_lifetime {
                builder = builder.context_lifetime(lifetime);
            }
        }
        builder.build()
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from `KEY=value` pairs using the environment naming
    /// scheme. Unrelated keys are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = Self::builder();
        for (key, value) in vars {
            let key = key.as_ref();
            let value: String = value.into();
            if let Some(name) = key.strip_prefix(CONNECTION_STRINGS_PREFIX) {
                builder = builder.connection_string(name, value);
            } else if key == REPOSITORY_MODE_KEY {
                builder = builder.repository_mode(value.parse()?);
            } else if key == CONTEXT_LIFETIME_KEY {
                builder = builder.context_lifetime(value.parse()?);
            }
        }
        builder.build()
    }

    /// Checks that a non-blank `DefaultConnection` is present.
    pub fn validate(&self) -> Result<()> {
        match self.default_connection() {
            None => Err(Error::Config(format!(
                "Connection string '{DEFAULT_CONNECTION_NAME}' is required"
            ))),
            Some(value) if value.trim().is_empty() => Err(Error::Config(
                "Connection string must not be null or empty.".to_string(),
            )),
            Some(_) => Ok(()),
        }
    }
}

impl ConnectionStringSource for ReasonsConfig {
    fn connection_string(&self, name: &str) -> Option<String> {
        self.connection_strings.get(name).cloned()
    }
}

#[derive(Deserialize)]
struct RawSettings {
    #[serde(rename = "ConnectionStrings", default)]
    connection_strings: HashMap<String, String>,
    #[serde(rename = "Reasons")]
    reasons: Option<RawReasonsSection>,
}

#[derive(Deserialize)]
struct RawReasonsSection {
    #[serde(rename = "RepositoryMode")]
    repository_mode: Option<RepositoryMode>,
    #[serde(rename = "ContextLifetime")]
    context_lifetime: Option<ContextLifetime>,
}

/// Builder for [`ReasonsConfig`].
#[derive(Debug, Default)]
pub struct ReasonsConfigBuilder {
    connection_strings: HashMap<String, String>,
    repository_mode: Option<RepositoryMode>,
    context_lifetime: Option<ContextLifetime>,
}

impl ReasonsConfigBuilder {
    /// Sets `DefaultConnection`.
    pub fn default_connection(self, value: impl Into<String>) -> Self {
        self.connection_string(DEFAULT_CONNECTION_NAME, value)
    }

    pub fn connection_string(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.connection_strings.insert(name.into(), value.into());
        self
    }

    pub fn repository_mode(mut self, mode: RepositoryMode) -> Self {
        self.repository_mode = Some(mode);
        self
    }

    pub fn context_lifetime(mut self, lifetime: ContextLifetime) -> Self {
        self.context_lifetime = Some(lifetime);
        self
    }

    pub fn build(self) -> Result<ReasonsConfig> {
        let config = ReasonsConfig {
            connection_strings: self.connection_strings,
            repository_mode: self.repository_mode.unwrap_or_default(),
            context_lifetime: self.context_lifetime.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
