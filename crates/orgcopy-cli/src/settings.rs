//! Settings file and environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use orgcopy_client::{Credentials, StoreConfig};
use orgcopy_core::catalog::Exclusions;
use orgcopy_core::MigrationConfig;

/// Settings file read when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "orgcopy.toml";

/// Prefix of the environment variables that override credentials.
pub const ENV_PREFIX: &str = "ORGCOPY";

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("cannot read settings file {path}: {source}", path = .path.display())]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for this schema.
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A required credential is missing.
    #[error("missing {field} for the {store} store (set it in the settings file or {env})")]
    MissingCredential {
        /// `source` or `target`.
        store: &'static str,
        /// Missing field.
        field: &'static str,
        /// Environment variable that can supply it.
        env: String,
    },
}

/// Connection settings for one store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreSettings {
    /// Login username.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Security token.
    pub security_token: String,
    /// Login domain (`login`, `test` or custom).
    pub domain: Option<String>,
    /// REST API version.
    pub api_version: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl StoreSettings {
    /// Credentials for login.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password, &self.security_token)
    }

    /// Connection configuration.
    pub fn store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(self.domain.as_deref().unwrap_or("login"));
        if let Some(version) = &self.api_version {
            config = config.with_api_version(version);
        }
        if let Some(secs) = self.timeout_secs {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        config
    }

    fn apply_env(&mut self, store: &str, lookup: &impl Fn(&str) -> Option<String>) {
        let var = |field: &str| lookup(&env_var(store, field));
        if let Some(value) = var("USERNAME") {
            self.username = value;
        }
        if let Some(value) = var("PASSWORD") {
            self.password = value;
        }
        if let Some(value) = var("SECURITY_TOKEN") {
            self.security_token = value;
        }
        if let Some(value) = var("DOMAIN") {
            self.domain = Some(value);
        }
    }

    fn validate(&self, store: &'static str) -> Result<(), SettingsError> {
        let missing = if self.username.is_empty() {
            Some(("username", "USERNAME"))
        } else if self.password.is_empty() {
            Some(("password", "PASSWORD"))
        } else {
            None
        };
        match missing {
            Some((field, suffix)) => Err(SettingsError::MissingCredential {
                store,
                field,
                env: env_var(store, suffix),
            }),
            None => Ok(()),
        }
    }
}

/// Overrides of the migration defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrationSettings {
    /// Create attempts per record.
    pub max_attempts: Option<usize>,
    /// Row cap per source query.
    pub query_limit: Option<usize>,
    /// Natural key field.
    pub natural_key_field: Option<String>,
    /// Estimated size of one record in KB.
    pub record_size_kb: Option<f64>,
    /// Replacement system-field list.
    pub system_fields: Option<Vec<String>>,
    /// Replacement system-object list.
    pub system_objects: Option<Vec<String>>,
}

/// Contents of the settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Store records are read from.
    pub source: StoreSettings,
    /// Store records are created in.
    pub target: StoreSettings,
    /// Migration tuning.
    pub migration: MigrationSettings,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn parse(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from `path`, or from [`DEFAULT_SETTINGS_FILE`] when it exists.
    ///
    /// Without an explicit path and without a default file, the settings are
    /// empty and must come from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_SETTINGS_FILE);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Override credentials from environment-style variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.source.apply_env("source", &lookup);
        self.target.apply_env("target", &lookup);
    }

    /// Check that both stores have credentials.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.source.validate("source")?;
        self.target.validate("target")
    }

    /// Migration configuration with the file overrides applied.
    pub fn migration_config(&self) -> MigrationConfig {
        let m = &self.migration;
        let mut config = MigrationConfig::default().with_query_limit(m.query_limit);
        if let Some(attempts) = m.max_attempts {
            config = config.with_max_attempts(attempts);
        }
        if let Some(field) = &m.natural_key_field {
            config = config.with_natural_key_field(field);
        }
        if let Some(kb) = m.record_size_kb {
            config = config.with_record_size_kb(kb);
        }
        let mut exclusions = Exclusions::default();
        if let Some(fields) = &m.system_fields {
            exclusions = exclusions.with_system_fields(fields.iter().cloned());
        }
        if let Some(objects) = &m.system_objects {
            exclusions = exclusions.with_system_objects(objects.iter().cloned());
        }
        config.with_exclusions(exclusions)
    }
}

/// Environment variable overriding `field` of `store`.
pub fn env_var(store: &str, field: &str) -> String {
    format!("{}_{}_{}", ENV_PREFIX, store.to_ascii_uppercase(), field)
}
