//! Services file loading and verification tunables.
//!
//! # Services file
//!
//! ```toml
//! [[services]]
//! id = "svc-a"
//! paths = ["/api/", "status"]
//! public_keys = ["""-----BEGIN PUBLIC KEY-----
//! ...
//! -----END PUBLIC KEY-----"""]
//! ```
//!
//! # Tunables
//!
//! | Field        | Default | Constraint                         |
//! |--------------|---------|------------------------------------|
//! | `freshness`  | 1h      | at least 1s                        |
//! | `cache_size` | 1000    | 0 disables the verification cache  |
//! | `prune_size` | 100     | at least 1 when caching is enabled |

use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, registry::ServiceRegistry};

/// Default maximum token age measured from `iat`.
pub const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60 * 60);

/// Default verification cache capacity.
pub const DEFAULT_CACHE_SIZE: usize = 1000;

/// Default number of entries evicted when the cache is full.
pub const DEFAULT_PRUNE_SIZE: usize = 100;

/// Smallest accepted freshness window.
pub const MIN_FRESHNESS: Duration = Duration::from_secs(1);

/// One `[[services]]` entry as written in the services file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDefinition {
    /// Service identifier, matched against the token `sub` claim.
    pub id: String,
    /// Allowed path prefixes, normalized on load.
    #[serde(default)]
    pub paths: Vec<String>,
    /// PEM-encoded RSA or EC public keys.
    #[serde(default)]
    pub public_keys: Vec<String>,
}

/// Top-level shape of the services file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesFile {
    /// Service definitions, in file order.
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

impl ServicesFile {
    /// Parses a services file from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML or unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse { source })
    }
}

impl ServiceRegistry {
    /// Parses TOML text and builds a validated registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML, otherwise any error
    /// from [`ServiceRegistry::load`].
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let file = ServicesFile::from_toml_str(contents)?;
        Self::load(&file.services)
    }

    /// Reads the services file at `path` and builds a validated registry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise
    /// any error from [`ServiceRegistry::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let registry = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), services = registry.len(), "loaded services file");
        Ok(registry)
    }
}

/// Verification tunables.
///
/// Construct with [`AuthConfig::builder`], which validates on `build()`, or
/// deserialize and then call [`AuthConfig::validate`].
///
/// ```
/// use std::time::Duration;
/// use authgate_authn::config::AuthConfig;
///
/// let config = AuthConfig::builder()
///     .freshness(Duration::from_secs(300))
///     .cache_size(0)
///     .build()
///     .expect("valid config");
/// assert!(!config.cache_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    #[serde(with = "humantime_serde", default = "default_freshness")]
    freshness: Duration,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_prune_size")]
    prune_size: usize,
}

fn default_freshness() -> Duration {
    DEFAULT_FRESHNESS
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_prune_size() -> usize {
    DEFAULT_PRUNE_SIZE
}

#[bon::bon]
impl AuthConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] if `freshness` is under one
    /// second, or if caching is enabled with a `prune_size` of zero.
    #[builder]
    pub fn new(
        #[builder(default = DEFAULT_FRESHNESS)] freshness: Duration,
        #[builder(default = DEFAULT_CACHE_SIZE)] cache_size: usize,
        #[builder(default = DEFAULT_PRUNE_SIZE)] prune_size: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self { freshness, cache_size, prune_size };
        config.validate()?;
        Ok(config)
    }
}

impl AuthConfig {
    /// Checks every field against its minimum.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::BelowMinimum`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.freshness < MIN_FRESHNESS {
            return Err(ConfigError::BelowMinimum {
                field: "freshness",
                value: humantime::format_duration(self.freshness).to_string(),
                min: humantime::format_duration(MIN_FRESHNESS).to_string(),
            });
        }
        if self.cache_size > 0 && self.prune_size == 0 {
            return Err(ConfigError::BelowMinimum {
                field: "prune_size",
                value: self.prune_size.to_string(),
                min: "1".to_owned(),
            });
        }
        Ok(())
    }

    /// Maximum token age measured from `iat`.
    #[must_use]
    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Verification cache capacity. Zero means disabled.
    #[must_use]
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// Number of oldest entries evicted when the cache reaches capacity.
    #[must_use]
    pub fn prune_size(&self) -> usize {
        self.prune_size
    }

    /// Whether verification results are cached at all.
    #[must_use]
    pub fn cache_enabled(&self) -> bool {
        self.cache_size > 0
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            freshness: DEFAULT_FRESHNESS,
            cache_size: DEFAULT_CACHE_SIZE,
            prune_size: DEFAULT_PRUNE_SIZE,
        }
    }
}
