use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::TimeDelta;
use getset::{Getters, Setters};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{SandcoreError, SandcoreResult};

use super::{
    DEFAULT_CONFIG_FILENAME, DEFAULT_EXPIRATION_SECS, DEFAULT_LIST_LIMIT,
    DEFAULT_PROVISION_DELAY, DEFAULT_SERVER_PORT,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// `DATABASE_URL` values that select the in-memory store.
const MEMORY_URLS: [&str; 3] = ["memory", ":memory:", "sqlite::memory:"];

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The sandcore service configuration.
///
/// Every field has a default, so an empty TOML document is a valid configuration.
///
/// ```toml
/// port = 8080
/// default_expiration_secs = 604800
/// default_list_limit = 10
/// provision_delay_ms = 30000
/// fail_name_prefix = "fail-"
///
/// [store]
/// kind = "sqlite"
/// path = "sandbox.db"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TypedBuilder, Getters, Setters)]
#[getset(get = "pub with_prefix", set = "pub with_prefix")]
#[serde(default)]
pub struct SandcoreConfig {
    /// The port the HTTP server listens on.
    #[builder(default = DEFAULT_SERVER_PORT)]
    port: u16,

    /// Where sandbox records are kept.
    #[builder(default)]
    store: StoreKind,

    /// Lifetime given to sandboxes created without a usable expiration.
    #[builder(default = DEFAULT_EXPIRATION_SECS)]
    default_expiration_secs: u64,

    /// Page size used when a listing has no usable limit.
    #[builder(default = DEFAULT_LIST_LIMIT)]
    default_list_limit: usize,

    /// Delay of each simulated provisioning call, in milliseconds.
    #[builder(default = DEFAULT_PROVISION_DELAY.as_millis() as u64)]
    provision_delay_ms: u64,

    /// Sandbox names with this prefix fail to provision.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    fail_name_prefix: Option<String>,
}

/// The store backing the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreKind {
    /// Records live in process memory.
    Memory,

    /// Records live in a SQLite database.
    Sqlite {
        /// Database file. Relative paths resolve against the sandcore home directory. Defaults to
        /// `sandbox.db` there.
        #[serde(skip_serializing_if = "Option::is_none", default)]
        path: Option<PathBuf>,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl SandcoreConfig {
    /// Loads the configuration.
    ///
    /// An explicit `path` must exist. Without one, `$SANDCORE_HOME/sandcore.toml` is read if it
    /// exists and the built-in defaults are used otherwise.
    pub async fn load(path: Option<&Path>) -> SandcoreResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let path = sandutils::resolve_home_path()?.join(DEFAULT_CONFIG_FILENAME);
                if !tokio::fs::try_exists(&path).await? {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = tokio::fs::read_to_string(&path).await?;
        let config = Self::from_toml_str(&contents)?;
        tracing::info!(path = %path.display(), "loaded config file");

        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> SandcoreResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> SandcoreResult<()> {
        if self.default_list_limit == 0 {
            return Err(SandcoreError::Validation(
                "default_list_limit must be positive".to_string(),
            ));
        }

        self.default_expiration()?;
        Ok(())
    }

    /// The lifetime given to sandboxes created without a usable expiration.
    pub fn default_expiration(&self) -> SandcoreResult<TimeDelta> {
        i64::try_from(self.default_expiration_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .and_then(TimeDelta::try_seconds)
            .ok_or_else(|| {
                SandcoreError::Validation(format!(
                    "default_expiration_secs out of range: {}",
                    self.default_expiration_secs
                ))
            })
    }

    /// The delay of each simulated provisioning call.
    pub fn provision_delay(&self) -> Duration {
        Duration::from_millis(self.provision_delay_ms)
    }
}

impl StoreKind {
    /// Interprets a `DATABASE_URL`-style value.
    ///
    /// `memory` and `:memory:` select the in-memory store. Anything else names a SQLite database,
    /// with or without a `sqlite://` scheme. URLs with any other scheme, such as `postgres://`,
    /// are rejected.
    pub fn from_url(url: &str) -> SandcoreResult<Self> {
        let url = url.trim();
        if MEMORY_URLS.iter().any(|m| m.eq_ignore_ascii_case(url)) {
            return Ok(StoreKind::Memory);
        }

        let path = match url.strip_prefix("sqlite:") {
            Some(rest) => rest.strip_prefix("//").unwrap_or(rest),
            None => {
                if let Some((scheme, _)) = url.split_once("://") {
                    return Err(SandcoreError::Validation(format!(
                        "unsupported database scheme `{scheme}`, only sqlite is supported"
                    )));
                }
                url
            }
        };
        let path = path.split('?').next().unwrap_or(path);

        Ok(StoreKind::Sqlite {
            path: (!path.is_empty()).then(|| PathBuf::from(path)),
        })
    }

    /// Resolves the database file of a SQLite store. Returns `None` for the in-memory store.
    pub fn resolve_db_path(&self) -> SandcoreResult<Option<PathBuf>> {
        match self {
            StoreKind::Memory => Ok(None),
            StoreKind::Sqlite { path: Some(path) } => {
                Ok(Some(sandutils::resolve_in_home(path.clone())?))
            }
            StoreKind::Sqlite { path: None } => Ok(Some(sandutils::default_db_path()?)),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Default for SandcoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Default for StoreKind {
    fn default() -> Self {
        StoreKind::Sqlite { path: None }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
