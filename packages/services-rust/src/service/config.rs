//! Router configuration: remote service locations, shared secret, verbosity.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Location of a service hosted by another process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteService {
    /// Base URL; request paths are appended to it verbatim.
    pub url: String,
}

/// Configuration consumed by [`ServiceRegistry::register`](super::ServiceRegistry::register)
/// and [`ServiceRouter`](super::ServiceRouter).
///
/// ```json
/// {
///   "verbose": false,
///   "secret": "shared-salt",
///   "services": { "auth": { "url": "http://auth.internal:8080" } }
/// }
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Log every call and its outcome at info level.
    pub verbose: bool,
    /// Shared secret for internal keys.
    pub secret: String,
    /// Remote services by name. Entries without a matching binding are ignored.
    pub services: BTreeMap<String, RemoteService>,
}

impl RouterConfig {
    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed JSON or unexpected field types.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file cannot be read and
    /// [`ConfigError::Parse`] when its contents are not a valid config.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Adds or replaces the remote location of `name`.
    #[must_use]
    pub fn with_service(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.services
            .insert(name.into(), RemoteService { url: url.into() });
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = secret.into();
        self
    }

    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl fmt::Debug for RouterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterConfig")
            .field("verbose", &self.verbose)
            .field("secret", &"<redacted>")
            .field("services", &self.services)
            .finish()
    }
}

/// Errors raised while loading configuration or registering services.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A service was bound as remote but has no `services.<name>` entry.
    #[error("services.{0}: no remote location configured")]
    MissingRemote(String),

    #[error("services.{name}: invalid url {url:?}")]
    InvalidUrl { name: String, url: String },

    #[error("services.{0}: bound more than once")]
    Duplicate(String),

    /// A local service's initialise hook failed.
    #[error("services.{name}: initialise failed: {source}")]
    Initialise {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// A local service's install hook failed.
    #[error("services.{name}: install failed: {source}")]
    Install {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
