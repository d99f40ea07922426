use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::Url;

use super::config::{ConfigError, RouterConfig};
use super::contract::Service;

// ---------------------------------------------------------------------------
// Binding / Registration
// ---------------------------------------------------------------------------

/// How the caller wants a service name resolved.
pub enum Binding {
    /// Hosted in this process.
    Local(Arc<dyn Service>),
    /// Hosted elsewhere; the location comes from `services.<name>.url`.
    Remote,
}

impl Binding {
    pub fn local<S: Service>(service: S) -> Self {
        Self::Local(Arc::new(service))
    }
}

/// A resolved registry entry.
#[derive(Clone)]
pub enum Registration {
    /// Initialised local instance.
    Local(Arc<dyn Service>),
    /// Validated base URL; call paths are appended verbatim.
    Remote(String),
}

impl Registration {
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(service) => f.debug_tuple("Local").field(&service.name()).finish(),
            Self::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Name-to-registration map, built once and read-only afterwards.
///
/// Registration runs local initialise hooks in the order bindings are
/// supplied and fails on the first problem; no partial registry is returned.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: HashMap<String, Registration>,
}

impl ServiceRegistry {
    /// Resolves every binding against `config`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::Duplicate`] when a name is bound twice.
    /// - [`ConfigError::Initialise`] when a local initialise hook fails.
    /// - [`ConfigError::MissingRemote`] when a remote binding has no URL.
    /// - [`ConfigError::InvalidUrl`] when that URL is not absolute http(s).
    pub async fn register<I, N>(bindings: I, config: &RouterConfig) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (N, Binding)>,
        N: Into<String>,
    {
        let mut entries = HashMap::new();

        for (name, binding) in bindings {
            let name = name.into();
            if entries.contains_key(&name) {
                return Err(ConfigError::Duplicate(name));
            }

            let registration = match binding {
                Binding::Local(service) => {
                    let service = service
                        .initialise()
                        .await
                        .map_err(|source| ConfigError::Initialise {
                            name: name.clone(),
                            source,
                        })?;
                    tracing::info!(service = %name, handler = service.name(), "registered local service");
                    Registration::Local(service)
                }
                Binding::Remote => {
                    let remote = config
                        .services
                        .get(&name)
                        .ok_or_else(|| ConfigError::MissingRemote(name.clone()))?;
                    if !is_http_base(&remote.url) {
                        return Err(ConfigError::InvalidUrl {
                            name,
                            url: remote.url.clone(),
                        });
                    }
                    tracing::info!(service = %name, url = %remote.url, "registered remote service");
                    Registration::Remote(remote.url.clone())
                }
            };

            entries.insert(name, registration);
        }

        Ok(Self { entries })
    }

    /// Runs the install hook of every local service, in name order.
    ///
    /// Remote services install themselves. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Install`] naming the service whose hook failed.
    pub async fn install_all(&self) -> Result<(), ConfigError> {
        for name in self.names() {
            let Some(Registration::Local(service)) = self.entries.get(name) else {
                continue;
            };
            service
                .install()
                .await
                .map_err(|source| ConfigError::Install {
                    name: name.to_string(),
                    source,
                })?;
            tracing::info!(service = name, "installed local service");
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_http_base(url: &str) -> bool {
    Url::parse(url).is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
