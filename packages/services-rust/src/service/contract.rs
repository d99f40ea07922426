//! Dispatch contract: the shape every local service exposes.
//!
//! A service answers four actions (`create`, `read`, `update`, `delete`),
//! each taking a path, a JSON payload and an optional credential, and each
//! producing an [`Envelope`]. Business failures travel inside the envelope;
//! only genuine bugs surface as [`ServiceFault`].
//!
//! Most services resolve paths through a [`NounTable`]: an explicit map from
//! handler name (path-to-method name plus action suffix) to a handler
//! function, built once when the service is constructed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use restoc_core::errors::codes;
use restoc_core::{method_name, Action, Credential, Envelope, Interrupt, PathError};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Handler types
// ---------------------------------------------------------------------------

/// Future returned by a noun handler.
pub type NounFuture<'a> = Pin<Box<dyn Future<Output = Result<Envelope, Interrupt>> + Send + 'a>>;

/// A noun handler bound to service type `S`.
///
/// Handlers return `Err(Interrupt::Effect(..))` to end the call early with a
/// finished envelope; `Err(Interrupt::Fault(..))` is reported as a bug.
pub type NounHandler<S> =
    for<'a> fn(&'a S, Value, Option<&'a dyn Credential>) -> NounFuture<'a>;

/// A handler failed with something other than an envelope.
#[derive(Debug, thiserror::Error)]
#[error("{verb} {path} faulted: {source}")]
pub struct ServiceFault {
    pub verb: &'static str,
    pub path: String,
    #[source]
    pub source: anyhow::Error,
}

// ---------------------------------------------------------------------------
// Service trait
// ---------------------------------------------------------------------------

/// Upcast helper so `initialise` can hand back `Arc<dyn Service>` by default.
pub trait IntoDynService {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn Service>;
}

impl<T: Service> IntoDynService for T {
    fn into_dyn(self: Arc<Self>) -> Arc<dyn Service> {
        self
    }
}

/// A locally hosted service.
///
/// Implementors provide [`Service::dispatch`], usually by delegating to a
/// [`NounTable`]. The four action methods default to `dispatch` and may be
/// overridden individually.
#[async_trait]
pub trait Service: IntoDynService + Send + Sync + 'static {
    /// Human-readable name used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// One-time hook run at registration. Returns the instance to store,
    /// which may be a decorated wrapper around `self`.
    async fn initialise(self: Arc<Self>) -> anyhow::Result<Arc<dyn Service>> {
        Ok(self.into_dyn())
    }

    /// First-time setup of whatever the service needs (schemas, seed data).
    ///
    /// Not run at registration; see [`ServiceRegistry::install_all`](super::ServiceRegistry::install_all).
    /// Services with nothing to install must override this to return `Ok(())`.
    async fn install(&self) -> anyhow::Result<()> {
        anyhow::bail!("{} does not implement install", self.name())
    }

    /// Resolves `path` under `action` and runs the matching handler.
    async fn dispatch(
        &self,
        action: Action,
        path: &str,
        payload: Value,
        credential: Option<&dyn Credential>,
    ) -> Result<Envelope, ServiceFault>;

    async fn create(
        &self,
        path: &str,
        payload: Value,
        credential: Option<&dyn Credential>,
    ) -> Result<Envelope, ServiceFault> {
        self.dispatch(Action::Create, path, payload, credential).await
    }

    async fn read(
        &self,
        path: &str,
        payload: Value,
        credential: Option<&dyn Credential>,
    ) -> Result<Envelope, ServiceFault> {
        self.dispatch(Action::Read, path, payload, credential).await
    }

    async fn update(
        &self,
        path: &str,
        payload: Value,
        credential: Option<&dyn Credential>,
    ) -> Result<Envelope, ServiceFault> {
        self.dispatch(Action::Update, path, payload, credential).await
    }

    async fn delete(
        &self,
        path: &str,
        payload: Value,
        credential: Option<&dyn Credential>,
    ) -> Result<Envelope, ServiceFault> {
        self.dispatch(Action::Delete, path, payload, credential).await
    }
}

/// Calls the action-specific method of `service`.
///
/// # Errors
///
/// Propagates the service's [`ServiceFault`].
pub async fn invoke(
    service: &dyn Service,
    action: Action,
    path: &str,
    payload: Value,
    credential: Option<&dyn Credential>,
) -> Result<Envelope, ServiceFault> {
    match action {
        Action::Create => service.create(path, payload, credential).await,
        Action::Read => service.read(path, payload, credential).await,
        Action::Update => service.update(path, payload, credential).await,
        Action::Delete => service.delete(path, payload, credential).await,
    }
}

// ---------------------------------------------------------------------------
// NounTable
// ---------------------------------------------------------------------------

/// Explicit handler table for a service of type `S`.
///
/// Keys are handler names such as `"userPermission_read"`, generated from the
/// registration path with the same path-to-method rule used at lookup time.
pub struct NounTable<S> {
    handlers: HashMap<String, NounHandler<S>>,
}

impl<S> NounTable<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Binds `handler` to `path` under `action`. Later bindings replace earlier ones.
    ///
    /// A path ending with a separator can never be looked up; it is logged
    /// and left unbound. Use [`NounTable::try_on`] to surface it instead.
    #[must_use]
    pub fn on(self, action: Action, path: &str, handler: NounHandler<S>) -> Self {
        match method_name(path, action) {
            Ok(name) => self.insert(name, handler),
            Err(err) => {
                tracing::error!(verb = action.verb(), path, error = %err, "handler not bound");
                self
            }
        }
    }

    /// As [`NounTable::on`], but rejects unbindable paths.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::TrailingSeparator`] when `path` ends with a separator.
    pub fn try_on(
        self,
        action: Action,
        path: &str,
        handler: NounHandler<S>,
    ) -> Result<Self, PathError> {
        let name = method_name(path, action)?;
        Ok(self.insert(name, handler))
    }

    fn insert(mut self, name: String, handler: NounHandler<S>) -> Self {
        self.handlers.insert(name, handler);
        self
    }

    /// Whether a handler answers `path` under `action`.
    #[must_use]
    pub fn contains(&self, action: Action, path: &str) -> bool {
        method_name(path, action).is_ok_and(|name| self.handlers.contains_key(&name))
    }

    /// Registered handler names, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Default dispatch behavior shared by table-backed services.
    ///
    /// An unknown path yields an envelope with code `SERVICE_NO_SUCH_NOUN`
    /// and message `"<VERB> <path>"`. An `Interrupt::Effect` from the
    /// handler is returned verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceFault`] when the handler ends in `Interrupt::Fault`.
    pub async fn dispatch(
        &self,
        service: &S,
        action: Action,
        path: &str,
        payload: Value,
        credential: Option<&dyn Credential>,
    ) -> Result<Envelope, ServiceFault>
    where
        S: Sync,
    {
        let handler = method_name(path, action)
            .ok()
            .and_then(|name| self.handlers.get(&name).copied());

        let Some(handler) = handler else {
            tracing::debug!(verb = action.verb(), path, "no such noun");
            return Ok(Envelope::fail((
                codes::SERVICE_NO_SUCH_NOUN,
                format!("{} {path}", action.verb()),
            )));
        };

        match handler(service, payload, credential).await {
            Ok(envelope) | Err(Interrupt::Effect(envelope)) => Ok(envelope),
            Err(Interrupt::Fault(source)) => Err(ServiceFault {
                verb: action.verb(),
                path: path.to_string(),
                source,
            }),
        }
    }
}

impl<S> Default for NounTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for NounTable<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("NounTable").field("handlers", &names).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
