//! Call routing: sends a request to a local instance or a remote peer by service name.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use restoc_core::errors::codes;
use restoc_core::{Action, Credential, Envelope, EnvelopeArgError, InternalKeys};
use serde_json::Value;
use tracing::{debug_span, Instrument};

use super::config::{ConfigError, RouterConfig};
use super::contract::{invoke, ServiceFault};
use super::registry::{Binding, Registration, ServiceRegistry};
use super::transport::remote_call;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// One call through the router.
#[derive(Debug, Clone)]
pub struct Request {
    pub service: String,
    pub action: Action,
    pub path: String,
    pub payload: Value,
    pub credential: Option<Arc<dyn Credential>>,
    /// Attach a fresh internal key to the payload before dispatch.
    pub internal: bool,
}

impl Request {
    #[must_use]
    pub fn new(
        service: impl Into<String>,
        action: Action,
        path: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            service: service.into(),
            action,
            path: path.into(),
            payload,
            credential: None,
            internal: false,
        }
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Arc<dyn Credential>) -> Self {
        self.credential = Some(credential);
        self
    }

    #[must_use]
    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}

// ---------------------------------------------------------------------------
// RouterError
// ---------------------------------------------------------------------------

/// Fatal routing failures. Everything recoverable is an envelope instead.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("service not registered: {0}")]
    ServiceNotRegistered(String),

    /// A remote peer answered 200 with a body that is not an envelope.
    #[error("malformed response from service `{service}`: {source}")]
    MalformedResponse {
        service: String,
        #[source]
        source: EnvelopeArgError,
    },

    /// A local handler failed with a bug rather than an envelope.
    #[error("service `{service}` faulted: {source}")]
    Fault {
        service: String,
        #[source]
        source: ServiceFault,
    },
}

// ---------------------------------------------------------------------------
// ServiceRouter
// ---------------------------------------------------------------------------

/// Routes calls by service name.
///
/// Local registrations are invoked in-process through the dispatch
/// contract; remote ones go over HTTP. Either way the caller receives an
/// [`Envelope`].
#[derive(Debug)]
pub struct ServiceRouter {
    registry: ServiceRegistry,
    keys: InternalKeys,
    verbose: bool,
    client: reqwest::Client,
}

impl ServiceRouter {
    #[must_use]
    pub fn new(registry: ServiceRegistry, keys: InternalKeys, verbose: bool) -> Self {
        Self {
            registry,
            keys,
            verbose,
            client: reqwest::Client::new(),
        }
    }

    /// Registers `bindings` against `config` and builds a router from the result.
    ///
    /// # Errors
    ///
    /// Propagates every [`ConfigError`] from [`ServiceRegistry::register`].
    pub async fn register<I, N>(bindings: I, config: &RouterConfig) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (N, Binding)>,
        N: Into<String>,
    {
        let registry = ServiceRegistry::register(bindings, config).await?;
        let keys = InternalKeys::new(config.secret.as_str());
        Ok(Self::new(registry, keys, config.verbose))
    }

    /// Replaces the HTTP client used for remote calls.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    #[must_use]
    pub fn internal_keys(&self) -> &InternalKeys {
        &self.keys
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Performs one call.
    ///
    /// # Errors
    ///
    /// - [`RouterError::ServiceNotRegistered`] for an unknown service name.
    /// - [`RouterError::MalformedResponse`] when a remote peer's 200 body is
    ///   not a JSON object.
    /// - [`RouterError::Fault`] when a local handler faults.
    pub async fn call(&self, request: Request) -> Result<Envelope, RouterError> {
        let Request {
            service,
            action,
            path,
            mut payload,
            credential,
            internal,
        } = request;

        let registration = self
            .registry
            .get(&service)
            .ok_or_else(|| RouterError::ServiceNotRegistered(service.clone()))?;

        if internal && !self.keys.attach(&mut payload) {
            return Ok(Envelope::fail((
                codes::REST_REQUEST_DATA,
                "internal calls require an object payload",
            )));
        }

        let span = debug_span!(
            "service_call",
            service = %service,
            action = %action,
            path = %path,
            local = registration.is_local(),
            duration_ms = tracing::field::Empty,
            outcome = tracing::field::Empty,
        );

        async move {
            if self.verbose {
                tracing::info!(
                    service = %service,
                    verb = action.verb(),
                    path = %path,
                    payload = %payload,
                    "calling service"
                );
            }

            let start = Instant::now();
            let credential = credential.as_deref();
            let result = match registration {
                Registration::Local(instance) => {
                    invoke(instance.as_ref(), action, &path, payload, credential)
                        .await
                        .map_err(|source| RouterError::Fault {
                            service: service.clone(),
                            source,
                        })
                }
                Registration::Remote(base) => {
                    remote_call(&self.client, base, action, &path, &payload, credential)
                        .await
                        .map_err(|source| RouterError::MalformedResponse {
                            service: service.clone(),
                            source,
                        })
                }
            };

            #[allow(clippy::cast_possible_truncation)]
            let duration_ms = start.elapsed().as_millis() as u64;
            let outcome = outcome(&result);
            tracing::Span::current().record("duration_ms", duration_ms);
            tracing::Span::current().record("outcome", outcome);

            if self.verbose {
                match &result {
                    Ok(envelope) => tracing::info!(
                        service = %service,
                        duration_ms,
                        outcome,
                        envelope = %envelope,
                        "service returned"
                    ),
                    Err(err) => tracing::warn!(
                        service = %service,
                        duration_ms,
                        error = %err,
                        "service call failed"
                    ),
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    /// As [`ServiceRouter::call`], with the action given as text.
    ///
    /// An unknown action token yields an envelope with code
    /// `SERVICE_ACTION` carrying the token.
    ///
    /// # Errors
    ///
    /// As [`ServiceRouter::call`].
    pub async fn call_str(
        &self,
        service: &str,
        action: &str,
        path: &str,
        payload: Value,
        credential: Option<Arc<dyn Credential>>,
    ) -> Result<Envelope, RouterError> {
        if !self.registry.contains(service) {
            return Err(RouterError::ServiceNotRegistered(service.to_string()));
        }
        let Ok(action) = action.parse::<Action>() else {
            return Ok(Envelope::fail((codes::SERVICE_ACTION, action)));
        };
        self.call(Request {
            credential,
            ..Request::new(service, action, path, payload)
        })
        .await
    }

    /// # Errors
    ///
    /// As [`ServiceRouter::call`].
    pub async fn create(
        &self,
        service: &str,
        path: &str,
        payload: Value,
        credential: Option<Arc<dyn Credential>>,
    ) -> Result<Envelope, RouterError> {
        self.call_action(service, Action::Create, path, payload, credential)
            .await
    }

    /// # Errors
    ///
    /// As [`ServiceRouter::call`].
    pub async fn read(
        &self,
        service: &str,
        path: &str,
        payload: Value,
        credential: Option<Arc<dyn Credential>>,
    ) -> Result<Envelope, RouterError> {
        self.call_action(service, Action::Read, path, payload, credential)
            .await
    }

    /// # Errors
    ///
    /// As [`ServiceRouter::call`].
    pub async fn update(
        &self,
        service: &str,
        path: &str,
        payload: Value,
        credential: Option<Arc<dyn Credential>>,
    ) -> Result<Envelope, RouterError> {
        self.call_action(service, Action::Update, path, payload, credential)
            .await
    }

    /// # Errors
    ///
    /// As [`ServiceRouter::call`].
    pub async fn delete(
        &self,
        service: &str,
        path: &str,
        payload: Value,
        credential: Option<Arc<dyn Credential>>,
    ) -> Result<Envelope, RouterError> {
        self.call_action(service, Action::Delete, path, payload, credential)
            .await
    }

    async fn call_action(
        &self,
        service: &str,
        action: Action,
        path: &str,
        payload: Value,
        credential: Option<Arc<dyn Credential>>,
    ) -> Result<Envelope, RouterError> {
        self.call(Request {
            credential,
            ..Request::new(service, action, path, payload)
        })
        .await
    }
}

fn outcome(result: &Result<Envelope, RouterError>) -> &'static str {
    match result {
        Ok(envelope) if envelope.has_error() => "error",
        Ok(envelope) if envelope.has_data() => "data",
        Ok(_) => "empty",
        Err(_) => "fatal",
    }
}

// ---------------------------------------------------------------------------
// tower::Service adapter
// ---------------------------------------------------------------------------

impl tower::Service<Request> for Arc<ServiceRouter> {
    type Response = Envelope;
    type Error = RouterError;
    type Future = Pin<Box<dyn Future<Output = Result<Envelope, RouterError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let router = Arc::clone(self);
        Box::pin(async move { ServiceRouter::call(&router, request).await })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
