//! Credential collaborator.
//!
//! The dispatch layer treats sessions opaquely: the only thing it ever needs
//! is the identifier placed in the `Authorization` header of remote calls.

use std::fmt;

/// Anything that can identify the caller of a service.
pub trait Credential: Send + Sync + fmt::Debug {
    /// Session identifier sent as the `Authorization` header value.
    fn id(&self) -> &str;
}

/// Bare session identifier, for callers that hold nothing but the token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl Credential for SessionId {
    fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
