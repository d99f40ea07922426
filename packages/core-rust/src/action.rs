//! Actions and the path-to-method naming rule.
//!
//! A call names one of four [`Action`]s. Remotely the action selects the HTTP
//! verb; locally it selects the handler suffix appended to the canonical noun
//! name produced by [`path_to_method`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The four REST-like actions a service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

impl Action {
    pub const ALL: [Action; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    /// HTTP verb used when the target service is remote.
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Read => "GET",
            Self::Update => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// Suffix appended to the canonical noun name to form a handler name.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Create => "_create",
            Self::Read => "_read",
            Self::Update => "_update",
            Self::Delete => "_delete",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action token outside create/read/update/delete.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "read" => Ok(Self::Read),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Paths that cannot be turned into a handler name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path ends in `/` or `_`, leaving nothing to upper-case.
    #[error("path ends with a separator: {0:?}")]
    TrailingSeparator(String),
}

/// Converts a path into its canonical handler name.
///
/// Each `/` or `_` is dropped and the character after it is upper-cased;
/// everything else passes through.
///
/// ```
/// use restoc_core::path_to_method;
///
/// assert_eq!(path_to_method("user/permission").unwrap(), "userPermission");
/// assert_eq!(path_to_method("auth_session").unwrap(), "authSession");
/// assert_eq!(path_to_method("/ping").unwrap(), "Ping");
/// ```
///
/// # Errors
///
/// Returns [`PathError::TrailingSeparator`] when the last character is a separator.
pub fn path_to_method(path: &str) -> Result<String, PathError> {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        if c == '/' || c == '_' {
            let next = chars
                .next()
                .ok_or_else(|| PathError::TrailingSeparator(path.to_string()))?;
            out.extend(next.to_uppercase());
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// Handler name for `path` under `action`, e.g. `"userPermission_read"`.
///
/// # Errors
///
/// Propagates [`PathError`] from [`path_to_method`].
pub fn method_name(path: &str, action: Action) -> Result<String, PathError> {
    let mut name = path_to_method(path)?;
    name.push_str(action.suffix());
    Ok(name)
}
