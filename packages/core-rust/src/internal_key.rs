//! Internal keys: time-bounded tokens proving a call came from a peer service.
//!
//! A key has the form `"<digest>:<unix-seconds>"`. The digest is the SHA-1 hex
//! of `t[5..] + secret + t[..5]`, where `t` is the decimal timestamp. A key is
//! accepted only while the validator's clock is within
//! [`TOLERANCE_SECS`] of `t`.
//!
//! # Security
//!
//! This is a lightweight shared-secret proof kept byte-compatible with
//! existing peers. It is not a standard keyed MAC (no HMAC construction) and
//! has not been cryptographically reviewed. Do not reuse it for anything but
//! service-to-service trust inside a private network.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use sha1::{Digest, Sha1};
use subtle::ConstantTimeEq;

use crate::clock::{ClockSource, SystemClock};
use crate::envelope::Interrupt;
use crate::errors::codes;

/// Payload field that carries an internal key between services.
pub const INTERNAL_FIELD: &str = "_internal_";

/// Maximum distance, in seconds, between a key's timestamp and now.
pub const TOLERANCE_SECS: i64 = 5;

/// Byte index at which the timestamp is split around the secret.
const SPLIT_AT: usize = 5;

/// Generator and validator of internal keys for one shared secret.
#[derive(Clone)]
pub struct InternalKeys {
    secret: Arc<str>,
    clock: Arc<dyn ClockSource>,
}

impl InternalKeys {
    /// Keys bound to `secret`, timed by the system clock.
    #[must_use]
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(secret: impl Into<Arc<str>>, clock: Arc<dyn ClockSource>) -> Self {
        Self {
            secret: secret.into(),
            clock,
        }
    }

    /// Produces a fresh key stamped with the current time.
    #[must_use]
    pub fn generate(&self) -> String {
        let t = self.clock.now_secs().to_string();
        let digest = self.digest(&t);
        format!("{digest}:{t}")
    }

    /// Checks shape, freshness and digest of `key`. Never panics.
    #[must_use]
    pub fn validate(&self, key: &str) -> bool {
        let Some((digest, t)) = key.split_once(':') else {
            return false;
        };
        if t.contains(':') {
            return false;
        }
        let Ok(stamp) = t.parse::<i64>() else {
            return false;
        };

        let now = i64::try_from(self.clock.now_secs()).unwrap_or(i64::MAX);
        if now.saturating_sub(stamp).saturating_abs() > TOLERANCE_SECS {
            tracing::debug!(stamp, now, "internal key outside time window");
            return false;
        }

        self.digest(t).as_bytes().ct_eq(digest.as_bytes()).into()
    }

    /// Inserts a fresh key into `payload` under [`INTERNAL_FIELD`].
    ///
    /// A `null` payload becomes an object holding only the key. Returns
    /// `false`, leaving `payload` untouched, when it is any other non-object.
    pub fn attach(&self, payload: &mut Value) -> bool {
        if payload.is_null() {
            *payload = Value::Object(Map::new());
        }
        match payload {
            Value::Object(map) => {
                map.insert(INTERNAL_FIELD.to_string(), Value::from(self.generate()));
                true
            }
            _ => false,
        }
    }

    /// Guard for handlers that only accept service-to-service calls.
    ///
    /// # Errors
    ///
    /// Returns an `Interrupt::Effect` with code `SERVICE_INTERNAL_KEY` when
    /// the key is missing or invalid.
    pub fn verify_payload(&self, payload: &Value) -> Result<(), Interrupt> {
        match payload.get(INTERNAL_FIELD).and_then(Value::as_str) {
            Some(key) if self.validate(key) => Ok(()),
            Some(_) => Err(Interrupt::fail((codes::SERVICE_INTERNAL_KEY, "invalid internal key"))),
            None => Err(Interrupt::fail((codes::SERVICE_INTERNAL_KEY, "missing internal key"))),
        }
    }

    fn digest(&self, t: &str) -> String {
        let (leading, trailing) = t.split_at(t.len().min(SPLIT_AT));
        let mut hasher = Sha1::new();
        hasher.update(trailing.as_bytes());
        hasher.update(self.secret.as_bytes());
        hasher.update(leading.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for InternalKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalKeys")
            .field("secret", &"<redacted>")
            .finish_non_exhaustive()
    }
}
