//! Result envelope: the uniform value every service call produces.
//!
//! An [`Envelope`] carries up to three independent fields: `data`, `error`
//! and `warning`. Only fields that are present are serialized, so absence
//! survives a JSON round trip as absence (never as `null`).
//!
//! Errors are always normalized to [`EnvelopeError`] (`{code, message}`)
//! regardless of which [`ErrorInput`] variant built them.
//!
//! # Wire format
//!
//! ```json
//! {"data": {"ok": true}, "warning": "cached"}
//! {"error": {"code": 204, "message": "GET /user"}}
//! ```
//!
//! The legacy `msg` key is accepted in place of `message` when decoding.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// EnvelopeError
// ---------------------------------------------------------------------------

/// Normalized error carried inside an [`Envelope`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct EnvelopeError {
    /// Numeric code from [`crate::errors::codes`] or a service-specific table.
    #[serde(default)]
    pub code: i64,
    /// Free-form detail; empty when only a code was supplied.
    #[serde(default, alias = "msg")]
    pub message: String,
    /// Any further keys of a structured error, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EnvelopeError {
    /// Creates an error from a code and message.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extra: Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// EnvelopeArgError
// ---------------------------------------------------------------------------

/// Errors raised while building or decoding an [`Envelope`].
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeArgError {
    /// The named argument had a shape that cannot be normalized.
    #[error("invalid argument `{0}`")]
    InvalidArgument(&'static str),
    /// The `val` text was not valid JSON.
    #[error("invalid argument `val`: {0}")]
    Json(#[from] serde_json::Error),
}

impl EnvelopeArgError {
    /// Name of the offending argument (`"error"` or `"val"`).
    #[must_use]
    pub fn argument(&self) -> &'static str {
        match self {
            Self::InvalidArgument(name) => name,
            Self::Json(_) => "val",
        }
    }
}

// ---------------------------------------------------------------------------
// ErrorInput
// ---------------------------------------------------------------------------

/// The accepted ways of describing an envelope error.
///
/// Every variant normalizes to the same [`EnvelopeError`] shape:
///
/// | Variant              | Result                                  |
/// |----------------------|-----------------------------------------|
/// | `Code(c)`            | `{code: c, message: ""}`                |
/// | `Message(m)`         | `{code: 0, message: m}`                 |
/// | `CodeAndMessage(c,m)`| `{code: c, message: m}`                 |
/// | `Structured(e)`      | `e` unchanged, extra keys included      |
/// | `Cause(i)`           | the error of the envelope `i` carries   |
#[derive(Debug)]
pub enum ErrorInput {
    Code(i64),
    Message(String),
    CodeAndMessage(i64, String),
    Structured(EnvelopeError),
    Cause(Interrupt),
}

impl ErrorInput {
    /// Interprets a dynamically shaped JSON value as an error description.
    ///
    /// Accepts an integer, a string, a `[code, message]` pair, or an object
    /// with `code` and/or `message` (`msg`) keys.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeArgError::InvalidArgument("error")` for any other shape.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeArgError> {
        const INVALID: EnvelopeArgError = EnvelopeArgError::InvalidArgument("error");

        match value {
            Value::Number(n) => n.as_i64().map(Self::Code).ok_or(INVALID),
            Value::String(s) => Ok(Self::Message(s)),
            Value::Array(items) => match items.as_slice() {
                [Value::Number(code), Value::String(message)] => code
                    .as_i64()
                    .map(|code| Self::CodeAndMessage(code, message.clone()))
                    .ok_or(INVALID),
                _ => Err(INVALID),
            },
            Value::Object(map) => {
                let structured = ["code", "message", "msg"]
                    .iter()
                    .any(|key| map.contains_key(*key));
                if !structured {
                    return Err(INVALID);
                }
                serde_json::from_value(Value::Object(map))
                    .map(Self::Structured)
                    .map_err(|_| INVALID)
            }
            Value::Null | Value::Bool(_) => Err(INVALID),
        }
    }

    /// Normalizes into the stored representation.
    ///
    /// Only `Cause` can produce `None`: when the wrapped envelope has no error,
    /// there is nothing to copy through.
    #[must_use]
    pub fn normalize(self) -> Option<EnvelopeError> {
        match self {
            Self::Code(code) => Some(EnvelopeError::new(code, "")),
            Self::Message(message) => Some(EnvelopeError::new(0, message)),
            Self::CodeAndMessage(code, message) => Some(EnvelopeError::new(code, message)),
            Self::Structured(error) => Some(error),
            Self::Cause(Interrupt::Effect(envelope)) => envelope.error,
            Self::Cause(Interrupt::Fault(err)) => Some(EnvelopeError::new(0, err.to_string())),
        }
    }
}

impl From<i64> for ErrorInput {
    fn from(code: i64) -> Self {
        Self::Code(code)
    }
}

impl From<&str> for ErrorInput {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for ErrorInput {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<(i64, &str)> for ErrorInput {
    fn from((code, message): (i64, &str)) -> Self {
        Self::CodeAndMessage(code, message.to_string())
    }
}

impl From<(i64, String)> for ErrorInput {
    fn from((code, message): (i64, String)) -> Self {
        Self::CodeAndMessage(code, message)
    }
}

impl From<EnvelopeError> for ErrorInput {
    fn from(error: EnvelopeError) -> Self {
        Self::Structured(error)
    }
}

impl From<Interrupt> for ErrorInput {
    fn from(cause: Interrupt) -> Self {
        Self::Cause(cause)
    }
}

impl From<anyhow::Error> for ErrorInput {
    fn from(cause: anyhow::Error) -> Self {
        Self::Cause(Interrupt::from(cause))
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Uniform result of every dispatch, local or remote.
///
/// `warning` may coexist with either `data` or `error`. A JSON `null` is
/// treated the same as an absent field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Envelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<EnvelopeError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<Value>,
}

impl Envelope {
    /// Builds an envelope from already-typed parts.
    #[must_use]
    pub fn new(data: Option<Value>, error: Option<ErrorInput>, warning: Option<Value>) -> Self {
        Self {
            data: data.filter(|v| !v.is_null()),
            error: error.and_then(ErrorInput::normalize),
            warning: warning.filter(|v| !v.is_null()),
        }
    }

    /// Builds an envelope whose error arrives as an untyped JSON value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument("error")` when `error` has an unsupported shape.
    pub fn try_new(
        data: Option<Value>,
        error: Option<Value>,
        warning: Option<Value>,
    ) -> Result<Self, EnvelopeArgError> {
        let error = match error {
            None | Some(Value::Null) => None,
            Some(raw) => Some(ErrorInput::from_value(raw)?),
        };
        Ok(Self::new(data, error, warning))
    }

    /// Success envelope carrying `data`.
    #[must_use]
    pub fn ok(data: impl Into<Value>) -> Self {
        Self::new(Some(data.into()), None, None)
    }

    /// Envelope with no fields set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Failure envelope; see [`ErrorInput`] for the accepted shapes.
    #[must_use]
    pub fn fail(error: impl Into<ErrorInput>) -> Self {
        Self::new(None, Some(error.into()), None)
    }

    /// Attaches a warning without touching `data` or `error`.
    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<Value>) -> Self {
        self.warning = Some(warning.into()).filter(|v| !v.is_null());
        self
    }

    #[must_use]
    pub fn has_data(&self) -> bool {
        self.data.is_some()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    #[must_use]
    pub fn has_warning(&self) -> bool {
        self.warning.is_some()
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    #[must_use]
    pub fn error(&self) -> Option<&EnvelopeError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn warning(&self) -> Option<&Value> {
        self.warning.as_ref()
    }

    /// Splits the envelope for callers that prefer `?`. The warning is dropped.
    ///
    /// # Errors
    ///
    /// Returns the envelope's error when one is present.
    pub fn into_result(self) -> Result<Option<Value>, EnvelopeError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }

    /// JSON object holding exactly the present fields.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(data) = &self.data {
            map.insert("data".to_string(), data.clone());
        }
        if let Some(error) = &self.error {
            let mut err = error.extra.clone();
            err.insert("code".to_string(), Value::from(error.code));
            err.insert("message".to_string(), Value::from(error.message.clone()));
            map.insert("error".to_string(), Value::Object(err));
        }
        if let Some(warning) = &self.warning {
            map.insert("warning".to_string(), warning.clone());
        }
        Value::Object(map)
    }

    /// Serializes to compact JSON text.
    #[must_use]
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    /// Rebuilds an envelope from a decoded JSON object.
    ///
    /// Missing keys stay absent and unknown keys are ignored. A present
    /// `error` is normalized like any other [`ErrorInput`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument("val")` when `value` is not an object and
    /// `InvalidArgument("error")` when its `error` cannot be normalized.
    pub fn from_value(value: Value) -> Result<Self, EnvelopeArgError> {
        let Value::Object(mut map) = value else {
            return Err(EnvelopeArgError::InvalidArgument("val"));
        };
        Self::try_new(map.remove("data"), map.remove("error"), map.remove("warning"))
    }

    /// Parses JSON text produced by [`Envelope::to_json`] or a remote peer.
    ///
    /// # Errors
    ///
    /// Fails with an `EnvelopeArgError` whose argument is `"val"` on malformed
    /// text, and as [`Envelope::from_value`] otherwise.
    pub fn from_json(text: &str) -> Result<Self, EnvelopeArgError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }
}

impl TryFrom<Value> for Envelope {
    type Error = EnvelopeArgError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

// ---------------------------------------------------------------------------
// Interrupt
// ---------------------------------------------------------------------------

/// Early exit from a handler.
///
/// `Effect` unwinds straight to the dispatch boundary with a finished
/// envelope, which is returned to the caller as-is. `Fault` is a bug and
/// propagates past the boundary.
#[derive(Debug, thiserror::Error)]
pub enum Interrupt {
    #[error("interrupted with {0}")]
    Effect(Envelope),
    #[error(transparent)]
    Fault(anyhow::Error),
}

impl Interrupt {
    /// Shorthand for an `Effect` holding a failure envelope.
    #[must_use]
    pub fn fail(error: impl Into<ErrorInput>) -> Self {
        Self::Effect(Envelope::fail(error))
    }

    /// Extracts the carried envelope, or hands the fault back.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error for `Fault`.
    pub fn into_envelope(self) -> Result<Envelope, anyhow::Error> {
        match self {
            Self::Effect(envelope) => Ok(envelope),
            Self::Fault(err) => Err(err),
        }
    }
}

impl From<Envelope> for Interrupt {
    fn from(envelope: Envelope) -> Self {
        Self::Effect(envelope)
    }
}

impl From<anyhow::Error> for Interrupt {
    fn from(err: anyhow::Error) -> Self {
        // An interrupt that travelled through `anyhow` is unwrapped, not nested.
        match err.downcast::<Interrupt>() {
            Ok(inner) => inner,
            Err(err) => Self::Fault(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::errors::codes;

    fn error_of(envelope: &Envelope) -> &EnvelopeError {
        envelope.error().expect("error present")
    }

    // ---- ErrorInput normalization ----

    #[test]
    fn code_normalizes_with_empty_message() {
        let e = Envelope::fail(codes::SERVICE_STATUS);
        assert_eq!(error_of(&e), &EnvelopeError::new(201, ""));
    }

    #[test]
    fn message_normalizes_with_zero_code() {
        let e = Envelope::fail("boom");
        assert_eq!(error_of(&e), &EnvelopeError::new(0, "boom"));
    }

    #[test]
    fn pair_normalizes_to_code_and_message() {
        let e = Envelope::fail((codes::SERVICE_NO_SUCH_NOUN, "GET /x"));
        assert_eq!(error_of(&e), &EnvelopeError::new(204, "GET /x"));
    }

    #[test]
    fn structured_is_stored_as_is() {
        let err = EnvelopeError::new(7, "seven");
        let e = Envelope::fail(err.clone());
        assert_eq!(error_of(&e), &err);
    }

    #[test]
    fn cause_copies_inner_error_through() {
        let inner = Envelope::fail((42_i64, "deep"));
        let e = Envelope::fail(Interrupt::from(inner));
        assert_eq!(error_of(&e), &EnvelopeError::new(42, "deep"));
    }

    #[test]
    fn cause_through_anyhow_is_not_double_wrapped() {
        let signal = Interrupt::fail((9_i64, "nine"));
        let wrapped = anyhow::Error::new(signal);
        let e = Envelope::fail(wrapped);
        assert_eq!(error_of(&e), &EnvelopeError::new(9, "nine"));
    }

    #[test]
    fn cause_from_plain_fault_keeps_message() {
        let e = Envelope::fail(anyhow::anyhow!("disk full"));
        assert_eq!(error_of(&e), &EnvelopeError::new(0, "disk full"));
    }

    #[test]
    fn cause_without_error_leaves_error_absent() {
        let e = Envelope::fail(Interrupt::Effect(Envelope::ok(1)));
        assert!(!e.has_error());
    }

    #[test]
    fn dynamic_shapes_normalize_identically() {
        let expected = EnvelopeError::new(5, "five");
        let shapes = [
            json!([5, "five"]),
            json!({"code": 5, "message": "five"}),
            json!({"code": 5, "msg": "five"}),
        ];
        for shape in shapes {
            let e = Envelope::try_new(None, Some(shape), None).unwrap();
            assert_eq!(error_of(&e), &expected);
        }

        let e = Envelope::try_new(None, Some(json!(5)), None).unwrap();
        assert_eq!(error_of(&e), &EnvelopeError::new(5, ""));
        let e = Envelope::try_new(None, Some(json!("five")), None).unwrap();
        assert_eq!(error_of(&e), &EnvelopeError::new(0, "five"));
    }

    #[test]
    fn unsupported_error_shapes_are_rejected() {
        for shape in [
            json!(true),
            json!(1.5),
            json!([1]),
            json!([1, 2]),
            json!(["a", "b"]),
            json!({"unrelated": 1}),
            json!({"code": "not-a-number"}),
        ] {
            let err = Envelope::try_new(None, Some(shape.clone()), None).unwrap_err();
            assert_eq!(err.argument(), "error", "shape {shape} should be rejected");
        }
    }

    // ---- Predicates ----

    #[test]
    fn predicates_report_presence() {
        let e = Envelope::ok(json!({"ok": true})).with_warning("slow");
        assert!(e.has_data());
        assert!(!e.has_error());
        assert!(e.has_warning());

        let e = Envelope::empty();
        assert!(!e.has_data() && !e.has_error() && !e.has_warning());
    }

    #[test]
    fn falsy_values_are_present() {
        for value in [json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(Envelope::ok(value).has_data());
        }
    }

    #[test]
    fn null_data_counts_as_absent() {
        assert!(!Envelope::ok(Value::Null).has_data());
    }

    #[test]
    fn warning_coexists_with_error() {
        let e = Envelope::fail("bad").with_warning(json!({"retry": false}));
        assert!(e.has_error());
        assert_eq!(e.warning(), Some(&json!({"retry": false})));
    }

    #[test]
    fn into_result_splits_on_error() {
        assert_eq!(Envelope::ok(3).into_result().unwrap(), Some(json!(3)));
        let err = Envelope::fail((1_i64, "x")).into_result().unwrap_err();
        assert_eq!(err.code, 1);
    }

    // ---- Serialization ----

    #[test]
    fn to_json_omits_absent_fields() {
        assert_eq!(Envelope::empty().to_json(), "{}");
        assert_eq!(Envelope::ok(json!({"ok": true})).to_json(), r#"{"data":{"ok":true}}"#);
        assert_eq!(
            Envelope::fail((201_i64, "500: boom")).to_json(),
            r#"{"error":{"code":201,"message":"500: boom"}}"#
        );
    }

    #[test]
    fn display_matches_to_json() {
        let e = Envelope::ok(1).with_warning("w");
        assert_eq!(e.to_string(), e.to_json());
    }

    #[test]
    fn from_json_leaves_missing_keys_absent() {
        let e = Envelope::from_json(r#"{"warning": "only"}"#).unwrap();
        assert!(!e.has_data());
        assert!(!e.has_error());
        assert_eq!(e.warning(), Some(&json!("only")));
    }

    #[test]
    fn from_json_accepts_legacy_msg_key() {
        let e = Envelope::from_json(r#"{"error": {"code": 3, "msg": "old"}}"#).unwrap();
        assert_eq!(error_of(&e), &EnvelopeError::new(3, "old"));
    }

    #[test]
    fn structured_error_keeps_extra_keys() {
        let text = r#"{"error":{"code":1,"message":"x","field":"name"}}"#;
        let e = Envelope::from_json(text).unwrap();
        assert_eq!(error_of(&e).extra.get("field"), Some(&json!("name")));
        assert_eq!(
            e.to_value(),
            json!({"error": {"code": 1, "message": "x", "field": "name"}})
        );
        assert_eq!(serde_json::to_value(&e).unwrap(), e.to_value());
    }

    #[test]
    fn from_json_rejects_malformed_text() {
        let err = Envelope::from_json("{not json").unwrap_err();
        assert_eq!(err.argument(), "val");
        assert!(matches!(err, EnvelopeArgError::Json(_)));
    }

    #[test]
    fn from_json_rejects_non_object() {
        let err = Envelope::from_json("[1, 2]").unwrap_err();
        assert!(matches!(err, EnvelopeArgError::InvalidArgument("val")));
    }

    #[test]
    fn serde_deserialize_goes_through_normalization() {
        let e: Envelope = serde_json::from_str(r#"{"error": "plain"}"#).unwrap();
        assert_eq!(error_of(&e), &EnvelopeError::new(0, "plain"));
    }

    #[test]
    fn serde_serialize_matches_to_json() {
        let e = Envelope::fail(3_i64).with_warning(json!([1]));
        assert_eq!(serde_json::to_string(&e).unwrap(), e.to_json());
    }

    // ---- Interrupt ----

    #[test]
    fn interrupt_into_envelope() {
        let env = Interrupt::fail("stop").into_envelope().unwrap();
        assert_eq!(error_of(&env).message, "stop");
        assert!(Interrupt::from(anyhow::anyhow!("bug")).into_envelope().is_err());
    }

    // ---- Round-trip law ----

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z ]{0,10}".prop_map(Value::from),
            prop::collection::vec(any::<i32>(), 0..4).prop_map(Value::from),
            ("[a-z]{1,6}", any::<i32>())
                .prop_map(|(k, v)| Value::Object(std::iter::once((k, Value::from(v))).collect())),
        ]
    }

    proptest! {
        #[test]
        fn json_round_trip_preserves_present_fields(
            data in prop::option::of(json_leaf()),
            error in prop::option::of((any::<i64>(), "[ -~]{0,16}")),
            warning in prop::option::of(json_leaf()),
        ) {
            let before = Envelope::new(
                data,
                error.map(|(c, m)| ErrorInput::CodeAndMessage(c, m)),
                warning,
            );
            let decoded = Envelope::from_json(&before.to_json()).unwrap();
            prop_assert_eq!(decoded, before);
        }
    }
}
