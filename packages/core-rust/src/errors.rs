//! Named integer error codes shared by every service.
//!
//! Codes travel inside [`EnvelopeError`](crate::EnvelopeError) and must stay
//! numerically stable: remote peers compare them as plain integers.

/// Error code constants.
pub mod codes {
    /// Request body could not be decoded.
    pub const REST_REQUEST_DATA: i64 = 100;
    /// Request arrived with an unsupported content type.
    pub const REST_CONTENT_TYPE: i64 = 101;
    /// Request lacked a valid `Authorization` header.
    pub const REST_AUTHORIZATION: i64 = 102;

    /// Action token is not one of create/read/update/delete.
    pub const SERVICE_ACTION: i64 = 200;
    /// Remote peer answered with a status other than 200.
    pub const SERVICE_STATUS: i64 = 201;
    /// Remote peer answered with an unexpected content type.
    pub const SERVICE_CONTENT_TYPE: i64 = 202;
    /// Remote peer could not be reached.
    pub const SERVICE_UNREACHABLE: i64 = 203;
    /// Path did not resolve to a handler on the service.
    pub const SERVICE_NO_SUCH_NOUN: i64 = 204;
    /// Internal key missing or rejected.
    pub const SERVICE_INTERNAL_KEY: i64 = 205;
    /// Handler failed unexpectedly.
    pub const SERVICE_CRASHED: i64 = 206;
    /// Service name is not registered.
    pub const SERVICE_NOT_REGISTERED: i64 = 207;
}

/// Returns the symbolic name of a known code, for log output.
#[must_use]
pub fn code_name(code: i64) -> Option<&'static str> {
    let name = match code {
        codes::REST_REQUEST_DATA => "REST_REQUEST_DATA",
        codes::REST_CONTENT_TYPE => "REST_CONTENT_TYPE",
        codes::REST_AUTHORIZATION => "REST_AUTHORIZATION",
        codes::SERVICE_ACTION => "SERVICE_ACTION",
        codes::SERVICE_STATUS => "SERVICE_STATUS",
        codes::SERVICE_CONTENT_TYPE => "SERVICE_CONTENT_TYPE",
        codes::SERVICE_UNREACHABLE => "SERVICE_UNREACHABLE",
        codes::SERVICE_NO_SUCH_NOUN => "SERVICE_NO_SUCH_NOUN",
        codes::SERVICE_INTERNAL_KEY => "SERVICE_INTERNAL_KEY",
        codes::SERVICE_CRASHED => "SERVICE_CRASHED",
        codes::SERVICE_NOT_REGISTERED => "SERVICE_NOT_REGISTERED",
        _ => return None,
    };
    Some(name)
}
