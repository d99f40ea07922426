//! Remote call over HTTP.
//!
//! Failures reaching or understanding the peer become envelopes; only a
//! 200 response whose body is not a JSON object is fatal.

use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{Method, StatusCode};
use restoc_core::errors::codes;
use restoc_core::{Action, Credential, Envelope, EnvelopeArgError};
use serde_json::Value;

/// Content type sent with every request and required on every response.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

fn method(action: Action) -> Method {
    match action {
        Action::Create => Method::POST,
        Action::Read => Method::GET,
        Action::Update => Method::PUT,
        Action::Delete => Method::DELETE,
    }
}

/// Sends `payload` to `base + path` and classifies the answer.
///
/// Order of checks: unreachable, status, content type, body.
///
/// # Errors
///
/// Returns [`EnvelopeArgError`] when a 200 response with the JSON content
/// type carries a body that is not a JSON object.
pub async fn remote_call(
    client: &reqwest::Client,
    base: &str,
    action: Action,
    path: &str,
    payload: &Value,
    credential: Option<&dyn Credential>,
) -> Result<Envelope, EnvelopeArgError> {
    let url = format!("{base}{path}");
    let body = payload.to_string();

    let mut request = client
        .request(method(action), &url)
        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
        .header(CONTENT_LENGTH, body.len().to_string())
        .body(body);
    if let Some(credential) = credential {
        request = request.header(AUTHORIZATION, credential.id());
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(%url, error = %err, "remote service unreachable");
            return Ok(Envelope::fail((codes::SERVICE_UNREACHABLE, err.to_string())));
        }
    };

    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let text = match response.text().await {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(%url, error = %err, "remote response body unreadable");
            return Ok(Envelope::fail((codes::SERVICE_UNREACHABLE, err.to_string())));
        }
    };

    if status != StatusCode::OK {
        return Ok(Envelope::fail((
            codes::SERVICE_STATUS,
            format!("{}: {text}", status.as_u16()),
        )));
    }

    if !content_type.eq_ignore_ascii_case(JSON_CONTENT_TYPE) {
        return Ok(Envelope::fail((codes::SERVICE_CONTENT_TYPE, content_type)));
    }

    Envelope::from_json(&text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::any;
    use axum::Router;
    use restoc_core::{EnvelopeError, SessionId};
    use serde_json::json;

    use super::*;

    /// Serves `app` on an ephemeral localhost port and returns its base URL.
    pub(crate) async fn spawn_peer(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Base URL of a port nothing listens on.
    pub(crate) fn dead_peer() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    /// Echoes what arrived, as an envelope with the canonical content type.
    pub(crate) async fn echo(
        method: Method,
        Path(rest): Path<String>,
        headers: HeaderMap,
        body: String,
    ) -> impl IntoResponse {
        let header = |name: axum::http::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let data = json!({
            "method": method.as_str(),
            "path": format!("/{rest}"),
            "authorization": header(AUTHORIZATION),
            "content_type": header(CONTENT_TYPE),
            "content_length": header(CONTENT_LENGTH),
            "body": serde_json::from_str::<Value>(&body).unwrap_or(Value::Null),
        });
        (
            [(CONTENT_TYPE, JSON_CONTENT_TYPE)],
            json!({ "data": data }).to_string(),
        )
    }

    pub(crate) fn peer_app() -> Router {
        Router::new()
            .route("/echo/{*rest}", any(echo))
            .route(
                "/ok",
                any(|| async { ([(CONTENT_TYPE, JSON_CONTENT_TYPE)], r#"{"data": {"ok": true}}"#) }),
            )
            .route(
                "/shouty",
                any(|| async {
                    (
                        [(CONTENT_TYPE, "APPLICATION/JSON; CHARSET=UTF-8")],
                        r#"{"data": 1, "warning": "loud"}"#,
                    )
                }),
            )
            .route(
                "/failing",
                any(|| async {
                    (
                        [(CONTENT_TYPE, JSON_CONTENT_TYPE)],
                        r#"{"error": {"code": 1001, "msg": "no such user"}}"#,
                    )
                }),
            )
            .route(
                "/boom",
                any(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            )
            .route(
                "/plain-json",
                any(|| async { axum::Json(json!({"data": 1})) }),
            )
            .route("/text", any(|| async { "hello" }))
            .route(
                "/garbage",
                any(|| async { ([(CONTENT_TYPE, JSON_CONTENT_TYPE)], "not json") }),
            )
            .route(
                "/array",
                any(|| async { ([(CONTENT_TYPE, JSON_CONTENT_TYPE)], "[1, 2]") }),
            )
    }

    async fn call(
        base: &str,
        action: Action,
        path: &str,
        payload: Value,
        credential: Option<&dyn Credential>,
    ) -> Result<Envelope, EnvelopeArgError> {
        remote_call(&reqwest::Client::new(), base, action, path, &payload, credential).await
    }

    #[tokio::test]
    async fn request_carries_verb_body_and_headers() {
        let base = spawn_peer(peer_app()).await;
        let sesh = SessionId::new("sess-9");
        let payload = json!({"name": "ann"});

        let env = call(&base, Action::Create, "/echo/user", payload.clone(), Some(&sesh))
            .await
            .unwrap();
        let data = env.data().unwrap();
        assert_eq!(data["method"], "POST");
        assert_eq!(data["path"], "/user");
        assert_eq!(data["authorization"], "sess-9");
        assert_eq!(data["content_type"], JSON_CONTENT_TYPE);
        assert_eq!(data["content_length"], payload.to_string().len().to_string());
        assert_eq!(data["body"], payload);
    }

    #[tokio::test]
    async fn successful_response_is_decoded() {
        let base = spawn_peer(peer_app()).await;
        let env = call(&base, Action::Read, "/ok", json!({}), None).await.unwrap();
        assert!(env.has_data());
        assert_eq!(env.data(), Some(&json!({"ok": true})));
        assert!(!env.has_error());
    }

    #[tokio::test]
    async fn each_action_uses_its_verb() {
        let base = spawn_peer(peer_app()).await;
        for action in Action::ALL {
            let env = call(&base, action, "/echo/x", json!({}), None).await.unwrap();
            assert_eq!(env.data().unwrap()["method"], action.verb());
        }
    }

    #[tokio::test]
    async fn no_credential_means_no_authorization_header() {
        let base = spawn_peer(peer_app()).await;
        let env = call(&base, Action::Read, "/echo/x", json!({}), None).await.unwrap();
        assert_eq!(env.data().unwrap()["authorization"], Value::Null);
    }

    #[tokio::test]
    async fn content_type_match_ignores_case() {
        let base = spawn_peer(peer_app()).await;
        let env = call(&base, Action::Read, "/shouty", json!({}), None).await.unwrap();
        assert_eq!(env.data(), Some(&json!(1)));
        assert_eq!(env.warning(), Some(&json!("loud")));
    }

    #[tokio::test]
    async fn remote_error_envelope_is_decoded() {
        let base = spawn_peer(peer_app()).await;
        let env = call(&base, Action::Read, "/failing", json!({}), None).await.unwrap();
        assert_eq!(env.error(), Some(&EnvelopeError::new(1001, "no such user")));
    }

    #[tokio::test]
    async fn non_200_status_reports_status_and_body() {
        let base = spawn_peer(peer_app()).await;
        let env = call(&base, Action::Read, "/boom", json!({}), None).await.unwrap();
        assert_eq!(
            env.error(),
            Some(&EnvelopeError::new(codes::SERVICE_STATUS, "500: boom"))
        );
    }

    #[tokio::test]
    async fn unknown_route_is_status_error() {
        let base = spawn_peer(peer_app()).await;
        let env = call(&base, Action::Read, "/nowhere", json!({}), None).await.unwrap();
        let error = env.error().unwrap();
        assert_eq!(error.code, codes::SERVICE_STATUS);
        assert!(error.message.starts_with("404: "));
    }

    #[tokio::test]
    async fn wrong_content_type_reports_received_value() {
        let base = spawn_peer(peer_app()).await;

        let env = call(&base, Action::Read, "/plain-json", json!({}), None).await.unwrap();
        assert_eq!(
            env.error(),
            Some(&EnvelopeError::new(codes::SERVICE_CONTENT_TYPE, "application/json"))
        );

        let env = call(&base, Action::Read, "/text", json!({}), None).await.unwrap();
        assert_eq!(env.error().unwrap().code, codes::SERVICE_CONTENT_TYPE);
        assert!(env.error().unwrap().message.starts_with("text/plain"));
    }

    #[tokio::test]
    async fn unreachable_peer_is_an_envelope() {
        let env = call(&dead_peer(), Action::Read, "/ping", json!({}), None)
            .await
            .unwrap();
        let error = env.error().unwrap();
        assert_eq!(error.code, codes::SERVICE_UNREACHABLE);
        assert!(!error.message.is_empty());
    }

    #[tokio::test]
    async fn malformed_body_is_fatal() {
        let base = spawn_peer(peer_app()).await;
        let err = call(&base, Action::Read, "/garbage", json!({}), None)
            .await
            .unwrap_err();
        assert_eq!(err.argument(), "val");

        let err = call(&base, Action::Read, "/array", json!({}), None)
            .await
            .unwrap_err();
        assert_eq!(err.argument(), "val");
    }
}
