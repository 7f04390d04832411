//! The token-carrying request pipeline every HAT call goes through.
//!
//! # Design
//! `HatClient` holds only immutable configuration and a shared transport, so
//! any number of calls can be in flight at once without locking. A call:
//!
//! 1. sends the request through the `Transport`,
//! 2. classifies the `RawOutcome` into an `Outcome`,
//! 3. applies the endpoint's status overrides (`dispatch`),
//! 4. decodes the body and returns it together with the renewed token.
//!
//! The renewed token is handed back to the caller, never stored here. Steps
//! 3 and 4 are pure (`dispatch`) so a host executing its own I/O can reuse
//! them with `classify`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::{classify, Body, Outcome, TokenSource};
use crate::config::ClientConfig;
use crate::endpoints::Endpoints;
use crate::error::{HatError, SERVER_ERROR_MESSAGE, UNAUTHORIZED_MESSAGE};
use crate::http::{HttpRequest, RawOutcome};
use crate::transport::{ReqwestTransport, Transport};

/// A decoded value plus the token the server renewed, if it sent one.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply<T> {
    pub value: T,
    pub renewed_token: Option<String>,
}

impl<T> Reply<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            value: f(self.value),
            renewed_token: self.renewed_token,
        }
    }
}

/// Endpoint-specific meaning of status codes on otherwise successful
/// exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    /// `/api/v2/data/...`: 404 means the table does not exist.
    DataTable,
    /// Any other authenticated endpoint.
    General,
    /// No overrides; the body alone decides.
    Lenient,
}

impl EndpointKind {
    /// 401 is unauthorized, 404 on a data table is a missing table, and any
    /// other status of 400 or above is a server error. `Lenient` keeps them
    /// all.
    pub fn status_override(self, status: Option<u16>) -> Option<HatError> {
        match (self, status) {
            (EndpointKind::Lenient, _) => None,
            (_, Some(401)) => Some(HatError::general(UNAUTHORIZED_MESSAGE, Some(401))),
            (EndpointKind::DataTable, Some(404)) => Some(HatError::TableDoesNotExist),
            (_, Some(code)) if code >= 400 => Some(HatError::general(SERVER_ERROR_MESSAGE, Some(code))),
            _ => None,
        }
    }
}

/// Resolve an `Outcome` into a decoded reply or exactly one error kind.
pub fn dispatch<T, F>(outcome: Outcome, kind: EndpointKind, decode: F) -> Result<Reply<T>, HatError>
where
    F: FnOnce(Body) -> Result<T, HatError>,
{
    match outcome {
        Outcome::Failure { error, .. } => Err(error),
        Outcome::Success {
            is_success: false, ..
        } => Err(HatError::NoValuesFound),
        Outcome::Success {
            is_success: true,
            status,
            body,
            renewed_token,
        } => {
            if let Some(error) = kind.status_override(status) {
                return Err(error);
            }
            let value = decode(body)?;
            Ok(Reply {
                value,
                renewed_token,
            })
        }
    }
}

/// Body must be a JSON array.
pub fn expect_array(body: Body) -> Result<Vec<Value>, HatError> {
    match body {
        Body::Json(Value::Array(items)) => Ok(items),
        _ => Err(HatError::NoValuesFound),
    }
}

/// Body must be JSON of any shape.
pub fn expect_json(body: Body) -> Result<Value, HatError> {
    body.into_json().ok_or(HatError::NoValuesFound)
}

pub fn expect_text(body: Body) -> Result<String, HatError> {
    body.into_text().ok_or(HatError::NoValuesFound)
}

/// Body must be a JSON object with a string `message` field.
pub fn expect_message(body: Body) -> Result<String, HatError> {
    body.as_json()
        .and_then(|value| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(HatError::ExpectedFieldNotFound("message"))
}

/// Entry point for all HAT calls.
#[derive(Clone)]
pub struct HatClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for HatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HatClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HatClient {
    /// Client using the default reqwest transport.
    pub fn new(config: ClientConfig) -> Result<Self, HatError> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub(crate) fn token_source(&self) -> TokenSource<'_> {
        TokenSource {
            header: &self.config.token_header,
            field: &self.config.token_field,
            policy: self.config.token_policy,
        }
    }

    /// Send and classify, without interpreting status codes.
    pub async fn send(&self, request: &HttpRequest) -> Outcome {
        let raw: RawOutcome = self.transport.send(request).await;
        classify(raw, request.content_type, self.token_source())
    }

    /// Run `request` through the pipeline and decode the body with `decode`.
    pub async fn call<T, F>(
        &self,
        request: HttpRequest,
        kind: EndpointKind,
        decode: F,
    ) -> Result<Reply<T>, HatError>
    where
        F: FnOnce(Body) -> Result<T, HatError>,
    {
        let outcome = self.send(&request).await;
        let result = dispatch(outcome, kind, decode);
        match &result {
            Ok(reply) => debug!(
                method = request.method.as_str(),
                url = %request.url,
                renewed = reply.renewed_token.is_some(),
                "HAT call succeeded"
            ),
            Err(error) => debug!(
                method = request.method.as_str(),
                url = %request.url,
                %error,
                "HAT call failed"
            ),
        }
        result
    }

    /// Continuation form of `call`: exactly one of `on_success` and
    /// `on_error` runs, once.
    pub async fn call_with<T, F, S, E>(
        &self,
        request: HttpRequest,
        kind: EndpointKind,
        decode: F,
        on_success: S,
        on_error: E,
    ) where
        F: FnOnce(Body) -> Result<T, HatError>,
        S: FnOnce(T, Option<String>),
        E: FnOnce(HatError),
    {
        match self.call(request, kind, decode).await {
            Ok(reply) => on_success(reply.value, reply.renewed_token),
            Err(error) => on_error(error),
        }
    }

    pub fn endpoints(&self) -> Endpoints<'_> {
        Endpoints::new(&self.config)
    }

    /// Fire-and-forget bulletin notification. The outcome is only logged.
    /// Returns `None` when there is no runtime to spawn on or the bulletin
    /// URL is unusable.
    pub fn notify_update(&self, user_domain: &str) -> Option<tokio::task::JoinHandle<()>> {
        let request = match self.endpoints().build_bulletin(user_domain) {
            Ok(request) => request,
            Err(error) => {
                warn!(%error, "skipping bulletin notification");
                return None;
            }
        };
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("no tokio runtime; skipping bulletin notification");
                return None;
            }
        };
        let transport = Arc::clone(&self.transport);
        Some(handle.spawn(async move {
            let raw = transport.send(&request).await;
            debug!(
                status = ?raw.status,
                error = ?raw.error.as_ref().map(|e| e.message.as_str()),
                "bulletin notification finished"
            );
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn success(status: u16, body: Body, token: Option<&str>) -> Outcome {
        Outcome::Success {
            is_success: true,
            status: Some(status),
            body,
            renewed_token: token.map(str::to_string),
        }
    }

    #[test]
    fn failure_passes_error_kind_through() {
        let outcome = Outcome::Failure {
            error: HatError::NoInternetConnection,
            status: None,
        };
        assert_eq!(
            dispatch(outcome, EndpointKind::DataTable, expect_array),
            Err(HatError::NoInternetConnection)
        );
    }

    #[test]
    fn unsuccessful_success_is_no_values_found() {
        let outcome = Outcome::Success {
            is_success: false,
            status: Some(200),
            body: Body::Empty,
            renewed_token: Some("t".into()),
        };
        let mut decoded = false;
        let result = dispatch(outcome, EndpointKind::DataTable, |body| {
            decoded = true;
            expect_array(body)
        });
        assert_eq!(result, Err(HatError::NoValuesFound));
        assert!(!decoded);
    }

    #[test]
    fn data_table_404_overrides_valid_body() {
        let outcome = success(404, Body::Json(json!([{"recordId": "r1"}])), Some("t"));
        assert_eq!(
            dispatch(outcome, EndpointKind::DataTable, expect_array),
            Err(HatError::TableDoesNotExist)
        );
    }

    #[test]
    fn general_endpoint_404_is_server_error() {
        let outcome = success(404, Body::Json(json!({"message": "gone"})), None);
        assert_eq!(
            dispatch(outcome, EndpointKind::General, expect_message),
            Err(HatError::general(SERVER_ERROR_MESSAGE, Some(404)))
        );
    }

    #[test]
    fn general_endpoint_500_with_json_body_is_server_error() {
        let outcome = success(500, Body::Json(json!({"error": "boom"})), Some("t"));
        let mut decoded = false;
        let result = dispatch(outcome, EndpointKind::General, |body| {
            decoded = true;
            expect_json(body)
        });
        assert_eq!(result, Err(HatError::general(SERVER_ERROR_MESSAGE, Some(500))));
        assert!(!decoded);
    }

    #[test]
    fn data_table_400_is_server_error() {
        let outcome = success(400, Body::Json(json!({"error": "Bad Request"})), None);
        let err = dispatch(outcome, EndpointKind::DataTable, expect_json).unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn lenient_endpoint_decodes_error_status_body() {
        let outcome = success(503, Body::Json(json!([{"namespace": "fitbit"}])), None);
        let reply = dispatch(outcome, EndpointKind::Lenient, expect_array).unwrap();
        assert_eq!(reply.value.len(), 1);
    }

    #[test]
    fn unauthorized_overrides_everything_but_lenient() {
        for kind in [EndpointKind::DataTable, EndpointKind::General] {
            let outcome = success(401, Body::Json(json!({"error": "nope"})), None);
            let err = dispatch(outcome, kind, expect_json).unwrap_err();
            assert!(err.is_unauthorized());
        }
        let outcome = success(401, Body::Json(json!({"error": "nope"})), None);
        assert!(dispatch(outcome, EndpointKind::Lenient, expect_json).is_ok());
    }

    #[test]
    fn success_carries_decoded_value_and_token() {
        let outcome = success(200, Body::Json(json!([1, 2, 3])), Some("renewed"));
        let reply = dispatch(outcome, EndpointKind::DataTable, expect_array).unwrap();
        assert_eq!(reply.value.len(), 3);
        assert_eq!(reply.renewed_token.as_deref(), Some("renewed"));
    }

    #[test]
    fn decoder_error_is_returned_as_is() {
        let outcome = success(200, Body::Json(json!({"not": "array"})), None);
        assert_eq!(
            dispatch(outcome, EndpointKind::DataTable, expect_array),
            Err(HatError::NoValuesFound)
        );
        let outcome = success(200, Body::Json(json!({"other": 1})), None);
        assert_eq!(
            dispatch(outcome, EndpointKind::General, expect_message),
            Err(HatError::ExpectedFieldNotFound("message"))
        );
    }

    #[test]
    fn text_decoder_accepts_text_and_json() {
        assert_eq!(expect_text(Body::Text("pem".into())).unwrap(), "pem");
        assert_eq!(expect_text(Body::Json(json!({"a": 1}))).unwrap(), r#"{"a":1}"#);
        assert_eq!(expect_text(Body::Empty), Err(HatError::NoValuesFound));
    }

    #[test]
    fn reply_map_keeps_token() {
        let reply = Reply {
            value: 2,
            renewed_token: Some("t".to_string()),
        };
        let mapped = reply.map(|v| v * 10);
        assert_eq!(mapped.value, 20);
        assert_eq!(mapped.renewed_token.as_deref(), Some("t"));
    }

    #[test]
    fn bulletin_request_targets_tickle_endpoint() {
        let client = HatClient::new(ClientConfig::default()).unwrap();
        let request = client
            .endpoints()
            .build_bulletin("alice.hubofallthings.net")
            .unwrap();
        assert_eq!(request.method, crate::http::HttpMethod::Get);
        assert_eq!(
            request.url,
            "https://notables.hubofallthings.com/api/bulletin/tickle?phata=alice.hubofallthings.net"
        );
    }

    #[test]
    fn notify_update_without_runtime_is_skipped() {
        let client = HatClient::new(ClientConfig::default()).unwrap();
        assert!(client.notify_update("alice.hubofallthings.net").is_none());
    }
}
