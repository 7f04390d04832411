//! HTTP request descriptors and raw transport outcomes.
//!
//! # Design
//! Requests and responses are plain data. The endpoint builders produce an
//! `HttpRequest`; a `Transport` (or a host doing its own I/O) executes it and
//! hands back a `RawOutcome`. Nothing here interprets status codes.
//!
//! Encoding follows the HAT conventions: URL-encoded parameters go to the
//! query string on GET/DELETE and to a form body on POST/PUT, JSON parameters
//! become an object body, and raw bodies are sent untouched.

use serde_json::{Map, Value};
use url::Url;

use crate::error::HatError;

pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";
pub const CONTENT_TYPE_HEADER: &str = "content-type";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn carries_query(self) -> bool {
        matches!(self, HttpMethod::Get | HttpMethod::Delete)
    }
}

/// How `parameters` (or `body`) are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    UrlEncoded,
    Raw,
}

/// What the caller expects back. Selects the JSON or string response mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    Text,
}

impl ContentType {
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Text => "text/plain",
        }
    }
}

/// An HTTP request described as plain data. Built fresh for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub encoding: BodyEncoding,
    pub content_type: ContentType,
    pub parameters: Map<String, Value>,
    pub headers: Vec<(String, String)>,
    /// JSON body sent instead of `parameters` (used for array payloads).
    pub json_body: Option<Value>,
    /// Verbatim body for `BodyEncoding::Raw`.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            encoding: BodyEncoding::UrlEncoded,
            content_type: ContentType::Json,
            parameters: Map::new(),
            headers: Vec::new(),
            json_body: None,
            body: None,
        }
    }

    pub fn encoding(mut self, encoding: BodyEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn auth_token(self, token: &str) -> Self {
        self.header(AUTH_TOKEN_HEADER, token)
    }

    pub fn json_body(mut self, body: Value) -> Self {
        self.encoding = BodyEncoding::Json;
        self.json_body = Some(body);
        self
    }

    pub fn raw_body(mut self, body: Vec<u8>) -> Self {
        self.encoding = BodyEncoding::Raw;
        self.body = Some(body);
        self
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// The final URL, with URL-encoded parameters folded into the query
    /// string when the method carries them there.
    pub fn full_url(&self) -> Result<String, HatError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| HatError::general(format!("invalid url `{}`: {e}", self.url), None))?;
        if self.encoding == BodyEncoding::UrlEncoded
            && self.method.carries_query()
            && !self.parameters.is_empty()
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in form_pairs(&self.parameters) {
                pairs.append_pair(&key, &value);
            }
        }
        Ok(url.into())
    }

    /// The encoded body and its content type, if the request has one.
    pub fn encoded_body(&self) -> Result<Option<(Vec<u8>, &'static str)>, HatError> {
        match self.encoding {
            BodyEncoding::Raw => Ok(self
                .body
                .clone()
                .map(|bytes| (bytes, "application/octet-stream"))),
            BodyEncoding::Json => {
                let value = match (&self.json_body, self.parameters.is_empty()) {
                    (Some(body), _) => body.clone(),
                    (None, false) => Value::Object(self.parameters.clone()),
                    (None, true) => return Ok(None),
                };
                let bytes = serde_json::to_vec(&value)
                    .map_err(|e| HatError::general(format!("serialization failed: {e}"), None))?;
                Ok(Some((bytes, "application/json")))
            }
            BodyEncoding::UrlEncoded => {
                if self.method.carries_query() || self.parameters.is_empty() {
                    return Ok(None);
                }
                let mut form = url::form_urlencoded::Serializer::new(String::new());
                for (key, value) in form_pairs(&self.parameters) {
                    form.append_pair(&key, &value);
                }
                Ok(Some((
                    form.finish().into_bytes(),
                    "application/x-www-form-urlencoded",
                )))
            }
        }
    }
}

/// Flatten parameters into key/value pairs. Arrays repeat the key, nulls are
/// dropped, nested objects are sent as their JSON text.
fn form_pairs(parameters: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(parameters.len());
    for (key, value) in parameters {
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Some(text) = scalar_text(item) {
                        pairs.push((key.clone(), text));
                    }
                }
            }
            other => {
                if let Some(text) = scalar_text(other) {
                    pairs.push((key.clone(), text));
                }
            }
        }
    }
    pairs
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// What came back from the transport, before any interpretation.
///
/// `error` is set when no HTTP exchange completed; `status` may still be
/// present if the failure happened after the status line was read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutcome {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub error: Option<crate::error::TransportError>,
}

impl RawOutcome {
    /// A completed HTTP exchange.
    pub fn response(status: u16, headers: Vec<(String, String)>, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            status: Some(status),
            headers,
            body: if body.is_empty() { None } else { Some(body) },
            error: None,
        }
    }

    /// An exchange that never produced a response.
    pub fn failed(error: crate::error::TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// First value of query parameter `name` in `url`, if any.
pub fn query_parameter(url: &str, name: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}
