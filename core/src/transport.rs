//! Executes `HttpRequest`s.
//!
//! # Design
//! A transport is purely mechanical: it puts the request on the wire and
//! returns whatever came back as a `RawOutcome`. It never retries and never
//! looks at status codes. The timeout belongs to the transport and is fixed
//! at construction.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::{Client, Method};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{HatError, TransportError, TransportErrorKind};
use crate::http::{HttpMethod, HttpRequest, RawOutcome};

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> RawOutcome;
}

/// `Transport` backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, HatError> {
        let mut builder = Client::builder().timeout(config.timeout());
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder
            .build()
            .map_err(|e| HatError::general(format!("failed to build http client: {e}"), None))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> RawOutcome {
        let url = match request.full_url() {
            Ok(url) => url,
            Err(e) => return RawOutcome::failed(TransportError::other(e.to_string())),
        };
        let body = match request.encoded_body() {
            Ok(body) => body,
            Err(e) => return RawOutcome::failed(TransportError::other(e.to_string())),
        };

        let mut builder = self
            .client
            .request(method(request.method), &url)
            .header(reqwest::header::ACCEPT, request.content_type.mime());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some((bytes, content_type)) = body {
            if request.header_value(CONTENT_TYPE.as_str()).is_none() {
                builder = builder.header(CONTENT_TYPE, content_type);
            }
            builder = builder.body(bytes);
        }

        debug!(method = request.method.as_str(), %url, "sending HAT request");
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(method = request.method.as_str(), %url, error = %err, "HAT request failed");
                return RawOutcome::failed(transport_error(&err));
            }
        };

        let status = response.status().as_u16();
        let headers = header_pairs(response.headers());
        debug!(method = request.method.as_str(), %url, status, "received HAT response");
        match response.text().await {
            Ok(text) => RawOutcome::response(status, headers, text),
            Err(err) => RawOutcome {
                status: Some(status),
                headers,
                body: None,
                error: Some(transport_error(&err)),
            },
        }
    }
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn transport_error(err: &reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        TransportErrorKind::TimedOut
    } else if err.is_connect() {
        TransportErrorKind::Offline
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, err.to_string())
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}
