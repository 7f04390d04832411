//! Turns a `RawOutcome` into an `Outcome`.
//!
//! # Design
//! The classifier applies the API-wide conventions only: offline/timeout
//! detection, JSON versus string response modes, and renewed-token
//! extraction. Status codes whose meaning depends on the endpoint (404 on a
//! data table, for instance) are left to the pipeline.
//!
//! An OK exchange with an empty or unparseable body is still a `Success`
//! with `is_success == false`. It is never escalated to `Failure`.

use serde_json::Value;

use crate::config::TokenPolicy;
use crate::error::{HatError, TransportErrorKind, SERVER_ERROR_MESSAGE};
use crate::http::{find_header, ContentType, RawOutcome, CONTENT_TYPE_HEADER};

const OFFLINE_PATTERNS: [&str; 2] = ["timed out", "offline"];

/// Decoded response payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Text(String),
    Empty,
}

impl Body {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            Body::Text(text) => Some(text),
            Body::Json(value) => Some(value.to_string()),
            Body::Empty => None,
        }
    }
}

/// Classified result of one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        is_success: bool,
        status: Option<u16>,
        body: Body,
        renewed_token: Option<String>,
    },
    Failure {
        error: HatError,
        status: Option<u16>,
    },
}

/// Where to look for a renewed token.
#[derive(Debug, Clone, Copy)]
pub struct TokenSource<'a> {
    pub header: &'a str,
    pub field: &'a str,
    pub policy: TokenPolicy,
}

impl Default for TokenSource<'static> {
    fn default() -> Self {
        Self {
            header: crate::http::AUTH_TOKEN_HEADER,
            field: "token",
            policy: TokenPolicy::PreferBody,
        }
    }
}

pub fn classify(raw: RawOutcome, expected: ContentType, tokens: TokenSource<'_>) -> Outcome {
    let RawOutcome {
        status,
        headers,
        body,
        error,
    } = raw;

    if let Some(error) = error {
        return Outcome::Failure {
            error: transport_failure(error, status),
            status,
        };
    }

    if expected == ContentType::Text {
        if let Some(code) = status {
            if !(200..300).contains(&code) {
                return Outcome::Failure {
                    error: HatError::general(SERVER_ERROR_MESSAGE, Some(code)),
                    status,
                };
            }
        }
        if let Some(received) = find_header(&headers, CONTENT_TYPE_HEADER) {
            if !mime_matches(received, expected) {
                return Outcome::Failure {
                    error: HatError::general(
                        format!("unexpected content type `{received}`"),
                        status,
                    ),
                    status,
                };
            }
        }
    }

    let parsed = match (expected, body) {
        (_, None) => None,
        (ContentType::Json, Some(text)) => serde_json::from_str::<Value>(&text).ok().map(Body::Json),
        (ContentType::Text, Some(text)) => Some(Body::Text(text)),
    };

    match parsed {
        Some(body) => {
            let renewed_token = extract_token(&headers, &body, tokens);
            Outcome::Success {
                is_success: true,
                status,
                body,
                renewed_token,
            }
        }
        None => Outcome::Success {
            is_success: false,
            status,
            body: Body::Empty,
            renewed_token: find_header(&headers, tokens.header).map(str::to_string),
        },
    }
}

fn transport_failure(error: crate::error::TransportError, status: Option<u16>) -> HatError {
    if is_offline(&error) {
        return HatError::NoInternetConnection;
    }
    HatError::GeneralError {
        message: SERVER_ERROR_MESSAGE.to_string(),
        status,
        cause: Some(error),
    }
}

fn is_offline(error: &crate::error::TransportError) -> bool {
    if matches!(
        error.kind,
        TransportErrorKind::TimedOut | TransportErrorKind::Offline
    ) {
        return true;
    }
    let message = error.message.to_ascii_lowercase();
    OFFLINE_PATTERNS.iter().any(|pattern| message.contains(pattern))
}

fn mime_matches(received: &str, expected: ContentType) -> bool {
    let essence = received.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case(expected.mime())
}

/// Renewed token from the body field or the response header, resolved by
/// `tokens.policy` when both are present.
pub fn extract_token(
    headers: &[(String, String)],
    body: &Body,
    tokens: TokenSource<'_>,
) -> Option<String> {
    let from_body = body
        .as_json()
        .and_then(|value| value.get(tokens.field))
        .and_then(Value::as_str)
        .map(str::to_string);
    let from_header = find_header(headers, tokens.header).map(str::to_string);

    match tokens.policy {
        TokenPolicy::PreferBody => from_body.or(from_header),
        TokenPolicy::PreferHeader => from_header.or(from_body),
    }
}
