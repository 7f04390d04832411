//! Async client core for a HAT personal data store.
//!
//! # Overview
//! Every call to the HAT goes through one pipeline: build an `HttpRequest`,
//! send it through a `Transport`, classify the raw outcome, apply the
//! endpoint's status semantics and decode the body. The server renews the
//! caller's token on most responses; the renewed token is handed back with
//! every successful reply and never stored by the client.
//!
//! # Design
//! - `HatClient` holds only an immutable `ClientConfig` and an
//!   `Arc<dyn Transport>`. It is cheap to clone and safe to share.
//! - Request building (`endpoints`) and response interpretation (`classify`,
//!   `pipeline::dispatch`) are pure, so a host that executes HTTP itself can
//!   drive the same logic without the bundled reqwest transport.
//! - Errors form a closed set (`HatError`). Nested fields that fail to decode
//!   are logged and dropped rather than failing the whole record.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod classify;
pub mod config;
pub mod decode;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod services;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use classify::{classify, Body, Outcome, TokenSource};
pub use config::{ClientConfig, TokenPolicy};
pub use decode::{DecodeError, HatRecord};
pub use endpoints::Endpoints;
pub use error::{HatError, TransportError, TransportErrorKind};
pub use http::{query_parameter, HttpMethod, HttpRequest, RawOutcome};
pub use pipeline::{dispatch, EndpointKind, HatClient, Reply};
pub use transport::{ReqwestTransport, Transport};
