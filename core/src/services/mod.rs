//! Domain services: thin callers that pick an endpoint, its status
//! semantics and a decoder, then hand everything to the pipeline.
//!
//! Each service is an `impl HatClient` block so every call shares the same
//! transport and configuration.

pub mod account;
pub mod fitbit;
pub mod location;
