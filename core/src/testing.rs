//! Scripted transport used by unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::http::{HttpRequest, RawOutcome};
use crate::pipeline::HatClient;
use crate::transport::Transport;

type Responder = dyn Fn(&HttpRequest) -> RawOutcome + Send + Sync;

/// Records every request and answers with `responder`.
pub struct ScriptedTransport {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(responder: impl Fn(&HttpRequest) -> RawOutcome + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Every request gets the same JSON response.
    pub fn json(status: u16, body: &str) -> Arc<Self> {
        let body = body.to_string();
        Self::new(move |_| RawOutcome::response(status, Vec::new(), body.clone()))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, prefix: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }

    /// Poll until `count` requests with `prefix` were seen or one second
    /// elapsed; returns what was seen.
    pub async fn wait_for(&self, prefix: &str, count: usize) -> Vec<HttpRequest> {
        for _ in 0..100 {
            let seen = self.requests_to(prefix);
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.requests_to(prefix)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> RawOutcome {
        self.requests.lock().unwrap().push(request.clone());
        (self.responder)(request)
    }
}

pub fn client(transport: Arc<ScriptedTransport>) -> HatClient {
    HatClient::with_transport(ClientConfig::default(), transport)
}
