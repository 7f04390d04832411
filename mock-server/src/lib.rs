//! In-memory HAT used by the integration tests and for local development.
//!
//! # Design
//! One router serves every host the SDK talks to: the user's HAT
//! (`/api/v2/data`, `/publickey`, `/control`, combinators), the bulletin
//! (`/api/bulletin/tickle`), the dex (`/stats`, `/api/dataplugs`) and a
//! presigned upload target (`/upload`). Point the user domain, bulletin URL
//! and dex URL of a client at the same address.
//!
//! Authenticated endpoints accept any non-empty `x-auth-token` and answer
//! with `renewed-{token}` in the same header.

use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const TOKEN_HEADER: &str = "x-auth-token";
pub const SSE_HEADER: &str = "x-amz-server-side-encryption";
pub const INITIAL_PASSWORD: &str = "correct horse battery";
pub const PUBLIC_KEY: &str = "-----BEGIN PUBLIC KEY-----\n\
MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8AMIIBCgKCAQEAs2mock\n\
-----END PUBLIC KEY-----\n";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub endpoint: String,
    pub record_id: Uuid,
    pub data: Value,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Operator {
    pub operator: String,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Filter {
    pub field: String,
    pub operator: Operator,
}

impl Filter {
    fn matches(&self, data: &Value) -> bool {
        let Some(value) = data.get(&self.field).and_then(Value::as_f64) else {
            return false;
        };
        self.operator.operator == "between"
            && self.operator.lower <= value
            && value <= self.operator.upper
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Combinator {
    pub endpoint: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
}

#[derive(Deserialize)]
struct PasswordChange {
    password: String,
    #[serde(rename = "newPassword")]
    new_password: String,
}

#[derive(Debug)]
pub struct HatState {
    /// Keyed by `namespace/scope`, oldest record first.
    pub tables: HashMap<String, Vec<Record>>,
    pub combinators: HashMap<String, Vec<Combinator>>,
    /// `phata` of every bulletin tickle received.
    pub tickles: Vec<String>,
    pub uploads: Vec<Bytes>,
    pub password: String,
}

impl Default for HatState {
    fn default() -> Self {
        Self {
            tables: HashMap::new(),
            combinators: HashMap::new(),
            tickles: Vec::new(),
            uploads: Vec::new(),
            password: INITIAL_PASSWORD.to_string(),
        }
    }
}

pub type Db = Arc<RwLock<HatState>>;

pub fn app() -> Router {
    app_with_state(Db::default())
}

pub fn app_with_state(db: Db) -> Router {
    Router::new()
        .route("/api/v2/data", put(update_records).delete(delete_records))
        .route(
            "/api/v2/data/{namespace}/{*scope}",
            get(list_records).post(create_records),
        )
        .route(
            "/api/v2/combinator/{name}",
            get(run_combinator).post(create_combinator),
        )
        .route("/control/v2/auth/password", post(change_password))
        .route("/publickey", get(public_key))
        .route("/api/bulletin/tickle", get(tickle))
        .route("/stats/available-data", get(available_data))
        .route("/api/dataplugs/{plug}/connect", get(connect_plug))
        .route("/upload/{*key}", post(upload))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with_state(listener, Db::default()).await
}

pub async fn run_with_state(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    info!(addr = ?listener.local_addr().ok(), "mock HAT listening");
    axum::serve(listener, app_with_state(db)).await
}

fn authorize(headers: &HeaderMap) -> Result<String, Response> {
    headers
        .get(TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Not Authenticated", "message": "Not Authenticated"})),
            )
                .into_response()
        })
}

/// JSON response carrying the renewed token.
fn renewed(token: &str, status: StatusCode, body: Value) -> Response {
    (status, [(TOKEN_HEADER, format!("renewed-{token}"))], Json(body)).into_response()
}

fn error_body(error: &str, message: impl Into<String>) -> Value {
    json!({"error": error, "message": message.into()})
}

async fn list_records(
    State(db): State<Db>,
    Path((namespace, scope)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let token = match authorize(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let endpoint = format!("{namespace}/{scope}");
    let state = db.read().await;
    let Some(records) = state.tables.get(&endpoint) else {
        return renewed(
            &token,
            StatusCode::NOT_FOUND,
            error_body("Not Found", format!("table {endpoint} does not exist")),
        );
    };
    let take = params
        .get("take")
        .and_then(|take| take.parse::<usize>().ok())
        .unwrap_or(usize::MAX);
    let newest_first: Vec<&Record> = records.iter().rev().take(take).collect();
    renewed(&token, StatusCode::OK, json!(newest_first))
}

async fn create_records(
    State(db): State<Db>,
    Path((namespace, scope)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let token = match authorize(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let endpoint = format!("{namespace}/{scope}");
    let mut state = db.write().await;
    let table = state.tables.entry(endpoint.clone()).or_default();
    let mut store = |data: Value| {
        let record = Record {
            endpoint: endpoint.clone(),
            record_id: Uuid::new_v4(),
            data,
        };
        table.push(record.clone());
        record
    };
    let created = match body {
        Value::Array(items) => json!(items.into_iter().map(&mut store).collect::<Vec<_>>()),
        object @ Value::Object(_) => json!(store(object)),
        _ => {
            return renewed(
                &token,
                StatusCode::BAD_REQUEST,
                error_body("Bad Request", "expected an object or an array of objects"),
            )
        }
    };
    debug!(%endpoint, "records created");
    renewed(&token, StatusCode::CREATED, created)
}

async fn delete_records(
    State(db): State<Db>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let token = match authorize(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let ids: Vec<Uuid> = pairs
        .iter()
        .filter(|(key, _)| key == "records")
        .filter_map(|(_, value)| value.parse().ok())
        .collect();
    if ids.is_empty() {
        return renewed(
            &token,
            StatusCode::BAD_REQUEST,
            error_body("Bad Request", "no valid record ids"),
        );
    }
    let mut state = db.write().await;
    let mut removed = 0;
    for table in state.tables.values_mut() {
        let before = table.len();
        table.retain(|record| !ids.contains(&record.record_id));
        removed += before - table.len();
    }
    if removed == 0 {
        return renewed(
            &token,
            StatusCode::NOT_FOUND,
            error_body("Not Found", "no matching records"),
        );
    }
    debug!(removed, "records deleted");
    renewed(&token, StatusCode::OK, json!({"message": "All records deleted"}))
}

async fn update_records(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(updates): Json<Vec<Record>>,
) -> Response {
    let token = match authorize(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let mut state = db.write().await;
    for update in &updates {
        let existing = state
            .tables
            .values_mut()
            .flat_map(|table| table.iter_mut())
            .find(|record| record.record_id == update.record_id);
        match existing {
            Some(record) => record.data = update.data.clone(),
            None => {
                return renewed(
                    &token,
                    StatusCode::NOT_FOUND,
                    error_body("Not Found", format!("record {} does not exist", update.record_id)),
                )
            }
        }
    }
    renewed(&token, StatusCode::OK, json!(updates))
}

async fn create_combinator(
    State(db): State<Db>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Json(definition): Json<Vec<Combinator>>,
) -> Response {
    let token = match authorize(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    db.write().await.combinators.insert(name.clone(), definition);
    renewed(
        &token,
        StatusCode::CREATED,
        json!({"message": format!("combinator {name} created")}),
    )
}

async fn run_combinator(
    State(db): State<Db>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    let token = match authorize(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let state = db.read().await;
    let Some(definition) = state.combinators.get(&name) else {
        return renewed(
            &token,
            StatusCode::NOT_FOUND,
            error_body("Not Found", format!("combinator {name} does not exist")),
        );
    };
    let matching: Vec<&Record> = definition
        .iter()
        .flat_map(|combinator| {
            state
                .tables
                .get(&combinator.endpoint)
                .into_iter()
                .flatten()
                .filter(move |record| combinator.filters.iter().all(|f| f.matches(&record.data)))
        })
        .collect();
    renewed(&token, StatusCode::OK, json!(matching))
}

async fn change_password(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(change): Json<PasswordChange>,
) -> Response {
    let token = match authorize(&headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    let mut state = db.write().await;
    if state.password != change.password {
        return renewed(
            &token,
            StatusCode::FORBIDDEN,
            json!({"error": "Forbidden", "cause": "current password does not match"}),
        );
    }
    state.password = change.new_password;
    renewed(&token, StatusCode::OK, json!({"message": "Password changed"}))
}

async fn public_key() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], PUBLIC_KEY)
}

async fn tickle(
    State(db): State<Db>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(phata) = params.get("phata") else {
        return (StatusCode::BAD_REQUEST, "missing phata").into_response();
    };
    debug!(%phata, "bulletin tickled");
    db.write().await.tickles.push(phata.clone());
    ([(header::CONTENT_TYPE, "text/plain")], "ok").into_response()
}

async fn available_data() -> Json<Value> {
    Json(json!([
        {"namespace": "google", "endpoints": [{"endpoint": "calendar"}]},
        {"namespace": "fitbit", "endpoints": [
            {"endpoint": "sleep"},
            {"endpoint": "weight"},
            {"endpoint": "profile"},
            {"endpoint": "activity/day/summary"},
            {"endpoint": "lifetime/stats"},
            {"endpoint": "activity"}
        ]}
    ]))
}

async fn connect_plug(
    Path(plug): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = authorize(&headers) {
        return response;
    }
    match params.get("hat") {
        Some(hat) => Json(json!({"message": format!("plug {plug} enabled for {hat}")})).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(error_body("Bad Request", "missing hat")),
        )
            .into_response(),
    }
}

async fn upload(
    State(db): State<Db>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let encrypted = headers
        .get(SSE_HEADER)
        .and_then(|value| value.to_str().ok())
        == Some("AES256");
    if !encrypted {
        return StatusCode::BAD_REQUEST;
    }
    debug!(%key, bytes = body.len(), "upload stored");
    db.write().await.uploads.push(body);
    StatusCode::OK
}
