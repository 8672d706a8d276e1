//! In-memory stand-in for the LLM Config Manager API.
//!
//! Implements the slice of the HTTP contract the client consumes:
//! versioned config CRUD per (namespace, key, environment), history,
//! rollback, health, and `X-RateLimit-*` headers on every response. Error
//! bodies follow the service's `{"error": ..., "message": ...}` shape.
//! State lives in a shared map; nothing is persisted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const RATE_LIMIT: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ConfigId {
    namespace: String,
    key: String,
    environment: String,
}

#[derive(Debug, Clone)]
struct StoredVersion {
    version: u64,
    value: Value,
    created_by: String,
    created_at: String,
    secret: bool,
}

type Db = Arc<RwLock<HashMap<ConfigId, Vec<StoredVersion>>>>;

#[derive(Clone)]
pub struct AppState {
    db: Db,
    remaining: Arc<AtomicU64>,
}

#[derive(Deserialize)]
struct EnvQuery {
    #[serde(default = "default_env")]
    env: String,
}

fn default_env() -> String {
    "production".to_string()
}

#[derive(Deserialize)]
struct SetConfigBody {
    value: Value,
    #[serde(default = "default_env")]
    env: String,
    #[serde(default = "default_user")]
    user: String,
    #[serde(default)]
    secret: bool,
}

fn default_user() -> String {
    "api-user".to_string()
}

pub fn app() -> Router {
    let state = AppState {
        db: Arc::new(RwLock::new(HashMap::new())),
        remaining: Arc::new(AtomicU64::new(RATE_LIMIT)),
    };
    Router::new()
        .route("/health", get(health))
        .route("/configs/{namespace}", get(list_configs))
        .route(
            "/configs/{namespace}/{key}",
            get(get_config).post(set_config).delete(delete_config),
        )
        .route("/configs/{namespace}/{key}/history", get(get_history))
        .route(
            "/configs/{namespace}/{key}/rollback/{version}",
            post(rollback),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_headers,
        ))
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Attach the advertised quota to every response, decrementing per request.
async fn rate_limit_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let remaining = state
        .remaining
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
            Some(n.saturating_sub(1))
        })
        .unwrap_or(0)
        .saturating_sub(1);
    let reset = now_unix() + 60;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", header_num(RATE_LIMIT));
    headers.insert("X-RateLimit-Remaining", header_num(remaining));
    headers.insert("X-RateLimit-Reset", header_num(reset));
    response
}

fn header_num(n: u64) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or(HeaderValue::from_static("0"))
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn not_found(message: String) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Not Found", "message": message})),
    )
        .into_response()
}

fn entry_json(id: &ConfigId, stored: &StoredVersion) -> Value {
    json!({
        "namespace": id.namespace,
        "key": id.key,
        "value": stored.value,
        "version": stored.version,
        "environment": id.environment,
        "metadata": {
            "updated_by": stored.created_by,
            "updated_at": stored.created_at,
            "secret": stored.secret,
        },
    })
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_configs(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Query(query): Query<EnvQuery>,
) -> Json<Value> {
    let db = state.db.read().await;
    let mut entries: Vec<(&ConfigId, &StoredVersion)> = db
        .iter()
        .filter(|(id, _)| id.namespace == namespace && id.environment == query.env)
        .filter_map(|(id, versions)| versions.last().map(|v| (id, v)))
        .collect();
    entries.sort_by(|(a, _), (b, _)| a.key.cmp(&b.key));

    Json(Value::Array(
        entries
            .into_iter()
            .map(|(id, stored)| entry_json(id, stored))
            .collect(),
    ))
}

async fn get_config(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Query(query): Query<EnvQuery>,
) -> Response {
    let id = ConfigId {
        namespace,
        key,
        environment: query.env,
    };
    let db = state.db.read().await;
    match db.get(&id).and_then(|versions| versions.last()) {
        Some(stored) => Json(entry_json(&id, stored)).into_response(),
        None => not_found(format!(
            "configuration {}/{} not found",
            id.namespace, id.key
        )),
    }
}

async fn set_config(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Json(body): Json<SetConfigBody>,
) -> Response {
    let id = ConfigId {
        namespace,
        key,
        environment: body.env,
    };
    let mut db = state.db.write().await;
    let versions = db.entry(id.clone()).or_default();
    let stored = StoredVersion {
        version: versions.last().map(|v| v.version).unwrap_or(0) + 1,
        value: body.value,
        created_by: body.user,
        created_at: now_unix().to_string(),
        secret: body.secret,
    };
    versions.push(stored.clone());
    Json(entry_json(&id, &stored)).into_response()
}

async fn delete_config(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Query(query): Query<EnvQuery>,
) -> Response {
    let id = ConfigId {
        namespace,
        key,
        environment: query.env,
    };
    let mut db = state.db.write().await;
    match db.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(format!(
            "configuration {}/{} not found",
            id.namespace, id.key
        )),
    }
}

async fn get_history(
    State(state): State<AppState>,
    Path((namespace, key)): Path<(String, String)>,
    Query(query): Query<EnvQuery>,
) -> Response {
    let id = ConfigId {
        namespace,
        key,
        environment: query.env,
    };
    let db = state.db.read().await;
    match db.get(&id) {
        Some(versions) => {
            // Newest first.
            let history: Vec<Value> = versions
                .iter()
                .rev()
                .map(|v| {
                    json!({
                        "version": v.version,
                        "value": v.value,
                        "created_by": v.created_by,
                        "created_at": v.created_at,
                    })
                })
                .collect();
            Json(Value::Array(history)).into_response()
        }
        None => not_found(format!(
            "configuration {}/{} not found",
            id.namespace, id.key
        )),
    }
}

async fn rollback(
    State(state): State<AppState>,
    Path((namespace, key, version)): Path<(String, String, u64)>,
    Query(query): Query<EnvQuery>,
) -> Response {
    let id = ConfigId {
        namespace,
        key,
        environment: query.env,
    };
    let mut db = state.db.write().await;
    let Some(versions) = db.get_mut(&id) else {
        return not_found(format!(
            "configuration {}/{} not found",
            id.namespace, id.key
        ));
    };
    let Some(target) = versions.iter().find(|v| v.version == version).cloned() else {
        return not_found(format!(
            "version {version} of {}/{} not found",
            id.namespace, id.key
        ));
    };
    let stored = StoredVersion {
        version: versions.last().map(|v| v.version).unwrap_or(0) + 1,
        value: target.value,
        created_by: "rollback".to_string(),
        created_at: now_unix().to_string(),
        secret: target.secret,
    };
    versions.push(stored.clone());
    Json(entry_json(&id, &stored)).into_response()
}
