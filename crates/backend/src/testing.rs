//! In-process fake of the hosted backend for black-box tests.
//!
//! Serves the auth endpoints and the REST tables the client uses, on an
//! ephemeral local port. Table access requires a user access token (the
//! public key alone is rejected), which stands in for row-level security.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Duration, SecondsFormat, Utc};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::BackendConfig;

/// One request as seen by the fake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub apikey: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: Value,
}

#[derive(Debug, Default)]
struct FakeState {
    anon_key: String,
    accounts: Mutex<HashMap<String, Account>>,
    access_tokens: Mutex<HashMap<String, Value>>,
    refresh_tokens: Mutex<HashMap<String, Value>>,
    tables: Mutex<HashMap<String, Vec<Value>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    counter: AtomicU64,
    token_lifetime: AtomicI64,
    autoconfirm: AtomicBool,
    fail_logout: AtomicBool,
}

impl FakeState {
    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn record(&self, method: &Method, uri: &Uri, headers: &HeaderMap) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.requests.lock().unwrap().push(RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            apikey: header("apikey"),
            authorization: header("authorization"),
        });
    }

    fn issue_tokens(&self, user: &Value) -> Value {
        let n = self.next();
        let access = format!("access-{n}");
        let refresh = format!("refresh-{n}");
        let lifetime = self.token_lifetime.load(Ordering::SeqCst);

        self.access_tokens.lock().unwrap().insert(access.clone(), user.clone());
        self.refresh_tokens.lock().unwrap().insert(refresh.clone(), user.clone());

        json!({
            "access_token": access,
            "token_type": "bearer",
            "expires_in": lifetime,
            "expires_at": (Utc::now() + Duration::seconds(lifetime)).timestamp(),
            "refresh_token": refresh,
            "user": user,
        })
    }

    fn bearer_user(&self, headers: &HeaderMap) -> Option<Value> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;
        self.access_tokens.lock().unwrap().get(token).cloned()
    }

    fn check_apikey(&self, headers: &HeaderMap) -> Result<(), Response> {
        match headers.get("apikey").and_then(|v| v.to_str().ok()) {
            Some(key) if key == self.anon_key => Ok(()),
            _ => Err(error(StatusCode::UNAUTHORIZED, json!({"message": "Invalid API key"}))),
        }
    }
}

fn error(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Running fake; shuts down on drop.
pub struct FakeBackend {
    base_url: String,
    state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub const ANON_KEY: &'static str = "test-anon-key";

    pub async fn spawn() -> Self {
        let state = Arc::new(FakeState {
            anon_key: Self::ANON_KEY.to_string(),
            token_lifetime: AtomicI64::new(3600),
            ..FakeState::default()
        });

        let app = Router::new()
            .route("/auth/v1/token", post(token))
            .route("/auth/v1/signup", post(signup))
            .route("/auth/v1/logout", post(logout))
            .route(
                "/rest/v1/:table",
                get(select_rows).post(insert_row).patch(update_rows).delete(delete_rows),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().expect("listener has no local address");
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend crashed");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Client settings pointing at this fake (in-memory session, no
    /// background refresh).
    pub fn config(&self) -> BackendConfig {
        BackendConfig::new(&self.base_url, Self::ANON_KEY)
            .expect("fake backend url is valid")
            .with_auto_refresh(false)
    }

    /// Register a confirmed account; returns the user id.
    pub fn add_user(&self, email: &str, password: &str) -> Uuid {
        let id = Uuid::now_v7();
        let user = json!({
            "id": id,
            "email": email,
            "created_at": Utc::now().to_rfc3339(),
        });
        self.state.accounts.lock().unwrap().insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user,
            },
        );
        id
    }

    pub fn set_token_lifetime(&self, secs: i64) {
        self.state.token_lifetime.store(secs, Ordering::SeqCst);
    }

    pub fn set_autoconfirm(&self, enabled: bool) {
        self.state.autoconfirm.store(enabled, Ordering::SeqCst);
    }

    pub fn set_fail_logout(&self, fail: bool) {
        self.state.fail_logout.store(fail, Ordering::SeqCst);
    }

    pub fn revoke_refresh_tokens(&self) {
        self.state.refresh_tokens.lock().unwrap().clear();
    }

    /// Insert a row directly (assigns `id` and `created_at` when absent).
    pub fn seed(&self, table: &str, mut row: Value) -> Value {
        stamp(&self.state, &mut row);
        self.state
            .tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        row
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state
            .tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Number of requests whose path starts with `prefix`.
    pub fn request_count(&self, prefix: &str) -> usize {
        self.state
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path.starts_with(prefix))
            .count()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn stamp(state: &FakeState, row: &mut Value) {
    let n = state.next();
    if let Some(obj) = row.as_object_mut() {
        obj.entry("id").or_insert_with(|| json!(format!("row-{n}")));
        // Strictly increasing so ordering by created_at is deterministic.
        let created = Utc::now() + Duration::milliseconds(n as i64);
        obj.entry("created_at")
            .or_insert_with(|| json!(created.to_rfc3339_opts(SecondsFormat::Micros, true)));
    }
}

async fn token(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    state.record(&method, &uri, &headers);
    if let Err(response) = state.check_apikey(&headers) {
        return response;
    }

    match query.get("grant_type").map(String::as_str) {
        Some("password") => {
            let email = body["email"].as_str().unwrap_or_default();
            let password = body["password"].as_str().unwrap_or_default();
            let account = state.accounts.lock().unwrap().get(email).cloned();
            match account {
                Some(account) if account.password == password => {
                    Json(state.issue_tokens(&account.user)).into_response()
                }
                _ => error(
                    StatusCode::BAD_REQUEST,
                    json!({"error": "invalid_grant", "error_description": "Invalid login credentials"}),
                ),
            }
        }
        Some("refresh_token") => {
            let presented = body["refresh_token"].as_str().unwrap_or_default();
            let user = state.refresh_tokens.lock().unwrap().remove(presented);
            match user {
                Some(user) => Json(state.issue_tokens(&user)).into_response(),
                None => error(
                    StatusCode::BAD_REQUEST,
                    json!({"error": "invalid_grant", "error_description": "Invalid Refresh Token"}),
                ),
            }
        }
        _ => error(
            StatusCode::BAD_REQUEST,
            json!({"error": "unsupported_grant_type"}),
        ),
    }
}

async fn signup(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&method, &uri, &headers);
    if let Err(response) = state.check_apikey(&headers) {
        return response;
    }

    let email = body["email"].as_str().unwrap_or_default().to_string();
    let password = body["password"].as_str().unwrap_or_default().to_string();
    if state.accounts.lock().unwrap().contains_key(&email) {
        return error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({"code": 422, "msg": "User already registered"}),
        );
    }

    let user = json!({
        "id": Uuid::now_v7(),
        "email": email,
        "created_at": Utc::now().to_rfc3339(),
    });
    state.accounts.lock().unwrap().insert(
        email,
        Account {
            password,
            user: user.clone(),
        },
    );

    if state.autoconfirm.load(Ordering::SeqCst) {
        Json(state.issue_tokens(&user)).into_response()
    } else {
        Json(user).into_response()
    }
}

async fn logout(
    State(state): State<Arc<FakeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.record(&method, &uri, &headers);
    if let Err(response) = state.check_apikey(&headers) {
        return response;
    }
    if state.fail_logout.load(Ordering::SeqCst) {
        return error(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"message": "logout failed"}),
        );
    }
    if let Some(user) = state.bearer_user(&headers) {
        let id = user["id"].clone();
        state.access_tokens.lock().unwrap().retain(|_, u| u["id"] != id);
        state.refresh_tokens.lock().unwrap().retain(|_, u| u["id"] != id);
    }
    StatusCode::NO_CONTENT.into_response()
}

fn authorize_rest(state: &FakeState, headers: &HeaderMap) -> Result<(), Response> {
    state.check_apikey(headers)?;
    match state.bearer_user(headers) {
        Some(_) => Ok(()),
        None => Err(error(
            StatusCode::UNAUTHORIZED,
            json!({"code": "42501", "message": "permission denied"}),
        )),
    }
}

fn id_filter(query: &HashMap<String, String>) -> Option<&str> {
    query.get("id").and_then(|f| f.strip_prefix("eq."))
}

fn with_embedded_clients(state: &FakeState, mut row: Value) -> Value {
    let name = {
        let tables = state.tables.lock().unwrap();
        tables
            .get("clients")
            .and_then(|clients| clients.iter().find(|c| c["id"] == row["client_id"]))
            .map(|c| json!({"name": c["name"]}))
            .unwrap_or(Value::Null)
    };
    if let Some(obj) = row.as_object_mut() {
        obj.insert("clients".to_string(), name);
    }
    row
}

async fn select_rows(
    State(state): State<Arc<FakeState>>,
    Path(table): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record(&method, &uri, &headers);
    if let Err(response) = authorize_rest(&state, &headers) {
        return response;
    }

    let mut rows: Vec<Value> = state
        .tables
        .lock()
        .unwrap()
        .get(&table)
        .cloned()
        .unwrap_or_default();

    if let Some(id) = id_filter(&query) {
        rows.retain(|r| r["id"] == id);
    }
    if let Some(order) = query.get("order") {
        if let Some((column, direction)) = order.split_once('.') {
            rows.sort_by(|a, b| {
                let a = a[column].as_str().unwrap_or_default();
                let b = b[column].as_str().unwrap_or_default();
                if direction == "desc" { b.cmp(a) } else { a.cmp(b) }
            });
        }
    }
    let embed = query
        .get("select")
        .is_some_and(|s| s.contains("clients(name)"));
    if embed {
        rows = rows
            .into_iter()
            .map(|r| with_embedded_clients(&state, r))
            .collect();
    }

    let total = rows.len();
    let range = if total == 0 {
        "*/0".to_string()
    } else {
        format!("0-{}/{}", total - 1, total)
    };
    let mut response = Json(rows).into_response();
    if let Ok(value) = HeaderValue::from_str(&range) {
        response.headers_mut().insert("content-range", value);
    }
    response
}

async fn insert_row(
    State(state): State<Arc<FakeState>>,
    Path(table): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(mut row): Json<Value>,
) -> Response {
    state.record(&method, &uri, &headers);
    if let Err(response) = authorize_rest(&state, &headers) {
        return response;
    }

    if table == "factures" {
        let number = row["number"].clone();
        let duplicate = state
            .tables
            .lock()
            .unwrap()
            .get("factures")
            .is_some_and(|rows| rows.iter().any(|r| r["number"] == number));
        if duplicate {
            return error(
                StatusCode::CONFLICT,
                json!({"code": "23505", "message": "duplicate key value violates unique constraint \"factures_number_key\""}),
            );
        }
    }

    stamp(&state, &mut row);
    state
        .tables
        .lock()
        .unwrap()
        .entry(table)
        .or_default()
        .push(row.clone());
    (StatusCode::CREATED, Json(vec![row])).into_response()
}

async fn update_rows(
    State(state): State<Arc<FakeState>>,
    Path(table): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(patch): Json<Value>,
) -> Response {
    state.record(&method, &uri, &headers);
    if let Err(response) = authorize_rest(&state, &headers) {
        return response;
    }
    let Some(id) = id_filter(&query).map(str::to_string) else {
        return error(StatusCode::BAD_REQUEST, json!({"message": "UPDATE requires a filter"}));
    };

    let mut updated = Vec::new();
    if let Some(rows) = state.tables.lock().unwrap().get_mut(&table) {
        for row in rows.iter_mut().filter(|r| r["id"] == id.as_str()) {
            if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                for (k, v) in fields {
                    target.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
    }
    Json(updated).into_response()
}

async fn delete_rows(
    State(state): State<Arc<FakeState>>,
    Path(table): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    state.record(&method, &uri, &headers);
    if let Err(response) = authorize_rest(&state, &headers) {
        return response;
    }
    let Some(id) = id_filter(&query).map(str::to_string) else {
        return error(StatusCode::BAD_REQUEST, json!({"message": "DELETE requires a filter"}));
    };

    if let Some(rows) = state.tables.lock().unwrap().get_mut(&table) {
        rows.retain(|r| r["id"] != id.as_str());
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Distinct user emails that currently hold a valid access token.
pub fn signed_in_emails(fake: &FakeBackend) -> HashSet<String> {
    fake.state
        .access_tokens
        .lock()
        .unwrap()
        .values()
        .filter_map(|u| u["email"].as_str().map(str::to_string))
        .collect()
}
