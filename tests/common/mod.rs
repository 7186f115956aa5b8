#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};

use leadsweep::config::SweepSettings;
use leadsweep::dispatch::{DispatchError, Dispatcher, HttpDispatcher};
use leadsweep::models::{LeadSubmission, ProcessingStatus, WebhookPayload};
use leadsweep::store::{CandidateQuery, LeadStore, StoreError};
use leadsweep::sweeper::Sweeper;

// ── Fixtures ────────────────────────────────────────────────────

/// A lead created `age_hours` ago.
pub fn lead(id: &str, status: ProcessingStatus, age_hours: i64) -> LeadSubmission {
    LeadSubmission {
        id: id.to_string(),
        full_name: format!("Lead {id}"),
        email: format!("{id}@example.com"),
        phone: None,
        business_name: format!("{id} Plumbing"),
        website: None,
        message: None,
        created_at: Utc::now() - ChronoDuration::hours(age_hours),
        processing_status: status,
    }
}

pub fn settings() -> SweepSettings {
    SweepSettings {
        dispatch_timeout: Duration::from_millis(2_000),
        ..SweepSettings::default()
    }
}

// ── In-memory store ─────────────────────────────────────────────

/// Fake `LeadStore` with hooks for simulating races and store failures.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<LeadSubmission>>,
    /// Ids whose claim loses to another writer just before it lands.
    racing: Mutex<HashSet<String>>,
    /// Ids whose claim errors out.
    broken_claims: Mutex<HashSet<String>>,
    fail_reads: Mutex<bool>,
    fail_mark_failed: Mutex<bool>,
    /// Yield after reading candidates so concurrent sweeps both see the same set.
    yield_after_read: Mutex<bool>,
    pub mark_failed_calls: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new(rows: Vec<LeadSubmission>) -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(rows),
            ..Self::default()
        })
    }

    pub fn status_of(&self, id: &str) -> Option<ProcessingStatus> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.processing_status)
    }

    pub fn lose_claim_race(&self, id: &str) {
        self.racing.lock().unwrap().insert(id.to_string());
    }

    pub fn break_claim(&self, id: &str) {
        self.broken_claims.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_reads(&self) {
        *self.fail_reads.lock().unwrap() = true;
    }

    pub fn fail_mark_failed(&self) {
        *self.fail_mark_failed.lock().unwrap() = true;
    }

    pub fn yield_after_read(&self) {
        *self.yield_after_read.lock().unwrap() = true;
    }

    fn set_status(&self, id: &str, status: ProcessingStatus) -> Option<LeadSubmission> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.iter_mut().find(|r| r.id == id)?;
        row.processing_status = status;
        Some(row.clone())
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn fetch_candidates(
        &self,
        query: &CandidateQuery,
    ) -> Result<Vec<LeadSubmission>, StoreError> {
        if *self.fail_reads.lock().unwrap() {
            return Err(StoreError::Transport("connection refused".to_string()));
        }

        let mut rows: Vec<LeadSubmission> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.processing_status.is_retryable() && r.created_at >= query.cutoff)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.created_at);
        rows.truncate(query.limit);

        let should_yield = *self.yield_after_read.lock().unwrap();
        if should_yield {
            tokio::task::yield_now().await;
        }

        Ok(rows)
    }

    async fn claim(&self, id: &str) -> Result<Option<LeadSubmission>, StoreError> {
        if self.broken_claims.lock().unwrap().contains(id) {
            return Err(StoreError::Status {
                status: 503,
                body: "upstream unavailable".to_string(),
            });
        }
        if self.racing.lock().unwrap().remove(id) {
            self.set_status(id, ProcessingStatus::Processing);
        }

        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.id == id) {
            Some(row) if row.processing_status.is_retryable() => {
                row.processing_status = ProcessingStatus::Processing;
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_failed(&self, id: &str) -> Result<(), StoreError> {
        self.mark_failed_calls.lock().unwrap().push(id.to_string());
        if *self.fail_mark_failed.lock().unwrap() {
            return Err(StoreError::Transport("connection reset".to_string()));
        }
        self.set_status(id, ProcessingStatus::Failed);
        Ok(())
    }
}

// ── Recording dispatcher ────────────────────────────────────────

/// Dispatcher fake that records each payload together with the row status
/// the store held at the moment of dispatch.
pub struct RecordingDispatcher {
    store: Arc<MemoryStore>,
    failing: HashSet<String>,
    pub calls: Mutex<Vec<(WebhookPayload, Option<ProcessingStatus>)>>,
}

impl RecordingDispatcher {
    pub fn new(store: Arc<MemoryStore>) -> Arc<Self> {
        Self::failing_for(store, &[])
    }

    pub fn failing_for(store: Arc<MemoryStore>, ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            store,
            failing: ids.iter().map(|s| s.to_string()).collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn dispatched_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.submission_id.clone())
            .collect()
    }
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, payload: &WebhookPayload) -> Result<(), DispatchError> {
        let status = self.store.status_of(&payload.submission_id);
        self.calls.lock().unwrap().push((payload.clone(), status));
        tokio::task::yield_now().await;

        if self.failing.contains(&payload.submission_id) {
            return Err(DispatchError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            });
        }
        Ok(())
    }
}

pub fn sweeper(
    store: Arc<MemoryStore>,
    dispatcher: Arc<dyn Dispatcher>,
    settings: SweepSettings,
) -> Sweeper {
    Sweeper::new(store, dispatcher, settings)
}

// ── Mock webhook server ─────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ReceivedHook {
    pub content_type: Option<String>,
    pub body: Value,
}

struct HookState {
    status: StatusCode,
    body: String,
    delay: Duration,
    received: Mutex<Vec<ReceivedHook>>,
}

/// A webhook receiver listening on a random local port.
pub struct MockWebhook {
    pub addr: SocketAddr,
    state: Arc<HookState>,
}

impl MockWebhook {
    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    pub fn received(&self) -> Vec<ReceivedHook> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn dispatcher(&self, timeout: Duration) -> Arc<HttpDispatcher> {
        Arc::new(HttpDispatcher::new(&self.url(), timeout).expect("build dispatcher"))
    }
}

pub async fn spawn_webhook(status: StatusCode, body: &str, delay: Duration) -> MockWebhook {
    let state = Arc::new(HookState {
        status,
        body: body.to_string(),
        delay,
        received: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/hook", post(receive_hook))
        .with_state(state.clone());

    let addr = serve(app).await;
    MockWebhook { addr, state }
}

async fn receive_hook(
    State(state): State<Arc<HookState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, String) {
    state.received.lock().unwrap().push(ReceivedHook {
        content_type: headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string()),
        body,
    });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, state.body.clone())
}

// ── Mock PostgREST server ───────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub query: HashMap<String, String>,
    pub apikey: Option<String>,
    pub authorization: Option<String>,
    pub prefer: Option<String>,
    pub body: Option<Value>,
}

struct RestState {
    rows: Mutex<Vec<Value>>,
    requests: Mutex<Vec<RecordedRequest>>,
    fail_with: Mutex<Option<StatusCode>>,
}

/// Just enough of PostgREST for the lead table: `in.` / `eq.` filters on
/// `processing_status` and `id`, and `Prefer: return=...`.
pub struct MockRest {
    pub addr: SocketAddr,
    state: Arc<RestState>,
}

pub const REST_KEY: &str = "service-role-test-key";

impl MockRest {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn status_of(&self, id: &str) -> Option<String> {
        self.state
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r["id"] == json!(id))
            .and_then(|r| r["processing_status"].as_str().map(|s| s.to_string()))
    }

    pub fn set_status(&self, id: &str, status: &str) {
        let mut rows = self.state.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r["id"] == json!(id)) {
            row["processing_status"] = json!(status);
        }
    }

    pub fn fail_with(&self, status: StatusCode) {
        *self.state.fail_with.lock().unwrap() = Some(status);
    }
}

pub fn rest_row(id: &str, status: &str, created_at: DateTime<Utc>) -> Value {
    json!({
        "id": id,
        "full_name": format!("Lead {id}"),
        "email": format!("{id}@example.com"),
        "phone": null,
        "business_name": format!("{id} Roofing"),
        "website": "https://example.com",
        "message": "",
        "created_at": created_at.to_rfc3339(),
        "processing_status": status,
    })
}

pub async fn spawn_rest(rows: Vec<Value>) -> MockRest {
    let state = Arc::new(RestState {
        rows: Mutex::new(rows),
        requests: Mutex::new(Vec::new()),
        fail_with: Mutex::new(None),
    });

    let app = Router::new()
        .route(
            "/rest/v1/contact_submissions",
            get(rest_select).patch(rest_update),
        )
        .with_state(state.clone());

    let addr = serve(app).await;
    MockRest { addr, state }
}

fn record(
    state: &RestState,
    method: &str,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
    body: Option<Value>,
) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    };
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        query: query.clone(),
        apikey: header("apikey"),
        authorization: header("authorization"),
        prefer: header("prefer"),
        body,
    });
}

fn matches(row: &Value, query: &HashMap<String, String>) -> bool {
    if let Some(id) = query.get("id").and_then(|f| f.strip_prefix("eq.")) {
        if row["id"].as_str() != Some(id) {
            return false;
        }
    }
    if let Some(list) = query
        .get("processing_status")
        .and_then(|f| f.strip_prefix("in.("))
        .and_then(|f| f.strip_suffix(')'))
    {
        let status = row["processing_status"].as_str().unwrap_or_default();
        if !list.split(',').any(|s| s == status) {
            return false;
        }
    }
    true
}

async fn rest_select(
    State(state): State<Arc<RestState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    record(&state, "GET", &query, &headers, None);
    if let Some(status) = *state.fail_with.lock().unwrap() {
        return (status, Json(json!({ "message": "relation is unavailable" })));
    }

    let rows: Vec<Value> = state
        .rows
        .lock()
        .unwrap()
        .iter()
        .filter(|r| matches(r, &query))
        .cloned()
        .collect();
    (StatusCode::OK, Json(Value::Array(rows)))
}

async fn rest_update(
    State(state): State<Arc<RestState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "PATCH", &query, &headers, Some(body.clone()));
    if let Some(status) = *state.fail_with.lock().unwrap() {
        return (status, Json(json!({ "message": "relation is unavailable" }))).into_response();
    }

    let mut updated = Vec::new();
    for row in state.rows.lock().unwrap().iter_mut() {
        if matches(row, &query) {
            row["processing_status"] = body["processing_status"].clone();
            updated.push(row.clone());
        }
    }

    let wants_rows = headers
        .get("prefer")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|p| p.contains("return=representation"));
    if wants_rows {
        (StatusCode::OK, Json(Value::Array(updated))).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    addr
}
