//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use rfp_server::api;
use rfp_server::app_state::AppState;
use rfp_server::catalog::{CatalogError, ProductCatalog, StaticCatalog};
use rfp_server::db::{connect_in_memory, RecordStore, SharedRecordStore, SqliteRecordStore};
use rfp_server::delegate::WorkflowDelegate;
use rfp_server::model_gateway::{CompletionRequest, ModelError, ModelGateway, SharedModelGateway};
use rfp_server::orchestrator::{Orchestrator, Pipeline, PipelineSettings};
use shared_types::{NewRfp, Product, RfpRecord};

pub const USER_ID: &str = "user-1";

pub async fn memory_store() -> Arc<SqliteRecordStore> {
    let pool = connect_in_memory()
        .await
        .expect("Failed to open in-memory database");
    Arc::new(SqliteRecordStore::new(pool))
}

pub async fn insert_pump_rfp(store: &dyn RecordStore, user_id: &str) -> RfpRecord {
    store
        .insert_rfp(NewRfp {
            user_id: user_id.to_string(),
            title: "Industrial Pump System RFP".to_string(),
            content: Some("Centrifugal pumps for a municipal water treatment plant".to_string()),
            source: "ThomasNet".to_string(),
            source_url: Some("https://www.thomasnet.com/rfp/pump-2847".to_string()),
            specs: vec![
                "Flow Rate: 500 GPM".to_string(),
                "Pressure: 150 PSI".to_string(),
                "Material: Stainless Steel 316".to_string(),
            ],
        })
        .await
        .expect("Failed to insert RFP")
}

/// Answers with queued replies in order, then with text containing no JSON.
pub struct ScriptedGateway {
    replies: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().rev().map(|r| (*r).to_string()).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Never produces parseable output.
    pub fn unparseable() -> Self {
        Self::new(&[])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.replies.lock().unwrap().pop();
        Ok(next.unwrap_or_else(|| "Sorry, I cannot help with that request.".to_string()))
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Model host that always answers with a server error.
pub struct FailingGateway;

#[async_trait]
impl ModelGateway for FailingGateway {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, ModelError> {
        Err(ModelError::Status {
            status: 503,
            body: "upstream overloaded".to_string(),
        })
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

/// Standard catalog that counts how often it is listed.
#[derive(Default)]
pub struct CountingCatalog {
    inner: StaticCatalog,
    calls: AtomicUsize,
}

impl CountingCatalog {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductCatalog for CountingCatalog {
    async fn list_catalog(&self) -> Result<Vec<Product>, CatalogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.list_catalog().await
    }
}

pub fn orchestrator(
    store: SharedRecordStore,
    model: SharedModelGateway,
    catalog: Arc<CountingCatalog>,
) -> Orchestrator {
    let pipeline = Pipeline::standard(
        store.clone(),
        model,
        catalog,
        &PipelineSettings::default(),
    );
    Orchestrator::new(store, pipeline)
}

pub struct TestApp {
    pub router: axum::Router,
    pub store: Arc<SqliteRecordStore>,
    pub app_state: Arc<AppState>,
}

pub async fn setup_test_app(delegate: Option<WorkflowDelegate>) -> TestApp {
    setup_test_app_with_model(delegate, Arc::new(ScriptedGateway::unparseable())).await
}

pub async fn setup_test_app_with_model(
    delegate: Option<WorkflowDelegate>,
    model: SharedModelGateway,
) -> TestApp {
    let store = memory_store().await;
    let orchestrator = orchestrator(store.clone(), model, Arc::new(CountingCatalog::default()));

    let app_state = Arc::new(AppState::new(
        store.clone(),
        orchestrator,
        delegate,
        "http://localhost:5000",
    ));
    let router = api::router().with_state(api::ApiState {
        app_state: app_state.clone(),
    });

    TestApp {
        router,
        store,
        app_state,
    }
}

pub async fn json_response(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("Request failed");
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    let value: Value = serde_json::from_slice(&body).unwrap_or_else(|_| {
        let text = String::from_utf8_lossy(&body).to_string();
        json!({
            "error": {
                "message": text
            }
        })
    });
    (status, value)
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
