use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rfp_server::api;
use rfp_server::app_state::AppState;
use rfp_server::catalog::StaticCatalog;
use rfp_server::config::Config;
use rfp_server::db::{self, SqliteRecordStore};
use rfp_server::delegate::WorkflowDelegate;
use rfp_server::model_gateway;
use rfp_server::orchestrator::{Orchestrator, Pipeline, PipelineSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rfp_server=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(port = config.port, "rfp-server starting");

    // Database
    let pool = db::connect(&config.database_url).await?;
    let sqlite_store = SqliteRecordStore::new(pool);
    if config.seed_demo_data {
        let summary = db::seed::seed_demo_data(&sqlite_store).await?;
        info!(
            user_id = %summary.user_id,
            rfps_inserted = summary.rfps_inserted,
            "demo data seeded"
        );
    }
    let store: db::SharedRecordStore = Arc::new(sqlite_store);

    let model = model_gateway::from_config(&config.model)?;
    info!(model = model.model_id(), "model gateway ready");

    let pipeline = Pipeline::standard(
        store.clone(),
        model,
        Arc::new(StaticCatalog::standard()),
        &PipelineSettings {
            email_notifications: config.email_notifications,
        },
    );
    let orchestrator = Orchestrator::new(store.clone(), pipeline);

    let delegate = WorkflowDelegate::from_config(&config.delegate, &config.callback_base_url)?;
    match &delegate {
        Some(_) => info!(base_url = %config.delegate.base_url, "workflow delegate enabled"),
        None => warn!("N8N_WEBHOOK_BASE_URL not set; workflow delegate disabled"),
    }

    let app_state = Arc::new(AppState::new(
        store,
        orchestrator,
        delegate,
        config.callback_base_url.clone(),
    ));

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_str(&config.cors_origin)?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = api::router()
        .with_state(api::ApiState { app_state })
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
