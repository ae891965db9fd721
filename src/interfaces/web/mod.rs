mod handlers;
mod router;
mod ws;

use anyhow::Result;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::core::llm::service::ModelService;
use crate::core::metrics::MetricsSampler;
use crate::core::settings::SettingsStore;
use crate::core::uplink::{AgentRegistry, EventHub};
use crate::core::workflows::WorkflowStore;

pub type SettingsHandle = Arc<tokio::sync::RwLock<SettingsStore>>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) settings: SettingsHandle,
    pub(crate) models: Arc<ModelService>,
    pub(crate) metrics: Arc<MetricsSampler>,
    pub(crate) workflows: Arc<WorkflowStore>,
    pub(crate) agents: AgentRegistry,
    pub(crate) events: EventHub,
    pub(crate) log_tx: tokio::sync::broadcast::Sender<String>,
    pub(crate) started_at: Instant,
    pub(crate) http: reqwest::Client,
}

pub struct ApiServerConfig {
    pub settings: SettingsHandle,
    pub models: Arc<ModelService>,
    pub metrics: Arc<MetricsSampler>,
    pub workflows: Arc<WorkflowStore>,
    pub agents: AgentRegistry,
    pub events: EventHub,
    pub log_tx: tokio::sync::broadcast::Sender<String>,
    pub http: reqwest::Client,
    pub host: String,
    pub port: u16,
}

pub struct ApiServer {
    config: ApiServerConfig,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig) -> Self {
        Self { config }
    }

    /// Bind and serve until the process is signalled.
    pub async fn run(self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let state = AppState {
            settings: self.config.settings,
            models: self.config.models,
            metrics: self.config.metrics,
            workflows: self.config.workflows,
            agents: self.config.agents,
            events: self.config.events,
            log_tx: self.config.log_tx,
            started_at: Instant::now(),
            http: self.config.http,
        };
        let app = router::build_api_router(state);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("API server running at http://{addr}");
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received");
            })
            .await?;
        Ok(())
    }
}

// --- SSE Logs (used by router) ---

async fn sse_logs_endpoint(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.log_tx.subscribe();
    let stream = BroadcastStream::new(receiver).map(|msg| match msg {
        Ok(line) => Ok(Event::default().data(line)),
        Err(_) => Ok(Event::default().data("Log stream lagged")),
    });

    Sse::new(stream)
}
