//! # Homerisk Server
//!
//! HTTP boundary for the homerisk location risk-analysis pipeline.
//!
//! A submission is accepted synchronously (`POST /submit-analysis` returns a
//! deterministic job id immediately); collection, aggregation, and
//! summarization run asynchronously and are observed by polling
//! `GET /report/{job_id}` until the report reaches `COMPLETED` or `FAILED`.
//!
//! Backends are selected from the environment: Postgres job store when
//! `DATABASE_URL` is set (in-memory otherwise), SerpAPI search when
//! `SERPAPI_KEY` is set (no-evidence stub otherwise), and a mail-API
//! notifier when `MAIL_ENDPOINT`/`MAIL_API_KEY` are set.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use homerisk_core::broker::{Broker, MemoryBroker};
use homerisk_core::capabilities::{
    ChatSummarizer, HttpNotifier, NoopNotifier, Notifier, SearchProvider, SerpSearch, StubSearch,
};
use homerisk_core::store::{JobStore, MemoryJobStore, PostgresJobStore};
use homerisk_core::{Pipeline, PipelineConfig};
use homerisk_server::{AppState, Config, routes};

#[derive(Parser, Debug)]
#[command(name = "homerisk-server")]
#[command(about = "Location risk-analysis pipeline with async fan-out collection")]
struct Cli {
    /// Bind address (overrides HOMERISK_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Bind port (overrides HOMERISK_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("homerisk=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let store: Arc<dyn JobStore> = match &config.database.url {
        Some(url) => {
            info!("connecting to postgres job store");
            Arc::new(PostgresJobStore::connect(url).await?)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory job store");
            Arc::new(MemoryJobStore::new())
        }
    };
    let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());

    let search: Arc<dyn SearchProvider> = match &config.search.api_key {
        Some(key) => Arc::new(SerpSearch::new(config.search.endpoint.clone(), key.clone())),
        None => {
            warn!("SERPAPI_KEY not set, collectors will find no evidence");
            Arc::new(StubSearch)
        }
    };
    let summarizer = Arc::new(ChatSummarizer::new(
        config.summarizer.endpoint.clone(),
        config.summarizer.model.clone(),
        config.summarizer.api_key.clone(),
    ));
    let notifier: Arc<dyn Notifier> = match (&config.notifier.endpoint, &config.notifier.api_key) {
        (Some(endpoint), Some(key)) => Arc::new(HttpNotifier::new(
            endpoint.clone(),
            key.clone(),
            config.notifier.from.clone(),
        )),
        _ => Arc::new(NoopNotifier),
    };

    let pipeline = Pipeline::start(
        Arc::clone(&store),
        broker,
        search,
        summarizer,
        notifier,
        PipelineConfig {
            cache_ttl_days: config.cache.ttl_days,
            collector_timeout: config.pipeline.collector_timeout,
        },
    )
    .await?;

    let state = AppState::new(pipeline.orchestrator(), pipeline.store());
    let app = routes::create_router(state).layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "homerisk server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pipeline.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
