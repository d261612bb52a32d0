mod analysis;
mod auth;
mod config;
mod detail;
mod errors;
mod listing;
mod llm_client;
mod models;
mod raster;
mod report;
mod routes;
mod state;
mod storage;
mod wipe;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::analysis::retry::RetryPolicy;
use crate::config::{Config, RemoteStorage, StorageBackend};
use crate::llm_client::LlmClient;
use crate::raster::PdftoppmRasterizer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::memory::{MemoryFiles, MemoryKv};
use crate::storage::redis_kv::RedisKv;
use crate::storage::s3_files::S3Files;
use crate::storage::{FileStore, KvStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeRx API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize storage backends
    let (kv, files): (Arc<dyn KvStore>, Arc<dyn FileStore>) = match &config.storage {
        StorageBackend::Remote(remote) => {
            let redis = redis::Client::open(remote.redis_url.clone())?;
            info!("Redis client initialized");

            let s3 = build_s3_client(remote).await;
            info!("S3 client initialized (bucket: {})", remote.s3_bucket);

            (
                Arc::new(RedisKv::new(redis)),
                Arc::new(S3Files::new(s3, remote.s3_bucket.clone())),
            )
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data will not survive a restart");
            (Arc::new(MemoryKv::new()), Arc::new(MemoryFiles::new()))
        }
    };

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let rasterizer = PdftoppmRasterizer::new(&config.pdftoppm_path, config.raster_dpi);
    info!(
        "Rasterizer: {} at {} dpi",
        config.pdftoppm_path, config.raster_dpi
    );

    // Build app state
    let state = AppState {
        kv,
        files,
        feedback: Arc::new(llm),
        rasterizer: Arc::new(rasterizer),
        retry: RetryPolicy::default(),
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(remote: &RemoteStorage) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &remote.aws_access_key_id,
        &remote.aws_secret_access_key,
        None,
        None,
        "resumerx-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new(remote.s3_region.clone()))
        .credentials_provider(credentials)
        .endpoint_url(&remote.s3_endpoint)
        .load()
        .await;

    // MinIO serves buckets by path, not by virtual host.
    let s3_config = aws_sdk_s3::config::Builder::from(&s3_config)
        .force_path_style(true)
        .build();

    aws_sdk_s3::Client::from_conf(s3_config)
}
