mod config;
mod document;
mod errors;
mod jobs;
mod llm_client;
mod models;
mod pipeline;
mod resume;
mod rewrite;
mod routes;
mod state;
mod store;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::document::TemplateCache;
use crate::jobs::{run_worker, RedisJobQueue};
use crate::llm_client::LlmClient;
use crate::pipeline::{PipelineContext, RewriteSettings};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::postgres::create_pool;
use crate::store::{PgRecordStore, S3BlobStore};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cvpatch v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let records = Arc::new(PgRecordStore::new(db));

    // Initialize Redis job queue
    let redis = redis::Client::open(config.redis_url.clone())?;
    let queue = RedisJobQueue::new(redis, config.job_queue_key.clone());
    info!("Redis job queue initialized ({})", config.job_queue_key);

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    let blobs = Arc::new(S3BlobStore::new(s3, config.s3_bucket.clone()));
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    info!(
        "Rewrite strategy: {:?}, bullet length tolerance {:.0}%",
        config.rewrite_strategy,
        config.bullet_length_tolerance * 100.0
    );

    let pipeline = PipelineContext {
        records: records.clone(),
        blobs,
        generator: Arc::new(llm),
        templates: Arc::new(TemplateCache::new(&config.template_path)),
        settings: RewriteSettings {
            strategy: config.rewrite_strategy,
            bullet_tolerance: config.bullet_length_tolerance,
            progress_interval: config.progress_interval,
        },
    };
    tokio::spawn(run_worker(queue.clone(), pipeline));

    let state = AppState {
        records,
        jobs: Arc::new(queue),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client has a fixed host

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "cvpatch-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
