use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use digit_predict_service::{AppConfig, ModelRegistry, build_router};

/// Request spans from `TraceLayer` are emitted at debug.
const DEFAULT_LOG_FILTER: &str = "info,digit_predict_service=debug,tower_http=debug,hyper=warn";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(AppConfig::from_args()?);
    tracing::info!(
        model = %config.model_path.display(),
        preprocess = ?config.preprocess,
        "loading model"
    );

    let registry = Arc::new(ModelRegistry::initialize(config.as_ref())?);
    let metadata = registry.metadata();
    tracing::info!(
        backend = metadata.backend,
        size_bytes = metadata.size_bytes,
        "model ready"
    );

    let router = build_router(config.clone(), registry);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
