use anyhow::{Context, Result};
use storefront_service::build_router;
use storefront_service::catalog::Catalog;
use storefront_service::config::{Config, LogFormat};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(error) if error.not_found() => {}
        Err(error) => return Err(error).context("failed to load .env file"),
    }

    let config = Config::from_env()?;
    init_tracing(&config);

    let catalog = match Catalog::load(&config.products_path, &config.documents_path) {
        Ok(catalog) => {
            tracing::info!(
                products = catalog.product_count(),
                documents = catalog.document_count(),
                "catalog loaded"
            );
            catalog
        }
        Err(error) => {
            tracing::error!(%error, "catalog unavailable; serving an empty catalog");
            Catalog::default()
        }
    };
    if config.chatbots.is_empty() {
        tracing::warn!("no chatbots configured; the chat widget will report itself unavailable");
    }

    let bind_addr = config.bind_addr;
    let router = build_router(config, catalog)?;
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "storefront service listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
