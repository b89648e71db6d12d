use std::sync::Arc;

use anyhow::Context;

use shelfsync_infra::{CatalogStore, InMemoryCatalogStore, PostgresCatalogStore, ReconcileConfig};

const ENV_BIND_ADDR: &str = "SHELFSYNC_BIND_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shelfsync_observability::init();

    let config = ReconcileConfig::from_env().context("invalid reconciliation config")?;

    let catalog: Arc<dyn CatalogStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(
            PostgresCatalogStore::connect(&url)
                .await
                .context("failed to connect to catalog database")?,
        ),
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using empty in-memory catalog");
            Arc::new(InMemoryCatalogStore::new())
        }
    };

    let services = shelfsync_api::app::services::build_services(catalog, config);
    let app = shelfsync_api::app::build_app(services);

    let addr = std::env::var(ENV_BIND_ADDR).unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
