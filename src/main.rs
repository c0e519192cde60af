use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::runtime::Handle;

use cta_engine::config::{CtaConfig, ServerConfig};
use cta_engine::cta::{
    ChannelPixel, CtaDeps, CtaEngine, CtaRouteState, StaticWidgetCapabilities, cta_routes,
};
use cta_engine::store::{InMemoryStore, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let server_config = ServerConfig::from_env().context("Invalid server configuration")?;
    let cta_config = CtaConfig::from_env().context("Invalid CTA configuration")?;

    eprintln!("CTA engine v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/cta", server_config.port);
    eprintln!("   SERP domain: {}", cta_config.serp_domain);

    // ── Pixels ──────────────────────────────────────────────────────────
    let (pixel, mut pixel_rx) = ChannelPixel::new(server_config.pixel_buffer);
    tokio::spawn(async move {
        while let Some(event) = pixel_rx.recv().await {
            tracing::info!(
                pixel = %event.name,
                parameters = ?event.parameters,
                "Pixel"
            );
        }
    });

    // ── Stores ──────────────────────────────────────────────────────────
    let widgets = Arc::new(StaticWidgetCapabilities(server_config.widgets));
    let installed_at = server_config.installed_at.unwrap_or_else(Utc::now);

    let deps = match &server_config.db_path {
        Some(path) => {
            let db = Arc::new(
                LibSqlBackend::new_local(path)
                    .await
                    .with_context(|| format!("Failed to open database at {}", path.display()))?,
            );
            let installed_at = db.ensure_installed_at(installed_at).await?;
            eprintln!("   Database: {}", path.display());
            eprintln!("   Installed: {}", installed_at.to_rfc3339());
            CtaDeps::from_store(db, widgets, Arc::new(pixel))
        }
        None => {
            eprintln!("   Database: in-memory");
            let store = InMemoryStore::new().with_installed_at(installed_at);
            CtaDeps::from_store(Arc::new(store), widgets, Arc::new(pixel))
        }
    };

    let engine = CtaEngine::new(deps, cta_config);
    let app = cta_routes(CtaRouteState {
        engine,
        executor: Handle::current(),
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server_config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", server_config.port))?;
    tracing::info!(port = server_config.port, "CTA server started");
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
