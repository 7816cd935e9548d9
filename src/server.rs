//! Service wiring and the HTTP server loop

use crate::api::build_app;
use crate::artefacts::{open_artefact_store, ArtefactStore};
use crate::config::DealroomConfig;
use crate::deals::{DealManager, DealsState};
use crate::error::{Error, Result};
use crate::memo::{build_generator, MemoGenerator};
use crate::storage::{open_deal_store, DealStore};
use std::sync::Arc;

/// Backends chosen at startup
pub struct Services {
    pub deals: Arc<dyn DealStore>,
    pub artefacts: Arc<dyn ArtefactStore>,
    pub generator: Arc<dyn MemoGenerator>,
}

impl Services {
    /// Open every backend the configuration selects
    pub async fn from_config(config: &DealroomConfig) -> Result<Self> {
        let deals = open_deal_store(config).await?;
        let artefacts = open_artefact_store(config).await?;
        let generator = build_generator(&config.generator)?;
        Ok(Self {
            deals,
            artefacts,
            generator,
        })
    }

    pub fn into_manager(self, config: &DealroomConfig) -> DealManager {
        DealManager::new(
            self.deals,
            self.artefacts,
            self.generator,
            config.invites.clone(),
        )
    }
}

/// Serve the API until Ctrl+C
pub async fn serve(config: DealroomConfig) -> Result<()> {
    let services = Services::from_config(&config).await?;
    let manager = Arc::new(services.into_manager(&config));
    let (deal_store, artefact_store, generator) = manager.backends();

    let app = build_app(DealsState { manager }, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::Config(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!(
        addr = %addr,
        deal_store = %deal_store,
        artefact_store = %artefact_store,
        generator = %generator,
        "Dealroom API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Dealroom API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}
