use crate::api;
use crate::application::{InventoryService, StatsAggregator};
use crate::config::{CacheSettings, Settings};
use crate::infrastructure::{FastCounter, InMemoryFastCounter, PostgresLedger, RedisFastCounter};
use crate::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    db_pool: PgPool,
    service: Arc<InventoryService>,
}

impl Application {
    #[instrument(skip(settings))]
    pub async fn new(settings: Settings) -> Result<Self> {
        let inventory = settings.inventory_config()?;

        info!("Connecting to database at {}", settings.database.host);
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.database.max_connections)
            .connect(&settings.database_url())
            .await?;

        let ledger = PostgresLedger::new(db_pool.clone());
        ledger.migrate().await?;

        let counter = connect_counter(&settings.cache).await?;

        let service = InventoryService::new(
            Arc::new(ledger),
            counter,
            Arc::new(StatsAggregator::new()),
            inventory,
        );
        if !service.seed().await? {
            // The ledger is authoritative for rows left by an earlier run
            service.sync_cache().await?;
        }

        Ok(Self {
            settings,
            db_pool,
            service: Arc::new(service),
        })
    }

    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let address = format!(
            "{}:{}",
            self.settings.application.host, self.settings.application.port
        );
        let listener = TcpListener::bind(address.as_str()).await?;
        info!(%address, "Flash sale server listening");

        let router = api::router(Arc::clone(&self.service))
            .layer(api::cors_layer(&self.settings.application.cors_origins));
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.db_pool.close().await;
        info!("Server stopped");
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn db_pool(&self) -> &PgPool {
        &self.db_pool
    }

    pub fn service(&self) -> &Arc<InventoryService> {
        &self.service
    }
}

async fn connect_counter(settings: &CacheSettings) -> Result<Arc<dyn FastCounter>> {
    match settings.url.as_deref() {
        Some(url) => Ok(Arc::new(RedisFastCounter::connect(url).await?)),
        None => {
            warn!("No cache URL configured, using a process-local fast counter");
            Ok(Arc::new(InMemoryFastCounter::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
