use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::app_system::EngineConfig;
use crate::catalog::{load_catalog, refresh_stock, CatalogCache, CatalogWriter, Seed};
use crate::clients::{CartClient, OrderClient};
use crate::dispatch::{Dispatcher, Pipeline};
use crate::error::StartupError;
use crate::session::SessionService;
use crate::store::Store;

/// The running engine.
///
/// Responsible for loading the catalog, starting the dispatch pipeline and
/// the stock refresh task, wiring the clients together, and shutting it all
/// down in reverse order.
pub struct OrderSystem {
    pub session: SessionService,
    pub dispatcher: Dispatcher,
    pub catalog: CatalogCache,
    pipeline: Pipeline,
    refresh: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl OrderSystem {
    #[instrument(name = "order_system_start", skip_all)]
    pub async fn start(
        config: &EngineConfig,
        store: Arc<dyn Store>,
        seed: Seed,
    ) -> Result<Self, StartupError> {
        // 1. Catalog, seeded into the store
        let snapshot = load_catalog(seed, store.as_ref()).await?;
        let (writer, catalog) = CatalogWriter::new(snapshot);

        // 2. Workers
        let (pipeline, dispatcher) = Pipeline::start(Arc::clone(&store), config.pipeline).await?;

        // 3. Stock mirror
        let shutdown = CancellationToken::new();
        let refresh = tokio::spawn(refresh_stock(
            Arc::clone(&store),
            writer,
            config.stock_refresh,
            shutdown.clone(),
        ));

        // 4. Clients
        let carts = CartClient::new(dispatcher.clone(), config.retry);
        let orders = OrderClient::new(
            dispatcher.clone(),
            config.retry,
            store,
            catalog.clone(),
        );
        let session = SessionService::new(catalog.clone(), carts, orders, config.admin_user_id);

        info!(
            foods = catalog.snapshot().foods().count(),
            users = catalog.snapshot().user_count(),
            "Order system started"
        );

        Ok(Self {
            session,
            dispatcher,
            catalog,
            pipeline,
            refresh,
            shutdown,
        })
    }

    pub async fn shutdown(self) {
        info!(queued = self.dispatcher.queued(), "Shutting down system...");

        self.shutdown.cancel();
        if let Err(e) = self.refresh.await {
            error!(error = ?e, "Stock refresh task failed");
        }

        drop(self.session);
        drop(self.dispatcher);
        self.pipeline.shutdown().await;

        info!("System shutdown complete.");
    }
}
