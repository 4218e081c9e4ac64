use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::CatalogWriter;
use crate::error::CatalogError;
use crate::store::{Store, StoreConnection};

/// Pulls the authoritative stock hash and publishes a fresh snapshot.
pub async fn refresh_once(
    connection: &mut dyn StoreConnection,
    writer: &CatalogWriter,
) -> Result<(), CatalogError> {
    let levels = connection.stock_levels().await?;
    let snapshot = writer.current().with_stock(&levels)?;
    writer.publish(snapshot);
    Ok(())
}

/// Keeps the catalog's stock mirror current until `shutdown` fires.
///
/// Store failures are logged and retried on the next tick with a new
/// connection; the mirror just stays stale meanwhile.
#[instrument(name = "stock_refresh", skip_all, fields(interval_secs = interval.as_secs_f64()))]
pub async fn refresh_stock(
    store: Arc<dyn Store>,
    writer: CatalogWriter,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!("Stock refresh starting");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and the catalog was just loaded.
    ticker.tick().await;

    let mut connection: Option<Box<dyn StoreConnection>> = None;
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if connection.is_none() {
            match store.connect().await {
                Ok(fresh) => connection = Some(fresh),
                Err(e) => {
                    warn!(error = %e, "Stock refresh could not reach store");
                    continue;
                }
            }
        }
        let Some(active) = connection.as_mut() else {
            continue;
        };

        match refresh_once(active.as_mut(), &writer).await {
            Ok(()) => debug!("Stock mirror refreshed"),
            Err(e) => {
                warn!(error = %e, "Stock refresh failed");
                connection = None;
            }
        }
    }

    info!("Stock refresh stopped");
}
