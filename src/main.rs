use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, Instrument};

use larder::app_system::{setup_tracing, EngineConfig, OrderSystem, StoreBackend};
use larder::catalog::Seed;
use larder::session::SessionError;
use larder::store::{MemoryStore, RedisStore, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    setup_tracing();

    let config = EngineConfig::from_env();
    info!(backend = ?config.backend, seed = %config.seed_file, "Starting order engine");

    let store: Arc<dyn Store> = match &config.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new()),
        StoreBackend::Redis { url } => Arc::new(RedisStore::open(url)?),
    };
    let seed = Seed::from_file(&config.seed_file)?;
    let first_user = seed
        .users
        .first()
        .map(|user| (user.name.clone(), user.password.clone()))
        .context("seed contains no users")?;
    let first_food = seed.foods.first().map(|food| food.id).context("seed contains no foods")?;

    let system = OrderSystem::start(&config, store, seed).await?;

    let span = tracing::info_span!("order_walkthrough", username = %first_user.0);
    let walkthrough = async {
        let session = &system.session;
        let receipt = session.login(&first_user.0, &first_user.1)?;
        let user_id = session.authenticate(&receipt.access_token)?;

        let cart_id = session.create_cart(user_id);
        session
            .add_food(user_id, cart_id.as_str(), first_food, 2)
            .await?;
        let order_id = session.make_order(user_id, cart_id.as_str()).await?;
        info!(order_id = %order_id, "Order placed");

        let orders = session.fetch_orders(user_id).await?;
        info!(orders = %serde_json::to_string(&orders)?, "Orders fetched");
        anyhow::Ok(())
    }
    .instrument(span)
    .await;

    if let Err(e) = walkthrough {
        match e.downcast_ref::<SessionError>() {
            Some(rejected) => error!(
                code = rejected.code(),
                status = rejected.status(),
                error = %rejected,
                "Order walkthrough rejected"
            ),
            None => error!(error = %e, "Order walkthrough failed"),
        }
    }

    system.shutdown().await;

    info!("Application completed successfully");
    Ok(())
}
