#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::app_system::{EngineConfig, OrderSystem};
    use crate::catalog::Seed;
    use crate::dispatch::{Dispatcher, Pipeline, PipelineSettings, RetryPolicy};
    use crate::domain::{CartId, FoodId, Item};
    use crate::error::{DispatchError, StoreError};
    use crate::session::SessionError;
    use crate::store::{MemoryStore, Store, TransitionOutcome};

    fn settings(workers: usize, queue_capacity: usize) -> PipelineSettings {
        PipelineSettings {
            queue_capacity,
            workers,
            reply_timeout: Duration::from_secs(10),
            reconnect_backoff: Duration::from_millis(10),
        }
    }

    async fn start(store: &MemoryStore, workers: usize, queue_capacity: usize) -> (Pipeline, Dispatcher) {
        Pipeline::start(Arc::new(store.clone()), settings(workers, queue_capacity))
            .await
            .unwrap()
    }

    async fn cart_lines(store: &MemoryStore, cart_id: &CartId) -> Vec<Item> {
        let mut conn = store.connect().await.unwrap();
        conn.cart_items(cart_id).await.unwrap()
    }

    async fn stock_of(store: &MemoryStore, food_id: FoodId) -> i64 {
        let mut conn = store.connect().await.unwrap();
        conn.stock_levels().await.unwrap()[&food_id]
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_never_exceed_capacity() {
        let store = MemoryStore::new();
        let (pipeline, dispatcher) = start(&store, 8, 64).await;
        let cart_id = CartId::new(7, 1);

        let mut tasks = Vec::new();
        for i in 0..24_i64 {
            let dispatcher = dispatcher.clone();
            let cart_id = cart_id.clone();
            let (food_id, count) = (1 + i % 3, 1 + i % 2);
            tasks.push(tokio::spawn(async move {
                let outcome = dispatcher
                    .add_item_to_cart(cart_id, food_id, count, &RetryPolicy::none())
                    .await
                    .unwrap();
                (food_id, count, outcome)
            }));
        }

        let mut accepted: BTreeMap<FoodId, i64> = BTreeMap::new();
        for task in tasks {
            let (food_id, count, outcome) = task.await.unwrap();
            if outcome == TransitionOutcome::Accepted {
                *accepted.entry(food_id).or_insert(0) += count;
            } else {
                assert_eq!(outcome, TransitionOutcome::Rejected);
            }
        }

        let lines = cart_lines(&store, &cart_id).await;
        let held: i64 = lines.iter().map(|item| item.count).sum();
        assert!(held <= 3, "cart holds {held} items");
        assert!(held >= 2, "some additions must fit");
        let stored: BTreeMap<FoodId, i64> =
            lines.iter().map(|item| (item.food_id, item.count)).collect();
        assert_eq!(stored, accepted);

        pipeline.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_finalize_creates_one_order() {
        let store = MemoryStore::with_stock([(1, 100)]);
        let (pipeline, dispatcher) = start(&store, 8, 64).await;
        let cart_id = CartId::new(3, 1);
        dispatcher
            .add_item_to_cart(cart_id.clone(), 1, 2, &RetryPolicy::none())
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let dispatcher = dispatcher.clone();
            let cart_id = cart_id.clone();
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .finalize_order(3, cart_id, &RetryPolicy::none())
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        for task in tasks {
            match task.await.unwrap() {
                TransitionOutcome::Created => created += 1,
                other => assert_eq!(other, TransitionOutcome::AlreadyOrdered),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(stock_of(&store, 1).await, 98);

        pipeline.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stock_never_negative_across_users() {
        let store = MemoryStore::with_stock([(9, 5)]);
        let (pipeline, dispatcher) = start(&store, 8, 64).await;

        let mut wanted = BTreeMap::new();
        for user_id in 1..=10 {
            let cart_id = CartId::new(user_id, 1);
            let count = 1 + user_id % 3;
            dispatcher
                .add_item_to_cart(cart_id, 9, count, &RetryPolicy::none())
                .await
                .unwrap();
            wanted.insert(user_id, count);
        }

        let mut tasks = Vec::new();
        for user_id in 1..=10 {
            let dispatcher = dispatcher.clone();
            tasks.push(tokio::spawn(async move {
                let outcome = dispatcher
                    .finalize_order(user_id, CartId::new(user_id, 1), &RetryPolicy::none())
                    .await
                    .unwrap();
                (user_id, outcome)
            }));
        }

        let mut sold = 0;
        for task in tasks {
            let (user_id, outcome) = task.await.unwrap();
            match outcome {
                TransitionOutcome::Created => sold += wanted[&user_id],
                other => assert_eq!(other, TransitionOutcome::InsufficientStock),
            }
        }

        let left = stock_of(&store, 9).await;
        assert!(left >= 0);
        assert_eq!(left, 5 - sold);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_cart_at_two_takes_one_more_but_not_two() {
        let store = MemoryStore::new();
        let (pipeline, dispatcher) = start(&store, 2, 8).await;
        let cart_id = CartId::parse("7_2").unwrap();
        let retry = RetryPolicy::none();

        assert_eq!(
            dispatcher.add_item_to_cart(cart_id.clone(), 5, 2, &retry).await,
            Ok(TransitionOutcome::Accepted)
        );

        assert_eq!(
            dispatcher.add_item_to_cart(cart_id.clone(), 5, 2, &retry).await,
            Ok(TransitionOutcome::Rejected)
        );
        assert_eq!(cart_lines(&store, &cart_id).await, vec![Item::new(5, 2)]);

        assert_eq!(
            dispatcher.add_item_to_cart(cart_id.clone(), 5, 1, &retry).await,
            Ok(TransitionOutcome::Accepted)
        );
        assert_eq!(cart_lines(&store, &cart_id).await, vec![Item::new(5, 3)]);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_positive_counts_cannot_raise_stock() {
        let store = MemoryStore::with_stock([(1, 10), (2, 10)]);
        let (pipeline, dispatcher) = start(&store, 2, 8).await;
        let cart_id = CartId::new(1, 1);
        let retry = RetryPolicy::none();

        assert_eq!(
            dispatcher.add_item_to_cart(cart_id.clone(), 1, -3, &retry).await,
            Ok(TransitionOutcome::Rejected)
        );
        assert_eq!(
            dispatcher.add_item_to_cart(cart_id.clone(), 1, 0, &retry).await,
            Ok(TransitionOutcome::Rejected)
        );
        assert_eq!(
            dispatcher.add_item_to_cart(cart_id.clone(), 2, 3, &retry).await,
            Ok(TransitionOutcome::Accepted)
        );
        assert_eq!(
            dispatcher.add_item_to_cart(cart_id.clone(), 2, 3, &retry).await,
            Ok(TransitionOutcome::Rejected)
        );
        assert_eq!(
            dispatcher.finalize_order(1, cart_id, &retry).await,
            Ok(TransitionOutcome::Created)
        );

        assert_eq!(stock_of(&store, 1).await, 10);
        assert_eq!(stock_of(&store, 2).await, 7);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_last_units_go_to_first_finalize() {
        let store = MemoryStore::with_stock([(9, 2)]);
        let (pipeline, dispatcher) = start(&store, 2, 8).await;
        let retry = RetryPolicy::none();
        let (cart_a, cart_b) = (CartId::new(1, 1), CartId::new(2, 1));

        dispatcher.add_item_to_cart(cart_a.clone(), 9, 2, &retry).await.unwrap();
        dispatcher.add_item_to_cart(cart_b.clone(), 9, 1, &retry).await.unwrap();

        assert_eq!(
            dispatcher.finalize_order(1, cart_a.clone(), &retry).await,
            Ok(TransitionOutcome::Created)
        );
        assert_eq!(stock_of(&store, 9).await, 0);

        assert_eq!(
            dispatcher.finalize_order(2, cart_b.clone(), &retry).await,
            Ok(TransitionOutcome::InsufficientStock)
        );
        assert_eq!(stock_of(&store, 9).await, 0);
        assert_eq!(cart_lines(&store, &cart_b).await, vec![Item::new(9, 1)]);

        // A second order for the same user leaves stock alone.
        let cart_a2 = CartId::new(1, 2);
        dispatcher.add_item_to_cart(cart_a2.clone(), 9, 1, &retry).await.unwrap();
        assert_eq!(
            dispatcher.finalize_order(1, cart_a2, &retry).await,
            Ok(TransitionOutcome::AlreadyOrdered)
        );
        assert_eq!(stock_of(&store, 9).await, 0);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_blocks_submitters_without_dropping() {
        let store = MemoryStore::new();
        let (pipeline, dispatcher) = start(&store, 1, 1).await;
        let cart_id = CartId::new(4, 1);
        store.hold();

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let dispatcher = dispatcher.clone();
            let cart_id = cart_id.clone();
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .add_item_to_cart(cart_id, 1, 1, &RetryPolicy::none())
                    .await
            }));
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        // One job held by the worker, one queued, one waiting to enqueue.
        assert_eq!(dispatcher.queued(), 1);
        assert!(tasks.iter().all(|task| !task.is_finished()));

        store.release();
        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(TransitionOutcome::Accepted));
        }
        assert_eq!(cart_lines(&store, &cart_id).await, vec![Item::new(1, 3)]);

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_transport_fault_fails_only_that_job() {
        let store = MemoryStore::new();
        let (pipeline, dispatcher) = start(&store, 1, 4).await;
        let cart_id = CartId::new(6, 1);
        store.fail_next_transitions(1);

        let failed = dispatcher
            .add_item_to_cart(cart_id.clone(), 2, 1, &RetryPolicy::default())
            .await;
        assert!(matches!(
            failed,
            Err(DispatchError::Transport(StoreError::Connection(_)))
        ));
        assert!(cart_lines(&store, &cart_id).await.is_empty());

        assert_eq!(
            dispatcher
                .add_item_to_cart(cart_id.clone(), 2, 1, &RetryPolicy::none())
                .await,
            Ok(TransitionOutcome::Accepted)
        );

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_queued_jobs() {
        let store = MemoryStore::new();
        let (pipeline, dispatcher) = start(&store, 1, 8).await;
        let cart_id = CartId::new(2, 1);
        store.hold();

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let dispatcher = dispatcher.clone();
            let cart_id = cart_id.clone();
            tasks.push(tokio::spawn(async move {
                dispatcher
                    .add_item_to_cart(cart_id, 3, 1, &RetryPolicy::none())
                    .await
            }));
        }
        tokio::time::sleep(Duration::from_millis(30)).await;

        let stopping = tokio::spawn(pipeline.shutdown());
        store.release();
        stopping.await.unwrap();

        for task in tasks {
            assert_eq!(task.await.unwrap(), Ok(TransitionOutcome::Accepted));
        }
        assert!(matches!(
            dispatcher
                .add_item_to_cart(cart_id, 3, 1, &RetryPolicy::none())
                .await,
            Err(DispatchError::Closed)
        ));
    }

    const SEED: &str = r#"{
        "foods": [{"id": 1, "price": 12, "stock": 10}, {"id": 2, "price": 8, "stock": 1}],
        "users": [
            {"id": 1, "name": "root", "password": "root"},
            {"id": 2, "name": "alice", "password": "wonder"},
            {"id": 3, "name": "bob", "password": "builder"}
        ]
    }"#;

    #[tokio::test]
    async fn test_session_flow_end_to_end() {
        let mut config = EngineConfig::default();
        config.pipeline = settings(4, 16);
        config.retry = RetryPolicy::none();
        config.stock_refresh = Duration::from_millis(10);

        let store = MemoryStore::new();
        let system = OrderSystem::start(&config, Arc::new(store.clone()), Seed::from_json(SEED).unwrap())
            .await
            .unwrap();
        let session = system.session.clone();

        let alice = session.login("alice", "wonder").unwrap();
        let user_id = session.authenticate(&alice.access_token).unwrap();
        assert_eq!(user_id, 2);

        let cart_id = session.create_cart(user_id);
        session.add_food(user_id, cart_id.as_str(), 1, 2).await.unwrap();
        session.add_food(user_id, cart_id.as_str(), 2, 1).await.unwrap();
        assert_eq!(
            session.add_food(user_id, cart_id.as_str(), 1, 1).await,
            Err(SessionError::FoodOutOfLimit)
        );
        assert_eq!(
            session.add_food(3, cart_id.as_str(), 1, 1).await,
            Err(SessionError::NotAuthorizedToAccessCart(cart_id.to_string()))
        );

        assert_eq!(session.make_order(user_id, cart_id.as_str()).await, Ok("2".to_string()));
        assert_eq!(
            session.make_order(user_id, cart_id.as_str()).await,
            Err(SessionError::OrderOutOfLimit)
        );

        let orders = session.fetch_orders(user_id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].total, 12 * 2 + 8);
        assert_eq!(orders[0].items, vec![Item::new(1, 2), Item::new(2, 1)]);

        // Food 2 is sold out now.
        let bob_cart = session.create_cart(3);
        session.add_food(3, bob_cart.as_str(), 2, 1).await.unwrap();
        assert_eq!(
            session.make_order(3, bob_cart.as_str()).await,
            Err(SessionError::FoodOutOfStock)
        );

        // An empty cart still places an order, and it is listed as one.
        let root_cart = session.create_cart(1);
        assert_eq!(session.make_order(1, root_cart.as_str()).await, Ok("1".to_string()));
        let root_orders = session.fetch_orders(1).await.unwrap();
        assert_eq!(root_orders.len(), 1);
        assert!(root_orders[0].items.is_empty());
        assert_eq!(root_orders[0].total, 0);
        assert!(session.fetch_orders(3).await.unwrap().is_empty());

        assert!(session.fetch_admin_orders(user_id).await.unwrap().is_empty());
        assert_eq!(session.fetch_admin_orders(1).await.unwrap().len(), 2);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while system.catalog.snapshot().food(2).map(|food| food.stock) != Some(0) {
            assert!(tokio::time::Instant::now() < deadline, "stock mirror never refreshed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(session.foods_json().contains(r#"{"id":2,"price":8,"stock":0}"#));

        drop(session);
        system.shutdown().await;
    }
}
