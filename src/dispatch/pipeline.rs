use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::dispatch::worker::Worker;
use crate::dispatch::Dispatcher;
use crate::error::StoreError;
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub queue_capacity: usize,
    pub workers: usize,
    pub reply_timeout: Duration,
    pub reconnect_backoff: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 2000,
            workers: 250,
            reply_timeout: Duration::from_secs(5),
            reconnect_backoff: Duration::from_millis(100),
        }
    }
}

/// Owns the worker tasks. Dropping every [`Dispatcher`] or calling
/// [`Pipeline::shutdown`] stops them.
pub struct Pipeline {
    handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Opens one store connection per worker up front, so an unreachable store
    /// fails startup rather than the first request.
    #[instrument(name = "dispatch_pipeline", skip(store))]
    pub async fn start(
        store: Arc<dyn Store>,
        settings: PipelineSettings,
    ) -> Result<(Self, Dispatcher), StoreError> {
        let worker_count = settings.workers.max(1);
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let jobs = Arc::new(Mutex::new(receiver));
        let shutdown = CancellationToken::new();

        let mut connections = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            connections.push(store.connect().await?);
        }

        let handles = connections
            .into_iter()
            .enumerate()
            .map(|(index, connection)| {
                let worker = Worker::new(
                    index,
                    Arc::clone(&store),
                    connection,
                    Arc::clone(&jobs),
                    shutdown.clone(),
                    settings.reconnect_backoff,
                );
                tokio::spawn(worker.run())
            })
            .collect();

        info!(
            workers = worker_count,
            queue_capacity = settings.queue_capacity,
            "Dispatch pipeline started"
        );

        let pipeline = Self { handles, shutdown };
        let dispatcher = Dispatcher::new(sender, settings.reply_timeout);
        Ok((pipeline, dispatcher))
    }

    /// Stops accepting jobs, lets workers drain what is queued, then waits
    /// for them to exit.
    #[instrument(skip(self))]
    pub async fn shutdown(self) {
        info!("Shutting down dispatch pipeline");
        self.shutdown.cancel();

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = ?e, "Worker task failed");
            }
        }

        info!("Dispatch pipeline stopped");
    }
}
