use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::dispatch::{Job, JobKind};
use crate::error::{DispatchError, StoreError};
use crate::store::{Store, StoreConnection, TransitionOutcome};

pub(crate) type SharedJobs = Arc<Mutex<mpsc::Receiver<Job>>>;

/// A pool member. Owns one store connection and replaces it after a
/// transport failure instead of giving up.
pub(crate) struct Worker {
    index: usize,
    store: Arc<dyn Store>,
    connection: Option<Box<dyn StoreConnection>>,
    jobs: SharedJobs,
    shutdown: CancellationToken,
    reconnect_backoff: Duration,
}

impl Worker {
    pub(crate) fn new(
        index: usize,
        store: Arc<dyn Store>,
        connection: Box<dyn StoreConnection>,
        jobs: SharedJobs,
        shutdown: CancellationToken,
        reconnect_backoff: Duration,
    ) -> Self {
        Self {
            index,
            store,
            connection: Some(connection),
            jobs,
            shutdown,
            reconnect_backoff,
        }
    }

    /// Serves jobs until every dispatcher is gone, or until shutdown is
    /// requested and the queue has been drained.
    #[instrument(name = "dispatch_worker", skip(self), fields(worker = self.index))]
    pub(crate) async fn run(mut self) {
        debug!("Worker starting");

        loop {
            let next = tokio::select! {
                job = Self::next_job(&self.jobs) => job,
                () = self.shutdown.cancelled() => {
                    let mut jobs = self.jobs.lock().await;
                    jobs.close();
                    jobs.recv().await
                }
            };
            let Some(job) = next else { break };
            self.handle(job).await;
        }

        debug!("Worker stopped");
    }

    async fn next_job(jobs: &SharedJobs) -> Option<Job> {
        jobs.lock().await.recv().await
    }

    #[instrument(fields(job = ?job.kind), skip(self, job))]
    async fn handle(&mut self, job: Job) {
        let result = self.execute(&job.kind).await;
        let transport_failed = matches!(result, Err(DispatchError::Transport(_)));
        if let Err(DispatchError::Transport(e)) = &result {
            warn!(error = %e, "Store transport failed; dropping connection");
            self.connection = None;
        }

        if job.respond_to.send(result).is_err() {
            debug!("Caller stopped waiting before the reply");
        }

        if transport_failed {
            tokio::time::sleep(self.reconnect_backoff).await;
        }
    }

    async fn execute(&mut self, kind: &JobKind) -> Result<TransitionOutcome, DispatchError> {
        if self.connection.is_none() {
            self.connection = Some(self.store.connect().await?);
            debug!("Reconnected to store");
        }
        let Some(connection) = self.connection.as_mut() else {
            return Err(StoreError::Unavailable("no store connection".to_string()).into());
        };

        let outcome = match kind {
            JobKind::AddItemToCart {
                cart_id,
                food_id,
                food_count,
            } => {
                connection
                    .add_item_to_cart(cart_id, *food_id, *food_count)
                    .await?
            }
            JobKind::FinalizeOrder { user_id, cart_id } => {
                connection.finalize_order(*user_id, cart_id).await?
            }
        };
        debug!(code = outcome.code(), "Transition evaluated");
        Ok(outcome)
    }
}
