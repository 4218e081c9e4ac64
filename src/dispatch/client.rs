use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, instrument};

use crate::dispatch::{Job, JobKind, RetryPolicy};
use crate::domain::{CartId, FoodId, UserId};
use crate::error::DispatchError;
use crate::store::TransitionOutcome;

/// Generate typed submit methods, one per [`JobKind`] variant.
macro_rules! transition_method {
    ($client:ty => fn $method:ident($($param:ident: $param_type:ty),*) as $kind:ident::$variant:ident) => {
        impl $client {
            pub async fn $method(
                &self,
                $($param: $param_type,)*
                retry: &RetryPolicy,
            ) -> Result<TransitionOutcome, DispatchError> {
                let kind = $kind::$variant { $($param,)* };
                retry.run(|| self.submit(kind.clone())).await
            }
        }
    };
}

/// Cloneable handle onto the job queue.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Job>,
    reply_timeout: Duration,
}

impl Dispatcher {
    pub fn new(sender: mpsc::Sender<Job>, reply_timeout: Duration) -> Self {
        Self {
            sender,
            reply_timeout,
        }
    }

    /// Queues one transition and waits for its reply.
    ///
    /// Waits for queue capacity when the queue is full; nothing is dropped.
    /// The reply wait is bounded by the configured timeout.
    ///
    /// Precondition: the caller has already checked that the cart belongs to
    /// the user it acts for. The transitions trust the ids they are given.
    #[instrument(skip(self))]
    pub async fn submit(&self, kind: JobKind) -> Result<TransitionOutcome, DispatchError> {
        debug!("Sending job");
        let (job, response) = Job::new(kind);
        self.sender
            .send(job)
            .await
            .map_err(|_| DispatchError::Closed)?;

        match tokio::time::timeout(self.reply_timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(DispatchError::Dropped),
            Err(_) => Err(DispatchError::Timeout(self.reply_timeout)),
        }
    }

    /// Jobs currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

transition_method!(Dispatcher => fn add_item_to_cart(cart_id: CartId, food_id: FoodId, food_count: i64) as JobKind::AddItemToCart);
transition_method!(Dispatcher => fn finalize_order(user_id: UserId, cart_id: CartId) as JobKind::FinalizeOrder);
