use tokio::sync::oneshot;

use crate::domain::{CartId, FoodId, UserId};
use crate::error::DispatchError;
use crate::store::TransitionOutcome;

/// One-shot reply slot owned by a single job.
pub type Reply = oneshot::Sender<Result<TransitionOutcome, DispatchError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    AddItemToCart {
        cart_id: CartId,
        food_id: FoodId,
        food_count: i64,
    },
    FinalizeOrder {
        user_id: UserId,
        cart_id: CartId,
    },
}

#[derive(Debug)]
pub struct Job {
    pub kind: JobKind,
    pub respond_to: Reply,
}

impl Job {
    pub fn new(
        kind: JobKind,
    ) -> (
        Self,
        oneshot::Receiver<Result<TransitionOutcome, DispatchError>>,
    ) {
        let (respond_to, response) = oneshot::channel();
        (Self { kind, respond_to }, response)
    }
}
