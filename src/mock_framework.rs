//! # Mock Framework
//!
//! Utilities for testing dispatch callers in isolation.
//!
//! Use [`create_mock_dispatcher`] to get a dispatcher and the raw job queue,
//! then [`expect_job`] to take the next job and answer it by hand.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::dispatch::{Dispatcher, Job};

/// Creates a dispatcher whose jobs land in a queue the test controls.
///
/// No workers run: the test plays the worker, so it can reply, stall, or
/// drop the reply channel deterministically.
pub fn create_mock_dispatcher(
    buffer_size: usize,
    reply_timeout: Duration,
) -> (Dispatcher, mpsc::Receiver<Job>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (Dispatcher::new(sender, reply_timeout), receiver)
}

/// Waits up to a second for the next job.
pub async fn expect_job(receiver: &mut mpsc::Receiver<Job>) -> Option<Job> {
    tokio::time::timeout(Duration::from_secs(1), receiver.recv())
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::JobKind;
    use crate::domain::CartId;

    #[tokio::test]
    async fn test_expect_job_gives_up_when_idle() {
        let (_dispatcher, mut jobs) = create_mock_dispatcher(1, Duration::from_secs(1));
        assert!(expect_job(&mut jobs).await.is_none());
    }

    #[tokio::test]
    async fn test_mock_dispatcher_forwards_jobs() {
        let (dispatcher, mut jobs) = create_mock_dispatcher(1, Duration::from_secs(1));
        let kind = JobKind::FinalizeOrder {
            user_id: 4,
            cart_id: CartId::new(4, 9),
        };

        let submitted = kind.clone();
        let task = tokio::spawn(async move { dispatcher.submit(submitted).await });

        let job = expect_job(&mut jobs).await.expect("Expected a job");
        assert_eq!(job.kind, kind);
        drop(job);
        assert!(task.await.unwrap().is_err());
    }
}
