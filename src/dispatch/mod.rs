//! Bounded job queue feeding a fixed pool of store workers.
//!
//! Callers hold a [`Dispatcher`] and await a single reply per job. Jobs carry
//! no ordering guarantee between workers; correctness rests on the store's
//! atomic transitions.

mod client;
mod job;
mod pipeline;
mod retry;
mod worker;

pub use client::Dispatcher;
pub use job::{Job, JobKind};
pub use pipeline::{Pipeline, PipelineSettings};
pub use retry::RetryPolicy;
