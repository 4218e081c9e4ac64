use std::str::FromStr;
use std::time::Duration;

use crate::dispatch::{PipelineSettings, RetryPolicy};
use crate::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis { url: String },
}

/// Engine configuration.
///
/// # Environment
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | STORE_BACKEND | memory | `memory` or `redis` |
/// | REDIS_URL | redis://127.0.0.1:6379/ | Redis endpoint |
/// | QUEUE_CAPACITY | 2000 | jobs waiting before submitters block |
/// | WORKER_COUNT | 250 | store workers, one connection each |
/// | REPLY_TIMEOUT_MS | 5000 | how long a submitter waits for its reply |
/// | RECONNECT_BACKOFF_MS | 100 | worker pause after a transport failure |
/// | STOCK_REFRESH_SECS | 5 | catalog stock refresh period |
/// | SEED_FILE | seed.json | catalog and user seed |
/// | ADMIN_USER_ID | 1 | user allowed to list every order |
/// | RETRY_ATTEMPTS | 3 | submissions per job while the store is unreachable |
/// | RETRY_BACKOFF_MS | 50 | base wait between submissions |
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: StoreBackend,
    pub pipeline: PipelineSettings,
    pub retry: RetryPolicy,
    pub stock_refresh: Duration,
    pub seed_file: String,
    pub admin_user_id: UserId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            pipeline: PipelineSettings::default(),
            retry: RetryPolicy::default(),
            stock_refresh: Duration::from_secs(5),
            seed_file: "seed.json".into(),
            admin_user_id: 1,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source. Unset or unparsable
    /// values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let backend = match lookup("STORE_BACKEND").as_deref() {
            Some("redis") => StoreBackend::Redis {
                url: lookup("REDIS_URL").unwrap_or_else(|| "redis://127.0.0.1:6379/".into()),
            },
            _ => StoreBackend::Memory,
        };

        Self {
            backend,
            pipeline: PipelineSettings {
                queue_capacity: parse_or(
                    &lookup,
                    "QUEUE_CAPACITY",
                    defaults.pipeline.queue_capacity,
                ),
                workers: parse_or(&lookup, "WORKER_COUNT", defaults.pipeline.workers),
                reply_timeout: Duration::from_millis(parse_or(&lookup, "REPLY_TIMEOUT_MS", 5000)),
                reconnect_backoff: Duration::from_millis(parse_or(&lookup, "RECONNECT_BACKOFF_MS", 100)),
            },
            retry: RetryPolicy {
                max_attempts: parse_or(&lookup, "RETRY_ATTEMPTS", defaults.retry.max_attempts),
                backoff: Duration::from_millis(parse_or(&lookup, "RETRY_BACKOFF_MS", 50)),
            },
            stock_refresh: Duration::from_secs(parse_or(&lookup, "STOCK_REFRESH_SECS", 5)),
            seed_file: lookup("SEED_FILE").unwrap_or(defaults.seed_file),
            admin_user_id: parse_or(&lookup, "ADMIN_USER_ID", defaults.admin_user_id),
        }
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    lookup(name)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}
