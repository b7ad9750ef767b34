//! Cache janitor: a fixed daily job that evicts the picture caches so a new
//! day's picture is never served stale. Registered even when no chat has a
//! schedule.

use std::sync::Arc;

use apodbot_core::time::SendTime;
use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::engine::{JobCallback, TriggerEngine};

/// Engine id of the janitor job. Cannot collide with `send_task_*` ids.
pub const JANITOR_JOB_ID: &str = "apod_cache_janitor";

/// Something holding day-scoped cached data.
#[async_trait]
pub trait CacheEvictor: Send + Sync {
    async fn evict(&self);
}

/// Register the daily eviction job at `at`.
pub fn register_janitor(
    engine: &TriggerEngine,
    at: SendTime,
    evictor: Arc<dyn CacheEvictor>,
) -> Option<DateTime<Local>> {
    let callback: JobCallback = Arc::new(move || {
        let evictor = Arc::clone(&evictor);
        Box::pin(async move {
            tracing::info!("🧹 Evicting daily picture caches");
            evictor.evict().await;
        })
    });
    engine.schedule(JANITOR_JOB_ID, at, callback)
}
