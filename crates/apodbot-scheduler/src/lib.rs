//! # apodbot scheduler
//!
//! Durable per-chat daily schedules for the picture-of-the-day bot.
//!
//! ## Architecture
//! ```text
//! SchedulerService
//!   ├── ScheduleStore   apod_task_config.json, one store-wide lock
//!   ├── TriggerEngine   daily jobs keyed by id, one run per id at a time
//!   │     ├── send_task_<sha256(target)> → DeliveryHandler::deliver(target)
//!   │     └── apod_cache_janitor         → CacheEvictor::evict()
//!   └── recover()       store → engine, once at startup
//! ```

pub mod codec;
pub mod cron;
pub mod engine;
pub mod janitor;
pub mod recovery;
pub mod service;
pub mod store;

pub use engine::{JobCallback, JobInfo, TriggerEngine};
pub use janitor::{CacheEvictor, JANITOR_JOB_ID, register_janitor};
pub use recovery::RecoveryReport;
pub use service::{
    DeliveryHandler, ScheduleCommand, ScheduleReply, ScheduleStatus, SchedulerService, StartReport,
};
pub use store::{ScheduleEntry, ScheduleStore, TaskRecord};
