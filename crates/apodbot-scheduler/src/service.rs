//! Scheduler service — the management surface for per-target daily sends.
//!
//! Owns the schedule store, shares the trigger engine, and wires every job to
//! a [`DeliveryHandler`]. The store is the source of truth; engine jobs are a
//! derived cache rebuilt by [`SchedulerService::recover`](crate::recovery).

use std::sync::Arc;

use apodbot_core::error::Result;
use apodbot_core::time::SendTime;
use apodbot_core::types::Target;
use async_trait::async_trait;
use chrono::{DateTime, Local};

use crate::codec;
use crate::engine::{JobCallback, TriggerEngine};
use crate::store::{ScheduleEntry, ScheduleStore};

/// Performs one delivery to a target when its job fires.
#[async_trait]
pub trait DeliveryHandler: Send + Sync {
    async fn deliver(&self, target: Target);
}

/// Schedule management request, decoded once by the command front-end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleCommand {
    Status,
    Stop,
    /// Start with an explicit `HH:MM`, or the configured default.
    Start(Option<String>),
}

/// Result of a [`ScheduleCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleReply {
    Status(ScheduleStatus),
    Stopped { was_scheduled: bool },
    Started(StartReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleStatus {
    pub running: bool,
    pub next_fire: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartReport {
    pub send_time: SendTime,
    /// Whether the default time was used because none was given.
    pub used_default: bool,
    pub next_fire: Option<DateTime<Local>>,
}

/// Per-target schedule management.
pub struct SchedulerService {
    pub(crate) store: ScheduleStore,
    pub(crate) engine: Arc<TriggerEngine>,
    handler: Arc<dyn DeliveryHandler>,
    default_time: SendTime,
}

impl SchedulerService {
    pub fn new(
        store: ScheduleStore,
        engine: Arc<TriggerEngine>,
        handler: Arc<dyn DeliveryHandler>,
        default_time: SendTime,
    ) -> Self {
        Self {
            store,
            engine,
            handler,
            default_time,
        }
    }

    pub fn store(&self) -> &ScheduleStore {
        &self.store
    }

    pub fn engine(&self) -> &Arc<TriggerEngine> {
        &self.engine
    }

    /// Dispatch a decoded command.
    pub async fn handle(&self, target: &Target, command: ScheduleCommand) -> Result<ScheduleReply> {
        match command {
            ScheduleCommand::Status => Ok(ScheduleReply::Status(self.status(target))),
            ScheduleCommand::Stop => Ok(ScheduleReply::Stopped {
                was_scheduled: self.stop(target).await?,
            }),
            ScheduleCommand::Start(time) => {
                Ok(ScheduleReply::Started(self.start(target, time.as_deref()).await?))
            }
        }
    }

    /// Schedule (or reschedule) the daily send for `target`.
    ///
    /// The time is validated before anything is touched. The row is persisted
    /// before the job is registered, so a failed write leaves the previous
    /// schedule fully in place.
    pub async fn start(&self, target: &Target, time: Option<&str>) -> Result<StartReport> {
        let (send_time, used_default) = match time {
            Some(raw) => (SendTime::parse(raw)?, false),
            None => (self.default_time, true),
        };

        let locked = self.store.lock().await;
        locked
            .upsert(&ScheduleEntry::new(target.clone(), send_time))
            .await?;
        let next_fire = self.register(target.clone(), send_time);
        drop(locked);

        tracing::info!("✅ Daily APOD for {target} at {send_time}");
        Ok(StartReport {
            send_time,
            used_default,
            next_fire,
        })
    }

    /// Cancel the daily send for `target`. Returns whether anything was scheduled.
    ///
    /// If the row cannot be removed the cancelled job is registered again, so
    /// the live schedule keeps matching the persisted one.
    pub async fn stop(&self, target: &Target) -> Result<bool> {
        let id = codec::job_id(target);
        let locked = self.store.lock().await;
        let live = self.engine.job(&id).map(|job| job.at);
        let cancelled = self.engine.cancel(&id);
        let removed = match locked.remove(target).await {
            Ok(removed) => removed,
            Err(e) => {
                if let Some(at) = live {
                    self.register(target.clone(), at);
                    tracing::warn!("⚠️ Stop for {target} not persisted, job restored at {at}");
                }
                return Err(e);
            }
        };
        drop(locked);

        if !cancelled && !removed {
            tracing::info!("No daily APOD scheduled for {target}");
        }
        Ok(cancelled || removed)
    }

    pub fn status(&self, target: &Target) -> ScheduleStatus {
        let id = codec::job_id(target);
        ScheduleStatus {
            running: self.engine.contains(&id),
            next_fire: self.engine.next_fire(&id),
        }
    }

    /// Register the engine job for one entry. Caller holds the store lock.
    pub(crate) fn register(&self, target: Target, send_time: SendTime) -> Option<DateTime<Local>> {
        let id = codec::job_id(&target);
        self.engine.schedule(&id, send_time, self.delivery_job(target))
    }

    fn delivery_job(&self, target: Target) -> JobCallback {
        let handler = Arc::clone(&self.handler);
        Arc::new(move || {
            let handler = Arc::clone(&handler);
            let target = target.clone();
            Box::pin(async move { handler.deliver(target).await })
        })
    }
}
