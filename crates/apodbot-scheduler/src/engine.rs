//! Trigger engine — the main loop that checks and fires daily jobs.
//! Uses tokio::interval for zero-overhead ticking (sleeps between checks).
//!
//! Jobs are keyed by id: scheduling an existing id replaces it. A job id never
//! runs twice at once: a fire that arrives while the previous run is still in
//! flight is dropped, even if the job was replaced in between.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use apodbot_core::time::SendTime;
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::cron;

/// Work executed when a job fires.
pub type JobCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct Job {
    at: SendTime,
    callback: JobCallback,
    next_run: Option<DateTime<Local>>,
}

/// Snapshot of a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: String,
    pub at: SendTime,
    pub next_run: Option<DateTime<Local>>,
    pub running: bool,
}

/// In-process daily trigger engine.
#[derive(Default)]
pub struct TriggerEngine {
    jobs: Mutex<HashMap<String, Job>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl TriggerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a daily job, replacing any job with the same id.
    /// Returns the next fire time.
    pub fn schedule(&self, id: &str, at: SendTime, callback: JobCallback) -> Option<DateTime<Local>> {
        let next_run = cron::next_daily_run(at, &Local::now());
        let job = Job {
            at,
            callback,
            next_run,
        };
        let replaced = self.jobs.lock().insert(id.to_string(), job).is_some();
        if replaced {
            tracing::info!("📅 Job replaced: {id} (daily {at})");
        } else {
            tracing::info!("📅 Job added: {id} (daily {at})");
        }
        next_run
    }

    /// Remove a job. Absent ids are a no-op. A run already in flight finishes.
    pub fn cancel(&self, id: &str) -> bool {
        let removed = self.jobs.lock().remove(id).is_some();
        if removed {
            tracing::info!("🗑️ Job cancelled: {id}");
        }
        removed
    }

    /// Next fire time, or `None` if the job does not exist.
    pub fn next_fire(&self, id: &str) -> Option<DateTime<Local>> {
        self.jobs.lock().get(id).and_then(|job| job.next_run)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.lock().contains_key(id)
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.in_flight.lock().contains(id)
    }

    pub fn job(&self, id: &str) -> Option<JobInfo> {
        let running = self.is_running(id);
        self.jobs.lock().get(id).map(|job| JobInfo {
            id: id.to_string(),
            at: job.at,
            next_run: job.next_run,
            running,
        })
    }

    pub fn job_count(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Fire every due job. See [`TriggerEngine::tick_at`].
    pub fn tick(&self) -> Vec<String> {
        self.tick_at(Local::now())
    }

    /// Fire every job whose next run is at or before `now` and advance it to
    /// the following day. Late ticks fire a job once, never once per missed day.
    /// Returns the ids that were actually started.
    pub fn tick_at(&self, now: DateTime<Local>) -> Vec<String> {
        let due: Vec<(String, JobCallback)> = {
            let mut jobs = self.jobs.lock();
            jobs.iter_mut()
                .filter(|(_, job)| job.next_run.is_some_and(|next| next <= now))
                .map(|(id, job)| {
                    job.next_run = cron::next_daily_run(job.at, &now);
                    (id.clone(), Arc::clone(&job.callback))
                })
                .collect()
        };

        let mut started = Vec::with_capacity(due.len());
        for (id, callback) in due {
            if !self.in_flight.lock().insert(id.clone()) {
                tracing::warn!("⏭️ Job {id} still running — skipping this fire");
                continue;
            }
            tracing::info!("🔔 Job triggered: {id}");
            let guard = InFlightGuard {
                id: id.clone(),
                in_flight: Arc::clone(&self.in_flight),
            };
            tokio::spawn(async move {
                let _guard = guard;
                callback().await;
            });
            started.push(id);
        }
        started
    }

    /// Spawn the tick loop as a background tokio task.
    pub fn spawn(self: Arc<Self>, check_interval: Duration) -> JoinHandle<()> {
        tracing::info!(
            "⏰ Trigger engine started (check every {}s, {} jobs)",
            check_interval.as_secs(),
            self.job_count()
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(check_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.tick();
            }
        })
    }
}

/// Clears the in-flight mark when a run ends, including by panic.
struct InFlightGuard {
    id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn counting(counter: Arc<AtomicUsize>) -> JobCallback {
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    fn at(s: &str) -> SendTime {
        SendTime::parse(s).unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_schedule_and_next_fire() {
        let engine = TriggerEngine::new();
        let next = engine.schedule("a", at("13:30"), counting(Arc::default()));
        assert!(next.is_some());
        assert_eq!(engine.next_fire("a"), next);
        assert!(engine.next_fire("missing").is_none());
    }

    #[tokio::test]
    async fn test_replace_keeps_single_job() {
        let engine = TriggerEngine::new();
        engine.schedule("a", at("09:00"), counting(Arc::default()));
        engine.schedule("a", at("10:00"), counting(Arc::default()));
        assert_eq!(engine.job_count(), 1);
        assert_eq!(engine.job("a").unwrap().at, at("10:00"));
    }

    #[tokio::test]
    async fn test_cancel_absent_is_noop() {
        let engine = TriggerEngine::new();
        assert!(!engine.cancel("nope"));
        engine.schedule("a", at("09:00"), counting(Arc::default()));
        assert!(engine.cancel("a"));
        assert!(!engine.contains("a"));
    }

    #[tokio::test]
    async fn test_tick_fires_due_job_once_and_advances() {
        let engine = TriggerEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let first = engine
            .schedule("a", at("08:00"), counting(Arc::clone(&counter)))
            .unwrap();

        assert!(engine.tick_at(first - chrono::Duration::seconds(1)).is_empty());

        let fired = engine.tick_at(first + chrono::Duration::seconds(1));
        assert_eq!(fired, vec!["a".to_string()]);
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let next = engine.next_fire("a").unwrap();
        assert!(next > first);
        // Same instant again: not due any more.
        assert!(engine.tick_at(first + chrono::Duration::seconds(2)).is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_fire_is_dropped() {
        let engine = TriggerEngine::new();
        let release = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let callback: JobCallback = {
            let release = Arc::clone(&release);
            let runs = Arc::clone(&runs);
            Arc::new(move || {
                let release = Arc::clone(&release);
                let runs = Arc::clone(&runs);
                Box::pin(async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    release.notified().await;
                })
            })
        };

        let first = engine.schedule("a", at("08:00"), Arc::clone(&callback)).unwrap();
        assert_eq!(engine.tick_at(first).len(), 1);
        settle().await;
        assert!(engine.is_running("a"));

        // Replacing the job does not lift the in-flight guard.
        let second = engine.schedule("a", at("08:00"), callback).unwrap();
        let later = second.max(first) + chrono::Duration::days(1);
        assert!(engine.tick_at(later).is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        release.notify_one();
        settle().await;
        assert!(!engine.is_running("a"));
    }

    #[tokio::test]
    async fn test_distinct_jobs_fire_together() {
        let engine = TriggerEngine::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let a = engine.schedule("a", at("08:00"), counting(Arc::clone(&counter))).unwrap();
        let b = engine.schedule("b", at("08:00"), counting(Arc::clone(&counter))).unwrap();
        let fired = engine.tick_at(a.max(b));
        assert_eq!(fired.len(), 2);
        settle().await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
