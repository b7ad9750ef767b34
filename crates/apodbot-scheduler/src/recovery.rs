//! Startup recovery. Rebuilds engine jobs from the persisted schedule.

use crate::service::SchedulerService;

/// Outcome of a recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub restored: usize,
    pub skipped: usize,
}

impl SchedulerService {
    /// Re-register every persisted row. Run once, before the engine loop starts.
    ///
    /// A row that fails to decode is logged and skipped; it never stops the
    /// remaining rows from being restored.
    pub async fn recover(&self) -> RecoveryReport {
        let locked = self.store.lock().await;
        let records = locked.load_records().await;
        let mut report = RecoveryReport::default();

        for (idx, record) in records.iter().enumerate() {
            match record.decode() {
                Ok(entry) => {
                    let next = self.register(entry.target.clone(), entry.send_time);
                    tracing::debug!(
                        "♻️ Restored {} at {} (next: {:?})",
                        entry.target,
                        entry.send_time,
                        next
                    );
                    report.restored += 1;
                }
                Err(e) => {
                    tracing::error!("❌ Schedule row {idx} not restored: {e}");
                    report.skipped += 1;
                }
            }
        }
        drop(locked);

        tracing::info!(
            "♻️ Recovery done: {} restored, {} skipped",
            report.restored,
            report.skipped
        );
        report
    }
}
