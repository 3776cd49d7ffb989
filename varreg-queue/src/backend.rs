//! Run-state backend contract and the in-memory implementation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use crate::error::QueueError;
use crate::run::{RunRecord, RunStatus};

/// Where run state lives between submission and expiry.
///
/// Terminal states are sticky: once a run is `Completed` or `Failed`, the
/// `mark_*` methods leave it unchanged, so a late worker and the
/// hard-limit supervisor cannot overwrite each other.
pub trait ResultBackend: Send + Sync {
    /// Record a newly submitted run. Fails with `RunIdConflict` if the id
    /// is already in use by a non-expired run.
    fn create(&self, run_id: &str, input_path: &Path, output_path: &Path)
        -> Result<(), QueueError>;

    fn mark_running(&self, run_id: &str) -> Result<(), QueueError>;

    fn mark_completed(&self, run_id: &str) -> Result<(), QueueError>;

    fn mark_failed(&self, run_id: &str, error: &str) -> Result<(), QueueError>;

    /// Fetch a run's record; expired runs read as absent.
    fn get(&self, run_id: &str) -> Result<Option<RunRecord>, QueueError>;

    /// All runs currently marked running, for hard-limit supervision.
    fn list_running(&self) -> Result<Vec<RunRecord>, QueueError>;

    /// Drop expired records; returns how many were purged.
    fn purge_expired(&self) -> Result<usize, QueueError>;
}

/// HashMap-backed result store with TTL stamps.
pub struct InMemoryResultBackend {
    ttl: chrono::Duration,
    runs: Mutex<HashMap<String, RunRecord>>,
}

impl InMemoryResultBackend {
    pub fn new(result_expires: Duration) -> Self {
        Self {
            ttl: chrono::Duration::seconds(result_expires.as_secs() as i64),
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, RunRecord>>, QueueError> {
        self.runs
            .lock()
            .map_err(|_| QueueError::Unavailable("result backend lock poisoned".to_string()))
    }

    fn update(
        &self,
        run_id: &str,
        apply: impl FnOnce(&mut RunRecord),
    ) -> Result<(), QueueError> {
        let mut runs = self.lock()?;
        match runs.get_mut(run_id) {
            Some(record) => {
                apply(record);
                Ok(())
            }
            None => Err(QueueError::RunUnknown(run_id.to_string())),
        }
    }
}

impl ResultBackend for InMemoryResultBackend {
    fn create(
        &self,
        run_id: &str,
        input_path: &Path,
        output_path: &Path,
    ) -> Result<(), QueueError> {
        let now = Utc::now();
        let mut runs = self.lock()?;
        if let Some(existing) = runs.get(run_id) {
            if !existing.is_expired(now) {
                return Err(QueueError::RunIdConflict(run_id.to_string()));
            }
        }
        runs.insert(
            run_id.to_string(),
            RunRecord {
                run_id: run_id.to_string(),
                status: RunStatus::Pending,
                input_path: input_path.to_path_buf(),
                output_path: output_path.to_path_buf(),
                error_message: None,
                submitted_at: now,
                started_at: None,
                completed_at: None,
                ttl_expires_at: now + self.ttl,
            },
        );
        Ok(())
    }

    fn mark_running(&self, run_id: &str) -> Result<(), QueueError> {
        self.update(run_id, |record| {
            if !record.status.is_terminal() {
                record.status = RunStatus::Running;
                record.started_at = Some(Utc::now());
            }
        })
    }

    fn mark_completed(&self, run_id: &str) -> Result<(), QueueError> {
        self.update(run_id, |record| {
            if !record.status.is_terminal() {
                record.status = RunStatus::Completed;
                record.completed_at = Some(Utc::now());
            }
        })
    }

    fn mark_failed(&self, run_id: &str, error: &str) -> Result<(), QueueError> {
        self.update(run_id, |record| {
            if !record.status.is_terminal() {
                record.status = RunStatus::Failed;
                record.error_message = Some(error.to_string());
                record.completed_at = Some(Utc::now());
            }
        })
    }

    fn get(&self, run_id: &str) -> Result<Option<RunRecord>, QueueError> {
        let runs = self.lock()?;
        Ok(runs
            .get(run_id)
            .filter(|record| !record.is_expired(Utc::now()))
            .cloned())
    }

    fn list_running(&self) -> Result<Vec<RunRecord>, QueueError> {
        let now = Utc::now();
        let runs = self.lock()?;
        Ok(runs
            .values()
            .filter(|record| record.status == RunStatus::Running && !record.is_expired(now))
            .cloned()
            .collect())
    }

    fn purge_expired(&self) -> Result<usize, QueueError> {
        let now = Utc::now();
        let mut runs = self.lock()?;
        let before = runs.len();
        runs.retain(|_, record| !record.is_expired(now));
        Ok(before - runs.len())
    }
}
