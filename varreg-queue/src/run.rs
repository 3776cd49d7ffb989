//! Run records and their state machine.
//!
//! `Pending --(worker picks up)--> Running --> Completed | Failed`.
//! Expiry is not a stored state: once `ttl_expires_at` passes, the record
//! is purged and the run becomes unknown.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One unit of queued VCF work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcfTask {
    pub run_id: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub for_ref: bool,
}

/// The persisted state of a run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub error_message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub ttl_expires_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ttl_expires_at
    }

    /// Status with the hard time limit applied: a run still marked
    /// `Running` past the limit reads as failed (the worker is presumed
    /// lost). The supervisor uses the same predicate to persist the
    /// failure and reclaim the task; pollers applying it directly just
    /// cover the window before the next supervisor scan.
    pub fn observed_status(&self, hard_time_limit: Duration, now: DateTime<Utc>) -> RunStatus {
        if self.status == RunStatus::Running {
            if let Some(started) = self.started_at {
                let elapsed = now.signed_duration_since(started);
                if elapsed.num_seconds() >= 0
                    && elapsed.num_seconds() as u64 >= hard_time_limit.as_secs()
                {
                    return RunStatus::Failed;
                }
            }
        }
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: RunStatus) -> RunRecord {
        let now = Utc::now();
        RunRecord {
            run_id: "r1".to_string(),
            status,
            input_path: PathBuf::from("/in"),
            output_path: PathBuf::from("/out"),
            error_message: None,
            submitted_at: now,
            started_at: Some(now),
            completed_at: None,
            ttl_expires_at: now + chrono::Duration::hours(2),
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }

    #[test]
    fn test_observed_status_hard_limit() {
        let mut rec = record(RunStatus::Running);
        rec.started_at = Some(Utc::now() - chrono::Duration::hours(3));
        assert_eq!(
            rec.observed_status(Duration::from_secs(3900), Utc::now()),
            RunStatus::Failed
        );

        let fresh = record(RunStatus::Running);
        assert_eq!(
            fresh.observed_status(Duration::from_secs(3900), Utc::now()),
            RunStatus::Running
        );
    }

    #[test]
    fn test_expiry() {
        let mut rec = record(RunStatus::Completed);
        assert!(!rec.is_expired(Utc::now()));
        rec.ttl_expires_at = Utc::now() - chrono::Duration::seconds(1);
        assert!(rec.is_expired(Utc::now()));
    }
}
