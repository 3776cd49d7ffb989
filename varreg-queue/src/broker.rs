//! Task broker contract and the in-memory implementation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::error::QueueError;
use crate::run::VcfTask;

/// Minimal broker surface. Tasks are acknowledged late: a consumed task
/// stays un-acked until the worker reports success or failure, so a lost
/// worker's tasks can be re-delivered with `nack`.
pub trait Broker: Send + Sync {
    fn submit(&self, task: VcfTask) -> Result<(), QueueError>;

    /// Take the next task, waiting up to `timeout`. `None` on timeout.
    fn consume(&self, timeout: Duration) -> Result<Option<VcfTask>, QueueError>;

    /// Acknowledge a consumed task; it will not be delivered again.
    fn ack(&self, run_id: &str) -> Result<(), QueueError>;

    /// Return a consumed task to the front of the queue for re-delivery.
    fn nack(&self, run_id: &str) -> Result<(), QueueError>;
}

#[derive(Default)]
struct BrokerInner {
    ready: VecDeque<VcfTask>,
    unacked: HashMap<String, VcfTask>,
}

/// Mutex/condvar broker for single-process deployments and tests.
#[derive(Default)]
pub struct InMemoryBroker {
    inner: Mutex<BrokerInner>,
    available: Condvar,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BrokerInner>, QueueError> {
        self.inner
            .lock()
            .map_err(|_| QueueError::Unavailable("broker lock poisoned".to_string()))
    }
}

impl Broker for InMemoryBroker {
    fn submit(&self, task: VcfTask) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        inner.ready.push_back(task);
        self.available.notify_one();
        Ok(())
    }

    fn consume(&self, timeout: Duration) -> Result<Option<VcfTask>, QueueError> {
        let mut inner = self.lock()?;
        if inner.ready.is_empty() {
            let (guard, result) = self
                .available
                .wait_timeout(inner, timeout)
                .map_err(|_| QueueError::Unavailable("broker lock poisoned".to_string()))?;
            inner = guard;
            if result.timed_out() && inner.ready.is_empty() {
                return Ok(None);
            }
        }
        match inner.ready.pop_front() {
            Some(task) => {
                inner.unacked.insert(task.run_id.clone(), task.clone());
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    fn ack(&self, run_id: &str) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        inner.unacked.remove(run_id);
        Ok(())
    }

    fn nack(&self, run_id: &str) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        if let Some(task) = inner.unacked.remove(run_id) {
            inner.ready.push_front(task);
            self.available.notify_one();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn task(id: &str) -> VcfTask {
        VcfTask {
            run_id: id.to_string(),
            input_path: PathBuf::from("/in"),
            output_path: PathBuf::from("/out"),
            for_ref: true,
        }
    }

    #[test]
    fn test_fifo_delivery() {
        let broker = InMemoryBroker::new();
        broker.submit(task("a")).unwrap();
        broker.submit(task("b")).unwrap();
        assert_eq!(
            broker.consume(Duration::from_millis(10)).unwrap().unwrap().run_id,
            "a"
        );
        assert_eq!(
            broker.consume(Duration::from_millis(10)).unwrap().unwrap().run_id,
            "b"
        );
        assert!(broker.consume(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn test_nack_redelivers() {
        let broker = InMemoryBroker::new();
        broker.submit(task("a")).unwrap();
        let consumed = broker.consume(Duration::from_millis(10)).unwrap().unwrap();
        broker.nack(&consumed.run_id).unwrap();
        let again = broker.consume(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(again.run_id, "a");
    }

    #[test]
    fn test_ack_is_final() {
        let broker = InMemoryBroker::new();
        broker.submit(task("a")).unwrap();
        let consumed = broker.consume(Duration::from_millis(10)).unwrap().unwrap();
        broker.ack(&consumed.run_id).unwrap();
        broker.nack(&consumed.run_id).unwrap();
        assert!(broker.consume(Duration::from_millis(10)).unwrap().is_none());
    }
}
