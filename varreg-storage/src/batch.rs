//! Batched write machinery.
//!
//! Inside a batch scope, object writes accumulate into fixed-size batches
//! that are handed to a single background writer through a bounded queue.
//! Producers block when the queue is full (natural backpressure, with a
//! deadline); the writer drains FIFO. The first write error poisons the
//! scope: every later push and the final drain report it until the scope
//! exits.
//!
//! Writer states: Idle (queue empty, nothing in flight) -> Draining (batch
//! popped) -> Idle, or -> Failed once an error is recorded.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::StorageError;
use crate::traits::Storage;

/// One buffered object write.
#[derive(Debug, Clone)]
pub(crate) struct ObjectRow {
    pub vrs_id: String,
    /// Serialized stored JSON.
    pub vrs_object: String,
    /// Derived location-index row, present for Alleles only.
    pub location: Option<LocationRow>,
}

/// Derived overlap-index row for an Allele.
#[derive(Debug, Clone)]
pub(crate) struct LocationRow {
    pub accession: String,
    pub start: u64,
    pub end: u64,
    pub state_length: u64,
}

#[derive(Debug, Default)]
struct QueueInner {
    pending: VecDeque<Vec<ObjectRow>>,
    in_flight: bool,
    closed: bool,
    error: Option<String>,
}

/// Bounded FIFO of pending batches shared between producers and the
/// background writer.
#[derive(Debug)]
pub(crate) struct BatchQueue {
    max_pending: usize,
    inner: Mutex<QueueInner>,
    /// Signaled when space frees up, a batch completes, or the queue closes.
    producer: Condvar,
    /// Signaled when work arrives or the queue closes.
    consumer: Condvar,
}

fn lock_error() -> StorageError {
    StorageError::Unavailable("batch queue lock poisoned".to_string())
}

impl BatchQueue {
    pub fn new(max_pending: usize) -> Arc<Self> {
        Arc::new(Self {
            max_pending: max_pending.max(1),
            inner: Mutex::new(QueueInner::default()),
            producer: Condvar::new(),
            consumer: Condvar::new(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueInner>, StorageError> {
        self.inner.lock().map_err(|_| lock_error())
    }

    /// Enqueue a batch, blocking while the queue is at capacity.
    pub fn push(&self, batch: Vec<ObjectRow>, timeout: Duration) -> Result<(), StorageError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock()?;
        loop {
            if let Some(err) = &inner.error {
                return Err(StorageError::BatchAborted(err.clone()));
            }
            if inner.closed {
                return Err(StorageError::InvalidBatchState("batch queue is closed"));
            }
            if inner.pending.len() < self.max_pending {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(StorageError::BackpressureTimeout(timeout));
            }
            let (guard, _) = self
                .producer
                .wait_timeout(inner, deadline - now)
                .map_err(|_| lock_error())?;
            inner = guard;
        }
        inner.pending.push_back(batch);
        self.consumer.notify_one();
        Ok(())
    }

    /// Writer side: take the next batch, or `None` when closed and empty.
    pub fn pop(&self) -> Option<Vec<ObjectRow>> {
        let mut inner = self.inner.lock().ok()?;
        loop {
            if let Some(batch) = inner.pending.pop_front() {
                inner.in_flight = true;
                self.producer.notify_all();
                return Some(batch);
            }
            if inner.closed {
                return None;
            }
            inner = self.consumer.wait(inner).ok()?;
        }
    }

    /// Writer side: report the outcome of the batch taken by `pop`.
    pub fn complete(&self, result: Result<(), String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.in_flight = false;
            if let Err(e) = result {
                // First error wins.
                inner.error.get_or_insert(e);
            }
            self.producer.notify_all();
        }
    }

    /// Whether an error has been recorded.
    pub fn error(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|g| g.error.clone())
    }

    /// Remove and return the recorded error, clearing the poisoned state.
    pub fn take_error(&self) -> Option<String> {
        self.inner.lock().ok().and_then(|mut g| g.error.take())
    }

    /// Block until everything pending and in flight has been applied.
    pub fn wait_drained(&self) -> Result<(), StorageError> {
        let mut inner = self.lock()?;
        loop {
            if let Some(err) = &inner.error {
                return Err(StorageError::BatchAborted(err.clone()));
            }
            if inner.pending.is_empty() && !inner.in_flight {
                return Ok(());
            }
            inner = self.producer.wait(inner).map_err(|_| lock_error())?;
        }
    }

    /// Close the queue; the writer exits once it runs dry. With
    /// `discard_pending`, batches not yet in flight are dropped.
    pub fn close(&self, discard_pending: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            if discard_pending {
                inner.pending.clear();
            }
            inner.closed = true;
            self.consumer.notify_all();
            self.producer.notify_all();
        }
    }

    #[cfg(test)]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().map(|g| g.pending.len()).unwrap_or(0)
    }
}

/// Scoped batch acquisition over a shared storage handle.
///
/// Entering starts batched-write mode on the storage; the scope guarantees
/// `end_batch` on every exit path. A normal drop flushes or discards
/// according to `flush_on_exit`; a drop during a panic discards pending
/// batches, matching cancellation semantics. Use [`close`](Self::close) to
/// observe flush errors instead of dropping.
pub struct BatchManager {
    storage: Arc<dyn Storage>,
    flush_on_exit: bool,
    finished: bool,
}

impl BatchManager {
    /// Enter a batch scope.
    pub fn enter(storage: Arc<dyn Storage>, flush_on_exit: bool) -> Result<Self, StorageError> {
        storage.begin_batch()?;
        Ok(Self {
            storage,
            flush_on_exit,
            finished: false,
        })
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Exit the scope, flushing per `flush_on_exit`, and surface any
    /// writer error.
    pub fn close(mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.storage.end_batch(self.flush_on_exit)
    }

    /// Exit the scope discarding pending batches.
    pub fn discard(mut self) -> Result<(), StorageError> {
        self.finished = true;
        self.storage.end_batch(false)
    }
}

impl Drop for BatchManager {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let flush = self.flush_on_exit && !std::thread::panicking();
        if let Err(e) = self.storage.end_batch(flush) {
            tracing::error!(error = %e, "batch scope teardown failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn row(id: &str) -> ObjectRow {
        ObjectRow {
            vrs_id: id.to_string(),
            vrs_object: "{}".to_string(),
            location: None,
        }
    }

    #[test]
    fn test_push_pop_fifo() {
        let q = BatchQueue::new(4);
        q.push(vec![row("a")], Duration::from_secs(1)).unwrap();
        q.push(vec![row("b")], Duration::from_secs(1)).unwrap();
        assert_eq!(q.pop().unwrap()[0].vrs_id, "a");
        q.complete(Ok(()));
        assert_eq!(q.pop().unwrap()[0].vrs_id, "b");
        q.complete(Ok(()));
        q.close(false);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_backpressure_times_out() {
        let q = BatchQueue::new(2);
        q.push(vec![row("a")], Duration::from_millis(10)).unwrap();
        q.push(vec![row("b")], Duration::from_millis(10)).unwrap();
        let err = q.push(vec![row("c")], Duration::from_millis(50)).unwrap_err();
        assert!(matches!(err, StorageError::BackpressureTimeout(_)));
    }

    #[test]
    fn test_backpressure_unblocks_when_batch_drains() {
        let q = BatchQueue::new(1);
        q.push(vec![row("a")], Duration::from_millis(10)).unwrap();

        let q2 = Arc::clone(&q);
        let drainer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            let batch = q2.pop().unwrap();
            q2.complete(Ok(()));
            batch[0].vrs_id.clone()
        });

        let started = Instant::now();
        q.push(vec![row("b")], Duration::from_secs(5)).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(drainer.join().unwrap(), "a");
    }

    #[test]
    fn test_error_poisons_and_unblocks() {
        let q = BatchQueue::new(1);
        q.push(vec![row("a")], Duration::from_millis(10)).unwrap();

        let q2 = Arc::clone(&q);
        let failer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let _ = q2.pop();
            q2.complete(Err("disk on fire".to_string()));
        });

        // This producer is blocked on a full queue when the writer fails.
        let err = q.push(vec![row("b")], Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, StorageError::BatchAborted(_)));
        failer.join().unwrap();

        assert!(matches!(
            q.wait_drained(),
            Err(StorageError::BatchAborted(_))
        ));
        assert_eq!(q.take_error().unwrap(), "disk on fire");
        assert!(q.error().is_none());
    }

    #[test]
    fn test_wait_drained_waits_for_in_flight() {
        let q = BatchQueue::new(4);
        q.push(vec![row("a")], Duration::from_secs(1)).unwrap();

        let q2 = Arc::clone(&q);
        let writer = thread::spawn(move || {
            let batch = q2.pop().unwrap();
            thread::sleep(Duration::from_millis(100));
            q2.complete(Ok(()));
            batch.len()
        });

        let started = Instant::now();
        q.wait_drained().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(writer.join().unwrap(), 1);
    }

    #[test]
    fn test_close_discards_pending() {
        let q = BatchQueue::new(4);
        q.push(vec![row("a")], Duration::from_secs(1)).unwrap();
        q.push(vec![row("b")], Duration::from_secs(1)).unwrap();
        q.close(true);
        assert_eq!(q.pending_len(), 0);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_push_after_close_rejected() {
        let q = BatchQueue::new(4);
        q.close(false);
        assert!(matches!(
            q.push(vec![row("a")], Duration::from_millis(10)),
            Err(StorageError::InvalidBatchState(_))
        ));
    }
}
