//! The VCF run worker and its hard-limit supervisor.
//!
//! The worker takes one task at a time: consume, mark running, drive the
//! annotate pipeline with a soft-limit deadline, publish the output
//! atomically (write-temp-then-rename), then ack. Failures are caught and
//! recorded on the run; they never propagate through the broker.
//! Re-execution after re-delivery is safe because identifiers are
//! deterministic.
//!
//! The supervisor runs on its own thread so it can act while the worker
//! is blocked: it periodically scans running records, and any run past
//! the hard time limit is marked failed in the backend and its task
//! nacked back to the queue. A worker that later receives a task for an
//! already-terminal run drops it.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;

use varreg::Registry;
use varreg_vcf::{AnnotateOptions, VcfRegistrar};

use crate::backend::ResultBackend;
use crate::broker::Broker;
use crate::run::{RunStatus, VcfTask};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub soft_time_limit: Duration,
    pub hard_time_limit: Duration,
    /// How long one broker poll blocks before housekeeping runs.
    pub poll_interval: Duration,
    /// How often the supervisor scans for hard-limit violations.
    pub supervisor_interval: Duration,
    /// Flush the storage batch scope when a file completes.
    pub flush_on_exit: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            soft_time_limit: Duration::from_secs(3600),
            hard_time_limit: Duration::from_secs(3900),
            poll_interval: Duration::from_millis(500),
            supervisor_interval: Duration::from_secs(5),
            flush_on_exit: true,
        }
    }
}

/// Handle to the worker and supervisor threads.
pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for the in-flight task to finish.
    pub fn stop(mut self) {
        self.join_all();
    }

    fn join_all(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.join_all();
    }
}

/// Sleep in short slices so shutdown stays responsive.
fn sleep_until_shutdown(shutdown: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    while !shutdown.load(Ordering::Relaxed) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50).min(duration));
    }
}

/// Spawn the worker loop and its hard-limit supervisor, each on its own
/// thread.
///
/// The worker owns its registry instance (its own storage connection);
/// sharing one with concurrent request handlers would contend for the
/// single batch scope. The supervisor shares nothing with the worker but
/// the broker and backend, so it keeps acting when the worker is wedged.
pub fn spawn_worker(
    registry: Arc<Registry>,
    broker: Arc<dyn Broker>,
    backend: Arc<dyn ResultBackend>,
    config: WorkerConfig,
) -> WorkerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));

    let worker = {
        let shutdown = Arc::clone(&shutdown);
        let broker = Arc::clone(&broker);
        let backend = Arc::clone(&backend);
        let config = config.clone();
        thread::spawn(move || {
            tracing::info!("vcf worker started");
            while !shutdown.load(Ordering::Relaxed) {
                match broker.consume(config.poll_interval) {
                    Ok(Some(task)) => {
                        process_task(&registry, broker.as_ref(), backend.as_ref(), &config, task)
                    }
                    Ok(None) => {
                        if let Err(e) = backend.purge_expired() {
                            tracing::warn!(error = %e, "purging expired runs failed");
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "broker consume failed");
                        thread::sleep(config.poll_interval);
                    }
                }
            }
            tracing::info!("vcf worker stopped");
        })
    };

    let supervisor = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            tracing::info!("run supervisor started");
            while !shutdown.load(Ordering::Relaxed) {
                supervise_running(broker.as_ref(), backend.as_ref(), &config);
                sleep_until_shutdown(&shutdown, config.supervisor_interval);
            }
            tracing::info!("run supervisor stopped");
        })
    };

    WorkerHandle {
        shutdown,
        handles: vec![worker, supervisor],
    }
}

/// One supervisor pass: fail every running run past the hard limit and
/// return its task to the queue.
///
/// The worker thread itself cannot be killed; what the supervisor
/// guarantees is that the run reaches an observable terminal state and
/// that the task becomes available to a live worker again.
fn supervise_running(broker: &dyn Broker, backend: &dyn ResultBackend, config: &WorkerConfig) {
    let records = match backend.list_running() {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(error = %e, "supervisor cannot list running runs");
            return;
        }
    };
    let now = Utc::now();
    for record in records {
        if record.observed_status(config.hard_time_limit, now) != RunStatus::Failed {
            continue;
        }
        tracing::error!(run_id = %record.run_id, "hard time limit exceeded, failing run");
        if let Err(e) = backend.mark_failed(&record.run_id, "hard time limit exceeded") {
            tracing::warn!(run_id = %record.run_id, error = %e, "cannot mark run failed");
        }
        if let Err(e) = broker.nack(&record.run_id) {
            tracing::warn!(run_id = %record.run_id, error = %e, "cannot nack run task");
        }
    }
}

fn process_task(
    registry: &Registry,
    broker: &dyn Broker,
    backend: &dyn ResultBackend,
    config: &WorkerConfig,
    task: VcfTask,
) {
    let run_id = task.run_id.clone();
    tracing::info!(run_id = %run_id, input = %task.input_path.display(), "run picked up");

    // Tasks can be re-delivered after a supervisor intervention or TTL
    // expiry; runs that are already settled or gone are dropped.
    match backend.get(&run_id) {
        Ok(Some(record)) if !record.status.is_terminal() => {}
        Ok(Some(_)) => {
            tracing::warn!(run_id = %run_id, "dropping re-delivered task for terminal run");
            let _ = broker.ack(&run_id);
            return;
        }
        Ok(None) => {
            tracing::warn!(run_id = %run_id, "dropping task for unknown or expired run");
            let _ = broker.ack(&run_id);
            return;
        }
        Err(e) => {
            tracing::warn!(run_id = %run_id, error = %e, "cannot read run state");
            let _ = broker.ack(&run_id);
            return;
        }
    }

    if let Err(e) = backend.mark_running(&run_id) {
        tracing::warn!(run_id = %run_id, error = %e, "cannot mark run running");
        let _ = broker.ack(&run_id);
        return;
    }

    let options = AnnotateOptions {
        for_ref: task.for_ref,
        flush_on_exit: config.flush_on_exit,
        deadline: Some(Instant::now() + config.soft_time_limit),
    };

    // Write next to the final path, publish with an atomic rename.
    let partial_path = {
        let mut name = task.output_path.as_os_str().to_os_string();
        name.push(".part");
        std::path::PathBuf::from(name)
    };

    let outcome = VcfRegistrar::new(registry)
        .annotate(&task.input_path, &partial_path, &options)
        .and_then(|stats| {
            fs::rename(&partial_path, &task.output_path)?;
            Ok(stats)
        });

    match outcome {
        Ok(stats) => {
            if let Err(e) = backend.mark_completed(&run_id) {
                tracing::warn!(run_id = %run_id, error = %e, "cannot mark run completed");
            }
            if let Err(e) = fs::remove_file(&task.input_path) {
                tracing::warn!(run_id = %run_id, error = %e, "cannot remove run input");
            }
            tracing::info!(
                run_id = %run_id,
                records = stats.records,
                registered = stats.registered,
                failed_slots = stats.failed_slots,
                "run completed"
            );
        }
        Err(e) => {
            let _ = fs::remove_file(&partial_path);
            tracing::error!(run_id = %run_id, error = %e, "run failed");
            if let Err(mark_err) = backend.mark_failed(&run_id, &e.to_string()) {
                tracing::warn!(run_id = %run_id, error = %mark_err, "cannot mark run failed");
            }
        }
    }

    // Late ack: the task leaves the broker only after its terminal state
    // is recorded.
    if let Err(e) = broker.ack(&run_id) {
        tracing::warn!(run_id = %run_id, error = %e, "ack failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryResultBackend;
    use crate::broker::InMemoryBroker;
    use crate::run::RunStatus;
    use std::path::{Path, PathBuf};
    use varreg_refget::InMemorySequenceRepository;
    use varreg_storage::SqliteStorage;
    use varreg_vrs::Translator;

    const SEQ: &str = "ACGGTTAAAAGGCATT";

    const INPUT: &str = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO
chrT\t5\t.\tT\tG\t50\tPASS\t.
";

    fn test_registry() -> Arc<Registry> {
        let mut repo = InMemorySequenceRepository::new();
        let acc = repo.add_sequence(SEQ);
        repo.add_alias("ucsc", "chrT", &acc);
        Arc::new(Registry::new(
            Translator::new(Arc::new(repo)),
            Arc::new(SqliteStorage::in_memory().unwrap()),
        ))
    }

    fn submit(
        broker: &InMemoryBroker,
        backend: &InMemoryResultBackend,
        dir: &Path,
        run_id: &str,
        contents: Option<&str>,
    ) -> VcfTask {
        let input_path = dir.join(format!("{run_id}.vcf"));
        let output_path = dir.join(format!("{run_id}.out.vcf"));
        if let Some(contents) = contents {
            std::fs::write(&input_path, contents).unwrap();
        }
        backend.create(run_id, &input_path, &output_path).unwrap();
        let task = VcfTask {
            run_id: run_id.to_string(),
            input_path,
            output_path,
            for_ref: true,
        };
        broker.submit(task.clone()).unwrap();
        task
    }

    fn wait_terminal(
        backend: &InMemoryResultBackend,
        run_id: &str,
        timeout: Duration,
    ) -> RunStatus {
        let deadline = Instant::now() + timeout;
        loop {
            let record = backend.get(run_id).unwrap().expect("run disappeared");
            if record.status.is_terminal() {
                return record.status;
            }
            assert!(Instant::now() < deadline, "run did not reach terminal state");
            thread::sleep(Duration::from_millis(20));
        }
    }

    #[test]
    fn test_run_completes_and_publishes_output() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryResultBackend::new(Duration::from_secs(3600)));
        let worker = spawn_worker(
            test_registry(),
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&backend) as Arc<dyn ResultBackend>,
            WorkerConfig {
                poll_interval: Duration::from_millis(20),
                ..WorkerConfig::default()
            },
        );

        let task = submit(&broker, &backend, dir.path(), "run-ok", Some(INPUT));
        let status = wait_terminal(&backend, "run-ok", Duration::from_secs(10));
        worker.stop();

        assert_eq!(status, RunStatus::Completed);
        let output = std::fs::read_to_string(&task.output_path).unwrap();
        assert!(output.contains("VRS_Allele_IDs="));
        // Input consumed, no partial file left behind.
        assert!(!task.input_path.exists());
        assert!(!PathBuf::from(format!("{}.part", task.output_path.display())).exists());
    }

    #[test]
    fn test_missing_input_marks_failed() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryResultBackend::new(Duration::from_secs(3600)));
        let worker = spawn_worker(
            test_registry(),
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&backend) as Arc<dyn ResultBackend>,
            WorkerConfig {
                poll_interval: Duration::from_millis(20),
                ..WorkerConfig::default()
            },
        );

        submit(&broker, &backend, dir.path(), "run-missing", None);
        let status = wait_terminal(&backend, "run-missing", Duration::from_secs(10));
        worker.stop();

        assert_eq!(status, RunStatus::Failed);
        let record = backend.get("run-missing").unwrap().unwrap();
        assert!(record.error_message.is_some());
    }

    #[test]
    fn test_supervisor_fails_hard_limit_run_and_reclaims_task() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryResultBackend::new(Duration::from_secs(3600)));

        // Simulate a wedged worker: the task is consumed (un-acked) and
        // the run marked running, but no progress is ever made.
        let task = submit(&broker, &backend, dir.path(), "run-wedged", Some(INPUT));
        let consumed = broker.consume(Duration::from_millis(10)).unwrap().unwrap();
        assert_eq!(consumed.run_id, task.run_id);
        backend.mark_running("run-wedged").unwrap();

        let worker = spawn_worker(
            test_registry(),
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&backend) as Arc<dyn ResultBackend>,
            WorkerConfig {
                hard_time_limit: Duration::from_secs(0),
                poll_interval: Duration::from_millis(20),
                supervisor_interval: Duration::from_millis(20),
                ..WorkerConfig::default()
            },
        );

        let status = wait_terminal(&backend, "run-wedged", Duration::from_secs(10));
        worker.stop();

        assert_eq!(status, RunStatus::Failed);
        let record = backend.get("run-wedged").unwrap().unwrap();
        assert!(record.error_message.unwrap().contains("hard time limit"));

        // The reclaimed task may have been re-delivered and dropped by
        // the live worker already; either way the failure is sticky.
        if let Some(redelivered) = broker.consume(Duration::from_millis(10)).unwrap() {
            assert_eq!(redelivered.run_id, "run-wedged");
        }
        assert_eq!(
            backend.get("run-wedged").unwrap().unwrap().status,
            RunStatus::Failed
        );
    }

    #[test]
    fn test_soft_limit_fails_run() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(InMemoryBroker::new());
        let backend = Arc::new(InMemoryResultBackend::new(Duration::from_secs(3600)));
        let worker = spawn_worker(
            test_registry(),
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&backend) as Arc<dyn ResultBackend>,
            WorkerConfig {
                soft_time_limit: Duration::from_secs(0),
                poll_interval: Duration::from_millis(20),
                ..WorkerConfig::default()
            },
        );

        submit(&broker, &backend, dir.path(), "run-slow", Some(INPUT));
        let status = wait_terminal(&backend, "run-slow", Duration::from_secs(10));
        worker.stop();

        assert_eq!(status, RunStatus::Failed);
        let record = backend.get("run-slow").unwrap().unwrap();
        assert!(record
            .error_message
            .unwrap()
            .to_lowercase()
            .contains("time limit"));
    }
}
