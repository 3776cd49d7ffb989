//! Shared application state and stack assembly.

use std::path::PathBuf;
use std::sync::Arc;

use varreg::{create_storage, Registry, RegistryConfig};
use varreg_queue::{
    spawn_worker, Broker, InMemoryBroker, InMemoryResultBackend, ResultBackend, WorkerConfig,
    WorkerHandle,
};
use varreg_refget::SequenceRepository;
use varreg_vrs::Translator;

/// The async-run plumbing, present when queueing is enabled.
pub struct AsyncQueue {
    pub broker: Arc<dyn Broker>,
    pub backend: Arc<dyn ResultBackend>,
    pub work_dir: PathBuf,
}

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub config: Arc<RegistryConfig>,
    pub queue: Option<Arc<AsyncQueue>>,
    /// Serializes synchronous VCF ingests: the storage batch scope is a
    /// singleton per registry.
    pub vcf_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, config: RegistryConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            queue: None,
            vcf_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn with_queue(mut self, queue: AsyncQueue) -> Self {
        self.queue = Some(Arc::new(queue));
        self
    }
}

/// Assemble the full service stack from configuration and a sequence
/// repository.
///
/// When async work is enabled, the worker gets its own registry instance
/// (its own storage connection) so request handlers and the worker never
/// contend for one batch scope. Returns the worker handle so the caller
/// controls its lifetime.
pub fn build_state(
    config: RegistryConfig,
    repo: Arc<dyn SequenceRepository>,
) -> anyhow::Result<(AppState, Option<WorkerHandle>)> {
    let storage = create_storage(&config)?;
    let registry = Arc::new(Registry::new(Translator::new(Arc::clone(&repo)), storage));

    let mut state = AppState::new(registry, config.clone());
    let mut worker = None;

    if let Some(work_dir) = &config.async_work_dir {
        std::fs::create_dir_all(work_dir)?;

        let broker: Arc<dyn Broker> = Arc::new(InMemoryBroker::new());
        let backend: Arc<dyn ResultBackend> =
            Arc::new(InMemoryResultBackend::new(config.result_expires));

        let worker_storage = create_storage(&config)?;
        let worker_registry = Arc::new(Registry::new(
            Translator::new(Arc::clone(&repo)),
            worker_storage,
        ));
        worker = Some(spawn_worker(
            worker_registry,
            Arc::clone(&broker),
            Arc::clone(&backend),
            WorkerConfig {
                soft_time_limit: config.soft_time_limit,
                hard_time_limit: config.hard_time_limit,
                flush_on_exit: config.flush_on_batchctx_exit,
                ..WorkerConfig::default()
            },
        ));

        state = state.with_queue(AsyncQueue {
            broker,
            backend,
            work_dir: work_dir.clone(),
        });
    }

    Ok((state, worker))
}
