//! # Asynchronous bulk-VCF runs
//!
//! A submitted VCF becomes a [`Run`](run::RunRecord) identified by a UUID.
//! The API process persists the upload, records the run, and enqueues a
//! [`VcfTask`](run::VcfTask) on a [`Broker`]; a worker consumes one task
//! at a time, drives the `varreg-vcf` pipeline, and transitions the run
//! to `Completed` or `Failed` in the [`ResultBackend`]. Results expire
//! after a TTL and are purged.
//!
//! The broker/backend contracts are minimal so external implementations
//! (Redis streams, AMQP) can substitute for the in-memory ones.

pub mod backend;
pub mod broker;
pub mod error;
pub mod run;
pub mod worker;

pub use backend::{InMemoryResultBackend, ResultBackend};
pub use broker::{Broker, InMemoryBroker};
pub use error::QueueError;
pub use run::{RunRecord, RunStatus, VcfTask};
pub use worker::{spawn_worker, WorkerConfig, WorkerHandle};
