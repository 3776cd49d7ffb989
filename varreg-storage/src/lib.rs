//! Storage layer for the variation registry.
//!
//! The [`Storage`] trait is the contract the registry engine writes and
//! reads through. Two first-class backends implement it:
//!
//! - [`SqliteStorage`] - relational backend with an object table, a derived
//!   location index for overlap search, annotation and mapping tables, and
//!   a batched background write path with bounded-queue backpressure.
//! - [`NoObjectStore`] - stateless mode: writes are no-ops, reads return
//!   absent. Useful for pure translation/annotation pipelines.
//!
//! Batched writes are scoped through [`BatchManager`]; see the `batch`
//! module for the writer state machine.

pub mod batch;
pub mod error;
pub mod no_db;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

pub use batch::BatchManager;
pub use error::StorageError;
pub use no_db::NoObjectStore;
pub use schema::TableNames;
pub use sqlite::{MergeMode, SqliteStorage, SqliteStorageOptions};
pub use traits::Storage;
pub use types::{Annotation, VariationKind, VariationMapping};
