//! The storage contract.

use serde_json::Value;

use varreg_vrs::VrsObject;

use crate::error::StorageError;
use crate::types::{Annotation, VariationKind, VariationMapping};

/// Contract between the registry engine and a storage backend.
///
/// Implementations are shared across request handlers (`Send + Sync`) and
/// own their connection handling internally. Writes are idempotent per
/// object identifier; reads see committed state only, so callers that need
/// read-your-writes inside a batch scope must flush first.
pub trait Storage: Send + Sync {
    /// Store a VRS object under its computed identifier.
    ///
    /// Inside a batch scope this may buffer and, when the pending-batch
    /// queue is full, block for backpressure.
    fn put_vrs(&self, object: &VrsObject) -> Result<(), StorageError>;

    /// Fetch the stored JSON for an identifier, `None` when absent.
    fn get_vrs(&self, vrs_id: &str) -> Result<Option<Value>, StorageError>;

    /// Record a mapping; duplicates of the full triple are no-ops.
    fn put_mapping(&self, mapping: &VariationMapping) -> Result<(), StorageError>;

    /// Mappings outgoing from `source_id`, optionally filtered by type.
    fn get_mappings(
        &self,
        source_id: &str,
        mapping_type: Option<&str>,
    ) -> Result<Vec<VariationMapping>, StorageError>;

    /// Attach an annotation.
    fn put_annotation(&self, annotation: &Annotation) -> Result<(), StorageError>;

    /// Annotations on `object_id`, optionally filtered by type.
    fn get_annotations(
        &self,
        object_id: &str,
        annotation_type: Option<&str>,
    ) -> Result<Vec<Annotation>, StorageError>;

    /// Stored JSON of every Allele whose location on `accession`
    /// intersects `[start, end)`, ordered by allele identifier.
    fn search(&self, accession: &str, start: u64, end: u64) -> Result<Vec<Value>, StorageError>;

    /// Enter batched-write mode. Fails if a batch scope is already active.
    fn begin_batch(&self) -> Result<(), StorageError>;

    /// Leave batched-write mode. With `flush`, wait for all pending
    /// batches to drain; otherwise discard batches not yet in flight.
    /// Surfaces any write error the background writer recorded.
    fn end_batch(&self, flush: bool) -> Result<(), StorageError>;

    /// Block until pending background writes are applied. No-op outside a
    /// batch scope. Surfaces a recorded writer error without clearing it.
    fn wait_for_writes(&self) -> Result<(), StorageError>;

    /// Total number of stored objects.
    fn object_count(&self) -> Result<u64, StorageError>;

    /// Number of registered variations of a class.
    fn variation_count(&self, kind: VariationKind) -> Result<u64, StorageError>;

    /// Release resources. Idempotent.
    fn close(&self) -> Result<(), StorageError>;
}
