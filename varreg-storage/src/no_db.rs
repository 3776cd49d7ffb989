//! Stateless storage: all writes succeed as no-ops, all reads are absent.
//!
//! Selected by an empty storage URI. Registration still computes and
//! returns identifiers (translation is storage-independent), which is
//! enough for annotation-only pipelines.

use serde_json::Value;

use varreg_vrs::VrsObject;

use crate::error::StorageError;
use crate::traits::Storage;
use crate::types::{Annotation, VariationKind, VariationMapping};

#[derive(Debug, Default)]
pub struct NoObjectStore;

impl NoObjectStore {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for NoObjectStore {
    fn put_vrs(&self, _object: &VrsObject) -> Result<(), StorageError> {
        Ok(())
    }

    fn get_vrs(&self, _vrs_id: &str) -> Result<Option<Value>, StorageError> {
        Ok(None)
    }

    fn put_mapping(&self, _mapping: &VariationMapping) -> Result<(), StorageError> {
        Ok(())
    }

    fn get_mappings(
        &self,
        _source_id: &str,
        _mapping_type: Option<&str>,
    ) -> Result<Vec<VariationMapping>, StorageError> {
        Ok(Vec::new())
    }

    fn put_annotation(&self, _annotation: &Annotation) -> Result<(), StorageError> {
        Ok(())
    }

    fn get_annotations(
        &self,
        _object_id: &str,
        _annotation_type: Option<&str>,
    ) -> Result<Vec<Annotation>, StorageError> {
        Ok(Vec::new())
    }

    fn search(&self, _accession: &str, start: u64, end: u64) -> Result<Vec<Value>, StorageError> {
        if end <= start {
            return Err(StorageError::InvalidRange { start, end });
        }
        Ok(Vec::new())
    }

    fn begin_batch(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn end_batch(&self, _flush: bool) -> Result<(), StorageError> {
        Ok(())
    }

    fn wait_for_writes(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn object_count(&self) -> Result<u64, StorageError> {
        Ok(0)
    }

    fn variation_count(&self, _kind: VariationKind) -> Result<u64, StorageError> {
        Ok(0)
    }

    fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varreg_vrs::{Allele, SequenceLocation, SequenceReference};

    #[test]
    fn test_writes_succeed_reads_absent() {
        let store = NoObjectStore::new();
        let allele = Allele::new(
            SequenceLocation::new(SequenceReference::new("SQ.abc"), 5, 6),
            "T",
        );
        let id = allele.id();
        store.put_vrs(&VrsObject::Allele(allele)).unwrap();
        assert!(store.get_vrs(&id).unwrap().is_none());
        assert!(store.search("SQ.abc", 0, 10).unwrap().is_empty());
        assert_eq!(store.object_count().unwrap(), 0);
    }

    #[test]
    fn test_search_still_validates_range() {
        let store = NoObjectStore::new();
        assert!(matches!(
            store.search("SQ.abc", 10, 10),
            Err(StorageError::InvalidRange { .. })
        ));
    }
}
