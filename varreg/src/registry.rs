//! The registry façade.
//!
//! [`Registry`] composes a [`Translator`] and a [`Storage`] backend.
//! Putting an Allele decomposes it into its constituent objects
//! (SequenceReference, SequenceLocation, Allele), each stored under its
//! content-derived identifier; retrieval resolves stored identifier
//! references back into nested structures.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use varreg_refget::SequenceRepository;
use varreg_storage::{
    Annotation, BatchManager, Storage, StorageError, VariationKind, VariationMapping,
};
use varreg_vrs::{
    models::StoredLocationRef, Allele, ModelError, SequenceLocation, TranslateError, Translator,
    VrsObject,
};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Stored object {id} references missing object {reference}")]
    DanglingReference { id: String, reference: String },
}

/// Outcome of registering a definition string.
#[derive(Debug, Clone)]
pub struct RegisteredVariation {
    pub object_id: String,
    pub object: Allele,
    pub messages: Vec<String>,
}

pub struct Registry {
    translator: Translator,
    storage: Arc<dyn Storage>,
}

impl Registry {
    pub fn new(translator: Translator, storage: Arc<dyn Storage>) -> Self {
        Self {
            translator,
            storage,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn data_proxy(&self) -> &Arc<dyn SequenceRepository> {
        self.translator.repository()
    }

    /// Translate a definition string and register the resulting Allele.
    pub fn register_definition(
        &self,
        definition: &str,
    ) -> Result<RegisteredVariation, RegistryError> {
        let allele = self.translator.translate_allele(definition)?;
        let object_id = self.put_object(&VrsObject::Allele(allele.clone()))?;
        Ok(RegisteredVariation {
            object_id,
            object: allele,
            messages: Vec::new(),
        })
    }

    /// Store an object and its constituents; returns the top-level id.
    ///
    /// Idempotent: repeating a put leaves storage unchanged.
    pub fn put_object(&self, object: &VrsObject) -> Result<String, RegistryError> {
        match object {
            VrsObject::Allele(allele) => {
                self.storage.put_vrs(&VrsObject::SequenceReference(
                    allele.location.sequence_reference.clone(),
                ))?;
                self.storage
                    .put_vrs(&VrsObject::SequenceLocation(allele.location.clone()))?;
                self.storage.put_vrs(object)?;
            }
            VrsObject::SequenceLocation(location) => {
                self.storage.put_vrs(&VrsObject::SequenceReference(
                    location.sequence_reference.clone(),
                ))?;
                self.storage.put_vrs(object)?;
            }
            VrsObject::SequenceReference(_) => {
                self.storage.put_vrs(object)?;
            }
        }
        Ok(object.id())
    }

    /// Dereference an identifier, reconstructing nested structure.
    pub fn get_object(&self, vrs_id: &str) -> Result<Option<VrsObject>, RegistryError> {
        match self.storage.get_vrs(vrs_id)? {
            Some(stored) => self.reify(vrs_id, &stored).map(Some),
            None => Ok(None),
        }
    }

    /// Rebuild a full object from its stored JSON, resolving identifier
    /// references through storage.
    fn reify(&self, vrs_id: &str, stored: &Value) -> Result<VrsObject, RegistryError> {
        if stored.get("type").and_then(Value::as_str) != Some("Allele") {
            return Ok(VrsObject::from_wire_json(stored)?);
        }
        match Allele::stored_location_ref(stored)? {
            StoredLocationRef::Inline(_) => Ok(VrsObject::from_wire_json(stored)?),
            StoredLocationRef::Id(location_id) => {
                let location_json = self.storage.get_vrs(location_id)?.ok_or_else(|| {
                    RegistryError::DanglingReference {
                        id: vrs_id.to_string(),
                        reference: location_id.to_string(),
                    }
                })?;
                let location = SequenceLocation::from_wire_json(&location_json)?;
                let sequence = stored
                    .get("state")
                    .and_then(|s| s.get("sequence"))
                    .and_then(Value::as_str)
                    .ok_or(ModelError::MissingField("state"))?;
                Ok(VrsObject::Allele(Allele::new(location, sequence)))
            }
        }
    }

    /// Whether an identifier is registered.
    pub fn contains(&self, vrs_id: &str) -> Result<bool, RegistryError> {
        Ok(self.storage.get_vrs(vrs_id)?.is_some())
    }

    pub fn put_mapping(&self, mapping: &VariationMapping) -> Result<(), RegistryError> {
        Ok(self.storage.put_mapping(mapping)?)
    }

    pub fn get_object_mappings(
        &self,
        object_id: &str,
        mapping_type: Option<&str>,
    ) -> Result<Vec<VariationMapping>, RegistryError> {
        Ok(self.storage.get_mappings(object_id, mapping_type)?)
    }

    pub fn put_annotation(&self, annotation: &Annotation) -> Result<(), RegistryError> {
        Ok(self.storage.put_annotation(annotation)?)
    }

    pub fn get_object_annotations(
        &self,
        object_id: &str,
        annotation_type: Option<&str>,
    ) -> Result<Vec<Annotation>, RegistryError> {
        Ok(self.storage.get_annotations(object_id, annotation_type)?)
    }

    /// All registered Alleles intersecting `[start, end)` on an accession.
    pub fn search_variations(
        &self,
        accession: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<Allele>, RegistryError> {
        let accession = accession.strip_prefix("ga4gh:").unwrap_or(accession);
        let mut alleles = Vec::new();
        for stored in self.storage.search(accession, start, end)? {
            let id = stored
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<unknown>")
                .to_string();
            match self.reify(&id, &stored)? {
                VrsObject::Allele(allele) => alleles.push(allele),
                other => {
                    tracing::warn!(id = %other.id(), "non-Allele row in search index, skipping");
                }
            }
        }
        Ok(alleles)
    }

    pub fn object_count(&self) -> Result<u64, RegistryError> {
        Ok(self.storage.object_count()?)
    }

    pub fn variation_count(&self, kind: VariationKind) -> Result<u64, RegistryError> {
        Ok(self.storage.variation_count(kind)?)
    }

    /// Enter a scoped batch over this registry's storage.
    pub fn batch_context(&self, flush_on_exit: bool) -> Result<BatchManager, RegistryError> {
        Ok(BatchManager::enter(
            Arc::clone(&self.storage),
            flush_on_exit,
        )?)
    }

    pub fn wait_for_writes(&self) -> Result<(), RegistryError> {
        Ok(self.storage.wait_for_writes()?)
    }

    pub fn close(&self) -> Result<(), RegistryError> {
        Ok(self.storage.close()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use varreg_refget::InMemorySequenceRepository;
    use varreg_storage::{NoObjectStore, SqliteStorage};

    //                    0123456789012345
    const SEQ: &str = "ACGGTTAAAAGGCATT";

    fn test_registry() -> Registry {
        let mut repo = InMemorySequenceRepository::new();
        let acc = repo.add_sequence(SEQ);
        repo.add_alias("refseq", "NC_TEST.1", &acc);
        repo.add_alias("ucsc", "chrT", &acc);
        let translator = Translator::new(Arc::new(repo));
        let storage: Arc<dyn Storage> = Arc::new(SqliteStorage::in_memory().unwrap());
        Registry::new(translator, storage)
    }

    #[test]
    fn test_register_and_retrieve() {
        let registry = test_registry();
        let reg = registry.register_definition("NC_TEST.1:g.5T>C").unwrap();
        assert_eq!(reg.object_id, "ga4gh:VA.HNtqLbWP9FZnNzuVbXeuZ9gwY1WQbedG");

        let fetched = registry.get_object(&reg.object_id).unwrap().unwrap();
        match fetched {
            VrsObject::Allele(allele) => {
                assert_eq!(allele, reg.object);
                assert_eq!(allele.location.start, 4);
                assert_eq!(allele.state.sequence, "C");
            }
            other => panic!("expected Allele, got {}", other.object_type()),
        }
    }

    #[test]
    fn test_referential_closure() {
        let registry = test_registry();
        let reg = registry.register_definition("NC_TEST.1:g.5T>C").unwrap();

        let location_id = reg.object.location.id();
        let fetched = registry.get_object(&location_id).unwrap().unwrap();
        assert!(matches!(fetched, VrsObject::SequenceLocation(_)));

        let seqref_id = reg.object.location.sequence_reference.id();
        let fetched = registry.get_object(&seqref_id).unwrap().unwrap();
        assert!(matches!(fetched, VrsObject::SequenceReference(_)));
    }

    #[test]
    fn test_idempotent_registration() {
        let registry = test_registry();
        let first = registry.register_definition("NC_TEST.1:g.5T>C").unwrap();
        let count = registry.object_count().unwrap();
        let second = registry.register_definition("NC_TEST.1:g.5T>C").unwrap();
        assert_eq!(first.object_id, second.object_id);
        assert_eq!(registry.object_count().unwrap(), count);
    }

    #[test]
    fn test_search_includes_registered_allele() {
        let registry = test_registry();
        let reg = registry.register_definition("NC_TEST.1:4:T:G").unwrap();
        let acc = &reg.object.location.sequence_reference.refget_accession;

        let hits = registry.search_variations(acc, 0, 16).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id(), reg.object_id);

        // Non-intersecting window excludes it.
        let hits = registry.search_variations(acc, 5, 16).unwrap();
        assert!(hits.is_empty());

        // Curie-prefixed accession is accepted.
        let curie = format!("ga4gh:{acc}");
        assert_eq!(registry.search_variations(&curie, 0, 16).unwrap().len(), 1);
    }

    #[test]
    fn test_get_object_missing() {
        let registry = test_registry();
        assert!(registry
            .get_object("ga4gh:VA.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_stateless_mode_still_translates() {
        let mut repo = InMemorySequenceRepository::new();
        let acc = repo.add_sequence(SEQ);
        repo.add_alias("refseq", "NC_TEST.1", &acc);
        let registry = Registry::new(
            Translator::new(Arc::new(repo)),
            Arc::new(NoObjectStore::new()),
        );

        let reg = registry.register_definition("NC_TEST.1:g.5T>C").unwrap();
        assert_eq!(reg.object_id, "ga4gh:VA.HNtqLbWP9FZnNzuVbXeuZ9gwY1WQbedG");
        assert!(registry.get_object(&reg.object_id).unwrap().is_none());
    }

    #[test]
    fn test_batch_context_flush_visibility() {
        let registry = test_registry();
        let id;
        {
            let batch = registry.batch_context(true).unwrap();
            let reg = registry.register_definition("NC_TEST.1:g.5T>C").unwrap();
            id = reg.object_id;
            batch.close().unwrap();
        }
        assert!(registry.get_object(&id).unwrap().is_some());
    }
}
