//! VRS data models.
//!
//! Objects form a small acyclic graph: an Allele references a
//! SequenceLocation, which references a SequenceReference. The sum type
//! [`VrsObject`] is what the storage layer traffics in; cross-references in
//! stored JSON are identifier strings, resolved on read.

use serde_json::{json, Map, Value};
use thiserror::Error;

/// A reference to a sequence identified by its refget accession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceReference {
    /// GA4GH refget accession, e.g. "SQ.F-LrL…"
    pub refget_accession: String,
}

/// A location on a sequence, interbase (0-based, half-open) coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceLocation {
    pub sequence_reference: SequenceReference,
    pub start: u64,
    pub end: u64,
}

/// The sequence state of an Allele.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralSequenceExpression {
    pub sequence: String,
}

/// A specific sequence state at a specific location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allele {
    pub location: SequenceLocation,
    pub state: LiteralSequenceExpression,
}

/// Any VRS object the registry stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VrsObject {
    Allele(Allele),
    SequenceLocation(SequenceLocation),
    SequenceReference(SequenceReference),
}

/// Failures reading VRS wire JSON.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Missing or invalid field: {0}")]
    MissingField(&'static str),

    #[error("Unsupported VRS object type: {0}")]
    UnsupportedType(String),

    #[error("Unsupported state type: {0} (only LiteralSequenceExpression)")]
    UnsupportedState(String),
}

fn field_str<'v>(value: &'v Value, name: &'static str) -> Result<&'v str, ModelError> {
    value
        .get(name)
        .and_then(Value::as_str)
        .ok_or(ModelError::MissingField(name))
}

fn field_u64(value: &Value, name: &'static str) -> Result<u64, ModelError> {
    value
        .get(name)
        .and_then(Value::as_u64)
        .ok_or(ModelError::MissingField(name))
}

impl SequenceReference {
    pub fn new(refget_accession: impl Into<String>) -> Self {
        Self {
            refget_accession: refget_accession.into(),
        }
    }

    /// Identifier curie: `ga4gh:SQ.<digest>` (the accession itself).
    pub fn id(&self) -> String {
        format!("ga4gh:{}", self.refget_accession)
    }

    pub fn to_wire_json(&self) -> Value {
        json!({
            "id": self.id(),
            "type": "SequenceReference",
            "refgetAccession": self.refget_accession,
        })
    }

    pub fn from_wire_json(value: &Value) -> Result<Self, ModelError> {
        Ok(Self {
            refget_accession: field_str(value, "refgetAccession")?.to_string(),
        })
    }
}

impl SequenceLocation {
    pub fn new(sequence_reference: SequenceReference, start: u64, end: u64) -> Self {
        Self {
            sequence_reference,
            start,
            end,
        }
    }

    pub fn digest(&self) -> String {
        crate::digest::location_digest(self)
    }

    pub fn id(&self) -> String {
        crate::digest::location_identifier(self)
    }

    pub fn to_wire_json(&self) -> Value {
        json!({
            "id": self.id(),
            "type": "SequenceLocation",
            "digest": self.digest(),
            "sequenceReference": {
                "type": "SequenceReference",
                "refgetAccession": self.sequence_reference.refget_accession,
            },
            "start": self.start,
            "end": self.end,
        })
    }

    pub fn from_wire_json(value: &Value) -> Result<Self, ModelError> {
        let seq_ref = value
            .get("sequenceReference")
            .ok_or(ModelError::MissingField("sequenceReference"))?;
        Ok(Self {
            sequence_reference: SequenceReference::from_wire_json(seq_ref)?,
            start: field_u64(value, "start")?,
            end: field_u64(value, "end")?,
        })
    }
}

impl Allele {
    pub fn new(location: SequenceLocation, sequence: impl Into<String>) -> Self {
        Self {
            location,
            state: LiteralSequenceExpression {
                sequence: sequence.into(),
            },
        }
    }

    pub fn digest(&self) -> String {
        crate::digest::allele_digest(self)
    }

    pub fn id(&self) -> String {
        crate::digest::allele_identifier(self)
    }

    fn state_json(&self) -> Value {
        json!({
            "type": "LiteralSequenceExpression",
            "sequence": self.state.sequence,
        })
    }

    /// Fully nested wire form, ids and digests attached at each level.
    pub fn to_wire_json(&self) -> Value {
        json!({
            "id": self.id(),
            "type": "Allele",
            "digest": self.digest(),
            "location": self.location.to_wire_json(),
            "state": self.state_json(),
        })
    }

    /// Stored form: the location collapses to its identifier string.
    pub fn to_stored_json(&self) -> Value {
        json!({
            "id": self.id(),
            "type": "Allele",
            "digest": self.digest(),
            "location": self.location.id(),
            "state": self.state_json(),
        })
    }

    /// Read the nested wire form.
    pub fn from_wire_json(value: &Value) -> Result<Self, ModelError> {
        let location = value
            .get("location")
            .ok_or(ModelError::MissingField("location"))?;
        let location = SequenceLocation::from_wire_json(location)?;
        let state = value.get("state").ok_or(ModelError::MissingField("state"))?;
        let state_type = field_str(state, "type")?;
        if state_type != "LiteralSequenceExpression" {
            return Err(ModelError::UnsupportedState(state_type.to_string()));
        }
        Ok(Self {
            location,
            state: LiteralSequenceExpression {
                sequence: field_str(state, "sequence")?.to_string(),
            },
        })
    }

    /// Extract the location reference from a stored allele JSON value,
    /// whether collapsed to an id string or still nested.
    pub fn stored_location_ref(value: &Value) -> Result<StoredLocationRef<'_>, ModelError> {
        match value.get("location") {
            Some(Value::String(id)) => Ok(StoredLocationRef::Id(id)),
            Some(obj @ Value::Object(_)) => Ok(StoredLocationRef::Inline(obj)),
            _ => Err(ModelError::MissingField("location")),
        }
    }
}

/// How a stored allele refers to its location.
pub enum StoredLocationRef<'v> {
    Id(&'v str),
    Inline(&'v Value),
}

impl VrsObject {
    /// The object's computed identifier curie.
    pub fn id(&self) -> String {
        match self {
            VrsObject::Allele(a) => a.id(),
            VrsObject::SequenceLocation(l) => l.id(),
            VrsObject::SequenceReference(r) => r.id(),
        }
    }

    pub fn object_type(&self) -> &'static str {
        match self {
            VrsObject::Allele(_) => "Allele",
            VrsObject::SequenceLocation(_) => "SequenceLocation",
            VrsObject::SequenceReference(_) => "SequenceReference",
        }
    }

    pub fn to_wire_json(&self) -> Value {
        match self {
            VrsObject::Allele(a) => a.to_wire_json(),
            VrsObject::SequenceLocation(l) => l.to_wire_json(),
            VrsObject::SequenceReference(r) => r.to_wire_json(),
        }
    }

    pub fn from_wire_json(value: &Value) -> Result<Self, ModelError> {
        match field_str(value, "type")? {
            "Allele" => Ok(VrsObject::Allele(Allele::from_wire_json(value)?)),
            "SequenceLocation" => Ok(VrsObject::SequenceLocation(
                SequenceLocation::from_wire_json(value)?,
            )),
            "SequenceReference" => Ok(VrsObject::SequenceReference(
                SequenceReference::from_wire_json(value)?,
            )),
            other => Err(ModelError::UnsupportedType(other.to_string())),
        }
    }
}

/// Strip volatile fields (`id`, `digest`) for content comparison in tests.
pub fn strip_identifiers(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                if k == "id" || k == "digest" {
                    continue;
                }
                out.insert(k.clone(), strip_identifiers(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(strip_identifiers).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_allele() -> Allele {
        Allele::new(
            SequenceLocation::new(
                SequenceReference::new("SQ.F-LrLnMKIjgbR1HECnsl_VGjXfs3QHDE"),
                55181319,
                55181320,
            ),
            "T",
        )
    }

    #[test]
    fn test_wire_roundtrip_allele() {
        let allele = sample_allele();
        let wire = allele.to_wire_json();
        let back = Allele::from_wire_json(&wire).unwrap();
        assert_eq!(allele, back);
    }

    #[test]
    fn test_wire_json_shape() {
        let wire = sample_allele().to_wire_json();
        assert_eq!(wire["type"], "Allele");
        assert_eq!(wire["state"]["type"], "LiteralSequenceExpression");
        assert_eq!(wire["location"]["type"], "SequenceLocation");
        assert_eq!(
            wire["location"]["sequenceReference"]["refgetAccession"],
            "SQ.F-LrLnMKIjgbR1HECnsl_VGjXfs3QHDE"
        );
    }

    #[test]
    fn test_stored_allele_location_is_reference() {
        let allele = sample_allele();
        let stored = allele.to_stored_json();
        match Allele::stored_location_ref(&stored).unwrap() {
            StoredLocationRef::Id(id) => assert_eq!(id, allele.location.id()),
            StoredLocationRef::Inline(_) => panic!("expected collapsed location"),
        }
    }

    #[test]
    fn test_vrs_object_dispatch() {
        let obj = VrsObject::Allele(sample_allele());
        assert_eq!(obj.object_type(), "Allele");
        assert!(obj.id().starts_with("ga4gh:VA."));

        let wire = obj.to_wire_json();
        let back = VrsObject::from_wire_json(&wire).unwrap();
        assert_eq!(obj, back);
    }

    #[test]
    fn test_strip_identifiers_removes_volatile_fields() {
        let wire = sample_allele().to_wire_json();
        let stripped = strip_identifiers(&wire);
        assert!(stripped.get("id").is_none());
        assert!(stripped.get("digest").is_none());
        assert!(stripped["location"].get("id").is_none());
        assert_eq!(stripped["state"]["sequence"], "T");
    }

    #[test]
    fn test_unsupported_type_rejected() {
        let v = serde_json::json!({"type": "CopyNumberCount", "copies": 3});
        assert!(matches!(
            VrsObject::from_wire_json(&v),
            Err(ModelError::UnsupportedType(_))
        ));
    }
}
