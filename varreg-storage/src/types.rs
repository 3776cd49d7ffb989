//! Storage-layer record types.

use serde_json::Value;

/// A directed relationship between two registered variations.
///
/// Direction is meaningful (`source -> dest`); the full triple is the
/// identity, so repeated puts of the same triple are idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationMapping {
    pub source_id: String,
    pub dest_id: String,
    pub mapping_type: String,
}

/// An opaque key/value attachment on a registered object.
///
/// The same `(object_id, annotation_type)` pair may carry multiple values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub object_id: String,
    pub annotation_type: String,
    pub annotation: Value,
}

/// Variation classes for summary statistics.
///
/// Classification compares the location span against the state length:
/// equal spans are substitutions, longer states are insertions, shorter
/// states are deletions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationKind {
    Substitution,
    Insertion,
    Deletion,
    All,
}

impl VariationKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "substitution" => Some(Self::Substitution),
            "insertion" => Some(Self::Insertion),
            "deletion" => Some(Self::Deletion),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Substitution => "substitution",
            Self::Insertion => "insertion",
            Self::Deletion => "deletion",
            Self::All => "all",
        }
    }
}
