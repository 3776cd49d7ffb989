//! # GA4GH VRS object model and translation
//!
//! This crate carries the variation side of the registry:
//!
//! - VRS data models as a tagged sum ([`VrsObject`]): Allele,
//!   SequenceLocation, SequenceReference, with VRS 2.x wire JSON.
//! - Digest computation (canonical JSON + SHA-512/24u), including an
//!   allocation-free [`DigestWriter`] fast path for the VCF hot loop.
//! - Fully-justified allele normalization.
//! - [`Translator`]: HGVS (genomic), SPDI, and gnomAD definition strings
//!   to normalized, digested Alleles.

pub mod digest;
pub mod models;
pub mod normalize;
pub mod translate;

pub use digest::{
    allele_digest, allele_identifier, location_digest, location_identifier, DigestWriter,
};
pub use models::{
    Allele, LiteralSequenceExpression, ModelError, SequenceLocation, SequenceReference, VrsObject,
};
pub use normalize::{normalize, NormalizeError, NormalizedAllele};
pub use translate::{TranslateError, Translator};
