//! # Sequence repository access for variation registration
//!
//! This crate provides the reference-sequence side of the registry:
//!
//! - [`SequenceRepository`] - the contract for resolving sequence aliases
//!   (RefSeq/GenBank accessions, chromosome names) to refget accessions and
//!   fetching sequence substrings.
//! - [`InMemorySequenceRepository`] - a digest-keyed, namespace-aliased
//!   implementation suitable for tests and small deployments.
//! - Digest primitives (`sha512t24u`, `canonicalize_json`) shared with the
//!   VRS object model.

pub mod digest;
pub mod error;
pub mod fasta;
pub mod repository;

pub use digest::{canonicalize_json, sequence_accession, sha512t24u};
pub use error::RefgetError;
pub use fasta::read_fasta;
pub use repository::{InMemorySequenceRepository, SequenceRepository};
