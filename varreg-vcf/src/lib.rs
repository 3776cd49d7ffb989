//! # Bulk VCF ingestion
//!
//! Streams a VCF file row by row, registers the REF and ALT alleles of
//! every record through the registry, and writes an annotated copy of the
//! input: a `VRS_Allele_IDs` INFO field carries the computed identifiers
//! in REF-then-ALTs order. Input is never fully materialized; writes run
//! through a single batch scope around the whole file.

pub mod error;
pub mod pipeline;

pub use error::VcfError;
pub use pipeline::{AnnotateOptions, VcfRegistrar, VcfStats, VRS_IDS_INFO_KEY};
