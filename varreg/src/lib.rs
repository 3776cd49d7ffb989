//! # varreg
//!
//! Registration, retrieval, and overlap search of biological sequence
//! variation under the GA4GH Variation Representation Specification.
//!
//! [`Registry`] is the orchestration façade: it translates definition
//! strings through `varreg-vrs`, decomposes object graphs, and persists
//! them through a `varreg-storage` backend. Configuration comes from
//! `VARREG_*` environment variables via [`RegistryConfig`].

pub mod config;
pub mod registry;

pub use config::{create_storage, RegistryConfig};
pub use registry::{RegisteredVariation, Registry, RegistryError};

// Re-export member crates under short names for downstream use.
pub use varreg_refget as refget;
pub use varreg_storage as storage;
pub use varreg_vrs as vrs;
