use thiserror::Error;

use varreg::RegistryError;

#[derive(Error, Debug)]
pub enum VcfError {
    #[error("Malformed VCF at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("VCF processing exceeded its time limit")]
    DeadlineExceeded,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
