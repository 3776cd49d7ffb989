use thiserror::Error;

/// Failures surfaced by sequence repository implementations.
#[derive(Error, Debug)]
pub enum RefgetError {
    #[error("Unknown refget accession: {0}")]
    UnknownAccession(String),

    #[error("Cannot resolve sequence alias: {0}")]
    UnresolvedAlias(String),

    #[error("Range [{start}, {end}) out of bounds for {accession} (length {length})")]
    RangeOutOfBounds {
        accession: String,
        start: u64,
        end: u64,
        length: u64,
    },

    #[error("Sequence repository unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
