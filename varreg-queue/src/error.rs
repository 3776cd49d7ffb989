use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Run id {0} is already in use")]
    RunIdConflict(String),

    #[error("Unknown run: {0}")]
    RunUnknown(String),

    #[error("Queue unavailable: {0}")]
    Unavailable(String),
}
