use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Run was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}
