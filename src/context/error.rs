use thiserror::Error;

use crate::kv::KvError;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("unknown context: {0}")]
    UnknownContext(String),
    #[error("context already exists: {0}")]
    AlreadyExists(String),
}
