use thiserror::Error;

use crate::context::ContextError;
use crate::kv::KvError;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("unknown context: {0}")]
    UnknownContext(String),
    #[error("ambiguity map references redbiom_id not represented in context: {0}")]
    InconsistentAmbiguity(String),
}
