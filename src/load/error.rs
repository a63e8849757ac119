use thiserror::Error;

use crate::context::ContextError;
use crate::kv::KvError;
use crate::metadata::MetadataError;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error("unknown context: {0}")]
    UnknownContext(String),
    #[error("all samples already loaded into context {0}")]
    AlreadyLoaded(String),
    #[error("table has no entries")]
    EmptyTable,
    #[error("sample metadata must be loaded first: {0}")]
    MetadataMissing(String),
    #[error("value for {0} does not round-trip to an integer count")]
    NonCountData(String),
}
