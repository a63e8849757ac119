use thiserror::Error;

use crate::ambiguity::AmbiguityError;
use crate::context::ContextError;
use crate::fetch::FetchError;
use crate::kv::KvError;
use crate::load::LoadError;
use crate::metadata::MetadataError;
use crate::query::QueryError;

/// Crate-level error, composed from each component's own error type.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Kv(#[from] KvError),
    #[error("context error: {0}")]
    Context(#[from] ContextError),
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
    #[error("ambiguity error: {0}")]
    Ambiguity(#[from] AmbiguityError),
    #[error("query error: {0}")]
    Query(#[from] QueryError),
    #[error("load error: {0}")]
    Load(#[from] LoadError),
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),
    #[error("config error: {0}")]
    Config(#[from] ::config::ConfigError),
}
