use thiserror::Error;

use crate::kv::KvError;
use crate::metadata::MetadataError;
use crate::text::TextError;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Text(#[from] TextError),
    #[error("syntax error in query: {0}")]
    Syntax(String),
    #[error("unsupported node kind: {0}")]
    UnsupportedNode(String),
    #[error("no usable search stem found for: {0}")]
    NoUsableStem(String),
    #[error("empty query")]
    EmptyQuery,
    #[error("where clauses are not allowed with a category search")]
    WhereNotAllowedWithCategories,
}
