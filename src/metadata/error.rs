use thiserror::Error;

use crate::kv::KvError;
use crate::text::TextError;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Text(#[from] TextError),
}
