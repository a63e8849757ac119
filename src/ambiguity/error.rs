use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmbiguityError {
    #[error("redbiom id has no tag delimiter: {0:?}")]
    MissingTagDelimiter(String),
}
