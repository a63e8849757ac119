use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextError {
    #[error("value contains the reserved path delimiter '/': {0:?}")]
    PathDelimiter(String),
}
