use thiserror::Error;

/// Failure talking to the backing store. A key that simply has no value is
/// never an error here -- callers see `None` / an empty collection instead.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("transport error opening database: {0}")]
    Database(#[from] redb::DatabaseError),
    #[error("transport error starting transaction: {0}")]
    Transaction(#[from] redb::TransactionError),
    #[error("transport error opening table: {0}")]
    Table(#[from] redb::TableError),
    #[error("transport error committing: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("transport error on storage: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("transport error decoding value at key {key}: {reason}")]
    Decode { key: String, reason: String },
}
