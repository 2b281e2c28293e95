use thiserror::Error;

use crate::catalog::CatalogError;
use crate::storage::StorageError;
use crate::tuple::TupleError;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Tuple error: {0}")]
    Tuple(#[from] TupleError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Operator used before open()")]
    NotOpen,

    #[error("Aggregate {op} is not supported over {ty} fields")]
    IllegalAggregate { op: String, ty: String },

    #[error("Schema mismatch: got {child}, expected {table}")]
    SchemaMismatch { child: String, table: String },
}

pub type ExecResult<T> = Result<T, ExecError>;

impl ExecError {
    /// True when the underlying cause is a lock-timeout abort, which must
    /// be propagated to the transaction boundary rather than handled at
    /// the operator level.
    pub fn is_aborted(&self) -> bool {
        matches!(self, ExecError::Storage(err) if err.is_aborted())
    }
}
