use thiserror::Error;

#[derive(Debug, Error)]
pub enum TupleError {
    #[error("Field index {0} out of range (tuple has {1} fields)")]
    FieldIndex(usize, usize),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub type TupleResult<T> = Result<T, TupleError>;
