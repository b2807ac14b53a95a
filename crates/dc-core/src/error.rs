//! Core error types for docclip

use thiserror::Error;

use crate::types::AttributeType;

/// Errors raised while handling identifiers and attribute values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("Invalid document id: {0:?}")]
    InvalidId(String),

    #[error("Type mismatch for {attribute}: expected {expected}, found {found}")]
    TypeMismatch {
        attribute: String,
        expected: AttributeType,
        found: AttributeType,
    },
}

impl ValueError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ValueError::InvalidId(_) => "invalid_id",
            ValueError::TypeMismatch { .. } => "type_mismatch",
        }
    }
}

pub type ValueResult<T> = Result<T, ValueError>;
