//! Document and callback errors

use dc_core::error::ValueError;
use thiserror::Error;

use crate::schema::Cardinality;

/// Errors raised by schema and document operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Unknown attribute {attribute} on {type_name}")]
    UnknownAttribute { type_name: String, attribute: String },

    #[error("Unknown embedded slot {slot} on {type_name}")]
    UnknownSlot { type_name: String, slot: String },

    #[error("Embedded slot {slot} holds {expected} document(s)")]
    Cardinality { slot: String, expected: Cardinality },

    #[error("Embedded slot {slot} expects {expected}, got {found}")]
    WrongChildType {
        slot: String,
        expected: String,
        found: String,
    },

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error("Loader error: {0}")]
    Load(String),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Errors that abort a callback chain
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CallbackError {
    #[error("Embedded documents nested {depth} levels deep (max: {max})")]
    DepthExceeded { depth: usize, max: usize },

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Aborted: {0}")]
    Aborted(String),
}

impl CallbackError {
    /// Abort the chain from inside a handler or continuation
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Aborted(reason.into())
    }
}

impl From<ValueError> for CallbackError {
    fn from(err: ValueError) -> Self {
        Self::Document(DocumentError::Value(err))
    }
}

pub type CallbackResult<T> = Result<T, CallbackError>;
