//! Attachment errors

use dc_documents::{CallbackError, DocumentError};
use thiserror::Error;

/// Attachment errors
#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("Configuration error: attachment engine unavailable ({0})")]
    MissingDependency(String),
    #[error("{type_name} has no id yet; cannot build a path for {field}")]
    MissingIdentifier { type_name: String, field: String },
    #[error("Invalid attachment field name: {0:?}")]
    InvalidFieldName(String),
    #[error("No attachment {field} registered on {type_name}")]
    UnknownField { type_name: String, field: String },
    #[error("Cannot interpolate :{placeholder}: {message}")]
    Interpolation { placeholder: String, message: String },
    #[error("Invalid file: {0}")]
    InvalidFile(String),
    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },
    #[error("File too small: {size} bytes (min: {min} bytes)")]
    FileTooSmall { size: u64, min: u64 },
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),
    #[error("Stored file not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Callback(#[from] CallbackError),
}

pub type AttachmentResult<T> = Result<T, AttachmentError>;

impl From<AttachmentError> for CallbackError {
    /// Engine hooks run inside callback chains; their failures abort the chain
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::Callback(inner) => inner,
            AttachmentError::Document(inner) => CallbackError::Document(inner),
            other => CallbackError::abort(other.to_string()),
        }
    }
}
