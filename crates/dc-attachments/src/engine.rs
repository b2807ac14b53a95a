//! Attachment engine interface
//!
//! The engine owns storage, processing, and the placeholder table. This
//! crate only installs it into document types and feeds it field
//! declarations.

use std::sync::Arc;

use dc_documents::DocumentType;

use crate::error::AttachmentResult;
use crate::interpolations::Interpolations;
use crate::model::AttachmentField;
use crate::options::AttachmentOptions;

/// An attachment engine
#[cfg_attr(test, mockall::automock)]
pub trait AttachmentEngine: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    /// Install the engine's per-type capability set. Called once per type.
    fn include_capabilities(&self, doc_type: &Arc<DocumentType>) -> AttachmentResult<()>;

    /// Install the document-store glue for a type. Called once per type,
    /// after `include_capabilities`.
    fn include_glue(&self, doc_type: &Arc<DocumentType>) -> AttachmentResult<()>;

    /// Activate one attachment field. Called on every registration.
    fn has_attached_file(
        &self,
        doc_type: &Arc<DocumentType>,
        field: &AttachmentField,
        options: &AttachmentOptions,
    ) -> AttachmentResult<()>;

    /// Deactivate a field previously activated with `has_attached_file`
    fn remove_attached_file(&self, doc_type: &Arc<DocumentType>, field: &AttachmentField) -> AttachmentResult<()>;

    /// Placeholder table used for path and URL templates
    fn interpolations(&self) -> &Interpolations;
}
