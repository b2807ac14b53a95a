//! # dc-attachments
//!
//! File attachment fields for schemaless document types.
//!
//! ## Features
//!
//! - Attachment field registration backed by four metadata attributes
//! - Path partitioning for string document identifiers
//! - Placeholder interpolation for storage paths and URLs
//! - Pluggable attachment engines, with an in-memory engine included
//!
//! ## Example
//!
//! ```rust,ignore
//! use dc_attachments::{AttachmentEngine, AttachmentOptions, AttachmentSupport, MemoryEngine, Upload};
//! use dc_documents::{Document, DocumentType};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(MemoryEngine::default());
//! let support = AttachmentSupport::load(Some(engine.clone() as Arc<dyn AttachmentEngine>))?;
//!
//! let user = DocumentType::new("User");
//! support.has_attached_file(&user, "avatar", AttachmentOptions::new())?;
//!
//! let mut doc = Document::with_id(user, id);
//! engine.assign(doc.data_mut(), "avatar", Upload::new("me.png", png_bytes))?;
//! doc.save(|_| Ok(()))?; // stores the file under users/avatars/<id partition>/original/me.png
//! ```

pub mod attachment;
pub mod engine;
pub mod error;
pub mod interpolations;
pub mod memory;
pub mod model;
pub mod options;
pub mod partition;
pub mod registrar;

pub use attachment::{epoch_seconds, Attachment};
pub use engine::AttachmentEngine;
pub use error::{AttachmentError, AttachmentResult};
pub use interpolations::{Interpolations, Interpolator};
pub use memory::MemoryEngine;
pub use model::{AttachmentField, Upload, METADATA_ATTRIBUTES};
pub use options::{AttachmentOptions, AttachmentValidations};
pub use partition::{partition_id, SEGMENT_WIDTH};
pub use registrar::AttachmentSupport;
