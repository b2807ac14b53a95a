//! Attachment field model
//!
//! Every attachment field `<f>` is backed by four plain document
//! attributes holding its metadata.

use std::sync::Arc;

use bytes::Bytes;
use dc_core::types::AttributeType;
use dc_documents::{AttributeDef, DocumentData, DocumentType};
use serde::{Deserialize, Serialize};

use crate::error::{AttachmentError, AttachmentResult};

/// Identity of a document type. Two types with the same name are distinct.
/// Whoever stores a key also keeps the type alive, so the address is never
/// reused while the key exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypeKey(usize);

impl TypeKey {
    pub(crate) fn of(doc_type: &Arc<DocumentType>) -> Self {
        Self(Arc::as_ptr(doc_type) as usize)
    }
}

/// Metadata attribute suffixes and their types, in declaration order
pub const METADATA_ATTRIBUTES: [(&str, AttributeType); 4] = [
    ("file_name", AttributeType::Text),
    ("content_type", AttributeType::Text),
    ("file_size", AttributeType::Integer),
    ("updated_at", AttributeType::Timestamp),
];

/// A named attachment field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentField {
    name: String,
}

impl AttachmentField {
    /// Field names must be non-empty and made of ASCII letters, digits, or `_`
    pub fn new(name: impl Into<String>) -> AttachmentResult<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(AttachmentError::InvalidFieldName(name));
        }
        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn attribute(&self, suffix: &str) -> String {
        format!("{}_{}", self.name, suffix)
    }

    pub fn file_name_attr(&self) -> String {
        self.attribute("file_name")
    }

    pub fn content_type_attr(&self) -> String {
        self.attribute("content_type")
    }

    pub fn file_size_attr(&self) -> String {
        self.attribute("file_size")
    }

    pub fn updated_at_attr(&self) -> String {
        self.attribute("updated_at")
    }

    /// The four backing attribute definitions
    pub fn attributes(&self) -> Vec<AttributeDef> {
        METADATA_ATTRIBUTES
            .iter()
            .map(|(suffix, attribute_type)| AttributeDef {
                name: self.attribute(suffix),
                attribute_type: *attribute_type,
            })
            .collect()
    }

    /// Declare the backing attributes on a type. Safe to repeat.
    pub fn declare_on(&self, doc_type: &DocumentType) {
        for def in self.attributes() {
            doc_type.define_attribute(def.name, def.attribute_type);
        }
    }

    pub fn remove_from(&self, doc_type: &DocumentType) {
        for def in self.attributes() {
            doc_type.remove_attribute(&def.name);
        }
    }

    /// Reset all four attributes to absent on one document
    pub fn clear(&self, data: &mut DocumentData) {
        for def in self.attributes() {
            data.clear_attribute(&def.name);
        }
    }
}

impl std::fmt::Display for AttachmentField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// An uploaded file waiting to be assigned to a field
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn content_type(mut self, ct: impl Into<String>) -> Self {
        self.content_type = Some(ct.into());
        self
    }

    /// Declared content type, or a guess from the file name
    pub fn resolved_content_type(&self) -> String {
        self.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&self.file_name)
                .first_or_octet_stream()
                .to_string()
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
