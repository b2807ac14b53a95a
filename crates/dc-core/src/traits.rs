//! Core traits shared by documents and the attachment layer

use crate::types::{DocumentId, Value};

/// Trait for documents that carry a store-assigned identifier
pub trait Identifiable {
    fn document_id(&self) -> Option<&DocumentId>;
    fn is_persisted(&self) -> bool {
        self.document_id().is_some()
    }
    fn is_new_record(&self) -> bool {
        !self.is_persisted()
    }
}

/// Read access to stored attribute values
pub trait AttributeReader {
    /// Raw stored value, `None` when the attribute is absent
    fn read_attribute(&self, name: &str) -> Option<&Value>;

    fn has_attribute(&self, name: &str) -> bool {
        self.read_attribute(name).is_some()
    }
}

/// Base trait for anything the attachment engine can be pointed at
pub trait Record: Identifiable + AttributeReader {
    /// Name of the document type (used for path interpolation)
    fn type_name(&self) -> &str;
}
