//! Document instances

use std::collections::BTreeMap;
use std::sync::Arc;

use dc_core::error::ValueError;
use dc_core::traits::{AttributeReader, Identifiable, Record};
use dc_core::types::{DocumentId, Value};
use tracing::{debug, instrument};

use crate::callbacks::{noop, CallbackPhase, Continuation};
use crate::embedded::{DocumentLoader, EmbeddedState, LoadedSlot};
use crate::error::{CallbackResult, DocumentError, DocumentResult};
use crate::propagation::EmbeddedCallbacks;
use crate::schema::{Cardinality, DocumentType, EmbeddedSlot};

/// A document's own state: type, identifier, and attribute values.
///
/// This is what callback handlers receive. Embedded children live next to
/// it in `Document`, which lets a parent's handlers run while the
/// composed chain still holds its children.
#[derive(Debug, Clone)]
pub struct DocumentData {
    doc_type: Arc<DocumentType>,
    id: Option<DocumentId>,
    attributes: BTreeMap<String, Value>,
}

impl DocumentData {
    pub fn new(doc_type: Arc<DocumentType>) -> Self {
        Self {
            doc_type,
            id: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn doc_type(&self) -> &Arc<DocumentType> {
        &self.doc_type
    }

    pub fn type_name(&self) -> &str {
        self.doc_type.name()
    }

    pub fn id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: DocumentId) {
        self.id = Some(id);
    }

    /// Write a declared attribute, checking its declared type
    pub fn write_attribute(&mut self, name: &str, value: impl Into<Value>) -> DocumentResult<()> {
        let value = value.into();
        let def = self
            .doc_type
            .attribute(name)
            .ok_or_else(|| DocumentError::UnknownAttribute {
                type_name: self.doc_type.name().to_string(),
                attribute: name.to_string(),
            })?;

        if !def.attribute_type.accepts(&value) {
            return Err(ValueError::TypeMismatch {
                attribute: name.to_string(),
                expected: def.attribute_type,
                found: value.attribute_type(),
            }
            .into());
        }

        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Reset an attribute to absent. Returns the previous value.
    pub fn clear_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Stored values, including ones whose declaration was removed
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }
}

impl Identifiable for DocumentData {
    fn document_id(&self) -> Option<&DocumentId> {
        self.id.as_ref()
    }
}

impl AttributeReader for DocumentData {
    fn read_attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

impl Record for DocumentData {
    fn type_name(&self) -> &str {
        self.doc_type.name()
    }
}

/// A document together with its embedded children
#[derive(Debug, Clone)]
pub struct Document {
    pub(crate) data: DocumentData,
    pub(crate) embedded: EmbeddedState,
}

impl Document {
    /// A new, unsaved document without an identifier
    pub fn new(doc_type: Arc<DocumentType>) -> Self {
        Self {
            data: DocumentData::new(doc_type),
            embedded: EmbeddedState::default(),
        }
    }

    pub fn with_id(doc_type: Arc<DocumentType>, id: DocumentId) -> Self {
        let mut doc = Self::new(doc_type);
        doc.data.id = Some(id);
        doc
    }

    /// Rebuild a document from raw stored values.
    ///
    /// Values are taken as stored, without type checks: stores do not
    /// always hand back the representation the schema declares.
    pub fn from_raw(
        doc_type: Arc<DocumentType>,
        id: Option<DocumentId>,
        attributes: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            data: DocumentData {
                doc_type,
                id,
                attributes,
            },
            embedded: EmbeddedState::default(),
        }
    }

    pub fn data(&self) -> &DocumentData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DocumentData {
        &mut self.data
    }

    pub fn doc_type(&self) -> &Arc<DocumentType> {
        &self.data.doc_type
    }

    pub fn id(&self) -> Option<&DocumentId> {
        self.data.id()
    }

    pub fn write_attribute(&mut self, name: &str, value: impl Into<Value>) -> DocumentResult<()> {
        self.data.write_attribute(name, value)
    }

    fn slot(&self, name: &str) -> DocumentResult<EmbeddedSlot> {
        self.doc_type()
            .embedded_slot(name)
            .ok_or_else(|| DocumentError::UnknownSlot {
                type_name: self.data.type_name().to_string(),
                slot: name.to_string(),
            })
    }

    fn check_child(slot: &EmbeddedSlot, child: &Document) -> DocumentResult<()> {
        if !child.doc_type().is_a(slot.child_type()) {
            return Err(DocumentError::WrongChildType {
                slot: slot.name().to_string(),
                expected: slot.child_type().name().to_string(),
                found: child.data.type_name().to_string(),
            });
        }
        Ok(())
    }

    /// Stage a child into an embeds-one slot, replacing any current child
    pub fn embed_one(&mut self, slot: &str, child: Document) -> DocumentResult<()> {
        let slot = self.slot(slot)?;
        if slot.cardinality() != Cardinality::One {
            return Err(DocumentError::Cardinality {
                slot: slot.name().to_string(),
                expected: slot.cardinality(),
            });
        }
        Self::check_child(&slot, &child)?;
        self.embedded
            .set(slot.name(), LoadedSlot::One(Some(Box::new(child))));
        Ok(())
    }

    /// Stage a child into an embeds-many slot
    pub fn push_embedded(&mut self, slot: &str, child: Document) -> DocumentResult<()> {
        let slot = self.slot(slot)?;
        if slot.cardinality() != Cardinality::Many {
            return Err(DocumentError::Cardinality {
                slot: slot.name().to_string(),
                expected: slot.cardinality(),
            });
        }
        Self::check_child(&slot, &child)?;
        self.embedded.push(slot.name(), child);
        Ok(())
    }

    /// Children of a slot that are already in memory; never loads
    pub fn loaded_children(&self, slot: &str) -> Vec<&Document> {
        self.embedded.loaded(slot)
    }

    pub fn is_loaded(&self, slot: &str) -> bool {
        self.embedded.is_loaded(slot)
    }

    /// Children of a slot, loading them through `loader` on first access
    pub fn embedded<L>(&mut self, slot: &str, loader: &L) -> DocumentResult<Vec<&Document>>
    where
        L: DocumentLoader + ?Sized,
    {
        let slot_def = self.slot(slot)?;
        if !self.embedded.is_loaded(slot) {
            let children = loader.load_embedded(&self.data, &slot_def)?;
            for child in &children {
                Self::check_child(&slot_def, child)?;
            }
            debug!(doc_type = %self.data.type_name(), slot, count = children.len(), "Embedded slot loaded");
            let loaded = match slot_def.cardinality() {
                Cardinality::One => {
                    if children.len() > 1 {
                        return Err(DocumentError::Cardinality {
                            slot: slot.to_string(),
                            expected: Cardinality::One,
                        });
                    }
                    LoadedSlot::One(children.into_iter().next().map(Box::new))
                }
                Cardinality::Many => LoadedSlot::Many(children),
            };
            self.embedded.set(slot, loaded);
        }
        Ok(self.embedded.loaded(slot))
    }

    /// Mutable access to loaded children of every declared slot, in
    /// slot-declaration order then within-slot order
    pub fn all_loaded_children_mut(&mut self) -> Vec<&mut Document> {
        let slots = self.data.doc_type.embedded_slots();
        self.embedded.loaded_in_order_mut(&slots)
    }

    /// Assign fresh ids to this document and loaded children lacking one
    pub fn assign_ids(&mut self) {
        if self.data.id.is_none() {
            self.data.id = Some(DocumentId::generate());
        }
        for child in self.all_loaded_children_mut() {
            child.assign_ids();
        }
    }

    /// Run `phase` on this document and its loaded embedded children.
    ///
    /// `continuation` runs first, then each participating child, then this
    /// document's own handlers. Uses the default depth limit.
    pub fn run_callbacks<'a>(
        &'a mut self,
        phase: CallbackPhase,
        continuation: Continuation<'a>,
    ) -> CallbackResult<()> {
        EmbeddedCallbacks::default().run(self, phase, continuation)
    }

    /// Base dispatch on this document only, ignoring embedded children
    pub fn run_own_callbacks(
        &mut self,
        phase: CallbackPhase,
        continuation: Continuation<'_>,
    ) -> CallbackResult<()> {
        let doc_type = Arc::clone(&self.data.doc_type);
        doc_type.callbacks().run(phase, &mut self.data, continuation)
    }

    /// Save lifecycle: `before_save`, `persist`, `after_save`
    #[instrument(skip(self, persist), fields(doc_type = %self.data.type_name()))]
    pub fn save<P>(&mut self, persist: P) -> CallbackResult<()>
    where
        P: FnOnce(&DocumentData) -> CallbackResult<()>,
    {
        self.assign_ids();
        self.run_callbacks(CallbackPhase::BeforeSave, noop())?;
        persist(&self.data)?;
        self.run_callbacks(CallbackPhase::AfterSave, noop())
    }

    /// Destroy lifecycle: `before_destroy`, `remove`, `after_destroy`
    #[instrument(skip(self, remove), fields(doc_type = %self.data.type_name()))]
    pub fn destroy<R>(&mut self, remove: R) -> CallbackResult<()>
    where
        R: FnOnce(&DocumentData) -> CallbackResult<()>,
    {
        self.run_callbacks(CallbackPhase::BeforeDestroy, noop())?;
        remove(&self.data)?;
        self.run_callbacks(CallbackPhase::AfterDestroy, noop())
    }
}

impl Identifiable for Document {
    fn document_id(&self) -> Option<&DocumentId> {
        self.data.id()
    }
}

impl AttributeReader for Document {
    fn read_attribute(&self, name: &str) -> Option<&Value> {
        self.data.read_attribute(name)
    }
}

impl Record for Document {
    fn type_name(&self) -> &str {
        self.data.type_name()
    }
}
