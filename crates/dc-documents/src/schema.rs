//! Document type schemas
//!
//! A `DocumentType` is shared (behind an `Arc`) by every instance of that
//! type, so declaring or removing an attribute is visible to all of them.

use std::fmt;
use std::sync::Arc;

use dc_core::types::AttributeType;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::callbacks::{CallbackPhase, CallbackRegistry, CallbackResult};
use crate::document::DocumentData;

/// A declared attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    pub attribute_type: AttributeType,
}

/// How many documents an embedded slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    One,
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("one"),
            Self::Many => f.write_str("many"),
        }
    }
}

/// An embedded-association slot declared on a type
#[derive(Debug, Clone)]
pub struct EmbeddedSlot {
    name: String,
    child_type: Arc<DocumentType>,
    cardinality: Cardinality,
}

impl EmbeddedSlot {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn child_type(&self) -> &Arc<DocumentType> {
        &self.child_type
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
}

/// Schema of one document type
pub struct DocumentType {
    name: String,
    parent: Option<Arc<DocumentType>>,
    attributes: RwLock<Vec<AttributeDef>>,
    slots: RwLock<Vec<EmbeddedSlot>>,
    callbacks: CallbackRegistry,
}

impl DocumentType {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: None,
            attributes: RwLock::new(Vec::new()),
            slots: RwLock::new(Vec::new()),
            callbacks: CallbackRegistry::new(),
        })
    }

    /// A type that embedded slots declared for `parent` also accept.
    ///
    /// Attributes and callbacks are not inherited; they are declared per type.
    pub fn subtype(name: impl Into<String>, parent: &Arc<DocumentType>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(Arc::clone(parent)),
            attributes: RwLock::new(Vec::new()),
            slots: RwLock::new(Vec::new()),
            callbacks: CallbackRegistry::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<DocumentType>> {
        self.parent.as_ref()
    }

    /// Whether this type is `other` or one of its subtypes
    pub fn is_a(&self, other: &DocumentType) -> bool {
        let mut current = Some(self);
        while let Some(t) = current {
            if std::ptr::eq(t, other) {
                return true;
            }
            current = t.parent.as_deref();
        }
        false
    }

    /// Declare an attribute, replacing any earlier declaration of the same name
    pub fn define_attribute(&self, name: impl Into<String>, attribute_type: AttributeType) {
        let name = name.into();
        let mut attributes = self.attributes.write();
        match attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.attribute_type = attribute_type,
            None => {
                debug!(doc_type = %self.name, attribute = %name, %attribute_type, "Attribute defined");
                attributes.push(AttributeDef {
                    name,
                    attribute_type,
                });
            }
        }
    }

    /// Remove an attribute declaration. Returns whether it existed.
    pub fn remove_attribute(&self, name: &str) -> bool {
        let mut attributes = self.attributes.write();
        let before = attributes.len();
        attributes.retain(|a| a.name != name);
        before != attributes.len()
    }

    pub fn attribute(&self, name: &str) -> Option<AttributeDef> {
        self.attributes.read().iter().find(|a| a.name == name).cloned()
    }

    /// All declared attributes, in declaration order
    pub fn attributes(&self) -> Vec<AttributeDef> {
        self.attributes.read().clone()
    }

    pub fn embeds_one(&self, slot: impl Into<String>, child_type: Arc<DocumentType>) {
        self.declare_slot(slot.into(), child_type, Cardinality::One);
    }

    pub fn embeds_many(&self, slot: impl Into<String>, child_type: Arc<DocumentType>) {
        self.declare_slot(slot.into(), child_type, Cardinality::Many);
    }

    fn declare_slot(&self, name: String, child_type: Arc<DocumentType>, cardinality: Cardinality) {
        let slot = EmbeddedSlot {
            name,
            child_type,
            cardinality,
        };
        let mut slots = self.slots.write();
        match slots.iter_mut().find(|s| s.name == slot.name) {
            Some(existing) => *existing = slot,
            None => slots.push(slot),
        }
    }

    /// Embedded slots in declaration order
    pub fn embedded_slots(&self) -> Vec<EmbeddedSlot> {
        self.slots.read().clone()
    }

    pub fn embedded_slot(&self, name: &str) -> Option<EmbeddedSlot> {
        self.slots.read().iter().find(|s| s.name == name).cloned()
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Register a callback handler for a phase
    pub fn on<F>(&self, phase: CallbackPhase, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut DocumentData) -> CallbackResult<()> + Send + Sync + 'static,
    {
        self.callbacks.register(phase, name, handler);
    }
}

impl fmt::Debug for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slots: Vec<String> = self
            .slots
            .read()
            .iter()
            .map(|s| format!("{}:{}", s.name, s.child_type.name))
            .collect();
        f.debug_struct("DocumentType")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name.clone()))
            .field("attributes", &*self.attributes.read())
            .field("slots", &slots)
            .finish()
    }
}
