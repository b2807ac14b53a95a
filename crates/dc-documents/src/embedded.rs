//! Embedded association state
//!
//! A slot missing from `EmbeddedState` has not been loaded. Staging a child
//! into an unloaded embeds-many slot marks it loaded with just the staged
//! children.

use std::collections::HashMap;

use crate::document::{Document, DocumentData};
use crate::error::DocumentResult;
use crate::schema::EmbeddedSlot;

/// Fetches embedded children from the store on first access
pub trait DocumentLoader {
    fn load_embedded(&self, parent: &DocumentData, slot: &EmbeddedSlot)
        -> DocumentResult<Vec<Document>>;
}

/// Materialized contents of one slot
#[derive(Debug, Clone)]
pub enum LoadedSlot {
    One(Option<Box<Document>>),
    Many(Vec<Document>),
}

impl LoadedSlot {
    fn iter(&self) -> Box<dyn Iterator<Item = &Document> + '_> {
        match self {
            Self::One(child) => Box::new(child.as_deref().into_iter()),
            Self::Many(children) => Box::new(children.iter()),
        }
    }

    fn iter_mut(&mut self) -> Box<dyn Iterator<Item = &mut Document> + '_> {
        match self {
            Self::One(child) => Box::new(child.as_deref_mut().into_iter()),
            Self::Many(children) => Box::new(children.iter_mut()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(child) => usize::from(child.is_some()),
            Self::Many(children) => children.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loaded slots of one document, keyed by slot name
#[derive(Debug, Clone, Default)]
pub struct EmbeddedState {
    slots: HashMap<String, LoadedSlot>,
}

impl EmbeddedState {
    pub fn is_loaded(&self, slot: &str) -> bool {
        self.slots.contains_key(slot)
    }

    pub(crate) fn set(&mut self, slot: &str, loaded: LoadedSlot) {
        self.slots.insert(slot.to_string(), loaded);
    }

    pub(crate) fn push(&mut self, slot: &str, child: Document) {
        let loaded = self
            .slots
            .entry(slot.to_string())
            .or_insert_with(|| LoadedSlot::Many(Vec::new()));
        if let LoadedSlot::Many(children) = loaded {
            children.push(child);
        } else {
            *loaded = LoadedSlot::Many(vec![child]);
        }
    }

    /// Already-materialized children of a slot
    pub fn loaded(&self, slot: &str) -> Vec<&Document> {
        self.slots
            .get(slot)
            .map(|loaded| loaded.iter().collect())
            .unwrap_or_default()
    }

    /// Materialized children across `slots`, in the given slot order
    pub fn loaded_in_order(&self, slots: &[EmbeddedSlot]) -> Vec<&Document> {
        slots
            .iter()
            .filter_map(|slot| self.slots.get(slot.name()))
            .flat_map(|loaded| loaded.iter())
            .collect()
    }

    /// Mutable variant of `loaded_in_order`
    pub fn loaded_in_order_mut(&mut self, slots: &[EmbeddedSlot]) -> Vec<&mut Document> {
        let mut by_name: HashMap<&str, &mut LoadedSlot> = self
            .slots
            .iter_mut()
            .map(|(name, loaded)| (name.as_str(), loaded))
            .collect();

        let mut children = Vec::new();
        for slot in slots {
            if let Some(loaded) = by_name.remove(slot.name()) {
                children.extend(loaded.iter_mut());
            }
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DocumentType;
    use dc_core::types::DocumentId;

    fn doc(type_name: &str, id: &str) -> Document {
        Document::with_id(DocumentType::new(type_name), DocumentId::parse(id).unwrap())
    }

    fn ids(docs: &[&Document]) -> Vec<String> {
        docs.iter()
            .map(|d| d.id().map(|i| i.to_string()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_unloaded_slot_has_no_children() {
        let state = EmbeddedState::default();
        assert!(!state.is_loaded("comments"));
        assert!(state.loaded("comments").is_empty());
    }

    #[test]
    fn test_loaded_in_declaration_order() {
        let post = DocumentType::new("Post");
        let photo = DocumentType::new("Photo");
        let comment = DocumentType::new("Comment");
        post.embeds_one("cover", photo);
        post.embeds_many("comments", comment);

        let mut state = EmbeddedState::default();
        // Comments go in first; declaration order must still win.
        state.push("comments", doc("Comment", "c1"));
        state.push("comments", doc("Comment", "c2"));
        state.set("cover", LoadedSlot::One(Some(Box::new(doc("Photo", "p1")))));

        let slots = post.embedded_slots();
        assert_eq!(ids(&state.loaded_in_order(&slots)), vec!["p1", "c1", "c2"]);

        let mut_ids: Vec<String> = state
            .loaded_in_order_mut(&slots)
            .into_iter()
            .map(|d| d.id().map(|i| i.to_string()).unwrap_or_default())
            .collect();
        assert_eq!(mut_ids, vec!["p1", "c1", "c2"]);
    }

    #[test]
    fn test_empty_one_slot_counts_as_loaded() {
        let mut state = EmbeddedState::default();
        state.set("cover", LoadedSlot::One(None));
        assert!(state.is_loaded("cover"));
        assert!(state.loaded("cover").is_empty());
    }
}
