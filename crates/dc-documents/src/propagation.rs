//! Embedded callback propagation
//!
//! Wraps the base dispatch so that loaded embedded children run the same
//! phase before their parent. The parent's continuation runs the caller's
//! continuation, then each participating child in slot-declaration and
//! document order (each with its own subtree). The parent's own handlers
//! run last.
//!
//! Only children already in memory take part. Nothing here calls a
//! `DocumentLoader`.

use std::sync::Arc;

use dc_core::config::CallbackSettings;
use tracing::{debug, instrument, warn};

use crate::callbacks::{noop, CallbackPhase, Continuation};
use crate::document::Document;
use crate::error::{CallbackError, CallbackResult};

/// Callback runner that threads loaded embedded children into the chain
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedCallbacks {
    max_depth: usize,
}

impl Default for EmbeddedCallbacks {
    fn default() -> Self {
        Self::from_settings(&CallbackSettings::default())
    }
}

impl EmbeddedCallbacks {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn from_settings(settings: &CallbackSettings) -> Self {
        Self::new(settings.max_embedding_depth)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Run `phase` on `doc` and its loaded embedded subtree.
    ///
    /// Trees nested deeper than the limit are rejected before any handler
    /// or the continuation runs.
    #[instrument(level = "debug", skip(self, doc, continuation), fields(doc_type = %doc.data.type_name()))]
    pub fn run<'a>(
        &self,
        doc: &'a mut Document,
        phase: CallbackPhase,
        continuation: Continuation<'a>,
    ) -> CallbackResult<()> {
        let depth = loaded_depth(doc);
        if depth > self.max_depth {
            warn!(depth, max = self.max_depth, %phase, "Embedded nesting exceeds limit");
            return Err(CallbackError::DepthExceeded {
                depth,
                max: self.max_depth,
            });
        }
        run_with_children(doc, phase, continuation)
    }
}

fn run_with_children<'a>(
    doc: &'a mut Document,
    phase: CallbackPhase,
    continuation: Continuation<'a>,
) -> CallbackResult<()> {
    let Document { data, embedded } = doc;
    let doc_type = Arc::clone(data.doc_type());
    let slots = doc_type.embedded_slots();
    let children = embedded.loaded_in_order_mut(&slots);

    // Siblings run one after another inside a single link, so stack use
    // grows with nesting depth only.
    let chain: Continuation<'a> = Box::new(move || {
        continuation()?;
        for child in children {
            if !participates(child, phase) {
                debug!(%phase, child_type = %child.data.type_name(), "Skipping embedded child without handlers");
                continue;
            }
            run_with_children(child, phase, noop())?;
        }
        Ok(())
    });

    doc_type.callbacks().run(phase, data, chain)
}

/// A child joins the chain when its type, or the type of any loaded
/// descendant, declares handlers for the phase.
fn participates(doc: &Document, phase: CallbackPhase) -> bool {
    let mut stack = vec![doc];
    while let Some(current) = stack.pop() {
        if current.data.doc_type().callbacks().declares(phase) {
            return true;
        }
        let slots = current.data.doc_type().embedded_slots();
        stack.extend(current.embedded.loaded_in_order(&slots));
    }
    false
}

/// Depth of the loaded embedded tree; a document with no loaded children is 0
fn loaded_depth(doc: &Document) -> usize {
    let mut max = 0;
    let mut stack = vec![(doc, 0usize)];
    while let Some((current, depth)) = stack.pop() {
        max = max.max(depth);
        let slots = current.data.doc_type().embedded_slots();
        stack.extend(
            current
                .embedded
                .loaded_in_order(&slots)
                .into_iter()
                .map(|child| (child, depth + 1)),
        );
    }
    max
}
