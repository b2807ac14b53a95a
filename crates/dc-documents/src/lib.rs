//! # dc-documents
//!
//! Document types and instances for a schemaless document store.
//!
//! ## Features
//!
//! - Runtime schemas: attributes are declared (and removed) on a shared
//!   `DocumentType`, visible to every instance of that type
//! - Embedded associations (one / many), loaded lazily through a `DocumentLoader`
//! - Lifecycle callbacks per phase, propagated to loaded embedded children
//!
//! ## Example
//!
//! ```rust,ignore
//! use dc_documents::{CallbackPhase, Document, DocumentType};
//! use dc_core::AttributeType;
//!
//! let address = DocumentType::new("Address");
//! let user = DocumentType::new("User");
//! user.define_attribute("name", AttributeType::Text);
//! user.embeds_many("addresses", address.clone());
//!
//! address.on(CallbackPhase::AfterSave, "geocode", |data| Ok(()));
//!
//! let mut doc = Document::new(user);
//! doc.push_embedded("addresses", Document::new(address))?;
//! doc.save(|_| Ok(()))?; // runs the address's after_save, then the user's
//! ```

pub mod callbacks;
pub mod document;
pub mod embedded;
pub mod error;
pub mod propagation;
pub mod schema;

pub use callbacks::{noop, CallbackHandler, CallbackPhase, CallbackRegistry, Continuation, Handler};
pub use document::{Document, DocumentData};
pub use embedded::{DocumentLoader, EmbeddedState, LoadedSlot};
pub use error::{CallbackError, CallbackResult, DocumentError, DocumentResult};
pub use propagation::EmbeddedCallbacks;
pub use schema::{AttributeDef, Cardinality, DocumentType, EmbeddedSlot};
