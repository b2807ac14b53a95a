//! Attachment field registration
//!
//! `AttachmentSupport` binds an attachment engine to document types. The
//! first field registered on a type installs the engine's capabilities and
//! glue into it; every registration after that only activates the field
//! and (re)declares its four metadata attributes.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dc_documents::{DocumentData, DocumentType};
use tracing::{debug, error, info, instrument};

use crate::attachment::Attachment;
use crate::engine::AttachmentEngine;
use crate::error::{AttachmentError, AttachmentResult};
use crate::model::{AttachmentField, TypeKey};
use crate::options::AttachmentOptions;
use crate::partition;

/// A type that has received the engine's capabilities. Glue is tracked
/// separately so a failed glue step is retried without reinstalling
/// capabilities.
struct CapableType {
    doc_type: Arc<DocumentType>,
    glue_installed: bool,
    fields: Vec<(AttachmentField, Arc<AttachmentOptions>)>,
}

impl CapableType {
    fn upsert(&mut self, field: AttachmentField, options: Arc<AttachmentOptions>) {
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some(existing) => existing.1 = options,
            None => self.fields.push((field, options)),
        }
    }
}

pub struct AttachmentSupport {
    engine: Arc<dyn AttachmentEngine>,
    capable: DashMap<TypeKey, CapableType>,
}

impl AttachmentSupport {
    /// Load attachment support on top of an engine.
    ///
    /// Fails with `MissingDependency` when no engine is installed. On
    /// success the engine's `:id_partition` is replaced with string-id
    /// partitioning.
    pub fn load(engine: Option<Arc<dyn AttachmentEngine>>) -> AttachmentResult<Self> {
        let Some(engine) = engine else {
            error!("Attachment support needs an attachment engine. Install one before declaring attachment fields.");
            return Err(AttachmentError::MissingDependency(
                "no attachment engine installed".to_string(),
            ));
        };

        partition::install(engine.interpolations());
        info!(engine = engine.name(), "Attachment support loaded");
        Ok(Self {
            engine,
            capable: DashMap::new(),
        })
    }

    pub fn engine(&self) -> &Arc<dyn AttachmentEngine> {
        &self.engine
    }

    /// Declare an attachment field on a document type.
    ///
    /// Capabilities and glue are installed at most once per type, even when
    /// several threads register fields on the same type at the same time.
    /// The field is activated and its metadata attributes declared on every
    /// call.
    #[instrument(skip(self, doc_type, options), fields(doc_type = %doc_type.name()))]
    pub fn has_attached_file(
        &self,
        doc_type: &Arc<DocumentType>,
        field: &str,
        options: AttachmentOptions,
    ) -> AttachmentResult<AttachmentField> {
        let field = AttachmentField::new(field)?;
        let options = Arc::new(options);

        // The entry guard is held through activation so racing first
        // registrations see the type either untouched or fully capable.
        let mut capable = match self.capable.entry(TypeKey::of(doc_type)) {
            Entry::Occupied(occupied) => occupied.into_ref(),
            Entry::Vacant(vacant) => {
                self.engine.include_capabilities(doc_type)?;
                info!(engine = self.engine.name(), "Attachment capabilities installed");
                vacant.insert(CapableType {
                    doc_type: Arc::clone(doc_type),
                    glue_installed: false,
                    fields: Vec::new(),
                })
            }
        };
        if !capable.glue_installed {
            self.engine.include_glue(doc_type)?;
            capable.glue_installed = true;
            debug!(engine = self.engine.name(), "Attachment glue installed");
        }

        self.engine.has_attached_file(doc_type, &field, &options)?;
        field.declare_on(doc_type);
        capable.upsert(field.clone(), options);

        debug!(field = %field, "Attachment field registered");
        Ok(field)
    }

    /// Remove a field: deactivate it in the engine and drop its metadata
    /// attribute declarations. Capabilities stay installed.
    #[instrument(skip(self, doc_type), fields(doc_type = %doc_type.name()))]
    pub fn remove_attached_file(&self, doc_type: &Arc<DocumentType>, field: &str) -> AttachmentResult<()> {
        let unknown = || AttachmentError::UnknownField {
            type_name: doc_type.name().to_string(),
            field: field.to_string(),
        };

        let mut capable = self
            .capable
            .get_mut(&TypeKey::of(doc_type))
            .ok_or_else(unknown)?;
        let position = capable
            .fields
            .iter()
            .position(|(f, _)| f.name() == field)
            .ok_or_else(unknown)?;

        let field = capable.fields[position].0.clone();
        self.engine.remove_attached_file(doc_type, &field)?;
        capable.fields.remove(position);
        field.remove_from(doc_type);
        debug!(field = %field, "Attachment field removed");
        Ok(())
    }

    /// Whether the engine's capabilities and glue were installed into
    /// `doc_type`
    pub fn is_capable(&self, doc_type: &Arc<DocumentType>) -> bool {
        self.capable
            .get(&TypeKey::of(doc_type))
            .map_or(false, |capable| capable.glue_installed)
    }

    /// Registered field names, in registration order
    pub fn attached_fields(&self, doc_type: &Arc<DocumentType>) -> Vec<String> {
        self.capable
            .get(&TypeKey::of(doc_type))
            .map(|capable| capable.fields.iter().map(|(f, _)| f.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Names of every capable type
    pub fn capable_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .capable
            .iter()
            .filter(|entry| entry.glue_installed)
            .map(|entry| entry.doc_type.name().to_string())
            .collect();
        names.sort();
        names
    }

    pub fn options(&self, doc_type: &Arc<DocumentType>, field: &str) -> Option<Arc<AttachmentOptions>> {
        self.capable.get(&TypeKey::of(doc_type)).and_then(|capable| {
            capable
                .fields
                .iter()
                .find(|(f, _)| f.name() == field)
                .map(|(_, options)| Arc::clone(options))
        })
    }

    /// Runtime view of a registered field on one document
    pub fn attachment<'a>(&self, data: &'a DocumentData, field: &str) -> AttachmentResult<Attachment<'a>> {
        let options = self
            .options(data.doc_type(), field)
            .ok_or_else(|| AttachmentError::UnknownField {
                type_name: data.type_name().to_string(),
                field: field.to_string(),
            })?;
        Ok(Attachment::new(AttachmentField::new(field)?, data, options))
    }
}

impl std::fmt::Debug for AttachmentSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentSupport")
            .field("engine", &self.engine.name())
            .field("capable_types", &self.capable_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockAttachmentEngine;
    use crate::interpolations::Interpolations;
    use dc_core::types::AttributeType;

    fn mock_engine(installs: usize, activations: usize) -> MockAttachmentEngine {
        let mut engine = MockAttachmentEngine::new();
        engine.expect_name().return_const("mock");
        engine.expect_interpolations().return_const(Interpolations::with_defaults());
        engine
            .expect_include_capabilities()
            .times(installs)
            .returning(|_| Ok(()));
        engine
            .expect_include_glue()
            .times(installs)
            .returning(|_| Ok(()));
        engine
            .expect_has_attached_file()
            .times(activations)
            .returning(|_, _, _| Ok(()));
        engine
    }

    #[test]
    fn test_load_without_engine() {
        let result = AttachmentSupport::load(None);
        assert!(matches!(result, Err(AttachmentError::MissingDependency(_))));
    }

    #[test]
    fn test_load_overrides_id_partition() {
        let engine: Arc<dyn AttachmentEngine> = Arc::new(mock_engine(0, 0));
        let support = AttachmentSupport::load(Some(engine)).unwrap();

        let data = {
            let mut data = DocumentData::new(DocumentType::new("User"));
            data.set_id(dc_core::types::DocumentId::parse("abcdef12").unwrap());
            data
        };
        let attachment = Attachment::new(
            AttachmentField::new("avatar").unwrap(),
            &data,
            Arc::new(AttachmentOptions::default()),
        );
        let partition = support
            .engine()
            .interpolations()
            .resolve("id_partition", &attachment, "original")
            .unwrap();
        assert_eq!(partition, "abcd/ef12");
    }

    #[test]
    fn test_capabilities_installed_once() {
        let engine: Arc<dyn AttachmentEngine> = Arc::new(mock_engine(1, 3));
        let support = AttachmentSupport::load(Some(engine)).unwrap();
        let user = DocumentType::new("User");

        support.has_attached_file(&user, "avatar", AttachmentOptions::default()).unwrap();
        support.has_attached_file(&user, "resume", AttachmentOptions::default()).unwrap();
        support.has_attached_file(&user, "avatar", AttachmentOptions::default()).unwrap();

        assert!(support.is_capable(&user));
        assert_eq!(support.attached_fields(&user), vec!["avatar", "resume"]);
        assert_eq!(user.attributes().len(), 8);
        assert_eq!(
            user.attribute("resume_updated_at").map(|a| a.attribute_type),
            Some(AttributeType::Timestamp)
        );
    }

    #[test]
    fn test_failed_install_leaves_type_untouched() {
        let mut engine = MockAttachmentEngine::new();
        engine.expect_name().return_const("mock");
        engine.expect_interpolations().return_const(Interpolations::new());
        engine
            .expect_include_capabilities()
            .returning(|_| Err(AttachmentError::MissingDependency("storage offline".into())));
        engine.expect_has_attached_file().never();

        let support = AttachmentSupport::load(Some(Arc::new(engine) as Arc<dyn AttachmentEngine>)).unwrap();
        let user = DocumentType::new("User");

        assert!(support
            .has_attached_file(&user, "avatar", AttachmentOptions::default())
            .is_err());
        assert!(!support.is_capable(&user));
        assert!(user.attributes().is_empty());
    }

    #[test]
    fn test_glue_retry_keeps_single_capability_install() {
        let mut engine = MockAttachmentEngine::new();
        engine.expect_name().return_const("mock");
        engine.expect_interpolations().return_const(Interpolations::new());
        engine
            .expect_include_capabilities()
            .times(1)
            .returning(|_| Ok(()));
        let mut glue_calls = 0;
        engine.expect_include_glue().times(2).returning(move |_| {
            glue_calls += 1;
            if glue_calls == 1 {
                Err(AttachmentError::MissingDependency("store not ready".into()))
            } else {
                Ok(())
            }
        });
        engine
            .expect_has_attached_file()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let support = AttachmentSupport::load(Some(Arc::new(engine) as Arc<dyn AttachmentEngine>)).unwrap();
        let user = DocumentType::new("User");

        assert!(support
            .has_attached_file(&user, "avatar", AttachmentOptions::default())
            .is_err());
        assert!(!support.is_capable(&user));
        assert!(support.capable_types().is_empty());
        assert!(user.attributes().is_empty());

        support.has_attached_file(&user, "avatar", AttachmentOptions::default()).unwrap();
        assert!(support.is_capable(&user));
        assert_eq!(support.attached_fields(&user), vec!["avatar"]);
    }

    #[test]
    fn test_invalid_field_name_rejected_before_engine() {
        let engine: Arc<dyn AttachmentEngine> = Arc::new(mock_engine(0, 0));
        let support = AttachmentSupport::load(Some(engine)).unwrap();
        let user = DocumentType::new("User");

        let result = support.has_attached_file(&user, "my avatar", AttachmentOptions::default());
        assert!(matches!(result, Err(AttachmentError::InvalidFieldName(_))));
        assert!(!support.is_capable(&user));
    }

    #[test]
    fn test_remove_attached_file() {
        let mut engine = mock_engine(1, 1);
        engine
            .expect_remove_attached_file()
            .times(1)
            .returning(|_, _| Ok(()));
        let support = AttachmentSupport::load(Some(Arc::new(engine) as Arc<dyn AttachmentEngine>)).unwrap();
        let user = DocumentType::new("User");
        user.define_attribute("name", AttributeType::Text);

        support.has_attached_file(&user, "avatar", AttachmentOptions::default()).unwrap();
        support.remove_attached_file(&user, "avatar").unwrap();

        assert!(support.attached_fields(&user).is_empty());
        assert_eq!(user.attributes().len(), 1);
        assert!(support.is_capable(&user));
        assert!(matches!(
            support.remove_attached_file(&user, "avatar"),
            Err(AttachmentError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_types_with_same_name_are_distinct() {
        let engine: Arc<dyn AttachmentEngine> = Arc::new(mock_engine(2, 2));
        let support = AttachmentSupport::load(Some(engine)).unwrap();
        let first = DocumentType::new("User");
        let second = DocumentType::new("User");

        support.has_attached_file(&first, "avatar", AttachmentOptions::default()).unwrap();
        support.has_attached_file(&second, "resume", AttachmentOptions::default()).unwrap();

        assert_eq!(support.attached_fields(&first), vec!["avatar"]);
        assert_eq!(support.attached_fields(&second), vec!["resume"]);
    }
}
