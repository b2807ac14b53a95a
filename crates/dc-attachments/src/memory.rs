//! In-memory attachment engine
//!
//! Keeps stored files in a map keyed by interpolated path. Useful for tests
//! and as a reference for real engines.
//!
//! Assigned files stay pending until the owning document's `after_save`
//! callbacks run, so a file on an embedded document is written when its
//! parent saves. `after_destroy` removes stored files and clears the
//! field's metadata.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use dc_core::config::{AttachmentDefaults, Settings};
use dc_core::traits::Identifiable;
use dc_documents::{CallbackError, CallbackPhase, DocumentData, DocumentType};
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use crate::attachment::Attachment;
use crate::engine::AttachmentEngine;
use crate::error::{AttachmentError, AttachmentResult};
use crate::interpolations::{missing_id, Interpolations};
use crate::model::{AttachmentField, TypeKey, Upload};
use crate::options::AttachmentOptions;

/// (type, field name)
type FieldKey = (TypeKey, String);
/// (type, document id, field name)
type PendingKey = (TypeKey, String, String);

#[derive(Default)]
struct EngineState {
    /// Every type the engine has seen, kept alive so `TypeKey`s stay unique
    types: HashMap<TypeKey, Arc<DocumentType>>,
    capability_installs: HashMap<TypeKey, usize>,
    glue_installs: HashMap<TypeKey, usize>,
    activations: HashMap<FieldKey, usize>,
    fields: HashMap<FieldKey, Arc<AttachmentOptions>>,
    pending: HashMap<PendingKey, Upload>,
    files: BTreeMap<String, Bytes>,
}

impl EngineState {
    fn track(&mut self, doc_type: &Arc<DocumentType>) -> TypeKey {
        let key = TypeKey::of(doc_type);
        self.types.entry(key).or_insert_with(|| Arc::clone(doc_type));
        key
    }
}

pub struct MemoryEngine {
    defaults: AttachmentDefaults,
    interpolations: Arc<Interpolations>,
    state: Arc<RwLock<EngineState>>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new(AttachmentDefaults::default())
    }
}

impl MemoryEngine {
    pub fn new(defaults: AttachmentDefaults) -> Self {
        Self {
            defaults,
            interpolations: Arc::new(Interpolations::with_defaults()),
            state: Arc::new(RwLock::new(EngineState::default())),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.attachments.clone())
    }

    pub fn defaults(&self) -> &AttachmentDefaults {
        &self.defaults
    }

    /// How many times capabilities were installed into a type
    pub fn capability_installs(&self, doc_type: &Arc<DocumentType>) -> usize {
        self.state
            .read()
            .capability_installs
            .get(&TypeKey::of(doc_type))
            .copied()
            .unwrap_or(0)
    }

    pub fn glue_installs(&self, doc_type: &Arc<DocumentType>) -> usize {
        self.state
            .read()
            .glue_installs
            .get(&TypeKey::of(doc_type))
            .copied()
            .unwrap_or(0)
    }

    /// How many times a field was activated
    pub fn activations(&self, doc_type: &Arc<DocumentType>, field: &str) -> usize {
        self.state
            .read()
            .activations
            .get(&(TypeKey::of(doc_type), field.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Options the field was last activated with
    pub fn field_options(&self, doc_type: &Arc<DocumentType>, field: &str) -> Option<Arc<AttachmentOptions>> {
        self.state
            .read()
            .fields
            .get(&(TypeKey::of(doc_type), field.to_string()))
            .cloned()
    }

    /// Assign an uploaded file to a field.
    ///
    /// Validates the upload against the field's options and writes the four
    /// metadata attributes. The bytes are stored when the document's
    /// `after_save` callbacks run.
    #[instrument(skip(self, data, upload), fields(doc_type = %data.type_name(), file_name = %upload.file_name))]
    pub fn assign(&self, data: &mut DocumentData, field: &str, upload: Upload) -> AttachmentResult<()> {
        let field = AttachmentField::new(field)?;
        let options = self
            .field_options(data.doc_type(), field.name())
            .ok_or_else(|| AttachmentError::UnknownField {
                type_name: data.type_name().to_string(),
                field: field.name().to_string(),
            })?;

        if upload.file_name.trim().is_empty() {
            return Err(AttachmentError::InvalidFile("file name is empty".to_string()));
        }
        let content_type = upload.resolved_content_type();
        options.validations.check(&content_type, upload.size())?;

        let id = data
            .id()
            .map(|id| id.to_string())
            .ok_or_else(|| AttachmentError::MissingIdentifier {
                type_name: data.type_name().to_string(),
                field: field.name().to_string(),
            })?;
        let size = i64::try_from(upload.size()).map_err(|_| AttachmentError::FileTooLarge {
            size: upload.size(),
            max: i64::MAX as u64,
        })?;

        data.write_attribute(&field.file_name_attr(), upload.file_name.as_str())?;
        data.write_attribute(&field.content_type_attr(), content_type.as_str())?;
        data.write_attribute(&field.file_size_attr(), size)?;
        data.write_attribute(&field.updated_at_attr(), Utc::now())?;

        let key = (TypeKey::of(data.doc_type()), id, field.name().to_string());
        if self.state.write().pending.insert(key, upload).is_some() {
            debug!(field = %field, "Replaced earlier pending upload");
        }
        debug!(field = %field, %content_type, size, "Attachment assigned");
        Ok(())
    }

    /// Drop an assigned upload that has not been stored yet and clear the
    /// field's metadata. Returns `false` when nothing was pending, in which
    /// case the document is left untouched.
    pub fn discard(&self, data: &mut DocumentData, field: &str) -> AttachmentResult<bool> {
        let field = AttachmentField::new(field)?;
        let Some(id) = data.id().map(|id| id.to_string()) else {
            return Ok(false);
        };
        let key = (TypeKey::of(data.doc_type()), id, field.name().to_string());
        if self.state.write().pending.remove(&key).is_none() {
            return Ok(false);
        }
        field.clear(data);
        debug!(doc_type = %data.type_name(), field = %field, "Pending upload discarded");
        Ok(true)
    }

    /// Storage path for a style, or the default style
    pub fn path(&self, attachment: &Attachment<'_>, style: Option<&str>) -> AttachmentResult<String> {
        let template = attachment
            .options()
            .path
            .as_deref()
            .unwrap_or(&self.defaults.default_path);
        let style = style.unwrap_or_else(|| self.default_style(attachment.options()));
        self.interpolations.interpolate(template, attachment, style)
    }

    /// Public URL for a style. Carries `?<updated_at>` when known so caches
    /// see a new URL after every upload.
    pub fn url(&self, attachment: &Attachment<'_>, style: Option<&str>) -> AttachmentResult<String> {
        let style = style.unwrap_or_else(|| self.default_style(attachment.options()));
        if !attachment.is_present() {
            let template = attachment
                .options()
                .default_url
                .as_deref()
                .unwrap_or("/:attachment/:style/missing.png");
            return self.interpolations.interpolate(template, attachment, style);
        }

        let template = attachment
            .options()
            .url
            .as_deref()
            .unwrap_or(&self.defaults.default_url);
        let url = self.interpolations.interpolate(template, attachment, style)?;
        Ok(match attachment.updated_at() {
            Some(seconds) => format!("{url}?{seconds}"),
            None => url,
        })
    }

    /// Stored bytes for a style
    pub fn read(&self, attachment: &Attachment<'_>, style: Option<&str>) -> AttachmentResult<Bytes> {
        let path = self.path(attachment, style)?;
        self.state
            .read()
            .files
            .get(&path)
            .cloned()
            .ok_or(AttachmentError::NotFound(path))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state.read().files.contains_key(path)
    }

    /// Every stored path, sorted
    pub fn stored_paths(&self) -> Vec<String> {
        self.state.read().files.keys().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state.read().pending.len()
    }

    fn default_style<'o>(&'o self, options: &'o AttachmentOptions) -> &'o str {
        options
            .default_style
            .as_deref()
            .unwrap_or(&self.defaults.default_style)
    }

    fn hook_name(field: &AttachmentField, hook: &str) -> String {
        format!("attachment:{}:{}", field.name(), hook)
    }
}

/// Everything a field's lifecycle hooks need
struct FieldHooks {
    field: AttachmentField,
    options: Arc<AttachmentOptions>,
    path_template: String,
    default_style: String,
    interpolations: Arc<Interpolations>,
    state: Arc<RwLock<EngineState>>,
}

impl FieldHooks {
    fn attachment<'a>(&self, data: &'a DocumentData) -> Attachment<'a> {
        Attachment::new(self.field.clone(), data, Arc::clone(&self.options))
    }

    fn pending_key(&self, data: &DocumentData) -> Option<PendingKey> {
        data.id().map(|id| {
            (
                TypeKey::of(data.doc_type()),
                id.to_string(),
                self.field.name().to_string(),
            )
        })
    }

    /// Write a pending upload to storage. The upload stays pending when
    /// the path cannot be built, so a later save can still store it.
    fn flush(&self, data: &mut DocumentData) -> AttachmentResult<()> {
        let Some(key) = self.pending_key(data) else {
            return Ok(());
        };
        if !self.state.read().pending.contains_key(&key) {
            return Ok(());
        }

        let path = self
            .interpolations
            .interpolate(&self.path_template, &self.attachment(data), &self.default_style)?;
        let mut state = self.state.write();
        let Some(upload) = state.pending.remove(&key) else {
            return Ok(());
        };
        info!(path = %path, size = upload.size(), "Stored attachment");
        state.files.insert(path, upload.data);
        Ok(())
    }

    /// Remove stored files for every style and clear the metadata
    fn purge(&self, data: &mut DocumentData) -> AttachmentResult<()> {
        if let Some(key) = self.pending_key(data) {
            self.state.write().pending.remove(&key);
        }

        let attachment = self.attachment(data);
        if attachment.is_present() {
            if attachment.record().document_id().is_none() {
                return Err(missing_id(&attachment));
            }
            let mut styles = vec![self.default_style.clone()];
            styles.extend(self.options.styles.keys().cloned());

            let mut paths = Vec::with_capacity(styles.len());
            for style in &styles {
                paths.push(self.interpolations.interpolate(&self.path_template, &attachment, style)?);
            }
            let mut state = self.state.write();
            for path in paths {
                if state.files.remove(&path).is_some() {
                    info!(path = %path, "Deleted attachment");
                }
            }
        }

        self.field.clear(data);
        Ok(())
    }
}

impl AttachmentEngine for MemoryEngine {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn include_capabilities(&self, doc_type: &Arc<DocumentType>) -> AttachmentResult<()> {
        let mut state = self.state.write();
        let key = state.track(doc_type);
        *state.capability_installs.entry(key).or_default() += 1;
        debug!(doc_type = %doc_type.name(), "Capabilities installed");
        Ok(())
    }

    fn include_glue(&self, doc_type: &Arc<DocumentType>) -> AttachmentResult<()> {
        let mut state = self.state.write();
        let key = state.track(doc_type);
        *state.glue_installs.entry(key).or_default() += 1;
        debug!(doc_type = %doc_type.name(), "Glue installed");
        Ok(())
    }

    fn has_attached_file(
        &self,
        doc_type: &Arc<DocumentType>,
        field: &AttachmentField,
        options: &AttachmentOptions,
    ) -> AttachmentResult<()> {
        let options = Arc::new(options.clone());
        let hooks = Arc::new(FieldHooks {
            field: field.clone(),
            path_template: options
                .path
                .clone()
                .unwrap_or_else(|| self.defaults.default_path.clone()),
            default_style: self.default_style(&options).to_string(),
            options: Arc::clone(&options),
            interpolations: Arc::clone(&self.interpolations),
            state: Arc::clone(&self.state),
        });

        // Re-activation replaces the previous hooks
        let flush_name = Self::hook_name(field, "flush");
        let purge_name = Self::hook_name(field, "purge");
        doc_type.callbacks().remove(CallbackPhase::AfterSave, &flush_name);
        doc_type.callbacks().remove(CallbackPhase::AfterDestroy, &purge_name);

        let flush = Arc::clone(&hooks);
        doc_type.on(CallbackPhase::AfterSave, flush_name, move |data| {
            flush.flush(data).map_err(CallbackError::from)
        });
        let purge = hooks;
        doc_type.on(CallbackPhase::AfterDestroy, purge_name, move |data| {
            purge.purge(data).map_err(CallbackError::from)
        });

        let mut state = self.state.write();
        let key = (state.track(doc_type), field.name().to_string());
        *state.activations.entry(key.clone()).or_default() += 1;
        state.fields.insert(key, options);
        debug!(doc_type = %doc_type.name(), field = %field, "Field activated");
        Ok(())
    }

    fn remove_attached_file(&self, doc_type: &Arc<DocumentType>, field: &AttachmentField) -> AttachmentResult<()> {
        doc_type
            .callbacks()
            .remove(CallbackPhase::AfterSave, &Self::hook_name(field, "flush"));
        doc_type
            .callbacks()
            .remove(CallbackPhase::AfterDestroy, &Self::hook_name(field, "purge"));
        let type_key = TypeKey::of(doc_type);
        let mut state = self.state.write();
        state.fields.remove(&(type_key, field.name().to_string()));
        state
            .pending
            .retain(|(t, _, f), _| !(*t == type_key && f == field.name()));
        debug!(doc_type = %doc_type.name(), field = %field, "Field deactivated");
        Ok(())
    }

    fn interpolations(&self) -> &Interpolations {
        &self.interpolations
    }
}
