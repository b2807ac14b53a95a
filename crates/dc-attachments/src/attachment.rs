//! Runtime view of one attachment field on one document
//!
//! Engines read attachment metadata through `Attachment`. Its `updated_at`
//! always comes back as whole seconds since the epoch, whatever the store
//! handed back for the underlying attribute.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dc_core::traits::{AttributeReader, Identifiable, Record};
use dc_core::types::Value;
use tracing::warn;

use crate::model::AttachmentField;
use crate::options::AttachmentOptions;

pub struct Attachment<'a> {
    field: AttachmentField,
    record: &'a dyn Record,
    options: Arc<AttachmentOptions>,
}

impl<'a> Attachment<'a> {
    pub fn new(field: AttachmentField, record: &'a dyn Record, options: Arc<AttachmentOptions>) -> Self {
        Self {
            field,
            record,
            options,
        }
    }

    pub fn field(&self) -> &AttachmentField {
        &self.field
    }

    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn record(&self) -> &'a dyn Record {
        self.record
    }

    pub fn options(&self) -> &AttachmentOptions {
        &self.options
    }

    pub fn file_name(&self) -> Option<&str> {
        self.record
            .read_attribute(&self.field.file_name_attr())
            .and_then(Value::as_text)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.record
            .read_attribute(&self.field.content_type_attr())
            .and_then(Value::as_text)
    }

    pub fn file_size(&self) -> Option<i64> {
        self.record
            .read_attribute(&self.field.file_size_attr())
            .and_then(Value::as_integer)
    }

    /// Last update as integer seconds since the epoch
    pub fn updated_at(&self) -> Option<i64> {
        let attr = self.field.updated_at_attr();
        let value = self.record.read_attribute(&attr)?;
        let seconds = epoch_seconds(value);
        if seconds.is_none() {
            warn!(attribute = %attr, value = ?value, "Unreadable attachment timestamp");
        }
        seconds
    }

    /// Whether a file is currently attached
    pub fn is_present(&self) -> bool {
        self.file_name().map_or(false, |name| !name.is_empty())
    }

    /// Extension of the stored file name, without the dot. A leading dot
    /// (`.profile`) does not start an extension.
    pub fn extension(&self) -> Option<&str> {
        Path::new(self.file_name()?)
            .extension()
            .and_then(OsStr::to_str)
            .filter(|ext| !ext.is_empty())
    }
}

impl std::fmt::Debug for Attachment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("field", &self.field.name())
            .field("type_name", &self.record.type_name())
            .field("id", &self.record.document_id())
            .finish()
    }
}

/// Convert a stored timestamp-like value to whole seconds, truncating
/// toward zero. `None` when the value cannot be read as a time.
pub fn epoch_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Timestamp(at) => Some(truncate_seconds(at)),
        Value::Integer(seconds) => Some(*seconds),
        Value::Float(seconds) if seconds.is_finite() => Some(seconds.trunc() as i64),
        Value::Text(raw) => DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|at| truncate_seconds(&at.with_timezone(&Utc))),
        Value::Float(_) | Value::Boolean(_) => None,
    }
}

fn truncate_seconds(at: &DateTime<Utc>) -> i64 {
    // `timestamp()` floors; pre-epoch instants with a fraction need one added back.
    let seconds = at.timestamp();
    if seconds < 0 && at.timestamp_subsec_nanos() > 0 {
        seconds + 1
    } else {
        seconds
    }
}
