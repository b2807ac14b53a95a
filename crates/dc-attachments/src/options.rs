//! Per-field attachment options
//!
//! Options are handed to the engine as given. Keys this crate does not model
//! ride along in `extra`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AttachmentError, AttachmentResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentOptions {
    /// Storage backend selector
    pub storage: Option<String>,
    /// Storage path template, e.g. `:class/:attachment/:id_partition/:style/:filename`
    pub path: Option<String>,
    /// Public URL template
    pub url: Option<String>,
    /// URL returned while no file is attached
    pub default_url: Option<String>,
    /// Style used when none is requested
    pub default_style: Option<String>,
    /// Named styles and their geometry strings
    pub styles: BTreeMap<String, String>,
    pub validations: AttachmentValidations,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AttachmentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, template: impl Into<String>) -> Self {
        self.path = Some(template.into());
        self
    }

    pub fn url(mut self, template: impl Into<String>) -> Self {
        self.url = Some(template.into());
        self
    }

    pub fn default_url(mut self, url: impl Into<String>) -> Self {
        self.default_url = Some(url.into());
        self
    }

    pub fn storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    pub fn style(mut self, name: impl Into<String>, geometry: impl Into<String>) -> Self {
        self.styles.insert(name.into(), geometry.into());
        self
    }

    pub fn validations(mut self, validations: AttachmentValidations) -> Self {
        self.validations = validations;
        self
    }
}

/// Upload checks applied when a file is assigned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentValidations {
    /// Accepted content types. Entries may end in `/*` to accept a whole
    /// top-level type. Empty accepts everything not blocked.
    pub content_types: Vec<String>,
    /// Rejected content types, same pattern syntax. Wins over `content_types`.
    pub blocked_content_types: Vec<String>,
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
}

impl AttachmentValidations {
    pub fn is_allowed(&self, content_type: &str) -> bool {
        let hit = |patterns: &[String]| patterns.iter().any(|p| type_matches(p, content_type));
        !hit(&self.blocked_content_types)
            && (self.content_types.is_empty() || hit(&self.content_types))
    }

    pub fn check(&self, content_type: &str, size: u64) -> AttachmentResult<()> {
        if let Some(max) = self.max_size {
            if size > max {
                return Err(AttachmentError::FileTooLarge { size, max });
            }
        }
        if let Some(min) = self.min_size {
            if size < min {
                return Err(AttachmentError::FileTooSmall { size, min });
            }
        }
        if !self.is_allowed(content_type) {
            return Err(AttachmentError::InvalidContentType(content_type.to_string()));
        }
        Ok(())
    }
}

/// `image/*` matches any `image/...`; anything else must match exactly,
/// ignoring ASCII case
fn type_matches(pattern: &str, content_type: &str) -> bool {
    match pattern.strip_suffix("/*") {
        Some(top) => content_type
            .split_once('/')
            .map_or(false, |(ct_top, _)| ct_top.eq_ignore_ascii_case(top)),
        None => pattern.eq_ignore_ascii_case(content_type),
    }
}
