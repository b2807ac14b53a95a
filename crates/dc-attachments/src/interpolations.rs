//! Path and URL template interpolation
//!
//! Templates contain `:name` placeholders. Each placeholder is resolved by
//! the interpolator registered under that name. Longer names are replaced
//! first so `:id_partition` is never read as `:id` followed by `_partition`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dc_core::traits::{Identifiable, Record};
use parking_lot::RwLock;
use tracing::debug;

use crate::attachment::Attachment;
use crate::error::{AttachmentError, AttachmentResult};

/// Resolves one placeholder for an attachment and style
pub type Interpolator =
    Arc<dyn Fn(&Attachment<'_>, &str) -> AttachmentResult<String> + Send + Sync>;

#[derive(Default)]
pub struct Interpolations {
    table: RwLock<HashMap<String, Interpolator>>,
}

impl Interpolations {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the stock placeholders
    pub fn with_defaults() -> Self {
        let interpolations = Self::new();
        interpolations.register("class", |a, _| Ok(pluralize(&underscore(a.record().type_name()))));
        interpolations.register("attachment", |a, _| Ok(pluralize(&a.name().to_lowercase())));
        interpolations.register("id", |a, _| {
            a.record()
                .document_id()
                .map(|id| id.to_string())
                .ok_or_else(|| missing_id(a))
        });
        interpolations.register("id_partition", integer_partition);
        interpolations.register("style", |_, style| Ok(style.to_string()));
        interpolations.register("filename", |a, _| Ok(a.file_name().unwrap_or_default().to_string()));
        interpolations.register("basename", |a, _| {
            let name = a.file_name().unwrap_or_default();
            let base = match a.extension() {
                Some(ext) => &name[..name.len() - ext.len() - 1],
                None => name,
            };
            Ok(base.to_string())
        });
        interpolations.register("extension", |a, _| Ok(a.extension().unwrap_or_default().to_string()));
        interpolations
    }

    /// Register or replace the interpolator for `:name`
    pub fn register<F>(&self, name: impl Into<String>, interpolator: F)
    where
        F: Fn(&Attachment<'_>, &str) -> AttachmentResult<String> + Send + Sync + 'static,
    {
        let name = name.into();
        let previous = self.table.write().insert(name.clone(), Arc::new(interpolator));
        if previous.is_some() {
            debug!(placeholder = %name, "Interpolation overridden");
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.read().contains_key(name)
    }

    /// Registered placeholder names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.table.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve a single placeholder
    pub fn resolve(&self, name: &str, attachment: &Attachment<'_>, style: &str) -> AttachmentResult<String> {
        let interpolator = self
            .table
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AttachmentError::Interpolation {
                placeholder: name.to_string(),
                message: "no interpolator registered".to_string(),
            })?;
        interpolator(attachment, style)
    }

    /// Substitute every registered placeholder present in `template`.
    ///
    /// Interpolators run only for placeholders that actually appear.
    pub fn interpolate(&self, template: &str, attachment: &Attachment<'_>, style: &str) -> AttachmentResult<String> {
        let mut entries: Vec<(String, Interpolator)> = self
            .table
            .read()
            .iter()
            .map(|(name, f)| (name.clone(), Arc::clone(f)))
            .collect();
        entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let mut result = template.to_string();
        for (name, interpolator) in entries {
            let placeholder = format!(":{name}");
            if result.contains(&placeholder) {
                let value = interpolator(attachment, style)?;
                result = result.replace(&placeholder, &value);
            }
        }
        Ok(result)
    }
}

impl fmt::Debug for Interpolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interpolations")
            .field("names", &self.names())
            .finish()
    }
}

pub(crate) fn missing_id(attachment: &Attachment<'_>) -> AttachmentError {
    AttachmentError::MissingIdentifier {
        type_name: attachment.record().type_name().to_string(),
        field: attachment.name().to_string(),
    }
}

/// Stock `:id_partition`: zero-pad an integer id to nine digits and split
/// into groups of three (`123` -> `000/000/123`).
fn integer_partition(attachment: &Attachment<'_>, _style: &str) -> AttachmentResult<String> {
    let id = attachment
        .record()
        .document_id()
        .ok_or_else(|| missing_id(attachment))?;
    let number: u64 = id.as_str().parse().map_err(|_| AttachmentError::Interpolation {
        placeholder: "id_partition".to_string(),
        message: format!("id {id} is not an integer"),
    })?;
    let padded = format!("{number:09}");
    let groups: Vec<&str> = padded
        .as_bytes()
        .chunks(3)
        .filter_map(|chunk| std::str::from_utf8(chunk).ok())
        .collect();
    Ok(groups.join("/"))
}

/// `BlogPost` -> `blog_post`
fn underscore(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(if c == ':' { '_' } else { c });
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

fn pluralize(word: &str) -> String {
    if word.ends_with('s') || word.ends_with('x') || word.ends_with("ch") || word.ends_with("sh") {
        return format!("{word}es");
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.is_empty() && !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttachmentField;
    use crate::options::AttachmentOptions;
    use dc_core::types::DocumentId;
    use dc_documents::{DocumentData, DocumentType};

    fn photo(id: Option<&str>) -> DocumentData {
        let doc_type = DocumentType::new("BlogPost");
        AttachmentField::new("photo").unwrap().declare_on(&doc_type);
        let mut data = DocumentData::new(doc_type);
        if let Some(id) = id {
            data.set_id(DocumentId::parse(id).unwrap());
        }
        data.write_attribute("photo_file_name", "sunset.jpeg").unwrap();
        data
    }

    fn attachment(data: &DocumentData) -> Attachment<'_> {
        Attachment::new(
            AttachmentField::new("photo").unwrap(),
            data,
            Arc::new(AttachmentOptions::default()),
        )
    }

    #[test]
    fn test_default_placeholders() {
        let data = photo(Some("123"));
        let path = Interpolations::with_defaults()
            .interpolate(
                ":class/:attachment/:id_partition/:style/:basename.:extension",
                &attachment(&data),
                "thumb",
            )
            .unwrap();

        assert_eq!(path, "blog_posts/photos/000/000/123/thumb/sunset.jpeg");
    }

    #[test]
    fn test_integer_partition_rejects_text_ids() {
        let data = photo(Some("4f3a9b"));
        let result = Interpolations::with_defaults().interpolate(":id_partition", &attachment(&data), "original");

        assert!(matches!(result, Err(AttachmentError::Interpolation { .. })));
    }

    #[test]
    fn test_unused_placeholders_not_evaluated() {
        let data = photo(None);
        let path = Interpolations::with_defaults()
            .interpolate("static/:filename", &attachment(&data), "original")
            .unwrap();
        assert_eq!(path, "static/sunset.jpeg");
    }

    #[test]
    fn test_missing_id() {
        let data = photo(None);
        let result = Interpolations::with_defaults().interpolate(":id/:filename", &attachment(&data), "original");
        assert!(matches!(result, Err(AttachmentError::MissingIdentifier { .. })));
    }

    #[test]
    fn test_register_overrides() {
        let interpolations = Interpolations::with_defaults();
        interpolations.register("style", |_, style| Ok(style.to_uppercase()));

        let data = photo(Some("1"));
        assert_eq!(
            interpolations.resolve("style", &attachment(&data), "thumb").unwrap(),
            "THUMB"
        );
        assert!(interpolations.resolve("nope", &attachment(&data), "thumb").is_err());
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("photo"), "photos");
        assert_eq!(pluralize("box"), "boxes");
        assert_eq!(pluralize("gallery"), "galleries");
        assert_eq!(pluralize("day"), "days");
        assert_eq!(underscore("User"), "user");
        assert_eq!(underscore("BlogPost"), "blog_post");
    }
}
