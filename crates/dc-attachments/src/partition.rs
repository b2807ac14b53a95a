//! Identifier partitioning
//!
//! Document stores hand out string identifiers (often 24 or 32 hex
//! characters) rather than sequential integers. Storage paths split the
//! identifier into fixed-width segments so no single directory collects
//! every file.

use dc_core::traits::Identifiable;
use tracing::debug;

use crate::attachment::Attachment;
use crate::error::AttachmentResult;
use crate::interpolations::{missing_id, Interpolations};

/// Characters per path segment
pub const SEGMENT_WIDTH: usize = 4;

/// Split an identifier into `/`-joined segments of `SEGMENT_WIDTH`
/// characters. The last segment holds the remainder and may be shorter.
///
/// Removing every `/` from the result gives back `id` exactly.
pub fn partition_id(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    chars
        .chunks(SEGMENT_WIDTH)
        .map(|segment| segment.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

/// `:id_partition` for string identifiers
pub fn id_partition(attachment: &Attachment<'_>, _style: &str) -> AttachmentResult<String> {
    let id = attachment
        .record()
        .document_id()
        .ok_or_else(|| missing_id(attachment))?;
    Ok(partition_id(id.as_str()))
}

/// Install `id_partition` over the engine's stock placeholder
pub fn install(interpolations: &Interpolations) {
    interpolations.register("id_partition", id_partition);
    debug!("Installed string id partitioning for :id_partition");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::error::AttachmentError;
    use crate::model::AttachmentField;
    use crate::options::AttachmentOptions;
    use dc_core::types::DocumentId;
    use dc_documents::{DocumentData, DocumentType};
    use fake::{Fake, StringFaker};

    #[test]
    fn test_partition_hex_id() {
        assert_eq!(
            partition_id("507f1f77bcf86cd799439011"),
            "507f/1f77/bcf8/6cd7/9943/9011"
        );
    }

    #[test]
    fn test_partition_keeps_remainder() {
        assert_eq!(partition_id("abcdefghij"), "abcd/efgh/ij");
        assert_eq!(partition_id("abc"), "abc");
        assert_eq!(partition_id(""), "");
    }

    #[test]
    fn test_partition_round_trip() {
        let faker = StringFaker::with(Vec::from("0123456789abcdef"), 1..64);
        for _ in 0..100 {
            let id: String = faker.fake();
            let partitioned = partition_id(&id);

            assert_eq!(partitioned.replace('/', ""), id);
            let segments: Vec<&str> = partitioned.split('/').collect();
            let (last, full) = segments.split_last().unwrap();
            assert!(full.iter().all(|s| s.len() == SEGMENT_WIDTH));
            assert!((1..=SEGMENT_WIDTH).contains(&last.len()));
        }
    }

    #[test]
    fn test_partition_counts_characters() {
        assert_eq!(partition_id("ééééé"), "éééé/é");
    }

    fn data(id: Option<&str>) -> DocumentData {
        let mut data = DocumentData::new(DocumentType::new("User"));
        if let Some(id) = id {
            data.set_id(DocumentId::parse(id).unwrap());
        }
        data
    }

    fn attachment(data: &DocumentData) -> Attachment<'_> {
        Attachment::new(
            AttachmentField::new("avatar").unwrap(),
            data,
            Arc::new(AttachmentOptions::default()),
        )
    }

    #[test]
    fn test_id_partition_requires_id() {
        let data = data(None);
        let result = id_partition(&attachment(&data), "original");
        assert!(matches!(
            result,
            Err(AttachmentError::MissingIdentifier { ref type_name, ref field })
                if type_name == "User" && field == "avatar"
        ));
    }

    #[test]
    fn test_install_overrides_integer_partition() {
        let interpolations = Interpolations::with_defaults();
        let data = data(Some("507f1f77bcf86cd799439011"));

        assert!(interpolations
            .interpolate(":id_partition", &attachment(&data), "original")
            .is_err());

        install(&interpolations);
        let path = interpolations
            .interpolate(":class/:id_partition/:style", &attachment(&data), "thumb")
            .unwrap();
        assert_eq!(path, "users/507f/1f77/bcf8/6cd7/9943/9011/thumb");
    }
}
