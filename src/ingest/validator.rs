//! Validates incoming upload parts and JSON payloads before they reach the
//! orchestrator: MIME-type classification, per-kind size ceilings, and
//! JSON well-formedness/shape checks.

use std::collections::HashSet;
use std::sync::LazyLock;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::catalog::AssetKind;

pub const MAX_IMAGE_BYTES: u64 = 50 * 1024 * 1024;
pub const MAX_VIDEO_BYTES: u64 = 500 * 1024 * 1024;
pub const MAX_AUDIO_BYTES: u64 = 100 * 1024 * 1024;
pub const MAX_JSON_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_DOCUMENT_BYTES: u64 = 100 * 1024 * 1024;

static IMAGE_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp", "image/bmp", "image/tiff", "image/svg+xml"]
        .into_iter()
        .collect()
});

static VIDEO_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["video/mp4", "video/mpeg", "video/quicktime", "video/x-msvideo", "video/webm", "video/x-matroska", "video/avi"]
        .into_iter()
        .collect()
});

static AUDIO_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    ["audio/mpeg", "audio/mp3", "audio/wav", "audio/ogg", "audio/flac", "audio/aac", "audio/webm"]
        .into_iter()
        .collect()
});

static JSON_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| ["application/json", "text/json"].into_iter().collect());

static DOCUMENT_TYPES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "application/pdf",
        "application/epub+zip",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "application/vnd.ms-powerpoint",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "text/plain",
        "text/markdown",
        "text/html",
    ]
    .into_iter()
    .collect()
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("part {0}: size {1} exceeds the {2}-byte limit for this content type")]
    SizeLimit(String, u64, u64),
    #[error("part {0}: content type '{1}' is not a recognized media, json, or document type")]
    UnknownContentType(String, String),
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("JSON payload must be an object or a non-empty array, not a bare primitive or empty array")]
    InvalidJsonShape,
    #[error("request must include at least one file part or a JSON payload")]
    EmptyRequest,
}

pub type Result<T> = std::result::Result<T, ValidationError>;

fn classify(content_type: &str) -> Option<AssetKind> {
    if IMAGE_TYPES.contains(content_type) || VIDEO_TYPES.contains(content_type) || AUDIO_TYPES.contains(content_type) {
        Some(AssetKind::Media)
    } else if JSON_TYPES.contains(content_type) {
        Some(AssetKind::Json)
    } else if DOCUMENT_TYPES.contains(content_type) {
        Some(AssetKind::Document)
    } else {
        None
    }
}

fn max_bytes_for(kind: AssetKind, content_type: &str) -> u64 {
    match kind {
        AssetKind::Media => {
            if IMAGE_TYPES.contains(content_type) {
                MAX_IMAGE_BYTES
            } else if AUDIO_TYPES.contains(content_type) {
                MAX_AUDIO_BYTES
            } else {
                MAX_VIDEO_BYTES
            }
        }
        AssetKind::Json => MAX_JSON_BYTES,
        AssetKind::Document => MAX_DOCUMENT_BYTES,
    }
}

/// Result of validating a single uploaded part.
#[derive(Debug, Clone)]
pub struct FilePartValidation {
    pub kind: AssetKind,
    pub content_type: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Validates one upload part's declared content type and byte length,
/// hashing it in the same pass. `filename` is used only for error messages.
pub fn validate_file_part(filename: &str, content_type: &str, bytes: &[u8]) -> Result<FilePartValidation> {
    let kind = classify(content_type).ok_or_else(|| ValidationError::UnknownContentType(filename.to_string(), content_type.to_string()))?;

    let size_bytes = bytes.len() as u64;
    let max = max_bytes_for(kind, content_type);
    if size_bytes > max {
        return Err(ValidationError::SizeLimit(filename.to_string(), size_bytes, max));
    }

    let sha256 = format!("{:x}", Sha256::digest(bytes));

    Ok(FilePartValidation {
        kind,
        content_type: content_type.to_string(),
        size_bytes,
        sha256,
    })
}

/// Result of validating a JSON payload part.
#[derive(Debug, Clone)]
pub struct JsonPayloadValidation {
    pub size_bytes: u64,
    pub documents: Vec<serde_json::Value>,
}

/// Validates a raw JSON payload: size ceiling, well-formedness, and shape
/// (a single object becomes a one-element batch, a non-empty array of
/// objects becomes a batch of documents).
pub fn validate_json_payload(payload: &str) -> Result<JsonPayloadValidation> {
    let size_bytes = payload.len() as u64;
    if size_bytes > MAX_JSON_BYTES {
        return Err(ValidationError::SizeLimit("payload".to_string(), size_bytes, MAX_JSON_BYTES));
    }

    let parsed: serde_json::Value = serde_json::from_str(payload).map_err(|e| ValidationError::InvalidJson(e.to_string()))?;

    let documents = match parsed {
        serde_json::Value::Object(_) => vec![parsed],
        serde_json::Value::Array(items) if !items.is_empty() => items,
        _ => return Err(ValidationError::InvalidJsonShape),
    };

    Ok(JsonPayloadValidation { size_bytes, documents })
}

/// A request must carry at least one file part or a JSON payload.
pub fn require_nonempty_request(has_files: bool, has_payload: bool) -> Result<()> {
    if !has_files && !has_payload {
        return Err(ValidationError::EmptyRequest);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_image_under_image_limit() {
        let result = validate_file_part("a.png", "image/png", &[0u8; 1024]).unwrap();
        assert_eq!(result.kind, AssetKind::Media);
        assert_eq!(result.size_bytes, 1024);
    }

    #[test]
    fn rejects_oversized_image() {
        let bytes = vec![0u8; (MAX_IMAGE_BYTES + 1) as usize];
        let err = validate_file_part("a.png", "image/png", &bytes).unwrap_err();
        assert!(matches!(err, ValidationError::SizeLimit(_, _, MAX_IMAGE_BYTES)));
    }

    #[test]
    fn rejects_unknown_content_type() {
        let err = validate_file_part("a.xyz", "application/x-weird", b"hi").unwrap_err();
        assert!(matches!(err, ValidationError::UnknownContentType(_, _)));
    }

    #[test]
    fn single_object_payload_becomes_one_document_batch() {
        let result = validate_json_payload(r#"{"a": 1}"#).unwrap();
        assert_eq!(result.documents.len(), 1);
    }

    #[test]
    fn array_payload_becomes_document_batch() {
        let result = validate_json_payload(r#"[{"a": 1}, {"a": 2}]"#).unwrap();
        assert_eq!(result.documents.len(), 2);
    }

    #[test]
    fn empty_array_payload_is_rejected() {
        assert!(matches!(validate_json_payload("[]"), Err(ValidationError::InvalidJsonShape)));
    }

    #[test]
    fn bare_primitive_payload_is_rejected() {
        assert!(matches!(validate_json_payload("42"), Err(ValidationError::InvalidJsonShape)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(matches!(validate_json_payload("{not json"), Err(ValidationError::InvalidJson(_))));
    }
}
