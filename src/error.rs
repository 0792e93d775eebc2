//! Error types shared across the crate.
//!
//! Every failure observed while validating, optimizing, subsetting, or
//! writing a document is expressed as one of these kinds. Walkers propagate
//! errors unchanged; relaxed-mode tolerance is decided at the helper that
//! first sees the deviation, never by catching here.

use thiserror::Error;

use crate::version::Version;

/// Errors produced by the PDF core engine.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required dictionary entry is absent or dereferences to null.
    #[error("obj#{obj_nr} {dict}: required entry \"{entry}\" is missing")]
    MissingRequired {
        dict: String,
        entry: String,
        obj_nr: u32,
    },

    /// A dereferenced value has the wrong tagged variant.
    #[error("obj#{obj_nr} {dict} \"{entry}\": expected {expected}, found {found}")]
    TypeMismatch {
        dict: String,
        entry: String,
        expected: &'static str,
        found: &'static str,
        obj_nr: u32,
    },

    /// A well-typed value failed a predicate (range, enum membership, shape).
    #[error("obj#{obj_nr} {dict} \"{entry}\": {reason}")]
    ValueRejected {
        dict: String,
        entry: String,
        reason: String,
        obj_nr: u32,
    },

    /// A feature is used below the PDF version that introduced it.
    #[error("obj#{obj_nr} {feature}: introduced in PDF {since}, document is {current}")]
    VersionViolation {
        feature: String,
        since: Version,
        current: Version,
        obj_nr: u32,
    },

    /// An indirect reference points at a free or unknown slot.
    #[error("dangling reference: {obj_nr} {gen_nr} R")]
    DanglingRef { obj_nr: u32, gen_nr: u16 },

    /// The object graph violates a structural invariant.
    #[error("obj#{obj_nr}: corrupt structure: {detail}")]
    CorruptStructure { detail: String, obj_nr: u32 },

    /// A stream names a codec this build does not provide.
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// The compound-glyph walk hit inverted offsets or a malformed record.
    #[error("corrupt glyf table: {0}")]
    CorruptGlyf(String),

    /// A payload cannot be decoded under its declared encoding.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// A font file cannot be parsed at all (bad magic, truncation, CFF).
    #[error("font error: {0}")]
    Font(String),
}

impl PdfError {
    /// Structural-invariant failure attributed to `obj_nr`.
    pub fn corrupt(obj_nr: u32, detail: impl Into<String>) -> Self {
        PdfError::CorruptStructure {
            detail: detail.into(),
            obj_nr,
        }
    }

    /// Predicate failure attributed to a dict entry.
    pub fn rejected(
        dict: impl Into<String>,
        entry: impl Into<String>,
        obj_nr: u32,
        reason: impl Into<String>,
    ) -> Self {
        PdfError::ValueRejected {
            dict: dict.into(),
            entry: entry.into(),
            reason: reason.into(),
            obj_nr,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, PdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_required_display() {
        let err = PdfError::MissingRequired {
            dict: "catalog".to_string(),
            entry: "Pages".to_string(),
            obj_nr: 3,
        };
        assert_eq!(
            err.to_string(),
            "obj#3 catalog: required entry \"Pages\" is missing"
        );
    }

    #[test]
    fn test_type_mismatch_display() {
        let err = PdfError::TypeMismatch {
            dict: "page".to_string(),
            entry: "Rotate".to_string(),
            expected: "integer",
            found: "name",
            obj_nr: 12,
        };
        assert_eq!(
            err.to_string(),
            "obj#12 page \"Rotate\": expected integer, found name"
        );
    }

    #[test]
    fn test_dangling_ref_display() {
        let err = PdfError::DanglingRef {
            obj_nr: 42,
            gen_nr: 0,
        };
        assert_eq!(err.to_string(), "dangling reference: 42 0 R");
    }

    #[test]
    fn test_version_violation_display() {
        let err = PdfError::VersionViolation {
            feature: "catalog entry OCProperties".to_string(),
            since: Version::V15,
            current: Version::V13,
            obj_nr: 1,
        };
        assert!(err.to_string().contains("introduced in PDF 1.5"));
        assert!(err.to_string().contains("document is 1.3"));
    }

    #[test]
    fn test_error_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PdfError>();
    }
}
