//! Document information dictionary validation (ISO 32000-1, 14.3.3).
//!
//! All entries are optional metadata strings; custom keys are allowed and
//! ignored. Date entries are where producers get sloppiest, so relaxed
//! mode downgrades malformed dates to warnings.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::Object;
use crate::validate::entries::{lenient_date_entry, name_entry, string_entry};
use crate::version::Version;
use crate::xref::XRefTable;

/// Validates the trailer's `/Info` dict, when present.
pub fn validate_info(xref: &mut XRefTable) -> Result<()> {
    const DICT: &str = "info";
    let Some(raw) = xref.trailer.get("Info").cloned() else {
        return Ok(());
    };
    match &raw {
        Object::Reference(r) => xref.set_cur_obj(r.obj_nr()),
        other => {
            if xref.is_strict() {
                return Err(PdfError::TypeMismatch {
                    dict: "trailer".to_string(),
                    entry: "Info".to_string(),
                    expected: "indirect reference",
                    found: other.type_name(),
                    obj_nr: 0,
                });
            }
            warn!("trailer /Info is written inline instead of as a reference");
        }
    }
    let info = match xref.dereference(&raw)? {
        Object::Dict(d) => d,
        Object::Null => {
            if xref.is_strict() {
                return Err(PdfError::corrupt(0, "trailer /Info resolves to null"));
            }
            xref.trailer.remove("Info");
            xref.note_repair("dropped dangling trailer /Info".to_string());
            return Ok(());
        }
        other => {
            return Err(PdfError::TypeMismatch {
                dict: "trailer".to_string(),
                entry: "Info".to_string(),
                expected: "dict",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    };

    string_entry(xref, &info, DICT, "Title", false, Version::V11, None)?;
    string_entry(xref, &info, DICT, "Author", false, Version::V10, None)?;
    string_entry(xref, &info, DICT, "Subject", false, Version::V11, None)?;
    string_entry(xref, &info, DICT, "Keywords", false, Version::V11, None)?;
    string_entry(xref, &info, DICT, "Creator", false, Version::V10, None)?;
    string_entry(xref, &info, DICT, "Producer", false, Version::V10, None)?;
    lenient_date_entry(xref, &info, DICT, "CreationDate", false, Version::V10)?;
    lenient_date_entry(xref, &info, DICT, "ModDate", false, Version::V11)?;

    match name_entry(xref, &info, DICT, "Trapped", false, Version::V13, Some(&|t: &str| {
        matches!(t, "True" | "False" | "Unknown")
    })) {
        Ok(_) => {}
        Err(e) if !xref.is_strict() => warn!("info /Trapped: {e}"),
        Err(e) => return Err(e),
    }
    Ok(())
}
