//! File specification validation (ISO 32000-1, 7.11).
//!
//! A file spec is either a plain path string or a dict naming the file per
//! platform, optionally with embedded file streams under `/EF`.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object, StreamDict};
use crate::validate::entries::{
    any_entry, array_entry, boolean_entry, date_entry, dict_entry, integer_entry, name_entry,
    string_entry,
};
use crate::version::Version;
use crate::xref::XRefTable;

const PLATFORM_KEYS: [&str; 5] = ["F", "UF", "DOS", "Mac", "Unix"];

/// Validates a dict entry holding a file specification in either form.
/// Returns `Some(())` when the entry is present.
pub fn validate_file_spec_entry(
    xref: &mut XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<()>> {
    let Some(value) = any_entry(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    match value {
        Object::StringLiteral(_) | Object::HexLiteral(_) => Ok(Some(())),
        Object::Dict(d) => {
            validate_file_spec_dict(xref, &d)?;
            Ok(Some(()))
        }
        other => Err(PdfError::TypeMismatch {
            dict: dict_name.to_string(),
            entry: key.to_string(),
            expected: "string or dict",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

/// Validates the dictionary form of a file specification.
pub fn validate_file_spec_dict(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "file specification";

    let has_ef = dict.contains_key("EF");
    match name_entry(xref, dict, DICT, "Type", has_ef, Version::V10, None)? {
        None => {}
        Some(t) if t == "Filespec" => {}
        // Some producers abbreviate the type name.
        Some(t) if t == "F" && !xref.is_strict() => {
            warn!("file specification types itself /F instead of /Filespec");
        }
        Some(t) => {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Filespec"),
            ));
        }
    }

    let fs = name_entry(xref, dict, DICT, "FS", false, Version::V11, None)?;
    let is_url = fs.as_ref().is_some_and(|n| n == "URL");

    let f = string_entry(xref, dict, DICT, "F", is_url, Version::V10, None)?;
    let uf = string_entry(xref, dict, DICT, "UF", false, Version::V17, None)?;
    let dos = string_entry(xref, dict, DICT, "DOS", false, Version::V10, None)?;
    let mac = string_entry(xref, dict, DICT, "Mac", false, Version::V10, None)?;
    let unix = string_entry(xref, dict, DICT, "Unix", false, Version::V10, None)?;

    if f.is_none() && uf.is_none() && dos.is_none() && mac.is_none() && unix.is_none() {
        return Err(PdfError::MissingRequired {
            dict: DICT.to_string(),
            entry: "F".to_string(),
            obj_nr: xref.cur_obj(),
        });
    }

    if let Some(id) = array_entry(xref, dict, DICT, "ID", false, Version::V11, Some(&|a: &[Object]| {
        a.len() == 2
    }))? {
        for o in &id {
            if xref.dereference(o)?.as_string_bytes().is_none() {
                return Err(PdfError::rejected(
                    DICT,
                    "ID",
                    xref.cur_obj(),
                    "identifier elements must be strings",
                ));
            }
        }
    }

    boolean_entry(xref, dict, DICT, "V", false, Version::V12)?;
    string_entry(xref, dict, DICT, "Desc", false, Version::V16, None)?;
    dict_entry(xref, dict, DICT, "CI", false, Version::V17, None)?;

    let ef = dict_entry(xref, dict, DICT, "EF", false, Version::V13, None)?;
    if let Some(ef) = &ef {
        for key in ef.sorted_keys() {
            if !PLATFORM_KEYS.contains(&key.as_str()) {
                return Err(PdfError::rejected(
                    DICT,
                    "EF",
                    xref.cur_obj(),
                    format!("unknown embedded-file key {key}"),
                ));
            }
            if !dict.contains_key(key) {
                if xref.is_strict() {
                    return Err(PdfError::rejected(
                        DICT,
                        "EF",
                        xref.cur_obj(),
                        format!("embedded-file key {key} has no matching path entry"),
                    ));
                }
                warn!(key = %key, "embedded file without matching path entry");
            }
            let Some(o) = ef.get(key.as_str()) else {
                continue;
            };
            let sd = xref.dereference_stream(o, DICT, key)?;
            validate_embedded_file_stream(xref, &sd)?;
        }
    }

    if let Some(rf) = dict_entry(xref, dict, DICT, "RF", false, Version::V13, None)? {
        for key in rf.sorted_keys() {
            // Every related-files key must also name an embedded file.
            if ef.as_ref().map_or(true, |ef| !ef.contains_key(key)) {
                return Err(PdfError::rejected(
                    DICT,
                    "RF",
                    xref.cur_obj(),
                    format!("related-files key {key} is absent from /EF"),
                ));
            }
            let Some(o) = rf.get(key.as_str()) else {
                continue;
            };
            let pairs = xref.dereference_array(o, DICT, "RF")?;
            if pairs.len() % 2 != 0 {
                return Err(PdfError::rejected(
                    DICT,
                    "RF",
                    xref.cur_obj(),
                    format!("related-files array has odd length {}", pairs.len()),
                ));
            }
            for pair in pairs.chunks_exact(2) {
                if pair[0].as_string_bytes().is_none() {
                    return Err(PdfError::rejected(
                        DICT,
                        "RF",
                        xref.cur_obj(),
                        "related-files name slot is not a string",
                    ));
                }
                xref.dereference_stream(&pair[1], DICT, "RF")?;
            }
        }
    }

    Ok(())
}

/// Validates an embedded file stream (ISO 32000-1, 7.11.4).
pub fn validate_embedded_file_stream(xref: &XRefTable, sd: &StreamDict) -> Result<()> {
    const DICT: &str = "embedded file stream";
    if let Some(t) = sd.dict.dict_type() {
        if t != "EmbeddedFile" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /EmbeddedFile"),
            ));
        }
    }
    name_entry(xref, &sd.dict, DICT, "Subtype", false, Version::V13, None)?;
    if let Some(params) = dict_entry(xref, &sd.dict, DICT, "Params", false, Version::V13, None)? {
        integer_entry(xref, &params, "embedded file parameters", "Size", false, Version::V13, Some(&|i: &i64| *i >= 0))?;
        date_entry(xref, &params, "embedded file parameters", "CreationDate", false, Version::V13)?;
        date_entry(xref, &params, "embedded file parameters", "ModDate", false, Version::V13)?;
        string_entry(xref, &params, "embedded file parameters", "CheckSum", false, Version::V13, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationMode;

    fn holder(value: impl Into<Object>) -> Dict {
        Dict::new().with("FS", value)
    }

    fn spec_entry(xref: &mut XRefTable, holder: &Dict) -> Result<Option<()>> {
        validate_file_spec_entry(xref, holder, "annotation", "FS", true, Version::V10)
    }

    #[test]
    fn test_string_form() {
        let mut xref = XRefTable::default();
        let h = holder(Object::string("shared/report.pdf"));
        assert!(matches!(spec_entry(&mut xref, &h), Ok(Some(()))));
    }

    #[test]
    fn test_dict_form_needs_some_path() {
        let mut xref = XRefTable::default();
        let h = holder(Dict::new().with("V", false));
        assert!(matches!(
            spec_entry(&mut xref, &h),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "F"
        ));

        let h = holder(Dict::new().with("F", Object::string("a.txt")));
        assert!(spec_entry(&mut xref, &h).is_ok());
    }

    #[test]
    fn test_url_form_requires_f() {
        let mut xref = XRefTable::default();
        let d = Dict::new().with("FS", Object::name("URL"));
        assert!(matches!(
            validate_file_spec_dict(&mut xref, &d),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "F"
        ));
    }

    #[test]
    fn test_type_alias_relaxed_only() {
        let mut xref = XRefTable::default();
        let d = Dict::new()
            .with("Type", Object::name("F"))
            .with("F", Object::string("a.txt"));
        assert!(validate_file_spec_dict(&mut xref, &d).is_ok());

        xref.validation_mode = ValidationMode::Strict;
        assert!(matches!(
            validate_file_spec_dict(&mut xref, &d),
            Err(PdfError::ValueRejected { .. })
        ));
    }

    #[test]
    fn test_ef_requires_type_and_streams() {
        let mut xref = XRefTable::default();
        let attachment = StreamDict::new(
            Dict::new().with("Type", Object::name("EmbeddedFile")),
            b"data".to_vec(),
        );
        let r = xref.push_object(attachment);

        // missing /Type on the filespec itself
        let d = Dict::new()
            .with("F", Object::string("a.txt"))
            .with("EF", Dict::new().with("F", r));
        assert!(matches!(
            validate_file_spec_dict(&mut xref, &d),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "Type"
        ));

        let d = d.with("Type", Object::name("Filespec"));
        assert!(validate_file_spec_dict(&mut xref, &d).is_ok());
    }

    #[test]
    fn test_rf_keys_must_mirror_ef() {
        let mut xref = XRefTable::default();
        let r = xref.push_object(StreamDict::from_bytes(b"x".to_vec()));
        let d = Dict::new()
            .with("Type", Object::name("Filespec"))
            .with("F", Object::string("a.txt"))
            .with("EF", Dict::new().with("F", r))
            .with(
                "RF",
                Dict::new().with("UF", vec![Object::string("part"), Object::Reference(r)]),
            );
        assert!(matches!(
            validate_file_spec_dict(&mut xref, &d),
            Err(PdfError::ValueRejected { ref entry, .. }) if entry == "RF"
        ));
    }

    #[test]
    fn test_embedded_file_params() {
        let xref = XRefTable::default();
        let sd = StreamDict::new(
            Dict::new()
                .with("Type", Object::name("EmbeddedFile"))
                .with(
                    "Params",
                    Dict::new()
                        .with("Size", 4)
                        .with("ModDate", Object::string("D:20230101")),
                ),
            b"data".to_vec(),
        );
        assert!(validate_embedded_file_stream(&xref, &sd).is_ok());

        let sd = StreamDict::new(
            Dict::new().with("Params", Dict::new().with("Size", -2)),
            b"data".to_vec(),
        );
        assert!(matches!(
            validate_embedded_file_stream(&xref, &sd),
            Err(PdfError::ValueRejected { .. })
        ));
    }
}
