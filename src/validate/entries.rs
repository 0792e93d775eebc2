//! Typed dictionary-entry helpers.
//!
//! Every structural validator funnels through these. Each helper runs the
//! same sequence: fetch the entry, dereference it, treat null as absent,
//! gate the feature version, require the expected variant, then apply the
//! caller's predicate. Absent optional entries come back as `Ok(None)`;
//! absent required entries fail with [`PdfError::MissingRequired`].
//!
//! Callers decide relaxed-mode downgrades by passing `required` already
//! adjusted, typically `xref.is_strict()` for entries the wild routinely
//! omits.

use crate::date::is_valid_date;
use crate::error::{PdfError, Result};
use crate::objects::{decode_text, Dict, Name, Object, Reference, StreamDict};
use crate::version::Version;
use crate::xref::dereference::Check;
use crate::xref::XRefTable;

fn absent<T>(xref: &XRefTable, dict_name: &str, key: &str, required: bool) -> Result<Option<T>> {
    if required {
        return Err(PdfError::MissingRequired {
            dict: dict_name.to_string(),
            entry: key.to_string(),
            obj_nr: xref.cur_obj(),
        });
    }
    Ok(None)
}

/// Fetch, dereference, null-check, version-gate. The shared front half of
/// every helper below.
fn located(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<Object>> {
    let Some(raw) = dict.get(key) else {
        return absent(xref, dict_name, key, required);
    };
    let value = xref.dereference(raw)?;
    if value.is_null() {
        return absent(xref, dict_name, key, required);
    }
    xref.validate_version(&format!("{dict_name} entry {key}"), since)?;
    Ok(Some(value))
}

fn mismatch(
    xref: &XRefTable,
    dict_name: &str,
    key: &str,
    expected: &'static str,
    found: &Object,
) -> PdfError {
    PdfError::TypeMismatch {
        dict: dict_name.to_string(),
        entry: key.to_string(),
        expected,
        found: found.type_name(),
        obj_nr: xref.cur_obj(),
    }
}

/// Presence and version check only; the value may be of any type.
pub fn any_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<Object>> {
    located(xref, dict, dict_name, key, required, since)
}

pub fn name_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
    check: Check<'_, str>,
) -> Result<Option<Name>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    let Object::Name(name) = value else {
        return Err(mismatch(xref, dict_name, key, "name", &value));
    };
    if let Some(check) = check {
        if !check(name.as_str()) {
            return Err(PdfError::rejected(
                dict_name,
                key,
                xref.cur_obj(),
                format!("name {name} out of range"),
            ));
        }
    }
    Ok(Some(name))
}

/// Decoded text string of either notation.
pub fn string_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
    check: Check<'_, str>,
) -> Result<Option<String>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    let Some(bytes) = value.as_string_bytes() else {
        return Err(mismatch(xref, dict_name, key, "string", &value));
    };
    let text = decode_text(bytes)?;
    if let Some(check) = check {
        if !check(text.as_str()) {
            return Err(PdfError::rejected(
                dict_name,
                key,
                xref.cur_obj(),
                format!("string {text:?} out of range"),
            ));
        }
    }
    Ok(Some(text))
}

/// Raw payload bytes of a string entry, notation discarded.
pub fn string_bytes_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<Vec<u8>>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    match value.as_string_bytes() {
        Some(bytes) => Ok(Some(bytes.to_vec())),
        None => Err(mismatch(xref, dict_name, key, "string", &value)),
    }
}

pub fn integer_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
    check: Check<'_, i64>,
) -> Result<Option<i64>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    let Object::Integer(i) = value else {
        return Err(mismatch(xref, dict_name, key, "integer", &value));
    };
    if let Some(check) = check {
        if !check(&i) {
            return Err(PdfError::rejected(
                dict_name,
                key,
                xref.cur_obj(),
                format!("integer {i} out of range"),
            ));
        }
    }
    Ok(Some(i))
}

/// Integer or real.
pub fn number_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
    check: Check<'_, f64>,
) -> Result<Option<f64>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    let Some(n) = value.as_number() else {
        return Err(mismatch(xref, dict_name, key, "number", &value));
    };
    if let Some(check) = check {
        if !check(&n) {
            return Err(PdfError::rejected(
                dict_name,
                key,
                xref.cur_obj(),
                format!("number {n} out of range"),
            ));
        }
    }
    Ok(Some(n))
}

pub fn boolean_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<bool>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    match value {
        Object::Boolean(b) => Ok(Some(b)),
        other => Err(mismatch(xref, dict_name, key, "boolean", &other)),
    }
}

pub fn array_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
    check: Check<'_, [Object]>,
) -> Result<Option<Vec<Object>>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    let Object::Array(a) = value else {
        return Err(mismatch(xref, dict_name, key, "array", &value));
    };
    if let Some(check) = check {
        if !check(a.as_slice()) {
            return Err(PdfError::rejected(
                dict_name,
                key,
                xref.cur_obj(),
                format!("array of length {} rejected", a.len()),
            ));
        }
    }
    Ok(Some(a))
}

pub fn dict_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
    check: Check<'_, Dict>,
) -> Result<Option<Dict>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    let Object::Dict(d) = value else {
        return Err(mismatch(xref, dict_name, key, "dict", &value));
    };
    if let Some(check) = check {
        if !check(&d) {
            return Err(PdfError::rejected(
                dict_name,
                key,
                xref.cur_obj(),
                "dict rejected".to_string(),
            ));
        }
    }
    Ok(Some(d))
}

pub fn stream_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<StreamDict>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    match value {
        Object::Stream(sd) => Ok(Some(sd)),
        other => Err(mismatch(xref, dict_name, key, "stream", &other)),
    }
}

/// Array of four numbers; elements may be indirect.
pub fn rect_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<[f64; 4]>> {
    let Some(value) = located(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    xref.dereference_rect(&value, dict_name, key).map(Some)
}

/// Date string; leniency follows the table's validation mode.
pub fn date_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<String>> {
    let Some(text) = string_entry(xref, dict, dict_name, key, required, since, None)? else {
        return Ok(None);
    };
    if !is_valid_date(&text, !xref.is_strict()) {
        return Err(PdfError::rejected(
            dict_name,
            key,
            xref.cur_obj(),
            format!("malformed date string {text:?}"),
        ));
    }
    Ok(Some(text))
}

/// Like [`date_entry`], but relaxed mode downgrades a malformed value to
/// a warning. For entries producers routinely write sloppily.
pub fn lenient_date_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<String>> {
    match date_entry(xref, dict, dict_name, key, required, since) {
        Ok(v) => Ok(v),
        Err(e @ PdfError::MissingRequired { .. }) => Err(e),
        Err(e) if !xref.is_strict() => {
            tracing::warn!("{dict_name} /{key}: {e}");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// The entry itself must be an indirect reference; it is returned without
/// being resolved.
pub fn reference_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
) -> Result<Option<Reference>> {
    let Some(raw) = dict.get(key) else {
        return absent(xref, dict_name, key, required);
    };
    match raw {
        Object::Reference(r) => Ok(Some(*r)),
        Object::Null => absent(xref, dict_name, key, required),
        other => Err(mismatch(xref, dict_name, key, "indirect reference", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationMode;

    fn xref() -> XRefTable {
        let mut xref = XRefTable::default();
        xref.insert_object(1, Object::name("UseOutlines"));
        xref.insert_object(2, Object::Integer(90));
        xref
    }

    fn dict() -> Dict {
        Dict::new()
            .with("PageMode", Reference::new(1, 0))
            .with("Rotate", Reference::new(2, 0))
            .with("Count", 3)
            .with("Nothing", Object::Null)
            .with("T", Object::string("label"))
            .with("M", Object::string("D:20230601120000Z"))
    }

    #[test]
    fn test_optional_absent_is_none() {
        let r = name_entry(&xref(), &dict(), "d", "Missing", false, Version::V10, None);
        assert!(matches!(r, Ok(None)));
    }

    #[test]
    fn test_required_absent_fails() {
        let r = name_entry(&xref(), &dict(), "d", "Missing", true, Version::V10, None);
        assert!(matches!(r, Err(PdfError::MissingRequired { .. })));
    }

    #[test]
    fn test_null_counts_as_absent() {
        let r = integer_entry(&xref(), &dict(), "d", "Nothing", true, Version::V10, None);
        assert!(matches!(r, Err(PdfError::MissingRequired { .. })));
    }

    #[test]
    fn test_indirect_entry_resolves() {
        let r = name_entry(&xref(), &dict(), "d", "PageMode", true, Version::V10, None);
        let r = r.ok().flatten();
        assert_eq!(r.as_ref().map(Name::as_str), Some("UseOutlines"));
    }

    #[test]
    fn test_predicate_rejection() {
        let r = integer_entry(
            &xref(),
            &dict(),
            "page",
            "Rotate",
            true,
            Version::V10,
            Some(&|i: &i64| i % 90 == 0),
        );
        assert_eq!(r.ok().flatten(), Some(90));

        let r = integer_entry(
            &xref(),
            &dict(),
            "page",
            "Count",
            true,
            Version::V10,
            Some(&|i: &i64| i % 90 == 0),
        );
        assert!(matches!(r, Err(PdfError::ValueRejected { .. })));
    }

    #[test]
    fn test_type_mismatch_names_both_types() {
        let r = boolean_entry(&xref(), &dict(), "d", "Count", true, Version::V10);
        assert!(matches!(
            r,
            Err(PdfError::TypeMismatch {
                expected: "boolean",
                found: "integer",
                ..
            })
        ));
    }

    #[test]
    fn test_version_gate_orders_after_presence() {
        let mut x = xref();
        x.validation_mode = ValidationMode::Strict;
        x.header_version = Version::V12;
        // absent entry with a future version requirement is fine
        let r = name_entry(&x, &dict(), "d", "Missing", false, Version::V16, None);
        assert!(matches!(r, Ok(None)));
        // present entry trips the gate
        let r = string_entry(&x, &dict(), "d", "T", false, Version::V16, None);
        assert!(matches!(r, Err(PdfError::VersionViolation { .. })));
    }

    #[test]
    fn test_date_entry() {
        let r = date_entry(&xref(), &dict(), "d", "M", true, Version::V10);
        assert_eq!(r.ok().flatten().as_deref(), Some("D:20230601120000Z"));

        let bad = Dict::new().with("M", Object::string("yesterday"));
        let r = date_entry(&xref(), &bad, "d", "M", true, Version::V10);
        assert!(matches!(r, Err(PdfError::ValueRejected { .. })));
    }

    #[test]
    fn test_reference_entry_rejects_direct_values() {
        let r = reference_entry(&xref(), &dict(), "d", "Count", true);
        assert!(matches!(r, Err(PdfError::TypeMismatch { .. })));
        let r = reference_entry(&xref(), &dict(), "d", "PageMode", true);
        assert_eq!(r.ok().flatten(), Some(Reference::new(1, 0)));
    }
}
