//! Destination validation (ISO 32000-1, 12.3.2).
//!
//! A destination appears as an explicit array, as a name, or as a string;
//! named forms resolve through the `Dests` name tree (or the PDF 1.1
//! catalog `/Dests` dict), both of which have been flattened into the
//! table by the time link sources are walked.

use tracing::warn;

use crate::destination::{Destination, PageTarget};
use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::entries::any_entry;
use crate::version::Version;
use crate::xref::XRefTable;

/// Outcome of checking a destination's page target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationStatus {
    Valid,
    /// Relaxed mode only: the page reference resolves to nothing. The
    /// caller decides whether to drop the destination or just tolerate it.
    DanglingPage,
}

/// Validates one explicit destination array.
pub fn validate_destination_array(
    xref: &XRefTable,
    arr: &[Object],
    src: &str,
) -> Result<DestinationStatus> {
    let dest = Destination::from_array(arr, !xref.is_strict())?;
    xref.validate_version(
        &format!("{src} destination {}", dest.kind.fit_name()),
        dest.kind.since(),
    )?;

    match dest.page {
        // Remote destinations address pages by number; nothing to resolve.
        PageTarget::Number(_) => Ok(DestinationStatus::Valid),
        PageTarget::Ref(r) => {
            let target = xref.dereference(&Object::Reference(r))?;
            match target {
                Object::Null => {
                    warn!(reference = %r, src, "destination page is dangling");
                    Ok(DestinationStatus::DanglingPage)
                }
                Object::Dict(d) => match d.dict_type() {
                    Some("Page") => Ok(DestinationStatus::Valid),
                    Some("Pages") => Err(PdfError::rejected(
                        src,
                        "destination",
                        xref.cur_obj(),
                        format!("{r} targets a page-tree node, not a page"),
                    )),
                    Some(other) => Err(PdfError::rejected(
                        src,
                        "destination",
                        xref.cur_obj(),
                        format!("{r} targets a dict of type /{other}"),
                    )),
                    None if xref.is_strict() => Err(PdfError::MissingRequired {
                        dict: format!("{src} destination page"),
                        entry: "Type".to_string(),
                        obj_nr: r.obj_nr(),
                    }),
                    None => Ok(DestinationStatus::Valid),
                },
                other => Err(PdfError::TypeMismatch {
                    dict: src.to_string(),
                    entry: "destination page".to_string(),
                    expected: "dict",
                    found: other.type_name(),
                    obj_nr: r.obj_nr(),
                }),
            }
        }
    }
}

/// Validates a destination in any of its three forms.
pub fn validate_destination(
    xref: &XRefTable,
    obj: &Object,
    src: &str,
) -> Result<DestinationStatus> {
    let value = xref.dereference(obj)?;
    match &value {
        Object::Name(n) => validate_named(xref, n.as_str().as_bytes(), src),
        Object::StringLiteral(b) | Object::HexLiteral(b) => {
            xref.validate_version(&format!("{src} string destination"), Version::V11)?;
            validate_named(xref, b, src)
        }
        Object::Array(a) => validate_destination_array(xref, a, src),
        other => Err(PdfError::TypeMismatch {
            dict: src.to_string(),
            entry: "destination".to_string(),
            expected: "array, name, or string",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

fn validate_named(xref: &XRefTable, key: &[u8], src: &str) -> Result<DestinationStatus> {
    if xref.lookup_name("Dests", key).is_some() {
        return Ok(DestinationStatus::Valid);
    }
    let shown = String::from_utf8_lossy(key).into_owned();
    if xref.is_strict() {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            format!("{src}: undefined named destination ({shown})"),
        ));
    }
    warn!(destination = %shown, src, "named destination is undefined");
    Ok(DestinationStatus::DanglingPage)
}

/// Validates a dict entry holding a destination, e.g. an outline item's
/// `/Dest`.
pub fn validate_destination_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<Option<DestinationStatus>> {
    let Some(value) = any_entry(xref, dict, dict_name, key, required, since)? else {
        return Ok(None);
    };
    validate_destination(xref, &value, dict_name).map(Some)
}
