//! Optional content validation (ISO 32000-1, 8.11).
//!
//! Covers group and membership dicts hung off annotations and form
//! XObjects via `/OC`, plus the catalog's `/OCProperties` configuration.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::entries::{
    array_entry, dict_entry, name_entry, number_entry, string_entry,
};
use crate::version::Version;
use crate::xref::XRefTable;

/// Nested visibility expressions deeper than this are rejected.
const MAX_VE_DEPTH: u32 = 8;

/// Validates an `/OC` value: an optional content group or a membership
/// dict.
pub fn validate_oc_object(xref: &mut XRefTable, obj: &Object, src: &str) -> Result<()> {
    let dict = xref.dereference_dict(obj, src, "OC")?;
    match dict.dict_type() {
        Some("OCG") => validate_ocg_dict(xref, &dict),
        Some("OCMD") => validate_ocmd_dict(xref, &dict),
        Some(t) => Err(PdfError::rejected(
            src,
            "OC",
            xref.cur_obj(),
            format!("/{t} is neither /OCG nor /OCMD"),
        )),
        None => {
            if xref.is_strict() {
                return Err(PdfError::MissingRequired {
                    dict: format!("{src} /OC"),
                    entry: "Type".to_string(),
                    obj_nr: xref.cur_obj(),
                });
            }
            // Untyped dicts occur in the wild; the presence of /OCGs is
            // the usual tell for a membership dict.
            warn!("{src} /OC dict carries no /Type");
            if dict.contains_key("OCGs") {
                validate_ocmd_dict(xref, &dict)
            } else {
                validate_ocg_dict(xref, &dict)
            }
        }
    }
}

/// Optional content group dict (8.11.2).
pub fn validate_ocg_dict(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "optional content group";
    xref.validate_version(DICT, Version::V15)?;

    string_entry(xref, dict, DICT, "Name", true, Version::V15, None)?;
    validate_intent(xref, dict, DICT)?;

    if let Some(usage) = dict_entry(xref, dict, DICT, "Usage", false, Version::V15, None)? {
        validate_usage_dict(xref, &usage)?;
    }
    Ok(())
}

/// Optional content membership dict (8.11.2.3).
pub fn validate_ocmd_dict(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "optional content membership dict";
    xref.validate_version(DICT, Version::V15)?;

    if let Some(ocgs) = dict.get("OCGs") {
        match xref.dereference(ocgs)? {
            Object::Null => {}
            Object::Dict(ocg) => validate_ocg_dict(xref, &ocg)?,
            Object::Array(groups) => {
                for el in &groups {
                    match xref.dereference(el)? {
                        Object::Null => {}
                        Object::Dict(ocg) => validate_ocg_dict(xref, &ocg)?,
                        other => {
                            return Err(PdfError::TypeMismatch {
                                dict: DICT.to_string(),
                                entry: "OCGs".to_string(),
                                expected: "dict",
                                found: other.type_name(),
                                obj_nr: xref.cur_obj(),
                            });
                        }
                    }
                }
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "OCGs".to_string(),
                    expected: "dict or array",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }

    name_entry(xref, dict, DICT, "P", false, Version::V16, Some(&|s: &str| {
        matches!(s, "AllOn" | "AnyOn" | "AnyOff" | "AllOff")
    }))?;

    if let Some(ve) = array_entry(xref, dict, DICT, "VE", false, Version::V16, None)? {
        validate_visibility_expression(xref, &ve, 0)?;
    }
    Ok(())
}

/// `/VE`: `[/And|/Or|/Not operand...]` where operands are OCG refs or
/// nested expressions.
fn validate_visibility_expression(xref: &mut XRefTable, ve: &[Object], depth: u32) -> Result<()> {
    const DICT: &str = "visibility expression";
    if depth > MAX_VE_DEPTH {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            "visibility expression nests too deeply",
        ));
    }

    let Some(op) = ve.first().and_then(Object::as_name) else {
        return Err(PdfError::rejected(
            DICT,
            "VE",
            xref.cur_obj(),
            "first element must be /And, /Or or /Not".to_string(),
        ));
    };
    let operands = &ve[1..];
    match op.as_str() {
        "And" | "Or" => {}
        "Not" if operands.len() == 1 => {}
        "Not" => {
            return Err(PdfError::rejected(
                DICT,
                "VE",
                xref.cur_obj(),
                format!("/Not takes one operand, found {}", operands.len()),
            ));
        }
        other => {
            return Err(PdfError::rejected(
                DICT,
                "VE",
                xref.cur_obj(),
                format!("unknown operator /{other}"),
            ));
        }
    }

    for operand in operands {
        match xref.dereference(operand)? {
            Object::Null => {}
            Object::Dict(ocg) => validate_ocg_dict(xref, &ocg)?,
            Object::Array(nested) => validate_visibility_expression(xref, &nested, depth + 1)?,
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "VE".to_string(),
                    expected: "dict or array",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}

/// `/Intent`: a name or an array of names.
fn validate_intent(xref: &XRefTable, dict: &Dict, dict_name: &str) -> Result<()> {
    let Some(intent) = dict.get("Intent") else {
        return Ok(());
    };
    match xref.dereference(intent)? {
        Object::Null | Object::Name(_) => Ok(()),
        Object::Array(names) => {
            for el in &names {
                xref.dereference_name(el, dict_name, "Intent", Version::V15, None)?;
            }
            Ok(())
        }
        other => Err(PdfError::TypeMismatch {
            dict: dict_name.to_string(),
            entry: "Intent".to_string(),
            expected: "name or array",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

/// OCG `/Usage` dict (8.11.4.4). Every entry is optional.
fn validate_usage_dict(xref: &XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "OCG usage dict";
    let on_off: &dyn Fn(&str) -> bool = &|s: &str| matches!(s, "ON" | "OFF");

    if let Some(export) = dict_entry(xref, dict, DICT, "Export", false, Version::V15, None)? {
        name_entry(xref, &export, DICT, "ExportState", false, Version::V15, Some(on_off))?;
    }
    if let Some(zoom) = dict_entry(xref, dict, DICT, "Zoom", false, Version::V15, None)? {
        number_entry(xref, &zoom, DICT, "min", false, Version::V15, None)?;
        number_entry(xref, &zoom, DICT, "max", false, Version::V15, None)?;
    }
    if let Some(print) = dict_entry(xref, dict, DICT, "Print", false, Version::V15, None)? {
        name_entry(xref, &print, DICT, "Subtype", false, Version::V15, None)?;
        name_entry(xref, &print, DICT, "PrintState", false, Version::V15, Some(on_off))?;
    }
    if let Some(view) = dict_entry(xref, dict, DICT, "View", false, Version::V15, None)? {
        name_entry(xref, &view, DICT, "ViewState", false, Version::V15, Some(on_off))?;
    }
    if let Some(user) = dict_entry(xref, dict, DICT, "User", false, Version::V15, None)? {
        name_entry(xref, &user, DICT, "Type", true, Version::V15, Some(&|s: &str| {
            matches!(s, "Ind" | "Ttl" | "Org")
        }))?;
        if let Some(name) = user.get("Name") {
            match xref.dereference(name)? {
                Object::Null | Object::StringLiteral(_) | Object::HexLiteral(_) | Object::Array(_) => {}
                other => {
                    return Err(PdfError::TypeMismatch {
                        dict: DICT.to_string(),
                        entry: "Name".to_string(),
                        expected: "string or array",
                        found: other.type_name(),
                        obj_nr: xref.cur_obj(),
                    });
                }
            }
        }
    }
    if let Some(pe) = dict_entry(xref, dict, DICT, "PageElement", false, Version::V15, None)? {
        name_entry(xref, &pe, DICT, "Subtype", false, Version::V15, Some(&|s: &str| {
            matches!(s, "HF" | "FG" | "BG" | "L")
        }))?;
    }
    dict_entry(xref, dict, DICT, "CreatorInfo", false, Version::V15, None)?;
    dict_entry(xref, dict, DICT, "Language", false, Version::V15, None)?;
    Ok(())
}

/// Catalog `/OCProperties` (8.11.4.2).
pub fn validate_oc_properties(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "OCProperties";
    xref.validate_version(DICT, Version::V15)?;

    let Some(ocgs) = array_entry(xref, dict, DICT, "OCGs", true, Version::V15, None)? else {
        return Ok(());
    };
    for el in &ocgs {
        match xref.dereference(el)? {
            Object::Null => {}
            Object::Dict(ocg) => validate_ocg_dict(xref, &ocg)?,
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "OCGs".to_string(),
                    expected: "dict",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }

    if let Some(d) = dict_entry(xref, dict, DICT, "D", true, Version::V15, None)? {
        validate_oc_config(xref, &d, true)?;
    }
    if let Some(configs) = array_entry(xref, dict, DICT, "Configs", false, Version::V15, None)? {
        for el in &configs {
            let config = xref.dereference_dict(el, DICT, "Configs")?;
            validate_oc_config(xref, &config, false)?;
        }
    }
    Ok(())
}

/// One configuration dict (8.11.4.3). The default configuration must
/// leave `/BaseState` at ON.
fn validate_oc_config(xref: &mut XRefTable, dict: &Dict, default_config: bool) -> Result<()> {
    const DICT: &str = "OC configuration";

    string_entry(xref, dict, DICT, "Name", false, Version::V15, None)?;
    string_entry(xref, dict, DICT, "Creator", false, Version::V15, None)?;

    let base_state = name_entry(xref, dict, DICT, "BaseState", false, Version::V15, Some(&|s: &str| {
        matches!(s, "ON" | "OFF" | "Unchanged")
    }))?;
    if default_config {
        if let Some(bs) = base_state {
            if bs != "ON" {
                let detail = format!("default configuration has /BaseState /{bs}");
                if xref.is_strict() {
                    return Err(PdfError::rejected(DICT, "BaseState", xref.cur_obj(), detail));
                }
                warn!("{detail}");
            }
        }
    }

    for key in ["ON", "OFF", "Locked"] {
        let since = if key == "Locked" { Version::V16 } else { Version::V15 };
        if let Some(groups) = array_entry(xref, dict, DICT, key, false, since, None)? {
            for el in &groups {
                match xref.dereference(el)? {
                    Object::Null => {}
                    Object::Dict(ocg) => validate_ocg_dict(xref, &ocg)?,
                    other => {
                        return Err(PdfError::TypeMismatch {
                            dict: DICT.to_string(),
                            entry: key.to_string(),
                            expected: "dict",
                            found: other.type_name(),
                            obj_nr: xref.cur_obj(),
                        });
                    }
                }
            }
        }
    }

    validate_intent(xref, dict, DICT)?;

    if let Some(as_arr) = array_entry(xref, dict, DICT, "AS", false, Version::V15, None)? {
        for el in &as_arr {
            let usage_app = xref.dereference_dict(el, DICT, "AS")?;
            validate_usage_application(xref, &usage_app)?;
        }
    }

    if let Some(order) = array_entry(xref, dict, DICT, "Order", false, Version::V15, None)? {
        validate_order_array(xref, &order, 0)?;
    }

    name_entry(xref, dict, DICT, "ListMode", false, Version::V16, Some(&|s: &str| {
        matches!(s, "AllPages" | "VisiblePages")
    }))?;

    if let Some(rb) = array_entry(xref, dict, DICT, "RBGroups", false, Version::V15, None)? {
        for el in &rb {
            let group = xref.dereference_array(el, DICT, "RBGroups")?;
            for ocg in &group {
                xref.dereference_dict(ocg, DICT, "RBGroups")?;
            }
        }
    }
    Ok(())
}

/// Usage application dict inside `/AS`.
fn validate_usage_application(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "usage application dict";
    name_entry(xref, dict, DICT, "Event", true, Version::V15, Some(&|s: &str| {
        matches!(s, "View" | "Print" | "Export")
    }))?;
    if let Some(ocgs) = array_entry(xref, dict, DICT, "OCGs", false, Version::V15, None)? {
        for el in &ocgs {
            xref.dereference_dict(el, DICT, "OCGs")?;
        }
    }
    if let Some(categories) = array_entry(xref, dict, DICT, "Category", true, Version::V15, None)? {
        for el in &categories {
            xref.dereference_name(el, DICT, "Category", Version::V15, None)?;
        }
    }
    Ok(())
}

/// `/Order`: groups, textual labels and nested sub-orders, mixed freely.
fn validate_order_array(xref: &mut XRefTable, order: &[Object], depth: u32) -> Result<()> {
    if depth > MAX_VE_DEPTH {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            "/Order array nests too deeply",
        ));
    }
    for el in order {
        match xref.dereference(el)? {
            Object::Null => {}
            Object::Dict(ocg) => validate_ocg_dict(xref, &ocg)?,
            Object::StringLiteral(_) | Object::HexLiteral(_) => {}
            Object::Array(nested) => validate_order_array(xref, &nested, depth + 1)?,
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: "OC configuration".to_string(),
                    entry: "Order".to_string(),
                    expected: "dict, string or array",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}
