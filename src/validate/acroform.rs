//! Interactive form validation (ISO 32000-1, 12.7).
//!
//! The form dict hangs off the catalog; its `/Fields` array roots a tree
//! of field dicts whose terminal nodes double as widget annotations. The
//! widget side of merged nodes is covered by the page walk; here only the
//! field entries are checked. `/FT` inherits down the tree and must be
//! resolvable for every terminal field.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::actions::{validate_additional_actions, AdditionalActionsKind};
use crate::validate::entries::{
    any_entry, array_entry, boolean_entry, date_entry, dict_entry, integer_entry, name_entry,
    reference_entry, string_entry,
};
use crate::validate::fonts::validate_resource_dict;
use crate::version::Version;
use crate::xref::XRefTable;

const SIGNATURES_EXIST: i64 = 1;
const APPEND_ONLY: i64 = 1 << 1;

/// Validates the catalog's `/AcroForm` dict, when present.
pub fn validate_acro_form(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    const DICT: &str = "form";
    let Some(form) = dict_entry(xref, catalog, "catalog", "AcroForm", false, Version::V12, None)?
    else {
        return Ok(());
    };
    if let Some(r) = catalog.reference("AcroForm") {
        xref.set_cur_obj(r.obj_nr());
    }

    let fields = array_entry(xref, &form, DICT, "Fields", true, Version::V12, None)?
        .unwrap_or_default();
    for field in &fields {
        validate_field(xref, field, DICT, None)?;
    }

    boolean_entry(xref, &form, DICT, "NeedAppearances", false, Version::V12)?;

    if let Some(flags) = integer_entry(xref, &form, DICT, "SigFlags", false, Version::V13, Some(&|f: &i64| {
        (0..=3).contains(f)
    }))? {
        if flags & APPEND_ONLY != 0 && flags & SIGNATURES_EXIST == 0 {
            let detail = "/SigFlags sets AppendOnly but not SignaturesExist".to_string();
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "SigFlags", xref.cur_obj(), detail));
            }
            warn!("{detail}");
        }
    }

    // Calculation order: fields with calculation actions, already walked
    // above, so a plain dict check suffices.
    if let Some(co) = array_entry(xref, &form, DICT, "CO", false, Version::V13, None)? {
        for el in &co {
            xref.dereference_dict(el, DICT, "CO")?;
        }
    }

    if let Some(dr) = dict_entry(xref, &form, DICT, "DR", false, Version::V12, None)? {
        validate_resource_dict(xref, &dr)?;
    }
    string_entry(xref, &form, DICT, "DA", false, Version::V12, None)?;
    integer_entry(xref, &form, DICT, "Q", false, Version::V12, Some(&|q: &i64| {
        (0..=2).contains(q)
    }))?;
    validate_xfa(xref, &form)?;
    Ok(())
}

/// One node of the field tree. `inherited_ft` is the nearest ancestor's
/// `/FT`, already resolved.
fn validate_field(
    xref: &mut XRefTable,
    obj: &Object,
    src: &str,
    inherited_ft: Option<String>,
) -> Result<()> {
    const DICT: &str = "form field";
    let obj_nr = match obj {
        Object::Reference(r) => {
            xref.set_cur_obj(r.obj_nr());
            Some(r.obj_nr())
        }
        _ if xref.is_strict() => {
            return Err(PdfError::TypeMismatch {
                dict: src.to_string(),
                entry: "Fields".to_string(),
                expected: "indirect reference",
                found: obj.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
        _ => {
            warn!("form field written inline instead of as a reference");
            None
        }
    };
    if let Some(nr) = obj_nr {
        if !xref.mark(nr) {
            let detail = format!("form field obj#{nr} appears twice in the field tree");
            if xref.is_strict() {
                return Err(PdfError::corrupt(nr, detail));
            }
            warn!("{detail}");
            return Ok(());
        }
    }
    let dict = xref.dereference_dict(obj, src, "Fields")?;

    string_entry(xref, &dict, DICT, "T", false, Version::V12, None)?;
    string_entry(xref, &dict, DICT, "TU", false, Version::V13, None)?;
    string_entry(xref, &dict, DICT, "TM", false, Version::V13, None)?;
    reference_entry(xref, &dict, DICT, "Parent", false)?;
    integer_entry(xref, &dict, DICT, "Ff", false, Version::V12, Some(&|f: &i64| *f >= 0))?;
    validate_additional_actions(xref, &dict, DICT, false, Version::V12, AdditionalActionsKind::Field)?;
    string_entry(xref, &dict, DICT, "DA", false, Version::V12, None)?;
    integer_entry(xref, &dict, DICT, "Q", false, Version::V12, Some(&|q: &i64| {
        (0..=2).contains(q)
    }))?;
    string_entry(xref, &dict, DICT, "DS", false, Version::V15, None)?;
    validate_rich_text(xref, &dict)?;

    let own_ft = name_entry(xref, &dict, DICT, "FT", false, Version::V12, Some(&|ft: &str| {
        matches!(ft, "Btn" | "Tx" | "Ch" | "Sig")
    }))?;
    let effective_ft = own_ft
        .map(|n| n.as_str().to_string())
        .or(inherited_ft);

    // Children: nested fields recurse, widget-only kids are left to the
    // page walk.
    let mut terminal = true;
    if let Some(kids) = array_entry(xref, &dict, DICT, "Kids", false, Version::V12, None)? {
        for kid in &kids {
            let kid_dict = xref.dereference_dict(kid, DICT, "Kids")?;
            if kid_dict.contains_key("T")
                || kid_dict.contains_key("FT")
                || kid_dict.contains_key("Kids")
            {
                terminal = false;
                validate_field(xref, kid, DICT, effective_ft.clone())?;
            } else if kid_dict.name("Subtype") != Some("Widget") {
                let detail = "field kid is neither a field nor a widget".to_string();
                if xref.is_strict() {
                    return Err(PdfError::rejected(DICT, "Kids", xref.cur_obj(), detail));
                }
                warn!("{detail}");
            }
            if let Some(nr) = obj_nr {
                xref.set_cur_obj(nr);
            }
        }
    }

    match effective_ft.as_deref() {
        Some("Btn") => validate_button_field(xref, &dict)?,
        Some("Tx") => validate_text_field(xref, &dict)?,
        Some("Ch") => validate_choice_field(xref, &dict)?,
        Some("Sig") => validate_signature_field(xref, &dict)?,
        Some(_) => {}
        None if terminal => {
            if xref.is_strict() {
                return Err(PdfError::MissingRequired {
                    dict: DICT.to_string(),
                    entry: "FT".to_string(),
                    obj_nr: xref.cur_obj(),
                });
            }
            warn!("terminal form field without resolvable /FT");
        }
        None => {}
    }
    Ok(())
}

fn validate_button_field(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "button field";
    // /V names the appearance state of the on toggle.
    name_entry(xref, dict, DICT, "V", false, Version::V12, None)?;
    name_entry(xref, dict, DICT, "DV", false, Version::V12, None)?;
    if let Some(opt) = array_entry(xref, dict, DICT, "Opt", false, Version::V14, None)? {
        for el in &opt {
            let value = xref.dereference(el)?;
            if value.as_string_bytes().is_none() {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "Opt".to_string(),
                    expected: "string",
                    found: value.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}

fn validate_text_field(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "text field";
    string_entry(xref, dict, DICT, "V", false, Version::V12, None)?;
    string_entry(xref, dict, DICT, "DV", false, Version::V12, None)?;
    integer_entry(xref, dict, DICT, "MaxLen", false, Version::V12, Some(&|n: &i64| *n >= 0))?;
    Ok(())
}

fn validate_choice_field(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "choice field";
    if let Some(opt) = array_entry(xref, dict, DICT, "Opt", false, Version::V12, None)? {
        for el in &opt {
            validate_choice_option(xref, el)?;
        }
    }
    integer_entry(xref, dict, DICT, "TI", false, Version::V12, Some(&|n: &i64| *n >= 0))?;
    if let Some(indices) = array_entry(xref, dict, DICT, "I", false, Version::V15, None)? {
        for el in &indices {
            let value = xref.dereference(el)?;
            if !matches!(value, Object::Integer(n) if n >= 0) {
                return Err(PdfError::rejected(
                    DICT,
                    "I",
                    xref.cur_obj(),
                    "selection indices must be non-negative integers",
                ));
            }
        }
    }
    // /V: one selected export value, or several for multi-select lists.
    match dict.get("V").map(|v| xref.dereference(v)).transpose()? {
        None | Some(Object::Null) => {}
        Some(v) if v.as_string_bytes().is_some() => {}
        Some(Object::Array(items)) => {
            for el in &items {
                let value = xref.dereference(el)?;
                if value.as_string_bytes().is_none() {
                    return Err(PdfError::TypeMismatch {
                        dict: DICT.to_string(),
                        entry: "V".to_string(),
                        expected: "string",
                        found: value.type_name(),
                        obj_nr: xref.cur_obj(),
                    });
                }
            }
        }
        Some(other) => {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "V".to_string(),
                expected: "string or array",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }
    Ok(())
}

/// An `/Opt` element is an export string or a `[export, display]` pair.
fn validate_choice_option(xref: &XRefTable, el: &Object) -> Result<()> {
    const DICT: &str = "choice field";
    let value = xref.dereference(el)?;
    if value.as_string_bytes().is_some() {
        return Ok(());
    }
    if let Object::Array(pair) = &value {
        if pair.len() == 2 {
            for half in pair {
                if xref.dereference(half)?.as_string_bytes().is_none() {
                    return Err(PdfError::rejected(
                        DICT,
                        "Opt",
                        xref.cur_obj(),
                        "option pair elements must be strings",
                    ));
                }
            }
            return Ok(());
        }
    }
    Err(PdfError::rejected(
        DICT,
        "Opt",
        xref.cur_obj(),
        "option must be a string or a two-string array",
    ))
}

fn validate_signature_field(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "signature field";
    if let Some(sig) = dict_entry(xref, dict, DICT, "V", false, Version::V13, None)? {
        validate_signature_dict(xref, &sig)?;
    }
    if let Some(lock) = dict_entry(xref, dict, DICT, "Lock", false, Version::V15, None)? {
        if let Some(t) = lock.dict_type() {
            if t != "SigFieldLock" {
                return Err(PdfError::rejected(
                    DICT,
                    "Lock",
                    xref.cur_obj(),
                    format!("/{t} is not /SigFieldLock"),
                ));
            }
        }
        let action = name_entry(xref, &lock, "field lock", "Action", true, Version::V15, Some(&|a: &str| {
            matches!(a, "All" | "Include" | "Exclude")
        }))?;
        let needs_fields = action.is_some_and(|a| a != "All");
        array_entry(xref, &lock, "field lock", "Fields", needs_fields, Version::V15, None)?;
    }
    // Seed values constrain future signatures; presence checks only.
    dict_entry(xref, dict, DICT, "SV", false, Version::V15, None)?;
    Ok(())
}

fn validate_signature_dict(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "signature";
    if let Some(t) = dict.dict_type() {
        if t != "Sig" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Sig"),
            ));
        }
    }
    name_entry(xref, dict, DICT, "Filter", true, Version::V13, None)?;
    name_entry(xref, dict, DICT, "SubFilter", false, Version::V13, None)?;
    string_entry(xref, dict, DICT, "Name", false, Version::V13, None)?;
    date_entry(xref, dict, DICT, "M", false, Version::V13)?;
    string_entry(xref, dict, DICT, "Location", false, Version::V13, None)?;
    string_entry(xref, dict, DICT, "Reason", false, Version::V13, None)?;
    string_entry(xref, dict, DICT, "ContactInfo", false, Version::V15, None)?;
    if dict.contains_key("Contents") {
        let contents = xref.dereference(dict.get("Contents").unwrap_or(&Object::Null))?;
        if contents.as_string_bytes().is_none() {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "Contents".to_string(),
                expected: "string",
                found: contents.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }
    array_entry(xref, dict, DICT, "ByteRange", false, Version::V13, Some(&|a: &[Object]| {
        !a.is_empty() && a.len() % 2 == 0
    }))?;
    // Certificate chain: one string or an array of them.
    if let Some(cert) = any_entry(xref, dict, DICT, "Cert", false, Version::V13)? {
        match cert {
            v if v.as_string_bytes().is_some() => {}
            Object::Array(items) => {
                for el in &items {
                    if xref.dereference(el)?.as_string_bytes().is_none() {
                        return Err(PdfError::rejected(
                            DICT,
                            "Cert",
                            xref.cur_obj(),
                            "certificate chain elements must be strings",
                        ));
                    }
                }
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "Cert".to_string(),
                    expected: "string or array",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    if let Some(refs) = array_entry(xref, dict, DICT, "Reference", false, Version::V15, None)? {
        for el in &refs {
            let sig_ref = xref.dereference_dict(el, DICT, "Reference")?;
            if let Some(t) = sig_ref.dict_type() {
                if t != "SigRef" {
                    return Err(PdfError::rejected(
                        DICT,
                        "Reference",
                        xref.cur_obj(),
                        format!("/{t} is not /SigRef"),
                    ));
                }
            }
            name_entry(xref, &sig_ref, "signature reference", "TransformMethod", true, Version::V15, Some(&|s: &str| {
                matches!(s, "DocMDP" | "UR" | "FieldMDP")
            }))?;
            dict_entry(xref, &sig_ref, "signature reference", "TransformParams", false, Version::V15, None)?;
        }
    }
    Ok(())
}

/// `/RV` holds rich text as a string or a stream.
fn validate_rich_text(xref: &XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "form field";
    let Some(raw) = dict.get("RV") else {
        return Ok(());
    };
    let value = xref.dereference(raw)?;
    if value.is_null() {
        return Ok(());
    }
    xref.validate_version("form field entry RV", Version::V15)?;
    match value {
        Object::Stream(_) => Ok(()),
        v if v.as_string_bytes().is_some() => Ok(()),
        other => Err(PdfError::TypeMismatch {
            dict: DICT.to_string(),
            entry: "RV".to_string(),
            expected: "string or stream",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

/// `/XFA` carries an XML forms architecture payload: one packet stream or
/// an array alternating packet names and streams.
fn validate_xfa(xref: &mut XRefTable, form: &Dict) -> Result<()> {
    const DICT: &str = "form";
    let Some(raw) = form.get("XFA") else {
        return Ok(());
    };
    let value = xref.dereference(raw)?;
    if value.is_null() {
        return Ok(());
    }
    xref.validate_version("form entry XFA", Version::V15)?;
    match value {
        Object::Stream(_) => Ok(()),
        Object::Array(items) => {
            if items.len() % 2 != 0 {
                return Err(PdfError::rejected(
                    DICT,
                    "XFA",
                    xref.cur_obj(),
                    "packet array must alternate names and streams",
                ));
            }
            for pair in items.chunks_exact(2) {
                if xref.dereference(&pair[0])?.as_string_bytes().is_none() {
                    return Err(PdfError::rejected(
                        DICT,
                        "XFA",
                        xref.cur_obj(),
                        "packet name must be a string",
                    ));
                }
                xref.dereference_stream(&pair[1], DICT, "XFA")?;
            }
            Ok(())
        }
        other => Err(PdfError::TypeMismatch {
            dict: DICT.to_string(),
            entry: "XFA".to_string(),
            expected: "stream or array",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationMode;
    use crate::objects::Reference;

    fn form_xref(field: Dict) -> (XRefTable, Dict) {
        let mut xref = XRefTable::default();
        xref.insert_object(20, field);
        let form = Dict::new().with("Fields", vec![Object::Reference(Reference::new(20, 0))]);
        let r = xref.insert_object(21, form);
        let catalog = Dict::new().with("AcroForm", r);
        (xref, catalog)
    }

    #[test]
    fn test_text_field_passes() {
        let (mut xref, catalog) = form_xref(
            Dict::new()
                .with("FT", Object::name("Tx"))
                .with("T", Object::string("name"))
                .with("V", Object::string("Bob"))
                .with("MaxLen", 40),
        );
        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_acro_form(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_terminal_field_without_ft_fails_strict() {
        let (mut xref, catalog) = form_xref(Dict::new().with("T", Object::string("stray")));
        xref.validation_mode = ValidationMode::Strict;
        assert!(matches!(
            validate_acro_form(&mut xref, &catalog),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "FT"
        ));
        xref.validation_mode = ValidationMode::Relaxed;
        xref.reset_validation_state();
        assert!(validate_acro_form(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_ft_inherits_to_kids() {
        let mut xref = XRefTable::default();
        xref.insert_object(
            22,
            Dict::new()
                .with("T", Object::string("kid"))
                .with("Parent", Reference::new(20, 0))
                .with("MaxLen", 10),
        );
        xref.insert_object(
            20,
            Dict::new()
                .with("FT", Object::name("Tx"))
                .with("T", Object::string("group"))
                .with("Kids", vec![Object::Reference(Reference::new(22, 0))]),
        );
        let r = xref.insert_object(
            21,
            Dict::new().with("Fields", vec![Object::Reference(Reference::new(20, 0))]),
        );
        let catalog = Dict::new().with("AcroForm", r);
        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_acro_form(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_sig_flags_append_only_requires_signatures_exist() {
        let mut xref = XRefTable::default();
        let r = xref.insert_object(
            21,
            Dict::new()
                .with("Fields", Vec::<Object>::new())
                .with("SigFlags", 2),
        );
        let catalog = Dict::new().with("AcroForm", r);
        xref.validation_mode = ValidationMode::Strict;
        assert!(matches!(
            validate_acro_form(&mut xref, &catalog),
            Err(PdfError::ValueRejected { .. })
        ));
        xref.validation_mode = ValidationMode::Relaxed;
        xref.reset_validation_state();
        assert!(validate_acro_form(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_choice_option_pair() {
        let (mut xref, catalog) = form_xref(
            Dict::new().with("FT", Object::name("Ch")).with(
                "Opt",
                vec![
                    Object::string("plain"),
                    Object::Array(vec![Object::string("export"), Object::string("shown")]),
                ],
            ),
        );
        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_acro_form(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_choice_option_bad_pair_rejected() {
        let (mut xref, catalog) = form_xref(Dict::new().with("FT", Object::name("Ch")).with(
            "Opt",
            vec![Object::Array(vec![Object::string("only one")])],
        ));
        assert!(matches!(
            validate_acro_form(&mut xref, &catalog),
            Err(PdfError::ValueRejected { ref entry, .. }) if entry == "Opt"
        ));
    }

    #[test]
    fn test_signature_lock_fields_required_for_include() {
        let (mut xref, catalog) = form_xref(
            Dict::new().with("FT", Object::name("Sig")).with(
                "Lock",
                Object::Dict(
                    Dict::new()
                        .with("Type", Object::name("SigFieldLock"))
                        .with("Action", Object::name("Include")),
                ),
            ),
        );
        assert!(matches!(
            validate_acro_form(&mut xref, &catalog),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "Fields"
        ));
    }

    #[test]
    fn test_signature_dict_needs_filter() {
        let (mut xref, catalog) = form_xref(
            Dict::new().with("FT", Object::name("Sig")).with(
                "V",
                Object::Dict(
                    Dict::new()
                        .with("Type", Object::name("Sig"))
                        .with("Contents", Object::string("sig bytes"))
                        .with("ByteRange", vec![
                            Object::Integer(0),
                            Object::Integer(100),
                            Object::Integer(200),
                            Object::Integer(300),
                        ]),
                ),
            ),
        );
        assert!(matches!(
            validate_acro_form(&mut xref, &catalog),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "Filter"
        ));
    }

    #[test]
    fn test_duplicate_field_tolerated_relaxed() {
        let mut xref = XRefTable::default();
        xref.insert_object(20, Dict::new().with("FT", Object::name("Tx")));
        let r = xref.insert_object(
            21,
            Dict::new().with(
                "Fields",
                vec![
                    Object::Reference(Reference::new(20, 0)),
                    Object::Reference(Reference::new(20, 0)),
                ],
            ),
        );
        let catalog = Dict::new().with("AcroForm", r);
        assert!(validate_acro_form(&mut xref, &catalog).is_ok());
        xref.validation_mode = ValidationMode::Strict;
        xref.reset_validation_state();
        assert!(matches!(
            validate_acro_form(&mut xref, &catalog),
            Err(PdfError::CorruptStructure { .. })
        ));
    }
}
