//! Resource dict and font validation (ISO 32000-1, 7.8.3 and 9.6).

use bitflags::bitflags;
use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::entries::{
    array_entry, dict_entry, integer_entry, name_entry, number_entry, rect_entry, stream_entry,
    string_entry,
};
use crate::validate::optional_content::{validate_ocg_dict, validate_ocmd_dict};
use crate::version::Version;
use crate::xref::XRefTable;

bitflags! {
    /// Font descriptor flags (ISO 32000-1, table 123).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FontFlags: u32 {
        const FIXED_PITCH = 1 << 0;
        const SERIF = 1 << 1;
        const SYMBOLIC = 1 << 2;
        const SCRIPT = 1 << 3;
        const NONSYMBOLIC = 1 << 5;
        const ITALIC = 1 << 6;
        const ALL_CAP = 1 << 16;
        const SMALL_CAP = 1 << 17;
        const FORCE_BOLD = 1 << 18;
    }
}

/// The base fonts every reader ships. They may omit widths and the
/// descriptor.
pub const STANDARD_FONTS: [&str; 14] = [
    "Times-Roman",
    "Times-Bold",
    "Times-Italic",
    "Times-BoldItalic",
    "Helvetica",
    "Helvetica-Bold",
    "Helvetica-Oblique",
    "Helvetica-BoldOblique",
    "Courier",
    "Courier-Bold",
    "Courier-Oblique",
    "Courier-BoldOblique",
    "Symbol",
    "ZapfDingbats",
];

pub fn is_standard_font(name: &str) -> bool {
    STANDARD_FONTS.contains(&name)
}

/// Validates a `/Resources` dict hanging off a page, form XObject or
/// Type 3 font.
pub fn validate_resource_dict(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "resource dict";

    if let Some(gs) = dict_entry(xref, dict, DICT, "ExtGState", false, Version::V12, None)? {
        for (name, value) in gs.iter() {
            xref.dereference_dict(value, "ExtGState", name)?;
        }
    }
    if let Some(cs) = dict_entry(xref, dict, DICT, "ColorSpace", false, Version::V10, None)? {
        for (name, value) in cs.iter() {
            match xref.dereference(value)? {
                Object::Null | Object::Name(_) | Object::Array(_) => {}
                other => {
                    return Err(PdfError::TypeMismatch {
                        dict: "ColorSpace".to_string(),
                        entry: name.clone(),
                        expected: "name or array",
                        found: other.type_name(),
                        obj_nr: xref.cur_obj(),
                    });
                }
            }
        }
    }
    if let Some(patterns) = dict_entry(xref, dict, DICT, "Pattern", false, Version::V12, None)? {
        for (name, value) in patterns.iter() {
            match xref.dereference(value)? {
                Object::Null | Object::Dict(_) | Object::Stream(_) => {}
                other => {
                    return Err(PdfError::TypeMismatch {
                        dict: "Pattern".to_string(),
                        entry: name.clone(),
                        expected: "dict or stream",
                        found: other.type_name(),
                        obj_nr: xref.cur_obj(),
                    });
                }
            }
        }
    }
    if let Some(shadings) = dict_entry(xref, dict, DICT, "Shading", false, Version::V13, None)? {
        for (name, value) in shadings.iter() {
            let shading = match xref.dereference(value)? {
                Object::Null => continue,
                Object::Dict(d) => d,
                Object::Stream(sd) => sd.dict,
                other => {
                    return Err(PdfError::TypeMismatch {
                        dict: "Shading".to_string(),
                        entry: name.clone(),
                        expected: "dict or stream",
                        found: other.type_name(),
                        obj_nr: xref.cur_obj(),
                    });
                }
            };
            integer_entry(xref, &shading, "shading dict", "ShadingType", true, Version::V13, Some(&|t: &i64| {
                (1..=7).contains(t)
            }))?;
        }
    }
    if let Some(xobjects) = dict_entry(xref, dict, DICT, "XObject", false, Version::V10, None)? {
        for (name, value) in xobjects.iter() {
            let sd = xref.dereference_stream(value, "XObject", name)?;
            validate_xobject(xref, &sd.dict)?;
        }
    }
    if let Some(fonts) = dict_entry(xref, dict, DICT, "Font", false, Version::V10, None)? {
        for (name, value) in fonts.iter() {
            let font = xref.dereference_dict(value, "Font", name)?;
            validate_font_dict(xref, &font)?;
        }
    }
    if let Some(proc_set) = array_entry(xref, dict, DICT, "ProcSet", false, Version::V10, None)? {
        for el in &proc_set {
            xref.dereference_name(el, DICT, "ProcSet", Version::V10, None)?;
        }
    }
    if let Some(props) = dict_entry(xref, dict, DICT, "Properties", false, Version::V12, None)? {
        for (name, value) in props.iter() {
            let d = xref.dereference_dict(value, "Properties", name)?;
            match d.dict_type() {
                Some("OCG") => validate_ocg_dict(xref, &d)?,
                Some("OCMD") => validate_ocmd_dict(xref, &d)?,
                _ => {}
            }
        }
    }
    Ok(())
}

/// Image, form and PostScript XObjects (8.8 to 8.10).
fn validate_xobject(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "XObject";
    let Some(subtype) = name_entry(xref, dict, DICT, "Subtype", true, Version::V10, None)? else {
        return Ok(());
    };
    match subtype.as_str() {
        "Image" => {
            integer_entry(xref, dict, "image XObject", "Width", true, Version::V10, Some(&|w: &i64| *w > 0))?;
            integer_entry(xref, dict, "image XObject", "Height", true, Version::V10, Some(&|h: &i64| *h > 0))?;
            integer_entry(xref, dict, "image XObject", "BitsPerComponent", false, Version::V10, Some(&|b: &i64| {
                matches!(b, 1 | 2 | 4 | 8 | 16)
            }))?;
            Ok(())
        }
        "Form" => {
            rect_entry(xref, dict, "form XObject", "BBox", true, Version::V10)?;
            if let Some(matrix) = array_entry(xref, dict, "form XObject", "Matrix", false, Version::V10, Some(&|a: &[Object]| {
                a.len() == 6
            }))? {
                for el in &matrix {
                    xref.dereference_number(el, "form XObject", "Matrix")?;
                }
            }
            // Nested resource dicts occur; Type 3 fonts and forms both
            // carry them. Cycles are impossible through `/Resources`
            // alone because resolution stops at the dict, so one level
            // down is all the walk looks at.
            if let Some(oc) = dict.get("OC").cloned() {
                crate::validate::optional_content::validate_oc_object(xref, &oc, "form XObject")?;
            }
            Ok(())
        }
        "PS" => Ok(()),
        other => {
            let detail = format!("unknown XObject subtype /{other}");
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "Subtype", xref.cur_obj(), detail));
            }
            warn!("{detail}");
            Ok(())
        }
    }
}

/// Simple and composite font dicts (9.6, 9.7).
pub fn validate_font_dict(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "font dict";
    if let Some(t) = dict.dict_type() {
        if t != "Font" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Font"),
            ));
        }
    } else if xref.is_strict() {
        return Err(PdfError::MissingRequired {
            dict: DICT.to_string(),
            entry: "Type".to_string(),
            obj_nr: xref.cur_obj(),
        });
    }

    let Some(subtype) = name_entry(xref, dict, DICT, "Subtype", true, Version::V10, None)? else {
        return Ok(());
    };
    match subtype.as_str() {
        "Type1" | "MMType1" => validate_simple_font(xref, dict, true),
        "TrueType" => validate_simple_font(xref, dict, false),
        "Type3" => validate_type3_font(xref, dict),
        "Type0" => validate_type0_font(xref, dict),
        other => Err(PdfError::rejected(
            DICT,
            "Subtype",
            xref.cur_obj(),
            format!("unknown font type /{other}"),
        )),
    }
}

/// Type 1 and TrueType fonts. Only the fourteen standard Type 1 fonts
/// may rely on reader-builtin metrics.
fn validate_simple_font(xref: &mut XRefTable, dict: &Dict, may_be_standard: bool) -> Result<()> {
    const DICT: &str = "simple font";
    let base_font = name_entry(xref, dict, DICT, "BaseFont", true, Version::V10, None)?;
    let standard = may_be_standard
        && base_font.as_ref().is_some_and(|f| is_standard_font(f.as_str()));

    let metrics_required = !standard;
    let first = integer_entry(xref, dict, DICT, "FirstChar", metrics_required, Version::V10, Some(&|c: &i64| {
        (0..=255).contains(c)
    }))?;
    let last = integer_entry(xref, dict, DICT, "LastChar", metrics_required, Version::V10, Some(&|c: &i64| {
        (0..=255).contains(c)
    }))?;
    let widths = array_entry(xref, dict, DICT, "Widths", metrics_required, Version::V10, None)?;

    if let (Some(first), Some(last), Some(widths)) = (first, last, &widths) {
        let expected = (last - first + 1).max(0) as usize;
        if widths.len() != expected {
            let detail = format!(
                "/Widths has {} entries for char range {first}..={last}",
                widths.len()
            );
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "Widths", xref.cur_obj(), detail));
            }
            warn!("{detail}");
        }
    }
    if let Some(widths) = &widths {
        for el in widths {
            xref.dereference_number(el, DICT, "Widths")?;
        }
    }

    if let Some(fd) = dict_entry(xref, dict, DICT, "FontDescriptor", metrics_required, Version::V10, None)? {
        validate_font_descriptor(xref, &fd)?;
    }
    validate_encoding_entry(xref, dict, DICT)?;
    stream_entry(xref, dict, DICT, "ToUnicode", false, Version::V12)?;
    Ok(())
}

fn validate_type3_font(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Type 3 font";
    rect_entry(xref, dict, DICT, "FontBBox", true, Version::V10)?;
    if let Some(matrix) = array_entry(xref, dict, DICT, "FontMatrix", true, Version::V10, Some(&|a: &[Object]| {
        a.len() == 6
    }))? {
        for el in &matrix {
            xref.dereference_number(el, DICT, "FontMatrix")?;
        }
    }
    if let Some(procs) = dict_entry(xref, dict, DICT, "CharProcs", true, Version::V10, None)? {
        for (name, value) in procs.iter() {
            xref.dereference_stream(value, "CharProcs", name)?;
        }
    }
    validate_encoding_entry(xref, dict, DICT)?;
    integer_entry(xref, dict, DICT, "FirstChar", true, Version::V10, None)?;
    integer_entry(xref, dict, DICT, "LastChar", true, Version::V10, None)?;
    array_entry(xref, dict, DICT, "Widths", true, Version::V10, None)?;
    if let Some(resources) = dict_entry(xref, dict, DICT, "Resources", false, Version::V12, None)? {
        validate_resource_dict(xref, &resources)?;
    }
    Ok(())
}

fn validate_type0_font(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Type 0 font";
    name_entry(xref, dict, DICT, "BaseFont", true, Version::V12, None)?;

    match dict.get("Encoding").map(|e| xref.dereference(e)).transpose()? {
        Some(Object::Name(_)) | Some(Object::Stream(_)) => {}
        Some(Object::Null) | None => {
            return Err(PdfError::MissingRequired {
                dict: DICT.to_string(),
                entry: "Encoding".to_string(),
                obj_nr: xref.cur_obj(),
            });
        }
        Some(other) => {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "Encoding".to_string(),
                expected: "name or stream",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }

    let Some(descendants) = array_entry(xref, dict, DICT, "DescendantFonts", true, Version::V12, Some(&|a: &[Object]| {
        a.len() == 1
    }))? else {
        return Ok(());
    };
    let cid_font = xref.dereference_dict(&descendants[0], DICT, "DescendantFonts")?;
    validate_cid_font(xref, &cid_font)?;

    stream_entry(xref, dict, DICT, "ToUnicode", false, Version::V12)?;
    Ok(())
}

/// CIDFont dict (9.7.4).
fn validate_cid_font(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "CIDFont";
    let subtype = name_entry(xref, dict, DICT, "Subtype", true, Version::V12, Some(&|s: &str| {
        matches!(s, "CIDFontType0" | "CIDFontType2")
    }))?;
    name_entry(xref, dict, DICT, "BaseFont", true, Version::V12, None)?;

    if let Some(info) = dict_entry(xref, dict, DICT, "CIDSystemInfo", true, Version::V12, None)? {
        const INFO: &str = "CIDSystemInfo";
        string_entry(xref, &info, INFO, "Registry", true, Version::V12, None)?;
        string_entry(xref, &info, INFO, "Ordering", true, Version::V12, None)?;
        integer_entry(xref, &info, INFO, "Supplement", true, Version::V12, Some(&|s: &i64| {
            *s >= 0
        }))?;
    }

    if let Some(fd) = dict_entry(xref, dict, DICT, "FontDescriptor", true, Version::V12, None)? {
        validate_font_descriptor(xref, &fd)?;
    }
    number_entry(xref, dict, DICT, "DW", false, Version::V12, None)?;
    array_entry(xref, dict, DICT, "W", false, Version::V12, None)?;

    if subtype.is_some_and(|s| s == "CIDFontType2") {
        match dict.get("CIDToGIDMap").map(|e| xref.dereference(e)).transpose()? {
            None | Some(Object::Null) | Some(Object::Stream(_)) => {}
            Some(Object::Name(n)) if n == "Identity" => {}
            Some(Object::Name(n)) => {
                return Err(PdfError::rejected(
                    DICT,
                    "CIDToGIDMap",
                    xref.cur_obj(),
                    format!("/{n} is not /Identity"),
                ));
            }
            Some(other) => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "CIDToGIDMap".to_string(),
                    expected: "name or stream",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}

/// `/Encoding`: a base encoding name or a differences dict (9.6.6).
/// Relaxed mode also tolerates `StandardEncoding`, which producers emit
/// even though Table 114 omits it.
fn validate_encoding_entry(xref: &XRefTable, dict: &Dict, dict_name: &str) -> Result<()> {
    let Some(encoding) = dict.get("Encoding") else {
        return Ok(());
    };
    const BASE_ENCODINGS: [&str; 3] = ["MacRomanEncoding", "MacExpertEncoding", "WinAnsiEncoding"];
    let accepts = |s: &str| {
        BASE_ENCODINGS.contains(&s) || (!xref.is_strict() && s == "StandardEncoding")
    };
    match xref.dereference(encoding)? {
        Object::Null => Ok(()),
        Object::Name(n) => {
            if accepts(n.as_str()) {
                Ok(())
            } else {
                Err(PdfError::rejected(
                    dict_name,
                    "Encoding",
                    xref.cur_obj(),
                    format!("/{n} is not a base encoding"),
                ))
            }
        }
        Object::Dict(enc) => {
            const ENC: &str = "encoding dict";
            if let Some(t) = enc.dict_type() {
                if t != "Encoding" {
                    return Err(PdfError::rejected(
                        ENC,
                        "Type",
                        xref.cur_obj(),
                        format!("/{t} is not /Encoding"),
                    ));
                }
            }
            name_entry(xref, &enc, ENC, "BaseEncoding", false, Version::V10, Some(&accepts))?;
            if let Some(diff) = array_entry(xref, &enc, ENC, "Differences", false, Version::V10, None)? {
                validate_differences(xref, &diff)?;
            }
            Ok(())
        }
        other => Err(PdfError::TypeMismatch {
            dict: dict_name.to_string(),
            entry: "Encoding".to_string(),
            expected: "name or dict",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

/// `/Differences`: runs of a code followed by glyph names. The first
/// element must be a code.
fn validate_differences(xref: &XRefTable, diff: &[Object]) -> Result<()> {
    let mut seen_code = false;
    for el in diff {
        match xref.dereference(el)? {
            Object::Integer(code) => {
                if !(0..=255).contains(&code) {
                    return Err(PdfError::rejected(
                        "encoding dict",
                        "Differences",
                        xref.cur_obj(),
                        format!("char code {code} out of byte range"),
                    ));
                }
                seen_code = true;
            }
            Object::Name(_) if seen_code => {}
            Object::Name(_) => {
                return Err(PdfError::rejected(
                    "encoding dict",
                    "Differences",
                    xref.cur_obj(),
                    "glyph name precedes the first char code".to_string(),
                ));
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: "encoding dict".to_string(),
                    entry: "Differences".to_string(),
                    expected: "integer or name",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}

/// Font descriptor (9.8).
pub fn validate_font_descriptor(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "font descriptor";
    if let Some(t) = dict.dict_type() {
        if t != "FontDescriptor" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /FontDescriptor"),
            ));
        }
    } else if xref.is_strict() {
        return Err(PdfError::MissingRequired {
            dict: DICT.to_string(),
            entry: "Type".to_string(),
            obj_nr: xref.cur_obj(),
        });
    }

    name_entry(xref, dict, DICT, "FontName", true, Version::V10, None)?;
    let flags = integer_entry(xref, dict, DICT, "Flags", true, Version::V10, Some(&|f: &i64| {
        (0..=u32::MAX as i64).contains(f)
    }))?;
    if let Some(raw) = flags {
        // Table 123: exactly one of symbolic and nonsymbolic must be set.
        let flags = FontFlags::from_bits_truncate(raw as u32);
        if flags.contains(FontFlags::SYMBOLIC) == flags.contains(FontFlags::NONSYMBOLIC) {
            let detail = format!("/Flags {raw:#x} sets symbolic and nonsymbolic alike");
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "Flags", xref.cur_obj(), detail));
            }
            warn!("{detail}");
        }
    }
    number_entry(xref, dict, DICT, "ItalicAngle", true, Version::V10, None)?;
    rect_entry(xref, dict, DICT, "FontBBox", xref.is_strict(), Version::V10)?;
    number_entry(xref, dict, DICT, "Ascent", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "Descent", false, Version::V10, Some(&|d: &f64| *d <= 0.0))?;
    number_entry(xref, dict, DICT, "CapHeight", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "StemV", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "StemH", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "Leading", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "XHeight", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "AvgWidth", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "MaxWidth", false, Version::V10, None)?;
    number_entry(xref, dict, DICT, "MissingWidth", false, Version::V10, None)?;
    string_entry(xref, dict, DICT, "CharSet", false, Version::V11, None)?;

    let mut files = 0;
    for key in ["FontFile", "FontFile2", "FontFile3"] {
        let since = if key == "FontFile3" { Version::V12 } else { Version::V10 };
        if stream_entry(xref, dict, DICT, key, false, since)?.is_some() {
            files += 1;
        }
    }
    if files > 1 {
        let detail = "font descriptor embeds more than one font program".to_string();
        if xref.is_strict() {
            return Err(PdfError::corrupt(xref.cur_obj(), detail));
        }
        warn!("{detail}");
    }
    Ok(())
}
