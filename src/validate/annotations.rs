//! Annotation validation (ISO 32000-1, 12.5).
//!
//! Every subtype shares the common entries of table 164; markup subtypes
//! add table 170; the rest is dispatched per subtype. Validated
//! annotations are recorded on the table so callers can enumerate them
//! per page after validation.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::actions::{
    validate_action, validate_additional_actions, AdditionalActionsKind,
};
use crate::validate::destinations::validate_destination_entry;
use crate::validate::entries::{
    any_entry, array_entry, boolean_entry, dict_entry, integer_entry, lenient_date_entry,
    name_entry, number_entry, rect_entry, stream_entry, string_entry,
};
use crate::validate::filespec::validate_file_spec_entry;
use crate::validate::optional_content::validate_oc_object;
use crate::version::Version;
use crate::xref::{AnnotationRecord, XRefTable};

type AnnotHandler = fn(&mut XRefTable, &Dict) -> Result<()>;

lazy_static! {
    /// Annotation subtype, the version that introduced it, and its handler.
    static ref ANNOT_TABLE: HashMap<&'static str, (Version, AnnotHandler)> = {
        let mut t: HashMap<&'static str, (Version, AnnotHandler)> = HashMap::new();
        t.insert("Text", (Version::V10, annot_text));
        t.insert("Link", (Version::V10, annot_link));
        t.insert("FreeText", (Version::V13, annot_free_text));
        t.insert("Line", (Version::V13, annot_line));
        t.insert("Square", (Version::V13, annot_square_circle));
        t.insert("Circle", (Version::V13, annot_square_circle));
        t.insert("Polygon", (Version::V15, annot_polygon));
        t.insert("PolyLine", (Version::V15, annot_poly_line));
        t.insert("Highlight", (Version::V13, annot_text_markup));
        t.insert("Underline", (Version::V13, annot_text_markup));
        t.insert("Squiggly", (Version::V14, annot_text_markup));
        t.insert("StrikeOut", (Version::V13, annot_text_markup));
        t.insert("Stamp", (Version::V13, annot_stamp));
        t.insert("Caret", (Version::V15, annot_caret));
        t.insert("Ink", (Version::V13, annot_ink));
        t.insert("Popup", (Version::V13, annot_popup));
        t.insert("FileAttachment", (Version::V13, annot_file_attachment));
        t.insert("Sound", (Version::V12, annot_sound));
        t.insert("Movie", (Version::V12, annot_movie));
        t.insert("Widget", (Version::V12, annot_widget));
        t.insert("Screen", (Version::V15, annot_screen));
        t.insert("PrinterMark", (Version::V14, annot_printer_mark));
        t.insert("TrapNet", (Version::V13, annot_trap_net));
        t.insert("Watermark", (Version::V16, annot_watermark));
        t.insert("3D", (Version::V16, annot_3d));
        t.insert("Redact", (Version::V17, annot_redact));
        t.insert("RichMedia", (Version::V17, annot_rich_media));
        t
    };

    /// Subtypes that carry the markup entries of table 170.
    static ref MARKUP: HashSet<&'static str> = [
        "Text", "FreeText", "Line", "Square", "Circle", "Polygon", "PolyLine",
        "Highlight", "Underline", "Squiggly", "StrikeOut", "Stamp", "Caret",
        "Ink", "FileAttachment", "Sound", "Redact",
    ]
    .into_iter()
    .collect();
}

const LINE_ENDINGS: [&str; 10] = [
    "Square", "Circle", "Diamond", "OpenArrow", "ClosedArrow", "None", "Butt", "ROpenArrow",
    "RClosedArrow", "Slash",
];

fn is_line_ending(s: &str) -> bool {
    LINE_ENDINGS.contains(&s)
}

/// Validates one element of a page's `/Annots` array and records it.
/// Returns false when relaxed mode drops the annotation because its
/// reference dangles.
pub fn validate_annotation(xref: &mut XRefTable, obj: &Object) -> Result<bool> {
    let obj_nr = match obj {
        Object::Reference(r) => {
            xref.set_cur_obj(r.obj_nr());
            Some(r.obj_nr())
        }
        _ => None,
    };

    let resolved = xref.dereference(obj)?;
    let dict = match resolved {
        Object::Dict(d) => d,
        Object::Null => {
            if xref.is_strict() {
                return Err(PdfError::TypeMismatch {
                    dict: "Annots".to_string(),
                    entry: "element".to_string(),
                    expected: "dict",
                    found: "null",
                    obj_nr: xref.cur_obj(),
                });
            }
            xref.note_repair(format!("dropped dangling annotation obj#{}", xref.cur_obj()));
            return Ok(false);
        }
        other => {
            return Err(PdfError::TypeMismatch {
                dict: "Annots".to_string(),
                entry: "element".to_string(),
                expected: "dict",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    };

    const DICT: &str = "annotation";
    if let Some(t) = dict.dict_type() {
        if t != "Annot" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Annot"),
            ));
        }
    }

    let Some(subtype) = name_entry(xref, &dict, DICT, "Subtype", true, Version::V10, None)? else {
        // Unreachable: the entry is required.
        return Ok(true);
    };

    let known = ANNOT_TABLE.get(subtype.as_str()).copied();
    if known.is_none() {
        if xref.is_strict() {
            return Err(PdfError::rejected(
                DICT,
                "Subtype",
                xref.cur_obj(),
                format!("unknown annotation type /{subtype}"),
            ));
        }
        warn!(subtype = subtype.as_str(), "unknown annotation type, checking common entries only");
    }

    if let Some((since, _)) = known {
        xref.validate_version(&format!("{subtype} annotation"), since)?;
    }

    let (rect, id) = validate_common(xref, &dict, obj_nr)?;

    if MARKUP.contains(subtype.as_str()) {
        validate_markup(xref, &dict)?;
    }
    if let Some((_, handler)) = known {
        handler(xref, &dict)?;
    }

    let page_nr = xref.cur_page();
    xref.record_annotation(
        page_nr,
        AnnotationRecord {
            subtype: subtype.as_str().to_string(),
            rect,
            id,
            obj_nr,
        },
    );
    Ok(true)
}

/// Common entries shared by all subtypes (table 164).
fn validate_common(
    xref: &mut XRefTable,
    dict: &Dict,
    obj_nr: Option<u32>,
) -> Result<(Option<[f64; 4]>, Option<String>)> {
    const DICT: &str = "annotation";

    let rect = rect_entry(xref, dict, DICT, "Rect", true, Version::V10)?;
    string_entry(xref, dict, DICT, "Contents", false, Version::V10, None)?;

    // Page backlink. The page walk already knows which page this
    // annotation belongs to, so a dangling target is stripped, not fatal.
    if let Some(p) = dict.get("P") {
        match xref.dereference(p)? {
            Object::Dict(_) => {}
            Object::Null => {
                match obj_nr {
                    Some(nr) => {
                        xref.remove_dict_entry(nr, "P")?;
                        xref.note_repair(format!("stripped dangling /P from annotation obj#{nr}"));
                    }
                    None => warn!("inline annotation carries a dangling /P"),
                }
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "P".to_string(),
                    expected: "dict",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }

    let id = string_entry(xref, dict, DICT, "NM", false, Version::V14, None)?;
    lenient_date_entry(xref, dict, DICT, "M", false, Version::V11)?;
    integer_entry(xref, dict, DICT, "F", false, Version::V11, Some(&|f: &i64| *f >= 0))?;

    let needs_as = validate_appearance_dict(xref, dict)?;
    let r#as = name_entry(xref, dict, DICT, "AS", needs_as && xref.is_strict(), Version::V12, None)?;
    if needs_as && r#as.is_none() && !xref.is_strict() {
        warn!("annotation has appearance state subdicts but no /AS");
    }

    if let Some(border) = array_entry(xref, dict, DICT, "Border", false, Version::V10, Some(&|a: &[Object]| {
        matches!(a.len(), 0 | 3 | 4)
    }))? {
        for el in border.iter().take(3) {
            xref.dereference_number(el, DICT, "Border")?;
        }
        if let Some(dash) = border.get(3) {
            let dash = xref.dereference_array(dash, DICT, "Border")?;
            if dash.len() > 3 {
                return Err(PdfError::rejected(
                    DICT,
                    "Border",
                    xref.cur_obj(),
                    format!("dash pattern has {} elements", dash.len()),
                ));
            }
            let mut all_zero = true;
            for el in &dash {
                let v = xref.dereference_number(el, DICT, "Border")?;
                if v < 0.0 {
                    return Err(PdfError::rejected(
                        DICT,
                        "Border",
                        xref.cur_obj(),
                        "dash lengths must not be negative".to_string(),
                    ));
                }
                if v != 0.0 {
                    all_zero = false;
                }
            }
            if !dash.is_empty() && all_zero {
                return Err(PdfError::rejected(
                    DICT,
                    "Border",
                    xref.cur_obj(),
                    "dash pattern is all zeros".to_string(),
                ));
            }
        }
    }

    color_entry(xref, dict, DICT, "C", Version::V11)?;
    integer_entry(xref, dict, DICT, "StructParent", false, Version::V13, None)?;

    if let Some(oc) = any_entry(xref, dict, DICT, "OC", false, Version::V15)? {
        validate_oc_object(xref, &oc, DICT)?;
    }

    Ok((rect, id))
}

/// `/AP`. Returns true when any appearance carries state subdictionaries,
/// which makes `/AS` mandatory.
fn validate_appearance_dict(xref: &mut XRefTable, dict: &Dict) -> Result<bool> {
    const DICT: &str = "appearance dict";
    let Some(ap) = dict_entry(xref, dict, "annotation", "AP", false, Version::V12, None)? else {
        return Ok(false);
    };

    let mut needs_as = false;
    for (key, required) in [("N", true), ("R", false), ("D", false)] {
        let Some(value) = any_entry(xref, &ap, DICT, key, required, Version::V12)? else {
            continue;
        };
        match value {
            Object::Stream(_) => {}
            Object::Dict(states) => {
                needs_as = true;
                for (state, v) in states.iter() {
                    xref.dereference_stream(v, DICT, state)?;
                }
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: key.to_string(),
                    expected: "stream or dict of streams",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(needs_as)
}

/// Markup entries (table 170).
fn validate_markup(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "markup annotation";

    string_entry(xref, dict, DICT, "T", false, Version::V11, None)?;

    if let Some(popup) = any_entry(xref, dict, DICT, "Popup", false, Version::V13)? {
        let popup = xref.dereference_dict(&popup, DICT, "Popup")?;
        if let Some(st) = popup.name("Subtype") {
            if st != "Popup" {
                let detail = format!("/Popup points at a /{st} annotation");
                if xref.is_strict() {
                    return Err(PdfError::rejected(DICT, "Popup", xref.cur_obj(), detail));
                }
                warn!("{detail}");
            }
        }
    }

    number_entry(xref, dict, DICT, "CA", false, Version::V14, Some(&|ca: &f64| {
        (0.0..=1.0).contains(ca)
    }))?;

    if let Some(rc) = any_entry(xref, dict, DICT, "RC", false, Version::V15)? {
        match rc {
            Object::StringLiteral(_) | Object::HexLiteral(_) | Object::Stream(_) => {}
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "RC".to_string(),
                    expected: "string or stream",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }

    lenient_date_entry(xref, dict, DICT, "CreationDate", false, Version::V15)?;

    let rt = name_entry(xref, dict, DICT, "RT", false, Version::V16, Some(&|s: &str| {
        matches!(s, "R" | "Group")
    }))?;
    let irt = any_entry(xref, dict, DICT, "IRT", rt.is_some() && xref.is_strict(), Version::V15)?;
    match irt {
        Some(irt) => {
            xref.dereference_dict(&irt, DICT, "IRT")?;
        }
        None if rt.is_some() => warn!("markup annotation has /RT but no /IRT"),
        None => {}
    }

    string_entry(xref, dict, DICT, "Subj", false, Version::V15, None)?;
    name_entry(xref, dict, DICT, "IT", false, Version::V16, None)?;

    if let Some(ex) = dict_entry(xref, dict, DICT, "ExData", false, Version::V17, None)? {
        if let Some(t) = ex.dict_type() {
            if t != "ExData" {
                return Err(PdfError::rejected(
                    DICT,
                    "ExData",
                    xref.cur_obj(),
                    format!("/{t} is not /ExData"),
                ));
            }
        }
        name_entry(xref, &ex, "external data dict", "Subtype", true, Version::V17, None)?;
    }
    Ok(())
}

// --- per-subtype handlers ---

fn annot_text(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "text annotation";
    boolean_entry(xref, dict, DICT, "Open", false, Version::V10)?;
    name_entry(xref, dict, DICT, "Name", false, Version::V10, None)?;

    let model = name_entry(xref, dict, DICT, "StateModel", false, Version::V15, Some(&|s: &str| {
        matches!(s, "Marked" | "Review")
    }))?;
    let state = string_entry(xref, dict, DICT, "State", false, Version::V15, None)?;
    if let Some(state) = state {
        let Some(model) = model else {
            return Err(PdfError::MissingRequired {
                dict: DICT.to_string(),
                entry: "StateModel".to_string(),
                obj_nr: xref.cur_obj(),
            });
        };
        let ok = match model.as_str() {
            "Marked" => matches!(state.as_str(), "Marked" | "Unmarked"),
            _ => matches!(
                state.as_str(),
                "Accepted" | "Rejected" | "Cancelled" | "Completed" | "None"
            ),
        };
        if !ok {
            return Err(PdfError::rejected(
                DICT,
                "State",
                xref.cur_obj(),
                format!("\"{state}\" does not belong to the {model} model"),
            ));
        }
    }
    Ok(())
}

fn annot_link(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "link annotation";

    let has_a = dict.contains_key("A");
    if has_a && dict.contains_key("Dest") {
        let detail = "link annotation has both /A and /Dest".to_string();
        if xref.is_strict() {
            return Err(PdfError::corrupt(xref.cur_obj(), detail));
        }
        warn!("{detail}, ignoring /Dest");
    }

    if let Some(a) = dict.get("A").cloned() {
        validate_action(xref, &a, DICT)?;
    } else {
        validate_destination_entry(xref, dict, DICT, "Dest", false, Version::V10)?;
    }

    name_entry(xref, dict, DICT, "H", false, Version::V12, Some(&|s: &str| {
        matches!(s, "N" | "I" | "O" | "P")
    }))?;

    if let Some(pa) = any_entry(xref, dict, DICT, "PA", false, Version::V13)? {
        validate_action(xref, &pa, DICT)?;
        let pd = xref.dereference_dict(&pa, DICT, "PA")?;
        if pd.name("S").map_or(true, |s| s != "URI") {
            return Err(PdfError::rejected(
                DICT,
                "PA",
                xref.cur_obj(),
                "only URI actions may be used here".to_string(),
            ));
        }
    }

    quad_points_entry(xref, dict, DICT, "QuadPoints", false, Version::V16)?;
    validate_border_style(xref, dict, DICT)?;
    Ok(())
}

fn annot_free_text(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "free text annotation";
    string_entry(xref, dict, DICT, "DA", true, Version::V13, None)?;
    integer_entry(xref, dict, DICT, "Q", false, Version::V14, Some(&|q: &i64| {
        (0..=2).contains(q)
    }))?;
    string_entry(xref, dict, DICT, "DS", false, Version::V15, None)?;
    if let Some(cl) = array_entry(xref, dict, DICT, "CL", false, Version::V16, Some(&|a: &[Object]| {
        matches!(a.len(), 4 | 6)
    }))? {
        for el in &cl {
            xref.dereference_number(el, DICT, "CL")?;
        }
    }
    validate_border_effect(xref, dict, DICT)?;
    rect_entry(xref, dict, DICT, "RD", false, Version::V16)?;
    validate_border_style(xref, dict, DICT)?;
    name_entry(xref, dict, DICT, "LE", false, Version::V16, Some(&is_line_ending))?;
    Ok(())
}

fn annot_line(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "line annotation";
    if let Some(l) = array_entry(xref, dict, DICT, "L", true, Version::V13, Some(&|a: &[Object]| {
        a.len() == 4
    }))? {
        for el in &l {
            xref.dereference_number(el, DICT, "L")?;
        }
    }
    validate_border_style(xref, dict, DICT)?;
    line_endings_entry(xref, dict, DICT, Version::V14)?;
    color_entry(xref, dict, DICT, "IC", Version::V14)?;
    number_entry(xref, dict, DICT, "LL", false, Version::V16, None)?;
    number_entry(xref, dict, DICT, "LLE", false, Version::V16, Some(&|v: &f64| *v >= 0.0))?;
    boolean_entry(xref, dict, DICT, "Cap", false, Version::V16)?;
    number_entry(xref, dict, DICT, "LLO", false, Version::V17, Some(&|v: &f64| *v >= 0.0))?;
    name_entry(xref, dict, DICT, "CP", false, Version::V17, Some(&|s: &str| {
        matches!(s, "Inline" | "Top")
    }))?;
    dict_entry(xref, dict, DICT, "Measure", false, Version::V17, None)?;
    if let Some(co) = array_entry(xref, dict, DICT, "CO", false, Version::V17, Some(&|a: &[Object]| {
        a.len() == 2
    }))? {
        for el in &co {
            xref.dereference_number(el, DICT, "CO")?;
        }
    }
    Ok(())
}

fn annot_square_circle(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "square/circle annotation";
    validate_border_style(xref, dict, DICT)?;
    color_entry(xref, dict, DICT, "IC", Version::V14)?;
    validate_border_effect(xref, dict, DICT)?;
    rect_entry(xref, dict, DICT, "RD", false, Version::V15)?;
    Ok(())
}

fn annot_polygon(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "polygon annotation";
    vertices_entry(xref, dict, DICT)?;
    validate_border_style(xref, dict, DICT)?;
    color_entry(xref, dict, DICT, "IC", Version::V15)?;
    validate_border_effect(xref, dict, DICT)?;
    dict_entry(xref, dict, DICT, "Measure", false, Version::V17, None)?;
    Ok(())
}

fn annot_poly_line(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "polyline annotation";
    vertices_entry(xref, dict, DICT)?;
    validate_border_style(xref, dict, DICT)?;
    line_endings_entry(xref, dict, DICT, Version::V15)?;
    color_entry(xref, dict, DICT, "IC", Version::V15)?;
    Ok(())
}

fn annot_text_markup(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    quad_points_entry(xref, dict, "text markup annotation", "QuadPoints", true, Version::V13)?;
    Ok(())
}

fn annot_stamp(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    name_entry(xref, dict, "stamp annotation", "Name", false, Version::V13, None)?;
    Ok(())
}

fn annot_caret(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "caret annotation";
    rect_entry(xref, dict, DICT, "RD", false, Version::V15)?;
    name_entry(xref, dict, DICT, "Sy", false, Version::V15, Some(&|s: &str| {
        matches!(s, "P" | "None")
    }))?;
    Ok(())
}

fn annot_ink(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "ink annotation";
    let Some(list) = array_entry(xref, dict, DICT, "InkList", true, Version::V13, None)? else {
        return Ok(());
    };
    for stroke in &list {
        let stroke = xref.dereference_array(stroke, DICT, "InkList")?;
        if stroke.len() % 2 != 0 {
            return Err(PdfError::rejected(
                DICT,
                "InkList",
                xref.cur_obj(),
                format!("stroke has odd coordinate count {}", stroke.len()),
            ));
        }
        for el in &stroke {
            xref.dereference_number(el, DICT, "InkList")?;
        }
    }
    validate_border_style(xref, dict, DICT)?;
    Ok(())
}

fn annot_popup(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "popup annotation";
    if let Some(parent) = dict.get("Parent") {
        match xref.dereference(parent)? {
            Object::Null | Object::Dict(_) => {}
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "Parent".to_string(),
                    expected: "dict",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    boolean_entry(xref, dict, DICT, "Open", false, Version::V13)?;
    Ok(())
}

fn annot_file_attachment(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "file attachment annotation";
    validate_file_spec_entry(xref, dict, DICT, "FS", true, Version::V13)?;
    name_entry(xref, dict, DICT, "Name", false, Version::V13, None)?;
    Ok(())
}

fn annot_sound(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "sound annotation";
    if let Some(sound) = stream_entry(xref, dict, DICT, "Sound", true, Version::V12)? {
        validate_sound_object(xref, &sound.dict)?;
    }
    name_entry(xref, dict, DICT, "Name", false, Version::V12, None)?;
    Ok(())
}

/// Sound object stream dict (ISO 32000-1, 13.3).
fn validate_sound_object(xref: &XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "sound object";
    if let Some(t) = dict.dict_type() {
        if t != "Sound" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Sound"),
            ));
        }
    }
    number_entry(xref, dict, DICT, "R", true, Version::V12, Some(&|r: &f64| *r > 0.0))?;
    integer_entry(xref, dict, DICT, "C", false, Version::V12, Some(&|c: &i64| *c >= 1))?;
    integer_entry(xref, dict, DICT, "B", false, Version::V12, Some(&|b: &i64| *b >= 1))?;
    name_entry(xref, dict, DICT, "E", false, Version::V12, Some(&|s: &str| {
        matches!(s, "Raw" | "Signed" | "muLaw" | "ALaw")
    }))?;
    Ok(())
}

fn annot_movie(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "movie annotation";
    string_entry(xref, dict, DICT, "T", false, Version::V12, None)?;
    if let Some(movie) = dict_entry(xref, dict, DICT, "Movie", true, Version::V12, None)? {
        validate_movie_dict(xref, &movie)?;
    }
    if let Some(a) = any_entry(xref, dict, DICT, "A", false, Version::V12)? {
        match a {
            Object::Boolean(_) | Object::Dict(_) => {}
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "A".to_string(),
                    expected: "boolean or dict",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}

/// Movie dict (ISO 32000-1, 13.4).
fn validate_movie_dict(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "movie dict";
    validate_file_spec_entry(xref, dict, DICT, "F", true, Version::V12)?;
    if let Some(aspect) = array_entry(xref, dict, DICT, "Aspect", false, Version::V12, Some(&|a: &[Object]| {
        a.len() == 2
    }))? {
        for el in &aspect {
            xref.dereference_integer(el, DICT, "Aspect")?;
        }
    }
    integer_entry(xref, dict, DICT, "Rotate", false, Version::V12, Some(&|r: &i64| {
        r % 90 == 0
    }))?;
    if let Some(poster) = any_entry(xref, dict, DICT, "Poster", false, Version::V12)? {
        match poster {
            Object::Boolean(_) | Object::Stream(_) => {}
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "Poster".to_string(),
                    expected: "boolean or stream",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}

fn annot_widget(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "widget annotation";
    name_entry(xref, dict, DICT, "H", false, Version::V12, Some(&|s: &str| {
        matches!(s, "N" | "I" | "O" | "P" | "T")
    }))?;
    validate_appearance_characteristics(xref, dict, DICT)?;
    if let Some(a) = dict.get("A").cloned() {
        validate_action(xref, &a, DICT)?;
    }
    validate_additional_actions(xref, dict, DICT, false, Version::V12, AdditionalActionsKind::Field)?;
    validate_border_style(xref, dict, DICT)?;
    Ok(())
}

fn annot_screen(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "screen annotation";
    string_entry(xref, dict, DICT, "T", false, Version::V15, None)?;
    validate_appearance_characteristics(xref, dict, DICT)?;
    if let Some(a) = dict.get("A").cloned() {
        validate_action(xref, &a, DICT)?;
    }
    validate_additional_actions(xref, dict, DICT, false, Version::V15, AdditionalActionsKind::Field)?;
    Ok(())
}

fn annot_printer_mark(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    name_entry(xref, dict, "printer mark annotation", "MN", false, Version::V14, None)?;
    Ok(())
}

fn annot_trap_net(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "trap network annotation";

    let has_last_modified = dict.contains_key("LastModified");
    let has_version = dict.contains_key("Version") && dict.contains_key("AnnotStates");
    if has_last_modified == has_version {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            "trap network needs either /LastModified or /Version with /AnnotStates",
        ));
    }

    lenient_date_entry(xref, dict, DICT, "LastModified", false, Version::V13)?;
    array_entry(xref, dict, DICT, "Version", false, Version::V13, None)?;
    if let Some(states) = array_entry(xref, dict, DICT, "AnnotStates", false, Version::V13, None)? {
        for el in &states {
            let resolved = xref.dereference(el)?;
            if !matches!(resolved, Object::Name(_) | Object::Null) {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "AnnotStates".to_string(),
                    expected: "name or null",
                    found: resolved.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    if let Some(fonts) = array_entry(xref, dict, DICT, "FontFauxing", false, Version::V13, None)? {
        for el in &fonts {
            xref.dereference_dict(el, DICT, "FontFauxing")?;
        }
    }
    Ok(())
}

fn annot_watermark(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "watermark annotation";
    let Some(fp) = dict_entry(xref, dict, DICT, "FixedPrint", false, Version::V16, None)? else {
        return Ok(());
    };
    const FP: &str = "fixed print dict";
    if let Some(t) = fp.dict_type() {
        if t != "FixedPrint" {
            return Err(PdfError::rejected(
                FP,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /FixedPrint"),
            ));
        }
    }
    if let Some(matrix) = array_entry(xref, &fp, FP, "Matrix", false, Version::V16, Some(&|a: &[Object]| {
        a.len() == 6
    }))? {
        for el in &matrix {
            xref.dereference_number(el, FP, "Matrix")?;
        }
    }
    number_entry(xref, &fp, FP, "H", false, Version::V16, None)?;
    number_entry(xref, &fp, FP, "V", false, Version::V16, None)?;
    Ok(())
}

fn annot_3d(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "3D annotation";
    let Some(artwork) = any_entry(xref, dict, DICT, "3DD", true, Version::V16)? else {
        return Ok(());
    };
    match artwork {
        Object::Stream(_) | Object::Dict(_) => {}
        other => {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "3DD".to_string(),
                expected: "stream or dict",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }
    any_entry(xref, dict, DICT, "3DV", false, Version::V16)?;
    dict_entry(xref, dict, DICT, "3DA", false, Version::V16, None)?;
    boolean_entry(xref, dict, DICT, "3DI", false, Version::V16)?;
    rect_entry(xref, dict, DICT, "3DB", false, Version::V16)?;
    Ok(())
}

fn annot_redact(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "redaction annotation";
    quad_points_entry(xref, dict, DICT, "QuadPoints", false, Version::V17)?;
    color_entry(xref, dict, DICT, "IC", Version::V17)?;
    stream_entry(xref, dict, DICT, "RO", false, Version::V17)?;
    let overlay = string_entry(xref, dict, DICT, "OverlayText", false, Version::V17, None)?;
    boolean_entry(xref, dict, DICT, "Repeat", false, Version::V17)?;
    string_entry(xref, dict, DICT, "DA", overlay.is_some(), Version::V17, None)?;
    integer_entry(xref, dict, DICT, "Q", false, Version::V17, Some(&|q: &i64| {
        (0..=2).contains(q)
    }))?;
    Ok(())
}

fn annot_rich_media(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "rich media annotation";
    let content = dict_entry(xref, dict, DICT, "RichMediaContent", true, Version::V17, None)?;
    if let Some(content) = content {
        const CONTENT: &str = "rich media content dict";
        if let Some(t) = content.dict_type() {
            if t != "RichMediaContent" {
                return Err(PdfError::rejected(
                    CONTENT,
                    "Type",
                    xref.cur_obj(),
                    format!("/{t} is not /RichMediaContent"),
                ));
            }
        }
        dict_entry(xref, &content, CONTENT, "Assets", false, Version::V17, None)?;
        if let Some(configs) =
            array_entry(xref, &content, CONTENT, "Configurations", false, Version::V17, None)?
        {
            for el in &configs {
                xref.dereference_dict(el, CONTENT, "Configurations")?;
            }
        }
    }
    dict_entry(xref, dict, DICT, "RichMediaSettings", false, Version::V17, None)?;
    Ok(())
}

// --- shared sub-dict validators ---

/// `/BS` border style dict (table 166).
fn validate_border_style(xref: &XRefTable, dict: &Dict, dict_name: &str) -> Result<()> {
    let Some(bs) = dict_entry(xref, dict, dict_name, "BS", false, Version::V12, None)? else {
        return Ok(());
    };
    const BS: &str = "border style dict";
    if let Some(t) = bs.dict_type() {
        if t != "Border" {
            return Err(PdfError::rejected(
                BS,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Border"),
            ));
        }
    }
    number_entry(xref, &bs, BS, "W", false, Version::V12, Some(&|w: &f64| *w >= 0.0))?;
    name_entry(xref, &bs, BS, "S", false, Version::V12, Some(&|s: &str| {
        matches!(s, "S" | "D" | "B" | "I" | "U")
    }))?;
    if let Some(dash) = array_entry(xref, &bs, BS, "D", false, Version::V13, None)? {
        for el in &dash {
            let v = xref.dereference_number(el, BS, "D")?;
            if v < 0.0 {
                return Err(PdfError::rejected(
                    BS,
                    "D",
                    xref.cur_obj(),
                    "dash lengths must not be negative".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// `/BE` border effect dict (table 167).
fn validate_border_effect(xref: &XRefTable, dict: &Dict, dict_name: &str) -> Result<()> {
    let Some(be) = dict_entry(xref, dict, dict_name, "BE", false, Version::V15, None)? else {
        return Ok(());
    };
    const BE: &str = "border effect dict";
    name_entry(xref, &be, BE, "S", false, Version::V15, Some(&|s: &str| {
        matches!(s, "S" | "C")
    }))?;
    number_entry(xref, &be, BE, "I", false, Version::V15, Some(&|i: &f64| {
        (0.0..=2.0).contains(i)
    }))?;
    Ok(())
}

/// `/MK` appearance characteristics dict (table 189).
fn validate_appearance_characteristics(
    xref: &mut XRefTable,
    dict: &Dict,
    dict_name: &str,
) -> Result<()> {
    let Some(mk) = dict_entry(xref, dict, dict_name, "MK", false, Version::V12, None)? else {
        return Ok(());
    };
    const MK: &str = "appearance characteristics dict";
    integer_entry(xref, &mk, MK, "R", false, Version::V12, Some(&|r: &i64| r % 90 == 0))?;
    color_entry(xref, &mk, MK, "BC", Version::V12)?;
    color_entry(xref, &mk, MK, "BG", Version::V12)?;
    string_entry(xref, &mk, MK, "CA", false, Version::V12, None)?;
    string_entry(xref, &mk, MK, "RC", false, Version::V12, None)?;
    string_entry(xref, &mk, MK, "AC", false, Version::V12, None)?;
    stream_entry(xref, &mk, MK, "I", false, Version::V12)?;
    stream_entry(xref, &mk, MK, "RI", false, Version::V12)?;
    stream_entry(xref, &mk, MK, "IX", false, Version::V12)?;
    if let Some(icon_fit) = dict_entry(xref, &mk, MK, "IF", false, Version::V12, None)? {
        const IF: &str = "icon fit dict";
        name_entry(xref, &icon_fit, IF, "SW", false, Version::V12, Some(&|s: &str| {
            matches!(s, "A" | "B" | "S" | "N")
        }))?;
        name_entry(xref, &icon_fit, IF, "S", false, Version::V12, Some(&|s: &str| {
            matches!(s, "A" | "P")
        }))?;
        if let Some(a) = array_entry(xref, &icon_fit, IF, "A", false, Version::V12, Some(&|a: &[Object]| {
            a.len() == 2
        }))? {
            for el in &a {
                let v = xref.dereference_number(el, IF, "A")?;
                if !(0.0..=1.0).contains(&v) {
                    return Err(PdfError::rejected(
                        IF,
                        "A",
                        xref.cur_obj(),
                        "leftover space fractions must lie in 0..1".to_string(),
                    ));
                }
            }
        }
        boolean_entry(xref, &icon_fit, IF, "FB", false, Version::V15)?;
    }
    integer_entry(xref, &mk, MK, "TP", false, Version::V12, Some(&|tp: &i64| {
        (0..=6).contains(tp)
    }))?;
    Ok(())
}

// --- small shared helpers ---

/// Color component array: empty, gray, RGB or CMYK.
fn color_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    since: Version,
) -> Result<()> {
    if let Some(arr) = array_entry(xref, dict, dict_name, key, false, since, Some(&|a: &[Object]| {
        matches!(a.len(), 0 | 1 | 3 | 4)
    }))? {
        for el in &arr {
            xref.dereference_number(el, dict_name, key)?;
        }
    }
    Ok(())
}

fn quad_points_entry(
    xref: &XRefTable,
    dict: &Dict,
    dict_name: &str,
    key: &str,
    required: bool,
    since: Version,
) -> Result<()> {
    if let Some(arr) = array_entry(xref, dict, dict_name, key, required, since, Some(&|a: &[Object]| {
        !a.is_empty() && a.len() % 8 == 0
    }))? {
        for el in &arr {
            xref.dereference_number(el, dict_name, key)?;
        }
    }
    Ok(())
}

/// `/Vertices`, a flat list of coordinate pairs.
fn vertices_entry(xref: &XRefTable, dict: &Dict, dict_name: &str) -> Result<()> {
    if let Some(arr) = array_entry(xref, dict, dict_name, "Vertices", true, Version::V15, Some(&|a: &[Object]| {
        a.len() >= 4 && a.len() % 2 == 0
    }))? {
        for el in &arr {
            xref.dereference_number(el, dict_name, "Vertices")?;
        }
    }
    Ok(())
}

/// `/LE` as a two-element array of line ending names.
fn line_endings_entry(xref: &XRefTable, dict: &Dict, dict_name: &str, since: Version) -> Result<()> {
    let Some(le) = array_entry(xref, dict, dict_name, "LE", false, since, Some(&|a: &[Object]| {
        a.len() == 2
    }))? else {
        return Ok(());
    };
    for el in &le {
        xref.dereference_name(el, dict_name, "LE", since, Some(&is_line_ending))?;
    }
    Ok(())
}
