//! Action validation (ISO 32000-1, 12.6).
//!
//! Actions form small graphs: each action dict may chain further actions
//! through `/Next`. The walk marks indirect action objects so shared
//! suffixes are validated once and `/Next` cycles terminate.

use std::collections::HashMap;

use lazy_static::lazy_static;
use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::destinations::validate_destination;
use crate::validate::entries::{
    any_entry, array_entry, boolean_entry, dict_entry, integer_entry, name_entry, number_entry,
    stream_entry, string_entry,
};
use crate::validate::filespec::validate_file_spec_entry;
use crate::version::Version;
use crate::xref::XRefTable;

type ActionHandler = fn(&mut XRefTable, &Dict) -> Result<()>;

lazy_static! {
    /// Action subtype, introduction version, and handler.
    static ref ACTION_TABLE: HashMap<&'static str, (Version, ActionHandler)> = {
        let mut t: HashMap<&'static str, (Version, ActionHandler)> = HashMap::new();
        t.insert("GoTo", (Version::V10, validate_goto));
        t.insert("GoToR", (Version::V11, validate_goto_remote));
        t.insert("GoToE", (Version::V16, validate_goto_embedded));
        t.insert("Launch", (Version::V10, validate_launch));
        t.insert("Thread", (Version::V10, validate_thread_action));
        t.insert("URI", (Version::V10, validate_uri));
        t.insert("Sound", (Version::V12, validate_sound));
        t.insert("Movie", (Version::V12, validate_movie));
        t.insert("Hide", (Version::V12, validate_hide));
        t.insert("Named", (Version::V12, validate_named));
        t.insert("SubmitForm", (Version::V10, validate_submit_form));
        t.insert("ResetForm", (Version::V12, validate_reset_form));
        t.insert("ImportData", (Version::V12, validate_import_data));
        t.insert("JavaScript", (Version::V13, validate_javascript));
        t.insert("SetOCGState", (Version::V15, validate_set_ocg_state));
        t.insert("Rendition", (Version::V15, validate_rendition));
        t.insert("Trans", (Version::V15, validate_trans));
        t.insert("GoTo3DView", (Version::V16, validate_goto_3d_view));
        t
    };
}

/// Validates an action in dict form, then its `/Next` chain.
pub fn validate_action(xref: &mut XRefTable, obj: &Object, src: &str) -> Result<()> {
    // Indirect actions are validated once; revisits (shared chains,
    // /Next cycles) stop here.
    if let Object::Reference(r) = obj {
        if xref.is_marked(r.obj_nr()) {
            return Ok(());
        }
        xref.mark(r.obj_nr());
        xref.set_cur_obj(r.obj_nr());
    }
    let dict = xref.dereference_dict(obj, src, "action")?;

    if let Some(t) = dict.dict_type() {
        if t != "Action" {
            return Err(PdfError::rejected(
                src,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Action"),
            ));
        }
    }

    let Some(s) = name_entry(xref, &dict, src, "S", true, Version::V10, None)? else {
        return Ok(());
    };

    match ACTION_TABLE.get(s.as_str()) {
        Some((since, handler)) => {
            xref.validate_version(&format!("{s} action"), *since)?;
            handler(xref, &dict)?;
        }
        None => {
            return Err(PdfError::rejected(
                src,
                "S",
                xref.cur_obj(),
                format!("unknown action type {s}"),
            ));
        }
    }

    validate_next_chain(xref, &dict, src)
}

fn validate_next_chain(xref: &mut XRefTable, dict: &Dict, src: &str) -> Result<()> {
    let Some(next) = dict.get("Next") else {
        return Ok(());
    };
    xref.validate_version(&format!("{src} entry Next"), Version::V12)?;
    match xref.dereference(next)? {
        Object::Null => Ok(()),
        Object::Dict(_) => validate_action(xref, next, src),
        Object::Array(actions) => {
            for o in &actions {
                validate_action(xref, o, src)?;
            }
            Ok(())
        }
        other => Err(PdfError::TypeMismatch {
            dict: src.to_string(),
            entry: "Next".to_string(),
            expected: "dict or array",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

fn validate_goto(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "GoTo action";
    let Some(d) = any_entry(xref, dict, DICT, "D", true, Version::V10)? else {
        return Ok(());
    };
    validate_destination(xref, &d, DICT)?;
    Ok(())
}

/// Remote destinations address pages by number; named forms cannot be
/// resolved against this document, so only their shape is checked.
fn validate_remote_destination(xref: &XRefTable, obj: &Object, src: &str) -> Result<()> {
    match xref.dereference(obj)? {
        Object::Name(_) | Object::StringLiteral(_) | Object::HexLiteral(_) => Ok(()),
        Object::Array(a) => {
            validate_destination(xref, &Object::Array(a), src)?;
            Ok(())
        }
        other => Err(PdfError::TypeMismatch {
            dict: src.to_string(),
            entry: "D".to_string(),
            expected: "array, name, or string",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

fn validate_goto_remote(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "GoToR action";
    validate_file_spec_entry(xref, dict, DICT, "F", true, Version::V11)?;
    if let Some(d) = any_entry(xref, dict, DICT, "D", true, Version::V11)? {
        validate_remote_destination(xref, &d, DICT)?;
    }
    boolean_entry(xref, dict, DICT, "NewWindow", false, Version::V12)?;
    Ok(())
}

fn validate_goto_embedded(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "GoToE action";
    validate_file_spec_entry(xref, dict, DICT, "F", false, Version::V16)?;
    if let Some(d) = any_entry(xref, dict, DICT, "D", true, Version::V16)? {
        validate_remote_destination(xref, &d, DICT)?;
    }
    boolean_entry(xref, dict, DICT, "NewWindow", false, Version::V16)?;
    if let Some(t) = dict_entry(xref, dict, DICT, "T", false, Version::V16, None)? {
        validate_embedded_target(xref, &t, 0)?;
    }
    Ok(())
}

/// Target dicts nest through /T to address documents inside documents.
fn validate_embedded_target(xref: &mut XRefTable, dict: &Dict, depth: u8) -> Result<()> {
    const DICT: &str = "target";
    if depth > 8 {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            "embedded-goto target chain nests too deeply",
        ));
    }
    name_entry(xref, dict, DICT, "R", true, Version::V16, Some(&|s: &str| {
        s == "P" || s == "C"
    }))?;
    string_entry(xref, dict, DICT, "N", false, Version::V16, None)?;
    // P is a page number or a named destination; A an annotation index or
    // its /NM text.
    if let Some(p) = any_entry(xref, dict, DICT, "P", false, Version::V16)? {
        if !matches!(
            p,
            Object::Integer(_) | Object::StringLiteral(_) | Object::HexLiteral(_)
        ) {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "P".to_string(),
                expected: "integer or string",
                found: p.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }
    if let Some(a) = any_entry(xref, dict, DICT, "A", false, Version::V16)? {
        if !matches!(
            a,
            Object::Integer(_) | Object::StringLiteral(_) | Object::HexLiteral(_)
        ) {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "A".to_string(),
                expected: "integer or string",
                found: a.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }
    if let Some(t) = dict_entry(xref, dict, DICT, "T", false, Version::V16, None)? {
        validate_embedded_target(xref, &t, depth + 1)?;
    }
    Ok(())
}

fn validate_launch(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Launch action";
    let f = validate_file_spec_entry(xref, dict, DICT, "F", false, Version::V10)?;
    let win = dict_entry(xref, dict, DICT, "Win", false, Version::V10, None)?;
    if let Some(win) = &win {
        string_entry(xref, win, "Win launch parameters", "F", true, Version::V10, None)?;
        string_entry(xref, win, "Win launch parameters", "D", false, Version::V10, None)?;
        string_entry(xref, win, "Win launch parameters", "O", false, Version::V10, None)?;
        string_entry(xref, win, "Win launch parameters", "P", false, Version::V10, None)?;
    }
    let mac = dict.contains_key("Mac");
    let unix = dict.contains_key("Unix");
    if f.is_none() && win.is_none() && !mac && !unix {
        return Err(PdfError::MissingRequired {
            dict: DICT.to_string(),
            entry: "F".to_string(),
            obj_nr: xref.cur_obj(),
        });
    }
    boolean_entry(xref, dict, DICT, "NewWindow", false, Version::V12)?;
    Ok(())
}

fn validate_thread_action(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Thread action";
    validate_file_spec_entry(xref, dict, DICT, "F", false, Version::V10)?;
    let Some(d) = any_entry(xref, dict, DICT, "D", true, Version::V10)? else {
        return Ok(());
    };
    // Thread by index, by title, or by reference to the thread dict.
    match &d {
        Object::Integer(i) if *i >= 0 => {}
        Object::Integer(i) => {
            return Err(PdfError::rejected(
                DICT,
                "D",
                xref.cur_obj(),
                format!("thread index {i} is negative"),
            ));
        }
        Object::StringLiteral(_) | Object::HexLiteral(_) | Object::Dict(_) => {}
        other => {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "D".to_string(),
                expected: "integer, string, or dict",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }
    if let Some(b) = any_entry(xref, dict, DICT, "B", false, Version::V10)? {
        if !matches!(b, Object::Integer(_) | Object::Dict(_)) {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "B".to_string(),
                expected: "integer or dict",
                found: b.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    }
    Ok(())
}

fn validate_uri(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "URI action";
    let uri = string_entry(xref, dict, DICT, "URI", true, Version::V10, Some(&|s: &str| {
        s.is_ascii()
    }))?;
    boolean_entry(xref, dict, DICT, "IsMap", false, Version::V10)?;

    if let Some(uri) = uri {
        if xref.validate_links && (uri.starts_with("http://") || uri.starts_with("https://")) {
            let page = xref.cur_page();
            if page > 0 {
                xref.record_page_uri(page, uri);
            }
        }
    }
    Ok(())
}

fn validate_sound(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Sound action";
    let sound = stream_entry(xref, dict, DICT, "Sound", true, Version::V12)?;
    if let Some(sound) = sound {
        if let Some(t) = sound.dict.dict_type() {
            if t != "Sound" {
                return Err(PdfError::rejected(
                    DICT,
                    "Sound",
                    xref.cur_obj(),
                    format!("stream type /{t} is not /Sound"),
                ));
            }
        }
    }
    number_entry(xref, dict, DICT, "Volume", false, Version::V12, Some(&|v: &f64| {
        (-1.0..=1.0).contains(v)
    }))?;
    boolean_entry(xref, dict, DICT, "Synchronous", false, Version::V12)?;
    boolean_entry(xref, dict, DICT, "Repeat", false, Version::V12)?;
    boolean_entry(xref, dict, DICT, "Mix", false, Version::V12)?;
    Ok(())
}

fn validate_movie(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Movie action";
    let title = string_entry(xref, dict, DICT, "T", false, Version::V12, None)?;
    let annotation = dict.get("Annotation").is_some();
    // The target is named either by annotation title or by reference,
    // never both.
    if title.is_some() && annotation {
        return Err(PdfError::rejected(
            DICT,
            "T",
            xref.cur_obj(),
            "both /T and /Annotation name a target",
        ));
    }
    if title.is_none() && !annotation {
        return Err(PdfError::MissingRequired {
            dict: DICT.to_string(),
            entry: "T".to_string(),
            obj_nr: xref.cur_obj(),
        });
    }
    if annotation {
        dict_entry(xref, dict, DICT, "Annotation", true, Version::V12, None)?;
    }
    name_entry(xref, dict, DICT, "Operation", false, Version::V12, Some(&|s: &str| {
        matches!(s, "Play" | "Stop" | "Pause" | "Resume")
    }))?;
    Ok(())
}

fn validate_hide(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Hide action";
    let Some(t) = any_entry(xref, dict, DICT, "T", true, Version::V12)? else {
        return Ok(());
    };
    validate_hide_target(xref, &t)?;
    boolean_entry(xref, dict, DICT, "H", false, Version::V12)?;
    Ok(())
}

fn validate_hide_target(xref: &XRefTable, t: &Object) -> Result<()> {
    const DICT: &str = "Hide action";
    match t {
        Object::StringLiteral(_) | Object::HexLiteral(_) | Object::Dict(_) => Ok(()),
        Object::Reference(_) => match xref.dereference(t)? {
            Object::Dict(_) | Object::Null => Ok(()),
            other => Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "T".to_string(),
                expected: "annotation dict",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            }),
        },
        Object::Array(items) => {
            for item in items {
                validate_hide_target(xref, item)?;
            }
            Ok(())
        }
        other => Err(PdfError::TypeMismatch {
            dict: DICT.to_string(),
            entry: "T".to_string(),
            expected: "string, dict, or array",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

fn validate_named(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Named action";
    let Some(n) = name_entry(xref, dict, DICT, "N", true, Version::V12, None)? else {
        return Ok(());
    };
    let known = matches!(
        n.as_str(),
        "NextPage" | "PrevPage" | "FirstPage" | "LastPage"
    );
    if !known {
        if xref.is_strict() {
            return Err(PdfError::rejected(
                DICT,
                "N",
                xref.cur_obj(),
                format!("unknown named action {n}"),
            ));
        }
        warn!(action = %n, "nonstandard named action");
    }
    Ok(())
}

fn validate_submit_form(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "SubmitForm action";
    validate_file_spec_entry(xref, dict, DICT, "F", true, Version::V10)?;
    if let Some(fields) = array_entry(xref, dict, DICT, "Fields", false, Version::V10, None)? {
        validate_field_selection(xref, &fields, DICT)?;
    }
    integer_entry(xref, dict, DICT, "Flags", false, Version::V10, Some(&|i: &i64| {
        *i >= 0
    }))?;
    Ok(())
}

fn validate_reset_form(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "ResetForm action";
    if let Some(fields) = array_entry(xref, dict, DICT, "Fields", false, Version::V12, None)? {
        validate_field_selection(xref, &fields, DICT)?;
    }
    integer_entry(xref, dict, DICT, "Flags", false, Version::V12, Some(&|i: &i64| {
        *i >= 0
    }))?;
    Ok(())
}

/// `/Fields` mixes field references with fully qualified field names.
fn validate_field_selection(xref: &XRefTable, fields: &[Object], src: &str) -> Result<()> {
    for o in fields {
        match o {
            Object::Reference(_) | Object::StringLiteral(_) | Object::HexLiteral(_) => {}
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: src.to_string(),
                    entry: "Fields".to_string(),
                    expected: "indirect reference or string",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    Ok(())
}

fn validate_import_data(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    validate_file_spec_entry(xref, dict, "ImportData action", "F", true, Version::V12)?;
    Ok(())
}

fn validate_javascript(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "JavaScript action";
    let Some(js) = any_entry(xref, dict, DICT, "JS", true, Version::V13)? else {
        return Ok(());
    };
    match js {
        Object::StringLiteral(_) | Object::HexLiteral(_) | Object::Stream(_) => Ok(()),
        other => Err(PdfError::TypeMismatch {
            dict: DICT.to_string(),
            entry: "JS".to_string(),
            expected: "string or stream",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

fn validate_set_ocg_state(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "SetOCGState action";
    let Some(state) = array_entry(xref, dict, DICT, "State", true, Version::V15, None)? else {
        return Ok(());
    };
    // Alternating sequence: a mode name, then the OCGs it applies to.
    let mut seen_mode = false;
    for o in &state {
        match o {
            Object::Name(n) => {
                if !matches!(n.as_str(), "ON" | "OFF" | "Toggle") {
                    return Err(PdfError::rejected(
                        DICT,
                        "State",
                        xref.cur_obj(),
                        format!("unknown state mode {n}"),
                    ));
                }
                seen_mode = true;
            }
            Object::Reference(_) => {
                if !seen_mode {
                    return Err(PdfError::rejected(
                        DICT,
                        "State",
                        xref.cur_obj(),
                        "OCG reference precedes any state mode",
                    ));
                }
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "State".to_string(),
                    expected: "name or indirect reference",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    boolean_entry(xref, dict, DICT, "PreserveRB", false, Version::V15)?;
    Ok(())
}

fn validate_rendition(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Rendition action";
    let op = integer_entry(xref, dict, DICT, "OP", false, Version::V15, Some(&|i: &i64| {
        (0..=4).contains(i)
    }))?;
    let js = dict.contains_key("JS");
    if js {
        validate_javascript(xref, dict)?;
    }
    if op.is_none() && !js {
        return Err(PdfError::MissingRequired {
            dict: DICT.to_string(),
            entry: "OP".to_string(),
            obj_nr: xref.cur_obj(),
        });
    }
    // OP 0 and 4 start a rendition and need /R.
    let needs_rendition = matches!(op, Some(0) | Some(4));
    dict_entry(xref, dict, DICT, "R", needs_rendition, Version::V15, None)?;
    if op.is_some() {
        any_entry(xref, dict, DICT, "AN", needs_rendition, Version::V15)?;
    }
    Ok(())
}

fn validate_trans(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "Trans action";
    let trans = dict_entry(xref, dict, DICT, "Trans", true, Version::V15, None)?;
    if let Some(trans) = trans {
        name_entry(xref, &trans, "transition", "S", false, Version::V11, Some(&|s: &str| {
            matches!(
                s,
                "Split" | "Blinds" | "Box" | "Wipe" | "Dissolve" | "Glitter" | "R"
                    | "Fly" | "Push" | "Cover" | "Uncover" | "Fade"
            )
        }))?;
        number_entry(xref, &trans, "transition", "D", false, Version::V11, Some(&|v: &f64| {
            *v >= 0.0
        }))?;
    }
    Ok(())
}

fn validate_goto_3d_view(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "GoTo3DView action";
    any_entry(xref, dict, DICT, "TA", true, Version::V16)?;
    any_entry(xref, dict, DICT, "V", true, Version::V16)?;
    Ok(())
}

/// Which dictionary an `/AA` entry hangs off; each spot admits a different
/// key set (ISO 32000-1, 12.6.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdditionalActionsKind {
    /// Document catalog: will-close and save/print hooks.
    Catalog,
    /// Page open/close.
    Page,
    /// Form fields and their widgets.
    Field,
}

impl AdditionalActionsKind {
    fn allowed(self, key: &str) -> bool {
        match self {
            AdditionalActionsKind::Catalog => {
                matches!(key, "WC" | "WS" | "DS" | "WP" | "DP")
            }
            AdditionalActionsKind::Page => matches!(key, "O" | "C"),
            AdditionalActionsKind::Field => matches!(
                key,
                "K" | "F" | "V" | "C" | "E" | "X" | "D" | "U" | "Fo" | "Bl" | "PO" | "PC"
                    | "PV" | "PI"
            ),
        }
    }
}

/// Validates an `/AA` additional-actions dict.
pub fn validate_additional_actions(
    xref: &mut XRefTable,
    dict: &Dict,
    dict_name: &str,
    required: bool,
    since: Version,
    kind: AdditionalActionsKind,
) -> Result<()> {
    let Some(aa) = dict_entry(xref, dict, dict_name, "AA", required, since, None)? else {
        return Ok(());
    };
    for key in aa.sorted_keys() {
        if !kind.allowed(key) {
            if xref.is_strict() {
                return Err(PdfError::rejected(
                    dict_name,
                    "AA",
                    xref.cur_obj(),
                    format!("event key {key} not allowed here"),
                ));
            }
            warn!(key = %key, dict = dict_name, "ignoring unknown additional-action event");
            continue;
        }
        let Some(o) = aa.get(key.as_str()) else {
            continue;
        };
        if xref.dereference(o)?.is_null() {
            continue;
        }
        validate_action(xref, o, &format!("{dict_name} additional action {key}"))?;
    }
    Ok(())
}
