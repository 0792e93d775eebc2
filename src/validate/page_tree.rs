//! Page tree validation (ISO 32000-1, 7.7.3) and per-page entries
//! (table 30).
//!
//! The walk is depth-first and carries the inheritable attributes down
//! with it. The page cursor on the table advances once per leaf so that
//! everything recorded further down (annotations, link targets) lands on
//! the right page number. Relaxed mode patches the classic breakage in
//! place: wrong `/Count`, missing `/Type`, stale `/Parent`, dangling
//! kids and annotations.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object, Reference};
use crate::validate::actions::{validate_additional_actions, AdditionalActionsKind};
use crate::validate::annotations::validate_annotation;
use crate::validate::entries::{
    array_entry, boolean_entry, dict_entry, integer_entry, lenient_date_entry, name_entry,
    number_entry, rect_entry, stream_entry, string_entry,
};
use crate::validate::fonts::validate_resource_dict;
use crate::version::Version;
use crate::xref::XRefTable;

/// Attributes a page inherits from its ancestors (7.7.3.4).
#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Dict>,
    media_box: Option<[f64; 4]>,
    #[allow(dead_code)]
    crop_box: Option<[f64; 4]>,
    #[allow(dead_code)]
    rotate: Option<i64>,
}

/// Validates the catalog's page tree and counts its leaves into the
/// statistics.
pub fn validate_pages(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(pages) = catalog.get("Pages").cloned() else {
        return Err(PdfError::MissingRequired {
            dict: "catalog".to_string(),
            entry: "Pages".to_string(),
            obj_nr: xref.cur_obj(),
        });
    };
    let root_nr = match &pages {
        Object::Reference(r) => Some(r.obj_nr()),
        _ if xref.is_strict() => {
            return Err(PdfError::TypeMismatch {
                dict: "catalog".to_string(),
                entry: "Pages".to_string(),
                expected: "indirect reference",
                found: pages.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
        _ => {
            warn!("catalog /Pages is written inline instead of as a reference");
            None
        }
    };
    let root = xref.dereference_dict(&pages, "catalog", "Pages")?;

    if root.contains_key("Parent") {
        let detail = "page tree root carries a /Parent".to_string();
        if xref.is_strict() {
            return Err(PdfError::corrupt(root_nr.unwrap_or(0), detail));
        }
        warn!("{detail}");
    }

    xref.set_cur_page(0);
    let (count, _) = validate_pages_node(xref, root_nr, &root, &Inherited::default(), None)?;
    xref.stats.page_count = count;
    Ok(())
}

/// One interior node. Returns the number of leaves underneath it and
/// whether relaxed mode cut any dangling kids out of the subtree.
fn validate_pages_node(
    xref: &mut XRefTable,
    node_nr: Option<u32>,
    dict: &Dict,
    inherited: &Inherited,
    parent_nr: Option<u32>,
) -> Result<(u32, bool)> {
    const DICT: &str = "page tree node";
    if let Some(nr) = node_nr {
        if !xref.mark(nr) {
            return Err(PdfError::corrupt(nr, "page tree contains a cycle"));
        }
        xref.set_cur_obj(nr);
    }

    check_parent(xref, dict, node_nr, parent_nr)?;
    let inherited = update_inherited(xref, dict, node_nr, inherited)?;

    let Some(kids) = array_entry(xref, dict, DICT, "Kids", true, Version::V10, None)? else {
        return Ok((0, false));
    };
    let declared = integer_entry(xref, dict, DICT, "Count", xref.is_strict(), Version::V10, None)?;

    let mut count: u32 = 0;
    let mut dropped = false;
    let mut kept: Vec<Object> = Vec::with_capacity(kids.len());
    for kid in &kids {
        let kid_nr = match kid {
            Object::Reference(r) => Some(r.obj_nr()),
            _ if xref.is_strict() => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "Kids".to_string(),
                    expected: "indirect reference",
                    found: kid.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
            _ => {
                warn!("page tree kid is written inline instead of as a reference");
                None
            }
        };

        let kid_dict = match xref.dereference(kid)? {
            Object::Dict(d) => d,
            Object::Null => {
                // Relaxed dereference already warned; drop the kid.
                xref.note_repair(format!(
                    "dropped dangling page tree kid obj#{}",
                    kid_nr.unwrap_or(0)
                ));
                dropped = true;
                continue;
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "Kids".to_string(),
                    expected: "dict",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        };
        kept.push(kid.clone());

        let kid_type = match kid_dict.dict_type() {
            Some(t) => t.to_string(),
            None => {
                if xref.is_strict() {
                    return Err(PdfError::MissingRequired {
                        dict: DICT.to_string(),
                        entry: "Type".to_string(),
                        obj_nr: kid_nr.unwrap_or_else(|| xref.cur_obj()),
                    });
                }
                let assumed = if kid_dict.contains_key("Kids") { "Pages" } else { "Page" };
                if let Some(nr) = kid_nr {
                    xref.set_dict_entry(nr, "Type", Object::name(assumed))?;
                    xref.note_repair(format!("typed bare page tree kid obj#{nr} as /{assumed}"));
                } else {
                    warn!("untyped inline page tree kid, assuming /{assumed}");
                }
                assumed.to_string()
            }
        };

        match kid_type.as_str() {
            "Pages" => {
                let (kid_count, kid_dropped) =
                    validate_pages_node(xref, kid_nr, &kid_dict, &inherited, node_nr)?;
                count += kid_count;
                dropped |= kid_dropped;
            }
            "Page" => {
                count += 1;
                validate_page(xref, kid_nr, &kid_dict, &inherited, node_nr)?;
            }
            other => {
                return Err(PdfError::corrupt(
                    kid_nr.unwrap_or_else(|| xref.cur_obj()),
                    format!("page tree kid has type /{other}"),
                ));
            }
        }
    }

    if kept.len() != kids.len() {
        if let Some(nr) = node_nr {
            xref.set_dict_entry(nr, "Kids", Object::Array(kept))?;
        }
    }

    match declared {
        // A count inconsistency is fatal in both modes, unless the count
        // only went stale because dangling kids were cut out above.
        Some(declared) if declared != count as i64 => {
            let detail = format!("page tree node declares /Count {declared}, found {count}");
            if !dropped {
                return Err(PdfError::corrupt(node_nr.unwrap_or(0), detail));
            }
            if let Some(nr) = node_nr {
                xref.set_dict_entry(nr, "Count", Object::Integer(count as i64))?;
                xref.note_repair(format!("{detail}, corrected after dropped kids"));
            } else {
                warn!("{detail}");
            }
        }
        None if !xref.is_strict() => {
            let detail = format!("page tree node is missing /Count, found {count}");
            if let Some(nr) = node_nr {
                xref.set_dict_entry(nr, "Count", Object::Integer(count as i64))?;
                xref.note_repair(format!("{detail}, filled in"));
            } else {
                warn!("{detail}");
            }
        }
        _ => {}
    }
    Ok((count, dropped))
}

/// `/Parent` must point back at the node that listed this dict.
fn check_parent(
    xref: &mut XRefTable,
    dict: &Dict,
    obj_nr: Option<u32>,
    parent_nr: Option<u32>,
) -> Result<()> {
    let Some(expected) = parent_nr else {
        return Ok(());
    };
    let actual = dict.reference("Parent").map(|r| r.obj_nr());
    if actual == Some(expected) {
        return Ok(());
    }
    let detail = match actual {
        Some(nr) => format!("/Parent points at obj#{nr} instead of obj#{expected}"),
        None => "/Parent is missing".to_string(),
    };
    if xref.is_strict() {
        return Err(PdfError::corrupt(obj_nr.unwrap_or(0), detail));
    }
    if let Some(nr) = obj_nr {
        xref.set_dict_entry(nr, "Parent", Object::Reference(Reference::new(expected, 0)))?;
        xref.note_repair(format!("obj#{nr}: {detail}, rewired"));
    } else {
        warn!("{detail}");
    }
    Ok(())
}

/// Reads the inheritable attributes off `dict`, layering them over what
/// the ancestors provided. `/Rotate` gets snapped to a right angle in
/// relaxed mode.
fn update_inherited(
    xref: &mut XRefTable,
    dict: &Dict,
    obj_nr: Option<u32>,
    inherited: &Inherited,
) -> Result<Inherited> {
    const DICT: &str = "page tree node";
    let mut inh = inherited.clone();

    if let Some(res) = dict_entry(xref, dict, DICT, "Resources", false, Version::V10, None)? {
        inh.resources = Some(res);
    }
    if let Some(mb) = rect_entry(xref, dict, DICT, "MediaBox", false, Version::V10)? {
        inh.media_box = Some(mb);
    }
    if let Some(cb) = rect_entry(xref, dict, DICT, "CropBox", false, Version::V10)? {
        inh.crop_box = Some(cb);
    }
    if let Some(rotate) = integer_entry(xref, dict, DICT, "Rotate", false, Version::V10, None)? {
        let rotate = if rotate % 90 == 0 {
            rotate
        } else {
            let detail = format!("/Rotate {rotate} is not a multiple of 90");
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "Rotate", xref.cur_obj(), detail));
            }
            let snapped = ((rotate as f64 / 90.0).round() as i64) * 90;
            if let Some(nr) = obj_nr {
                xref.set_dict_entry(nr, "Rotate", Object::Integer(snapped))?;
                xref.note_repair(format!("{detail}, snapped to {snapped}"));
            } else {
                warn!("{detail}");
            }
            snapped
        };
        inh.rotate = Some(rotate);
    }
    Ok(inh)
}

/// One leaf page.
fn validate_page(
    xref: &mut XRefTable,
    page_obj: Option<u32>,
    dict: &Dict,
    inherited: &Inherited,
    parent_nr: Option<u32>,
) -> Result<()> {
    const DICT: &str = "page dict";
    if let Some(nr) = page_obj {
        if !xref.mark(nr) {
            return Err(PdfError::corrupt(nr, "page object appears twice in the page tree"));
        }
        xref.set_cur_obj(nr);
    }
    let page_nr = xref.advance_page();

    check_parent(xref, dict, page_obj, parent_nr)?;
    let inherited = update_inherited(xref, dict, page_obj, inherited)?;

    if inherited.media_box.is_none() {
        if xref.is_strict() {
            return Err(PdfError::MissingRequired {
                dict: DICT.to_string(),
                entry: "MediaBox".to_string(),
                obj_nr: page_obj.unwrap_or(0),
            });
        }
        xref.note_repair(format!("page {page_nr} inherits no /MediaBox"));
    }

    rect_entry(xref, dict, DICT, "BleedBox", false, Version::V13)?;
    rect_entry(xref, dict, DICT, "TrimBox", false, Version::V13)?;
    rect_entry(xref, dict, DICT, "ArtBox", false, Version::V13)?;

    match &inherited.resources {
        Some(res) => {
            let res = res.clone();
            validate_resource_dict(xref, &res)?;
        }
        None => warn!(page = page_nr, "page inherits no /Resources"),
    }

    validate_contents(xref, page_obj, dict)?;
    lenient_date_entry(xref, dict, DICT, "LastModified", false, Version::V13)?;

    if let Some(group) = dict_entry(xref, dict, DICT, "Group", false, Version::V14, None)? {
        name_entry(xref, &group, "group attributes dict", "S", true, Version::V14, Some(&|s: &str| {
            s == "Transparency"
        }))?;
    }
    stream_entry(xref, dict, DICT, "Thumb", false, Version::V10)?;
    array_entry(xref, dict, DICT, "B", false, Version::V11, None)?;
    number_entry(xref, dict, DICT, "Dur", false, Version::V11, Some(&|d: &f64| *d >= 0.0))?;
    if let Some(trans) = dict_entry(xref, dict, DICT, "Trans", false, Version::V11, None)? {
        validate_transition(xref, &trans)?;
    }

    validate_annots(xref, page_obj, dict)?;
    validate_additional_actions(xref, dict, DICT, false, Version::V12, AdditionalActionsKind::Page)?;
    stream_entry(xref, dict, DICT, "Metadata", false, Version::V14)?;

    if dict.contains_key("PieceInfo") {
        dict_entry(xref, dict, DICT, "PieceInfo", false, Version::V13, None)?;
        if !dict.contains_key("LastModified") {
            let detail = "page has /PieceInfo but no /LastModified".to_string();
            if xref.is_strict() {
                return Err(PdfError::MissingRequired {
                    dict: DICT.to_string(),
                    entry: "LastModified".to_string(),
                    obj_nr: page_obj.unwrap_or(0),
                });
            }
            warn!("{detail}");
        }
    }

    integer_entry(xref, dict, DICT, "StructParents", false, Version::V13, None)?;
    string_entry(xref, dict, DICT, "ID", false, Version::V13, None)?;
    number_entry(xref, dict, DICT, "PZ", false, Version::V13, None)?;
    dict_entry(xref, dict, DICT, "SeparationInfo", false, Version::V13, None)?;
    name_entry(xref, dict, DICT, "Tabs", false, Version::V15, Some(&|s: &str| {
        matches!(s, "R" | "C" | "S")
    }))?;
    name_entry(xref, dict, DICT, "TemplateInstantiated", false, Version::V15, None)?;
    dict_entry(xref, dict, DICT, "PresSteps", false, Version::V15, None)?;
    number_entry(xref, dict, DICT, "UserUnit", false, Version::V16, Some(&|u: &f64| *u > 0.0))?;
    validate_viewports(xref, dict)?;
    Ok(())
}

/// `/Contents`: one stream or an array of streams. Relaxed mode drops
/// array elements that dangle.
fn validate_contents(xref: &mut XRefTable, page_obj: Option<u32>, dict: &Dict) -> Result<()> {
    const DICT: &str = "page dict";
    let Some(contents) = dict.get("Contents") else {
        return Ok(());
    };
    match xref.dereference(contents)? {
        Object::Null => {
            if xref.is_strict() {
                return Err(PdfError::DanglingRef {
                    obj_nr: xref.cur_obj(),
                    gen_nr: 0,
                });
            }
            if let Some(nr) = page_obj {
                xref.remove_dict_entry(nr, "Contents")?;
                xref.note_repair(format!("removed dangling /Contents from page obj#{nr}"));
            }
            Ok(())
        }
        Object::Stream(_) => Ok(()),
        Object::Array(parts) => {
            let mut kept = Vec::with_capacity(parts.len());
            for part in &parts {
                match xref.dereference(part)? {
                    Object::Stream(_) => kept.push(part.clone()),
                    Object::Null => {
                        xref.note_repair("dropped dangling page content stream".to_string());
                    }
                    other => {
                        return Err(PdfError::TypeMismatch {
                            dict: DICT.to_string(),
                            entry: "Contents".to_string(),
                            expected: "stream",
                            found: other.type_name(),
                            obj_nr: xref.cur_obj(),
                        });
                    }
                }
            }
            if kept.len() != parts.len() {
                if let Some(nr) = page_obj {
                    xref.set_dict_entry(nr, "Contents", Object::Array(kept))?;
                }
            }
            Ok(())
        }
        other => Err(PdfError::TypeMismatch {
            dict: DICT.to_string(),
            entry: "Contents".to_string(),
            expected: "stream or array",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

/// Walks `/Annots`. A trap network annotation, when present, must sit at
/// the end of the array so it overprints everything else.
fn validate_annots(xref: &mut XRefTable, page_obj: Option<u32>, dict: &Dict) -> Result<()> {
    const DICT: &str = "page dict";
    let Some(annots) = array_entry(xref, dict, DICT, "Annots", false, Version::V10, None)? else {
        return Ok(());
    };

    let mut kept: Vec<Object> = Vec::with_capacity(annots.len());
    let mut subtypes: Vec<String> = Vec::with_capacity(annots.len());
    for el in &annots {
        if validate_annotation(xref, el)? {
            if let Ok(d) = xref.dereference_dict(el, DICT, "Annots") {
                subtypes.push(d.name("Subtype").unwrap_or_default().to_string());
            }
            kept.push(el.clone());
        }
    }

    if let Some(pos) = subtypes.iter().position(|s| s == "TrapNet") {
        if pos + 1 != subtypes.len() {
            let detail = "trap network annotation is not the last one on its page".to_string();
            if xref.is_strict() {
                return Err(PdfError::corrupt(page_obj.unwrap_or(0), detail));
            }
            warn!("{detail}");
        }
    }

    if kept.len() != annots.len() {
        if let Some(nr) = page_obj {
            if kept.is_empty() {
                xref.remove_dict_entry(nr, "Annots")?;
            } else {
                xref.set_dict_entry(nr, "Annots", Object::Array(kept))?;
            }
        }
    }
    Ok(())
}

/// Page transition dict (12.4.4.1).
fn validate_transition(xref: &XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "transition dict";
    let style = name_entry(xref, dict, DICT, "S", false, Version::V11, Some(&|s: &str| {
        matches!(
            s,
            "Split" | "Blinds" | "Box" | "Wipe" | "Dissolve" | "Glitter" | "R" | "Fly" | "Push"
                | "Cover" | "Uncover" | "Fade"
        )
    }))?;
    if let Some(style) = &style {
        if matches!(style.as_str(), "Fly" | "Push" | "Cover" | "Uncover" | "Fade") {
            xref.validate_version(&format!("transition style {style}"), Version::V15)?;
        }
    }
    number_entry(xref, dict, DICT, "D", false, Version::V11, Some(&|d: &f64| *d >= 0.0))?;
    name_entry(xref, dict, DICT, "Dm", false, Version::V11, Some(&|s: &str| {
        matches!(s, "H" | "V")
    }))?;
    name_entry(xref, dict, DICT, "M", false, Version::V11, Some(&|s: &str| {
        matches!(s, "I" | "O")
    }))?;
    if let Some(di) = dict.get("Di") {
        match xref.dereference(di)? {
            Object::Null => {}
            Object::Integer(angle) => {
                if angle % 90 != 0 {
                    return Err(PdfError::rejected(
                        DICT,
                        "Di",
                        xref.cur_obj(),
                        format!("direction {angle} is not a multiple of 90"),
                    ));
                }
            }
            Object::Name(n) if n == "None" => {}
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: DICT.to_string(),
                    entry: "Di".to_string(),
                    expected: "integer or /None",
                    found: other.type_name(),
                    obj_nr: xref.cur_obj(),
                });
            }
        }
    }
    number_entry(xref, dict, DICT, "SS", false, Version::V15, Some(&|s: &f64| *s > 0.0))?;
    boolean_entry(xref, dict, DICT, "B", false, Version::V15)?;
    Ok(())
}

/// `/VP` viewport array (14.11.6).
fn validate_viewports(xref: &mut XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "page dict";
    let Some(vps) = array_entry(xref, dict, DICT, "VP", false, Version::V16, None)? else {
        return Ok(());
    };
    for el in &vps {
        let vp = xref.dereference_dict(el, DICT, "VP")?;
        const VP: &str = "viewport dict";
        if let Some(t) = vp.dict_type() {
            if t != "Viewport" {
                return Err(PdfError::rejected(
                    VP,
                    "Type",
                    xref.cur_obj(),
                    format!("/{t} is not /Viewport"),
                ));
            }
        }
        rect_entry(xref, &vp, VP, "BBox", true, Version::V16)?;
        string_entry(xref, &vp, VP, "Name", false, Version::V16, None)?;
        dict_entry(xref, &vp, VP, "Measure", false, Version::V16, None)?;
    }
    Ok(())
}
