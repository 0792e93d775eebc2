//! Document catalog validation (ISO 32000-1, 7.7.2).
//!
//! The catalog is the root of the structural walk. Entry order matters
//! twice: `/Version` may raise the effective document version before any
//! other gate fires, and the name trees must be flattened before the page
//! walk so named link targets resolve against them.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::acroform::validate_acro_form;
use crate::validate::actions::{
    validate_action, validate_additional_actions, AdditionalActionsKind,
};
use crate::validate::destinations::validate_destination_array;
use crate::validate::entries::{
    array_entry, boolean_entry, dict_entry, lenient_date_entry, name_entry, number_entry,
    stream_entry, string_entry,
};
use crate::validate::optional_content::validate_oc_properties;
use crate::validate::outlines::validate_outlines;
use crate::validate::page_tree::validate_pages;
use crate::validate::threads::validate_threads;
use crate::validate::trees::{validate_name_tree, validate_number_tree, validate_tree_value};
use crate::validate::viewer_preferences::validate_viewer_preferences;
use crate::version::Version;
use crate::xref::XRefTable;

const DICT: &str = "catalog";

/// Name trees a catalog `/Names` dict may carry, with their introduction
/// versions (ISO 32000-1, table 31).
const NAME_TREES: [(&str, Version); 10] = [
    ("Dests", Version::V12),
    ("AP", Version::V13),
    ("JavaScript", Version::V13),
    ("Pages", Version::V13),
    ("Templates", Version::V13),
    ("IDS", Version::V13),
    ("URLS", Version::V13),
    ("EmbeddedFiles", Version::V14),
    ("AlternatePresentations", Version::V14),
    ("Renditions", Version::V15),
];

/// Validates the trailer's `/Root` catalog and everything under it.
pub fn validate_catalog(xref: &mut XRefTable) -> Result<()> {
    let catalog = xref.catalog()?;
    if let Some(nr) = xref.catalog_obj_nr() {
        xref.set_cur_obj(nr);
        xref.mark(nr);
    }

    match catalog.dict_type() {
        Some("Catalog") => {}
        Some(other) => {
            let detail = format!("/{other} is not /Catalog");
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "Type", xref.cur_obj(), detail));
            }
            warn!("{detail}");
        }
        None => {
            if xref.is_strict() {
                return Err(PdfError::MissingRequired {
                    dict: DICT.to_string(),
                    entry: "Type".to_string(),
                    obj_nr: xref.cur_obj(),
                });
            }
            warn!("catalog is missing /Type");
        }
    }

    validate_catalog_version(xref, &catalog)?;

    // Name trees before pages: the page walk resolves named destinations
    // against their flattened form.
    validate_names(xref, &catalog)?;
    validate_legacy_dests(xref, &catalog)?;

    validate_pages(xref, &catalog)?;
    validate_page_labels(xref, &catalog)?;

    validate_viewer_preferences(xref, &catalog)?;
    validate_page_layout(xref, &catalog)?;
    validate_page_mode(xref, &catalog)?;
    validate_outlines(xref, &catalog)?;
    validate_threads(xref, &catalog)?;
    validate_open_action(xref, &catalog)?;
    validate_additional_actions(xref, &catalog, DICT, false, Version::V14, AdditionalActionsKind::Catalog)?;
    validate_uri_dict(xref, &catalog)?;
    validate_acro_form(xref, &catalog)?;
    validate_metadata(xref, &catalog)?;
    validate_struct_tree_root(xref, &catalog)?;
    validate_mark_info(xref, &catalog)?;
    string_entry(xref, &catalog, DICT, "Lang", false, Version::V14, None)?;
    validate_spider_info(xref, &catalog)?;
    validate_output_intents(xref, &catalog)?;
    validate_piece_info(xref, &catalog)?;
    if let Some(oc) = dict_entry(xref, &catalog, DICT, "OCProperties", false, Version::V15, None)? {
        validate_oc_properties(xref, &oc)?;
    }
    dict_entry(xref, &catalog, DICT, "Perms", false, Version::V15, None)?;
    dict_entry(xref, &catalog, DICT, "Legal", false, Version::V15, None)?;
    validate_requirements(xref, &catalog)?;
    validate_collection(xref, &catalog)?;
    boolean_entry(xref, &catalog, DICT, "NeedsRendering", false, Version::V17)?;
    dict_entry(xref, &catalog, DICT, "Extensions", false, Version::V17, None)?;
    Ok(())
}

/// `/Version` may raise the effective document version; it never lowers it.
fn validate_catalog_version(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(name) = name_entry(xref, catalog, DICT, "Version", false, Version::V14, None)? else {
        return Ok(());
    };
    match name.as_str().parse::<Version>() {
        Ok(v) => {
            xref.catalog_version = Some(v);
            Ok(())
        }
        Err(_) => {
            let detail = format!("unknown version name {name}");
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "Version", xref.cur_obj(), detail));
            }
            warn!("{detail}");
            Ok(())
        }
    }
}

fn validate_names(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(names) = dict_entry(xref, catalog, DICT, "Names", false, Version::V12, None)? else {
        return Ok(());
    };
    for key in names.sorted_keys() {
        match NAME_TREES.iter().find(|(t, _)| *t == key.as_str()) {
            Some((tree, since)) => {
                xref.validate_version(&format!("{tree} name tree"), *since)?;
                if let Some(obj) = names.get(key) {
                    validate_name_tree(xref, tree, obj, true)?;
                }
            }
            None => {
                let detail = format!("unknown name tree /{key}");
                if xref.is_strict() {
                    return Err(PdfError::rejected(DICT, "Names", xref.cur_obj(), detail));
                }
                warn!("{detail}");
            }
        }
    }
    Ok(())
}

/// Pre-1.2 documents name destinations in a plain `/Dests` dict. Entries
/// flatten into the same map the name tree uses.
fn validate_legacy_dests(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(raw) = catalog.get("Dests") else {
        return Ok(());
    };
    if let Object::Reference(r) = raw {
        xref.set_cur_obj(r.obj_nr());
    }
    let dests = match xref.dereference(raw)? {
        Object::Dict(d) => d,
        Object::Null => return Ok(()),
        other => {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "Dests".to_string(),
                expected: "dict",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    };
    xref.validate_version("catalog entry Dests", Version::V11)?;
    for key in dests.sorted_keys() {
        let Some(value) = dests.get(key) else {
            continue;
        };
        if validate_tree_value(xref, "Dests", key.as_bytes(), value)? {
            xref.name_tree_mut("Dests")
                .insert(key.clone().into_bytes(), value.clone());
        }
    }
    Ok(())
}

/// The page label tree must start at page index 0.
fn validate_page_labels(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(labels) = catalog.get("PageLabels").cloned() else {
        return Ok(());
    };
    xref.validate_version("catalog entry PageLabels", Version::V13)?;
    if let Some((lo, _)) = validate_number_tree(xref, "PageLabels", &labels, true)? {
        if lo != 0 {
            let detail = format!("page label tree starts at {lo}, expected 0");
            if xref.is_strict() {
                return Err(PdfError::corrupt(xref.cur_obj(), detail));
            }
            warn!("{detail}");
        }
    }
    Ok(())
}

fn validate_page_layout(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(layout) = name_entry(xref, catalog, DICT, "PageLayout", false, Version::V10, Some(&|l: &str| {
        matches!(
            l,
            "SinglePage" | "OneColumn" | "TwoColumnLeft" | "TwoColumnRight" | "TwoPageLeft"
                | "TwoPageRight"
        )
    }))?
    else {
        return Ok(());
    };
    if matches!(layout.as_str(), "TwoPageLeft" | "TwoPageRight") {
        xref.validate_version(&format!("page layout {layout}"), Version::V15)?;
    }
    Ok(())
}

fn validate_page_mode(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(mode) = name_entry(xref, catalog, DICT, "PageMode", false, Version::V10, Some(&|m: &str| {
        matches!(
            m,
            "UseNone" | "UseOutlines" | "UseThumbs" | "FullScreen" | "UseOC" | "UseAttachments"
        )
    }))?
    else {
        return Ok(());
    };
    match mode.as_str() {
        "UseOC" => xref.validate_version("page mode UseOC", Version::V15)?,
        "UseAttachments" => xref.validate_version("page mode UseAttachments", Version::V16)?,
        _ => {}
    }
    Ok(())
}

/// `/OpenAction` is a destination array or an action dict.
fn validate_open_action(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(raw) = catalog.get("OpenAction") else {
        return Ok(());
    };
    xref.validate_version("catalog entry OpenAction", Version::V11)?;
    match xref.dereference(raw)? {
        Object::Dict(_) => validate_action(xref, raw, DICT),
        Object::Array(a) => {
            validate_destination_array(xref, &a, "open action")?;
            Ok(())
        }
        Object::Null => Ok(()),
        other => Err(PdfError::TypeMismatch {
            dict: DICT.to_string(),
            entry: "OpenAction".to_string(),
            expected: "dict or array",
            found: other.type_name(),
            obj_nr: xref.cur_obj(),
        }),
    }
}

fn validate_uri_dict(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(uri) = dict_entry(xref, catalog, DICT, "URI", false, Version::V11, None)? else {
        return Ok(());
    };
    string_entry(xref, &uri, "URI dict", "Base", false, Version::V11, None)?;
    Ok(())
}

fn validate_metadata(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(meta) = stream_entry(xref, catalog, DICT, "Metadata", false, Version::V14)? else {
        return Ok(());
    };
    let typed = meta.dict.dict_type() == Some("Metadata") && meta.dict.subtype() == Some("XML");
    if !typed {
        let detail = "metadata stream is not typed /Metadata /XML".to_string();
        if xref.is_strict() {
            return Err(PdfError::rejected(DICT, "Metadata", xref.cur_obj(), detail));
        }
        warn!("{detail}");
    }
    Ok(())
}

fn validate_struct_tree_root(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(root) = dict_entry(xref, catalog, DICT, "StructTreeRoot", false, Version::V13, None)?
    else {
        return Ok(());
    };
    match root.dict_type() {
        Some("StructTreeRoot") => Ok(()),
        got => {
            let detail = match got {
                Some(other) => format!("/{other} is not /StructTreeRoot"),
                None => "structure tree root is missing /Type".to_string(),
            };
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "StructTreeRoot", xref.cur_obj(), detail));
            }
            warn!("{detail}");
            Ok(())
        }
    }
}

fn validate_mark_info(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(info) = dict_entry(xref, catalog, DICT, "MarkInfo", false, Version::V14, None)? else {
        return Ok(());
    };
    boolean_entry(xref, &info, "MarkInfo", "Marked", false, Version::V14)?;
    boolean_entry(xref, &info, "MarkInfo", "Suspects", false, Version::V16)?;
    boolean_entry(xref, &info, "MarkInfo", "UserProperties", false, Version::V16)?;
    Ok(())
}

fn validate_spider_info(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(info) = dict_entry(xref, catalog, DICT, "SpiderInfo", false, Version::V13, None)?
    else {
        return Ok(());
    };
    number_entry(xref, &info, "SpiderInfo", "V", true, Version::V13, None)?;
    array_entry(xref, &info, "SpiderInfo", "C", false, Version::V13, None)?;
    Ok(())
}

fn validate_output_intents(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    const SRC: &str = "output intent";
    let Some(intents) = array_entry(xref, catalog, DICT, "OutputIntents", false, Version::V14, None)?
    else {
        return Ok(());
    };
    for el in &intents {
        if let Object::Reference(r) = el {
            xref.set_cur_obj(r.obj_nr());
        }
        let intent = xref.dereference_dict(el, DICT, "OutputIntents")?;
        if let Some(t) = intent.dict_type() {
            if t != "OutputIntent" {
                return Err(PdfError::rejected(
                    SRC,
                    "Type",
                    xref.cur_obj(),
                    format!("/{t} is not /OutputIntent"),
                ));
            }
        }
        let s = name_entry(xref, &intent, SRC, "S", true, Version::V14, None)?;
        let pdfx = s.is_some_and(|s| s == "GTS_PDFX");
        string_entry(xref, &intent, SRC, "OutputConditionIdentifier", pdfx, Version::V14, None)?;
        string_entry(xref, &intent, SRC, "OutputCondition", false, Version::V14, None)?;
        string_entry(xref, &intent, SRC, "RegistryName", false, Version::V14, None)?;
        string_entry(xref, &intent, SRC, "Info", false, Version::V14, None)?;
        stream_entry(xref, &intent, SRC, "DestOutputProfile", false, Version::V14)?;
    }
    Ok(())
}

/// Every piece-info data dict carries a `/LastModified` date next to its
/// `/Private` payload.
fn validate_piece_info(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(pieces) = dict_entry(xref, catalog, DICT, "PieceInfo", false, Version::V14, None)?
    else {
        return Ok(());
    };
    for key in pieces.sorted_keys() {
        let Some(value) = pieces.get(key) else {
            continue;
        };
        let data = xref.dereference_dict(value, "piece info", key)?;
        match lenient_date_entry(xref, &data, "piece info", "LastModified", true, Version::V13) {
            Ok(_) => {}
            Err(PdfError::MissingRequired { .. }) if !xref.is_strict() => {
                warn!("piece info /{key} is missing /LastModified");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn validate_requirements(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(reqs) = array_entry(xref, catalog, DICT, "Requirements", false, Version::V17, None)?
    else {
        return Ok(());
    };
    for el in &reqs {
        let req = xref.dereference_dict(el, DICT, "Requirements")?;
        name_entry(xref, &req, "requirement", "S", true, Version::V17, Some(&|s: &str| {
            s == "EnableJavaScripts"
        }))?;
    }
    Ok(())
}

fn validate_collection(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(collection) = dict_entry(xref, catalog, DICT, "Collection", false, Version::V17, None)?
    else {
        return Ok(());
    };
    dict_entry(xref, &collection, "collection", "Schema", false, Version::V17, None)?;
    string_entry(xref, &collection, "collection", "D", false, Version::V17, None)?;
    name_entry(xref, &collection, "collection", "View", false, Version::V17, Some(&|v: &str| {
        matches!(v, "D" | "T" | "H")
    }))?;
    Ok(())
}
