//! Post-validation optimization.
//!
//! Two passes over the table: duplicate elimination across page resources,
//! then a mark-and-sweep over everything the trailer can still reach.
//! Duplicate detection compares md5 fingerprints of decoded content, so two
//! copies of one image stored with different filters still collapse.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::error::Result;
use crate::filters::decode_stream;
use crate::objects::{Dict, Object, Reference};
use crate::writer::serialize_object;
use crate::xref::{XRefEntry, XRefTable};

/// Runs both passes over a validated document.
pub fn optimize_document(xref: &mut XRefTable) -> Result<()> {
    eliminate_duplicates(xref)?;
    collect_garbage(xref)?;
    info!(
        fonts = xref.stats.fonts,
        duplicate_fonts = xref.stats.duplicate_fonts,
        images = xref.stats.images,
        duplicate_images = xref.stats.duplicate_images,
        freed = xref.stats.freed_objects,
        "optimization finished"
    );
    Ok(())
}

#[derive(Default)]
struct DedupState {
    font_canon: HashMap<[u8; 16], Reference>,
    image_canon: HashMap<[u8; 16], Reference>,
    seen_fonts: HashSet<u32>,
    seen_images: HashSet<u32>,
    /// Duplicate object number to its canonical reference.
    replacement: HashMap<u32, Reference>,
}

/// Walks the page tree and collapses identical `/Font` and `/XObject`
/// resources onto one canonical object each.
fn eliminate_duplicates(xref: &mut XRefTable) -> Result<()> {
    let catalog = xref.catalog()?;
    let Some(pages) = catalog.reference("Pages") else {
        return Ok(());
    };
    let mut state = DedupState::default();
    let mut visited = HashSet::new();
    walk_node(xref, pages.obj_nr(), &mut visited, &mut state)?;

    let mut duplicates: Vec<u32> = state.replacement.keys().copied().collect();
    duplicates.sort_unstable();
    for nr in duplicates {
        xref.free_object(nr, 0);
    }
    Ok(())
}

fn walk_node(
    xref: &mut XRefTable,
    node_nr: u32,
    visited: &mut HashSet<u32>,
    state: &mut DedupState,
) -> Result<()> {
    if !visited.insert(node_nr) {
        return Ok(());
    }
    let node = match xref.lookup(node_nr).and_then(|e| e.object()) {
        Some(Object::Dict(d)) => d.clone(),
        _ => return Ok(()),
    };
    if node.contains_key("Resources") {
        process_resources(xref, node_nr, &node, state)?;
    }
    if let Some(kids) = node.array("Kids") {
        let kid_nrs: Vec<u32> = kids
            .iter()
            .filter_map(|o| o.as_reference())
            .map(|r| r.obj_nr())
            .collect();
        for kid in kid_nrs {
            walk_node(xref, kid, visited, state)?;
        }
    }
    Ok(())
}

fn process_resources(
    xref: &mut XRefTable,
    owner_nr: u32,
    node: &Dict,
    state: &mut DedupState,
) -> Result<()> {
    let res_entry = node.get("Resources").cloned().unwrap_or(Object::Null);
    let resources = match xref.dereference_dict(&res_entry, "page", "Resources") {
        Ok(d) => d,
        Err(err) => {
            debug!(%err, obj_nr = owner_nr, "skipping malformed /Resources");
            return Ok(());
        }
    };

    for category in ["Font", "XObject"] {
        let Some(cat_entry) = resources.get(category) else {
            continue;
        };
        let category_dict = match xref.dereference_dict(cat_entry, "resources", category) {
            Ok(d) => d,
            Err(err) => {
                debug!(%err, category, "skipping malformed resource category");
                continue;
            }
        };
        for key in category_dict.sorted_keys() {
            let Some(Object::Reference(r)) = category_dict.get(key) else {
                // Inline resource values cannot be shared or freed.
                continue;
            };
            let target_nr = r.obj_nr();
            if let Some(&canon) = state.replacement.get(&target_nr) {
                rewrite_resource_entry(xref, owner_nr, category, key, canon)?;
                continue;
            }
            if category == "Font" {
                if is_font_dict(xref, target_nr) && state.seen_fonts.insert(target_nr) {
                    xref.stats.fonts += 1;
                }
                let Some(digest) = font_fingerprint(xref, target_nr)? else {
                    continue;
                };
                if let Some(&canon) = state.font_canon.get(&digest) {
                    if canon.obj_nr() != target_nr {
                        state.replacement.insert(target_nr, canon);
                        xref.stats.duplicate_fonts += 1;
                        rewrite_resource_entry(xref, owner_nr, category, key, canon)?;
                        debug!(
                            duplicate = target_nr,
                            canonical = canon.obj_nr(),
                            "collapsed duplicate font"
                        );
                    }
                } else {
                    state.font_canon.insert(digest, *r);
                }
            } else {
                if is_image_stream(xref, target_nr) && state.seen_images.insert(target_nr) {
                    xref.stats.images += 1;
                }
                let Some(digest) = image_fingerprint(xref, target_nr)? else {
                    continue;
                };
                if let Some(&canon) = state.image_canon.get(&digest) {
                    if canon.obj_nr() != target_nr {
                        state.replacement.insert(target_nr, canon);
                        xref.stats.duplicate_images += 1;
                        rewrite_resource_entry(xref, owner_nr, category, key, canon)?;
                        debug!(
                            duplicate = target_nr,
                            canonical = canon.obj_nr(),
                            "collapsed duplicate image"
                        );
                    }
                } else {
                    state.image_canon.insert(digest, *r);
                }
            }
        }
    }
    Ok(())
}

fn is_font_dict(xref: &XRefTable, obj_nr: u32) -> bool {
    matches!(
        xref.lookup(obj_nr).and_then(|e| e.object()),
        Some(Object::Dict(d)) if d.dict_type().map_or(true, |t| t == "Font")
    )
}

fn is_image_stream(xref: &XRefTable, obj_nr: u32) -> bool {
    matches!(
        xref.lookup(obj_nr).and_then(|e| e.object()),
        Some(Object::Stream(sd)) if sd.dict.subtype() == Some("Image")
    )
}

/// md5 over the font's defining content: base name, program key, and the
/// decoded font program. Fonts without an embedded program never dedup.
fn font_fingerprint(xref: &XRefTable, obj_nr: u32) -> Result<Option<[u8; 16]>> {
    let Some(Object::Dict(font)) = xref.lookup(obj_nr).and_then(|e| e.object()) else {
        return Ok(None);
    };
    let font = font.clone();

    // Type0 fonts keep the program on their single descendant.
    let carrier = if font.subtype() == Some("Type0") {
        let descendant = font
            .array("DescendantFonts")
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or(Object::Null);
        match xref.dereference_dict(&descendant, "font", "DescendantFonts") {
            Ok(d) => d,
            Err(_) => return Ok(None),
        }
    } else {
        font.clone()
    };

    let descriptor_entry = carrier.get("FontDescriptor").cloned().unwrap_or(Object::Null);
    if descriptor_entry.is_null() {
        return Ok(None);
    }
    let descriptor = match xref.dereference_dict(&descriptor_entry, "font", "FontDescriptor") {
        Ok(d) => d,
        Err(_) => return Ok(None),
    };

    for key in ["FontFile", "FontFile2", "FontFile3"] {
        let Some(program_entry) = descriptor.get(key) else {
            continue;
        };
        let sd = match xref.dereference_stream(program_entry, "font descriptor", key) {
            Ok(sd) => sd,
            Err(_) => return Ok(None),
        };
        let body = match decode_stream(&sd) {
            Ok(b) => b,
            Err(err) => {
                debug!(%err, obj_nr, "font program not decodable, skipping dedup");
                return Ok(None);
            }
        };
        let mut fingerprint = Vec::new();
        fingerprint.extend_from_slice(font.name("BaseFont").unwrap_or("").as_bytes());
        fingerprint.extend_from_slice(key.as_bytes());
        fingerprint.extend_from_slice(&body);
        return Ok(Some(md5::compute(&fingerprint).0));
    }
    Ok(None)
}

/// md5 over the stream dict (sorted keys, encoding entries dropped) plus
/// the decoded body.
fn image_fingerprint(xref: &XRefTable, obj_nr: u32) -> Result<Option<[u8; 16]>> {
    let Some(Object::Stream(sd)) = xref.lookup(obj_nr).and_then(|e| e.object()) else {
        return Ok(None);
    };
    if sd.dict.subtype() != Some("Image") {
        return Ok(None);
    }
    let sd = sd.clone();
    let body = match decode_stream(&sd) {
        Ok(b) => b,
        Err(err) => {
            debug!(%err, obj_nr, "image not decodable, skipping dedup");
            return Ok(None);
        }
    };
    let mut fingerprint = Vec::new();
    for key in sd.dict.sorted_keys() {
        if matches!(key.as_str(), "Length" | "Filter" | "DecodeParms" | "DecodeParm") {
            continue;
        }
        fingerprint.extend_from_slice(key.as_bytes());
        if let Some(value) = sd.dict.get(key) {
            fingerprint.extend_from_slice(&serialize_object(value));
        }
    }
    fingerprint.extend_from_slice(&body);
    Ok(Some(md5::compute(&fingerprint).0))
}

/// Points `Resources/<category>/<name>` under the page node `owner_nr` at
/// `target`, following one indirection at either level.
fn rewrite_resource_entry(
    xref: &mut XRefTable,
    owner_nr: u32,
    category: &str,
    name: &str,
    target: Reference,
) -> Result<()> {
    let owner = match xref.lookup(owner_nr).and_then(|e| e.object()) {
        Some(Object::Dict(d)) => d.clone(),
        _ => return Ok(()),
    };
    let res_obj = owner.get("Resources").cloned().unwrap_or(Object::Null);
    match res_obj {
        Object::Reference(res_ref) => {
            let resources = match xref.lookup(res_ref.obj_nr()).and_then(|e| e.object()) {
                Some(Object::Dict(d)) => d.clone(),
                _ => return Ok(()),
            };
            match resources.get(category) {
                Some(Object::Reference(cat_ref)) => {
                    xref.set_dict_entry(cat_ref.obj_nr(), name, Object::Reference(target))
                }
                Some(Object::Dict(_)) => {
                    let mut resources = resources;
                    if let Some(Object::Dict(cat)) = resources.get_mut(category) {
                        cat.set(name, target);
                    }
                    xref.update_object(res_ref.obj_nr(), Object::Dict(resources))
                }
                _ => Ok(()),
            }
        }
        Object::Dict(resources) => match resources.get(category) {
            Some(Object::Reference(cat_ref)) => {
                xref.set_dict_entry(cat_ref.obj_nr(), name, Object::Reference(target))
            }
            Some(Object::Dict(_)) => {
                let mut owner = owner;
                if let Some(Object::Dict(res)) = owner.get_mut("Resources") {
                    if let Some(Object::Dict(cat)) = res.get_mut(category) {
                        cat.set(name, target);
                    }
                }
                xref.update_object(owner_nr, Object::Dict(owner))
            }
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

/// Marks everything reachable from the trailer, then sweeps the rest onto
/// the free list.
pub(crate) fn collect_garbage(xref: &mut XRefTable) -> Result<()> {
    let mut reachable: HashSet<u32> = HashSet::new();
    let mut pending: Vec<Object> = xref.trailer.iter().map(|(_, v)| v.clone()).collect();
    while let Some(obj) = pending.pop() {
        match obj {
            Object::Reference(r) => {
                if reachable.insert(r.obj_nr()) {
                    if let Some(target) = xref.lookup(r.obj_nr()).and_then(|e| e.object()) {
                        pending.push(target.clone());
                    }
                }
            }
            Object::Array(items) => pending.extend(items),
            Object::Dict(d) => pending.extend(d.iter().map(|(_, v)| v.clone())),
            Object::Stream(sd) => pending.extend(sd.dict.iter().map(|(_, v)| v.clone())),
            _ => {}
        }
    }

    // A reachable compressed object keeps its carrier stream alive.
    let carriers: Vec<u32> = xref
        .sorted_obj_nrs()
        .into_iter()
        .filter(|nr| reachable.contains(nr))
        .filter_map(|nr| match xref.lookup(nr) {
            Some(XRefEntry::Compressed { stream_obj_nr, .. }) => Some(*stream_obj_nr),
            _ => None,
        })
        .collect();
    reachable.extend(carriers);

    let mut freed = 0u32;
    for nr in xref.sorted_obj_nrs() {
        if nr == 0 || reachable.contains(&nr) {
            continue;
        }
        if matches!(xref.lookup(nr), Some(e) if !e.is_free()) {
            xref.free_object(nr, 0);
            freed += 1;
            debug!(obj_nr = nr, "freed unreachable object");
        }
    }
    xref.stats.freed_objects += freed;
    xref.relink_free_list();
    Ok(())
}
