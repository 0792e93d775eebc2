//! Name and number tree validation (ISO 32000-1, 7.9.6 and 7.9.7).
//!
//! Trees are walked depth-first. Leaves carry sorted key/value pairs;
//! interior nodes carry `/Limits` covering their subtree. Validated name
//! trees are flattened into the table so later walkers (destinations,
//! embedded files) can resolve keys without touching the tree again.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::actions::validate_action;
use crate::validate::destinations::{validate_destination_array, DestinationStatus};
use crate::validate::filespec::validate_file_spec_dict;
use crate::validate::entries::{array_entry, integer_entry, name_entry, string_entry};
use crate::version::Version;
use crate::xref::XRefTable;

/// Validates a name tree and flattens it into `xref` under `tree`.
/// Returns the key range the node covers, `None` for an empty node.
pub fn validate_name_tree(
    xref: &mut XRefTable,
    tree: &str,
    obj: &Object,
    root: bool,
) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let src = format!("{tree} name tree");
    if let Object::Reference(r) = obj {
        if !xref.mark(r.obj_nr()) {
            return Err(PdfError::corrupt(
                r.obj_nr(),
                format!("{src} contains a node cycle"),
            ));
        }
        xref.set_cur_obj(r.obj_nr());
    }
    let dict = xref.dereference_dict(obj, &src, "node")?;

    let kids = dict.get("Kids").cloned();
    let names = dict.get("Names").cloned();
    if kids.is_some() && names.is_some() {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            format!("{src} node has both /Kids and /Names"),
        ));
    }

    let range = if let Some(kids) = kids {
        let kids = xref.dereference_array(&kids, &src, "Kids")?;
        if kids.is_empty() {
            return Err(PdfError::corrupt(
                xref.cur_obj(),
                format!("{src} node has an empty /Kids array"),
            ));
        }
        let mut lo: Option<Vec<u8>> = None;
        let mut hi: Option<Vec<u8>> = None;
        for kid in &kids {
            if let Some((kid_lo, kid_hi)) = validate_name_tree(xref, tree, kid, false)? {
                if lo.as_ref().map_or(true, |lo| kid_lo < *lo) {
                    lo = Some(kid_lo);
                }
                if hi.as_ref().map_or(true, |hi| kid_hi > *hi) {
                    hi = Some(kid_hi);
                }
            }
        }
        lo.zip(hi)
    } else if let Some(names) = names {
        let names = xref.dereference_array(&names, &src, "Names")?;
        validate_name_leaf(xref, tree, &src, &names)?
    } else if root {
        // An empty root is a legal, if pointless, tree.
        None
    } else {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            format!("{src} node has neither /Kids nor /Names"),
        ));
    };

    check_limits(xref, &dict, &src, root, range.as_ref(), |o| {
        o.as_string_bytes().map(<[u8]>::to_vec)
    })?;

    Ok(range)
}

fn validate_name_leaf(
    xref: &mut XRefTable,
    tree: &str,
    src: &str,
    names: &[Object],
) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    if names.len() % 2 != 0 {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            format!("{src} /Names array has odd length {}", names.len()),
        ));
    }

    let mut prev: Option<Vec<u8>> = None;
    let mut lo: Option<Vec<u8>> = None;
    let mut hi: Option<Vec<u8>> = None;

    for pair in names.chunks_exact(2) {
        let key_obj = xref.dereference(&pair[0])?;
        let Some(key) = key_obj.as_string_bytes() else {
            return Err(PdfError::TypeMismatch {
                dict: src.to_string(),
                entry: "Names".to_string(),
                expected: "string",
                found: key_obj.type_name(),
                obj_nr: xref.cur_obj(),
            });
        };
        let key = key.to_vec();

        if let Some(prev) = &prev {
            if key < *prev {
                let detail = format!("{src} keys are not sorted");
                if xref.is_strict() {
                    return Err(PdfError::corrupt(xref.cur_obj(), detail));
                }
                warn!("{detail}");
            }
        }

        if validate_tree_value(xref, tree, &key, &pair[1])? {
            xref.name_tree_mut(tree).insert(key.clone(), pair[1].clone());
        }

        if lo.as_ref().map_or(true, |lo| key < *lo) {
            lo = Some(key.clone());
        }
        if hi.as_ref().map_or(true, |hi| key > *hi) {
            hi = Some(key.clone());
        }
        prev = Some(key);
    }

    Ok(lo.zip(hi))
}

/// Validates one leaf value. Returns false when relaxed mode drops the
/// pair instead of keeping it.
pub(crate) fn validate_tree_value(
    xref: &mut XRefTable,
    tree: &str,
    key: &[u8],
    value: &Object,
) -> Result<bool> {
    match tree {
        "Dests" => {
            let resolved = xref.dereference(value)?;
            let arr = match &resolved {
                Object::Array(a) => a.clone(),
                // 12.3.2.3: the tree may wrap the array in a dict under /D.
                Object::Dict(d) => {
                    let Some(inner) = d.get("D") else {
                        return Err(PdfError::MissingRequired {
                            dict: "destination value".to_string(),
                            entry: "D".to_string(),
                            obj_nr: xref.cur_obj(),
                        });
                    };
                    xref.dereference_array(inner, "destination value", "D")?
                }
                other => {
                    return Err(PdfError::TypeMismatch {
                        dict: "Dests name tree".to_string(),
                        entry: "value".to_string(),
                        expected: "array or dict",
                        found: other.type_name(),
                        obj_nr: xref.cur_obj(),
                    });
                }
            };
            match validate_destination_array(xref, &arr, "named destination")? {
                DestinationStatus::Valid => Ok(true),
                DestinationStatus::DanglingPage => {
                    xref.note_repair(format!(
                        "dropped named destination ({}) with dangling page",
                        String::from_utf8_lossy(key)
                    ));
                    Ok(false)
                }
            }
        }
        "EmbeddedFiles" => {
            match xref.dereference(value)? {
                Object::StringLiteral(_) | Object::HexLiteral(_) => {}
                Object::Dict(d) => validate_file_spec_dict(xref, &d)?,
                other => {
                    return Err(PdfError::TypeMismatch {
                        dict: "EmbeddedFiles name tree".to_string(),
                        entry: "value".to_string(),
                        expected: "file specification",
                        found: other.type_name(),
                        obj_nr: xref.cur_obj(),
                    });
                }
            }
            Ok(true)
        }
        "JavaScript" => {
            validate_action(xref, value, "JavaScript name tree")?;
            Ok(true)
        }
        "AP" => {
            xref.dereference_stream(value, "AP name tree", "value")?;
            Ok(true)
        }
        "Pages" | "Templates" => {
            xref.dereference_dict(value, tree, "value")?;
            Ok(true)
        }
        _ => Ok(true),
    }
}

/// Validates a number tree. Returns the key range the node covers.
pub fn validate_number_tree(
    xref: &mut XRefTable,
    tree: &str,
    obj: &Object,
    root: bool,
) -> Result<Option<(i64, i64)>> {
    let src = format!("{tree} number tree");
    if let Object::Reference(r) = obj {
        if !xref.mark(r.obj_nr()) {
            return Err(PdfError::corrupt(
                r.obj_nr(),
                format!("{src} contains a node cycle"),
            ));
        }
        xref.set_cur_obj(r.obj_nr());
    }
    let dict = xref.dereference_dict(obj, &src, "node")?;

    let kids = dict.get("Kids").cloned();
    let nums = dict.get("Nums").cloned();
    if kids.is_some() && nums.is_some() {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            format!("{src} node has both /Kids and /Nums"),
        ));
    }

    let range = if let Some(kids) = kids {
        let kids = xref.dereference_array(&kids, &src, "Kids")?;
        if kids.is_empty() {
            return Err(PdfError::corrupt(
                xref.cur_obj(),
                format!("{src} node has an empty /Kids array"),
            ));
        }
        let mut lo: Option<i64> = None;
        let mut hi: Option<i64> = None;
        for kid in &kids {
            if let Some((kid_lo, kid_hi)) = validate_number_tree(xref, tree, kid, false)? {
                lo = Some(lo.map_or(kid_lo, |lo| lo.min(kid_lo)));
                hi = Some(hi.map_or(kid_hi, |hi| hi.max(kid_hi)));
            }
        }
        lo.zip(hi)
    } else if let Some(nums) = nums {
        let nums = xref.dereference_array(&nums, &src, "Nums")?;
        validate_number_leaf(xref, tree, &src, &nums)?
    } else if root {
        None
    } else {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            format!("{src} node has neither /Kids nor /Nums"),
        ));
    };

    check_limits(xref, &dict, &src, root, range.as_ref(), Object::as_integer)?;

    Ok(range)
}

fn validate_number_leaf(
    xref: &mut XRefTable,
    tree: &str,
    src: &str,
    nums: &[Object],
) -> Result<Option<(i64, i64)>> {
    if nums.len() % 2 != 0 {
        return Err(PdfError::corrupt(
            xref.cur_obj(),
            format!("{src} /Nums array has odd length {}", nums.len()),
        ));
    }

    let mut prev: Option<i64> = None;
    let mut lo: Option<i64> = None;
    let mut hi: Option<i64> = None;

    for pair in nums.chunks_exact(2) {
        let key = xref.dereference_integer(&pair[0], src, "Nums")?;
        if let Some(prev) = prev {
            if key < prev {
                let detail = format!("{src} keys are not sorted");
                if xref.is_strict() {
                    return Err(PdfError::corrupt(xref.cur_obj(), detail));
                }
                warn!("{detail}");
            }
        }

        validate_number_value(xref, tree, &pair[1])?;

        lo = Some(lo.map_or(key, |lo| lo.min(key)));
        hi = Some(hi.map_or(key, |hi| hi.max(key)));
        prev = Some(key);
    }

    Ok(lo.zip(hi))
}

fn validate_number_value(xref: &mut XRefTable, tree: &str, value: &Object) -> Result<()> {
    match tree {
        "PageLabels" => {
            let d = xref.dereference_dict(value, "page label", "value")?;
            validate_page_label_dict(xref, &d)
        }
        _ => Ok(()),
    }
}

/// Page label dict (ISO 32000-1, 12.4.2).
fn validate_page_label_dict(xref: &XRefTable, dict: &Dict) -> Result<()> {
    const DICT: &str = "page label";
    if let Some(t) = dict.dict_type() {
        if t != "PageLabel" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /PageLabel"),
            ));
        }
    }
    name_entry(xref, dict, DICT, "S", false, Version::V13, Some(&|s: &str| {
        matches!(s, "D" | "R" | "r" | "A" | "a")
    }))?;
    string_entry(xref, dict, DICT, "P", false, Version::V13, None)?;
    integer_entry(xref, dict, DICT, "St", false, Version::V13, Some(&|i: &i64| {
        *i >= 1
    }))?;
    Ok(())
}

/// Shared `/Limits` handling: required on non-root nodes; must cover the
/// node's actual key range.
fn check_limits<K: Ord + std::fmt::Debug>(
    xref: &XRefTable,
    dict: &Dict,
    src: &str,
    root: bool,
    range: Option<&(K, K)>,
    extract: impl Fn(&Object) -> Option<K>,
) -> Result<()> {
    let limits = array_entry(xref, dict, src, "Limits", !root, Version::V10, Some(&|a: &[Object]| {
        a.len() == 2
    }));
    let limits = match limits {
        Ok(l) => l,
        Err(e) if !xref.is_strict() => {
            warn!(node = src, "unusable /Limits: {e}");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let Some(limits) = limits else {
        return Ok(());
    };

    let lo = xref.dereference(&limits[0]).ok().and_then(|o| extract(&o));
    let hi = xref.dereference(&limits[1]).ok().and_then(|o| extract(&o));
    let (Some(lo), Some(hi)) = (lo, hi) else {
        let detail = format!("{src} /Limits elements have the wrong type");
        if xref.is_strict() {
            return Err(PdfError::corrupt(xref.cur_obj(), detail));
        }
        warn!("{detail}");
        return Ok(());
    };

    if let Some((min, max)) = range {
        if *min < lo || *max > hi {
            let detail = format!("{src} /Limits {lo:?}..{hi:?} do not cover keys {min:?}..{max:?}");
            if xref.is_strict() {
                return Err(PdfError::corrupt(xref.cur_obj(), detail));
            }
            warn!("{detail}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationMode;
    use crate::objects::Reference;

    fn xref_with_page() -> XRefTable {
        let mut xref = XRefTable::default();
        xref.insert_object(5, Dict::new().with("Type", Object::name("Page")));
        xref
    }

    fn dest(page: u32) -> Object {
        Object::Array(vec![
            Object::Reference(Reference::new(page, 0)),
            Object::name("Fit"),
        ])
    }

    fn leaf(names: Vec<Object>) -> Object {
        Object::Dict(Dict::new().with("Names", names))
    }

    #[test]
    fn test_leaf_tree_flattens() {
        let mut xref = xref_with_page();
        let tree = leaf(vec![
            Object::string("alpha"),
            dest(5),
            Object::string("beta"),
            dest(5),
        ]);
        assert!(validate_name_tree(&mut xref, "Dests", &tree, true).is_ok());
        assert!(xref.lookup_name("Dests", b"alpha").is_some());
        assert!(xref.lookup_name("Dests", b"beta").is_some());
    }

    #[test]
    fn test_dangling_destination_dropped_in_relaxed() {
        let mut xref = xref_with_page();
        let tree = leaf(vec![
            Object::string("good"),
            dest(5),
            Object::string("gone"),
            dest(42),
        ]);
        assert!(validate_name_tree(&mut xref, "Dests", &tree, true).is_ok());
        assert!(xref.lookup_name("Dests", b"good").is_some());
        assert!(xref.lookup_name("Dests", b"gone").is_none());
        assert_eq!(xref.stats.repairs.len(), 1);
    }

    #[test]
    fn test_dangling_destination_fails_strict() {
        let mut xref = xref_with_page();
        xref.validation_mode = ValidationMode::Strict;
        let tree = Object::Dict(
            Dict::new().with("Names", vec![Object::string("gone"), dest(42)]),
        );
        assert!(matches!(
            validate_name_tree(&mut xref, "Dests", &tree, true),
            Err(PdfError::DanglingRef { obj_nr: 42, .. })
        ));
    }

    #[test]
    fn test_interior_nodes_and_limits() {
        let mut xref = xref_with_page();
        let kid1 = xref.push_object(
            Dict::new()
                .with("Limits", vec![Object::string("a"), Object::string("c")])
                .with("Names", vec![Object::string("a"), dest(5), Object::string("c"), dest(5)]),
        );
        let kid2 = xref.push_object(
            Dict::new()
                .with("Limits", vec![Object::string("f"), Object::string("k")])
                .with("Names", vec![Object::string("f"), dest(5), Object::string("k"), dest(5)]),
        );
        let root = Object::Dict(Dict::new().with("Kids", vec![kid1.into(), kid2.into()]));
        let range = validate_name_tree(&mut xref, "Dests", &root, true);
        let range = range.ok().flatten();
        assert_eq!(range, Some((b"a".to_vec(), b"k".to_vec())));
        assert_eq!(xref.name_tree("Dests").map(|t| t.len()), Some(4));
    }

    #[test]
    fn test_limits_must_cover_keys_strict() {
        let mut xref = xref_with_page();
        xref.validation_mode = ValidationMode::Strict;
        let kid = xref.push_object(
            Dict::new()
                .with("Limits", vec![Object::string("a"), Object::string("b")])
                .with(
                    "Names",
                    vec![Object::string("a"), dest(5), Object::string("z"), dest(5)],
                ),
        );
        let root = Object::Dict(Dict::new().with("Kids", vec![kid.into()]));
        assert!(matches!(
            validate_name_tree(&mut xref, "Dests", &root, true),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_unsorted_keys_strict_vs_relaxed() {
        let names = vec![
            Object::string("zeta"),
            dest(5),
            Object::string("alpha"),
            dest(5),
        ];
        let mut xref = xref_with_page();
        assert!(validate_name_tree(&mut xref, "Dests", &leaf(names.clone()), true).is_ok());

        let mut xref = xref_with_page();
        xref.validation_mode = ValidationMode::Strict;
        assert!(matches!(
            validate_name_tree(&mut xref, "Dests", &leaf(names), true),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_node_cycle_detected() {
        let mut xref = xref_with_page();
        xref.insert_object(
            20,
            Dict::new().with("Kids", vec![Object::Reference(Reference::new(20, 0))]),
        );
        let root = Object::Reference(Reference::new(20, 0));
        assert!(matches!(
            validate_name_tree(&mut xref, "Dests", &root, true),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_kids_and_names_conflict() {
        let mut xref = xref_with_page();
        let node = Object::Dict(
            Dict::new()
                .with("Kids", Vec::<Object>::new())
                .with("Names", Vec::<Object>::new()),
        );
        assert!(matches!(
            validate_name_tree(&mut xref, "Dests", &node, true),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_number_tree_page_labels() {
        let mut xref = XRefTable::default();
        let node = Object::Dict(Dict::new().with(
            "Nums",
            vec![
                Object::Integer(0),
                Object::Dict(Dict::new().with("S", Object::name("r"))),
                Object::Integer(4),
                Object::Dict(Dict::new().with("S", Object::name("D")).with("St", 1)),
            ],
        ));
        let range = validate_number_tree(&mut xref, "PageLabels", &node, true);
        assert_eq!(range.ok().flatten(), Some((0, 4)));
    }

    #[test]
    fn test_number_tree_rejects_bad_label_style() {
        let mut xref = XRefTable::default();
        let node = Object::Dict(Dict::new().with(
            "Nums",
            vec![
                Object::Integer(0),
                Object::Dict(Dict::new().with("S", Object::name("Q"))),
            ],
        ));
        assert!(matches!(
            validate_number_tree(&mut xref, "PageLabels", &node, true),
            Err(PdfError::ValueRejected { .. })
        ));
    }

    #[test]
    fn test_non_root_requires_limits_strict() {
        let mut xref = xref_with_page();
        xref.validation_mode = ValidationMode::Strict;
        let kid = xref.push_object(Dict::new().with(
            "Names",
            vec![Object::string("a"), dest(5)],
        ));
        let root = Object::Dict(Dict::new().with("Kids", vec![kid.into()]));
        assert!(matches!(
            validate_name_tree(&mut xref, "Dests", &root, true),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "Limits"
        ));
    }
}
