//! Outline (bookmark) tree validation (ISO 32000-1, 12.3.3).
//!
//! Outline levels are doubly linked sibling chains under a parent.
//! Producers mangle these links more often than any other structure, so
//! relaxed mode carries a small repair kit: orphaned `/Prev` heads are
//! stripped, stale links are rewired, and `/Count` is recomputed. Strict
//! mode fails on the first inconsistency.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::actions::validate_action;
use crate::validate::destinations::validate_destination_entry;
use crate::validate::entries::{array_entry, integer_entry, string_entry};
use crate::version::Version;
use crate::xref::XRefTable;

/// Validates the catalog's `/Outlines` tree, when present.
pub fn validate_outlines(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    const DICT: &str = "outline root";
    let Some(outlines) = catalog.get("Outlines").cloned() else {
        return Ok(());
    };
    let root_nr = match &outlines {
        Object::Reference(r) => {
            xref.set_cur_obj(r.obj_nr());
            Some(r.obj_nr())
        }
        _ if xref.is_strict() => {
            return Err(PdfError::TypeMismatch {
                dict: "catalog".to_string(),
                entry: "Outlines".to_string(),
                expected: "indirect reference",
                found: outlines.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
        _ => {
            warn!("catalog /Outlines is written inline instead of as a reference");
            None
        }
    };
    let root = match xref.dereference(&outlines)? {
        Object::Dict(d) => d,
        Object::Null => {
            xref.note_repair("ignored dangling /Outlines".to_string());
            return Ok(());
        }
        other => {
            return Err(PdfError::TypeMismatch {
                dict: "catalog".to_string(),
                entry: "Outlines".to_string(),
                expected: "dict",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    };

    if let Some(t) = root.dict_type() {
        if t != "Outlines" {
            let detail = format!("/{t} is not /Outlines");
            if xref.is_strict() {
                return Err(PdfError::rejected(DICT, "Type", xref.cur_obj(), detail));
            }
            warn!("{detail}");
        }
    }
    if let Some(nr) = root_nr {
        xref.mark(nr);
    }

    let first = root.reference("First");
    let last = root.reference("Last");
    let visible = match (first, last) {
        (None, None) => 0,
        (Some(first), Some(last)) => {
            validate_level(xref, root_nr, first.obj_nr(), last.obj_nr())?
        }
        (one, _) => {
            let detail = "outline root has /First or /Last but not both".to_string();
            if xref.is_strict() {
                return Err(PdfError::corrupt(root_nr.unwrap_or(0), detail));
            }
            if let Some(nr) = root_nr {
                let present = if one.is_some() { "First" } else { "Last" };
                xref.remove_dict_entry(nr, present)?;
                xref.note_repair(format!("{detail}, treating the outline as empty"));
            } else {
                warn!("{detail}");
            }
            0
        }
    };

    if let Some(declared) = integer_entry(xref, &root, DICT, "Count", false, Version::V10, None)? {
        if declared < 0 || declared != visible as i64 {
            let detail = format!("outline root declares /Count {declared}, found {visible}");
            if xref.is_strict() {
                return Err(PdfError::corrupt(root_nr.unwrap_or(0), detail));
            }
            if let Some(nr) = root_nr {
                xref.set_dict_entry(nr, "Count", Object::Integer(visible as i64))?;
                xref.note_repair(format!("{detail}, corrected"));
            } else {
                warn!("{detail}");
            }
        }
    }
    Ok(())
}

/// Walks one sibling chain. Returns the number of items visible when the
/// parent is open: the direct children plus the visible counts of every
/// open child.
fn validate_level(
    xref: &mut XRefTable,
    parent_nr: Option<u32>,
    first_nr: u32,
    last_nr: u32,
) -> Result<u32> {
    const DICT: &str = "outline item";
    let mut visible: u32 = 0;
    let mut prev_nr: Option<u32> = None;
    let mut cur_nr = first_nr;

    loop {
        if !xref.mark(cur_nr) {
            let detail = format!("outline item obj#{cur_nr} appears twice");
            if xref.is_strict() {
                return Err(PdfError::corrupt(cur_nr, detail));
            }
            // Cut the chain before the duplicate.
            match prev_nr {
                Some(prev) => xref.remove_dict_entry(prev, "Next")?,
                None => {
                    if let Some(parent) = parent_nr {
                        xref.remove_dict_entry(parent, "First")?;
                        xref.remove_dict_entry(parent, "Last")?;
                    }
                }
            }
            xref.note_repair(format!("{detail}, chain truncated"));
            break;
        }
        xref.set_cur_obj(cur_nr);
        let dict = xref.dereference_dict(
            &Object::Reference(crate::objects::Reference::new(cur_nr, 0)),
            DICT,
            "Next",
        )?;

        string_entry(xref, &dict, DICT, "Title", true, Version::V10, None)?;
        if parent_nr.is_some() {
            check_backlink(xref, &dict, cur_nr, "Parent", parent_nr)?;
        }
        check_backlink(xref, &dict, cur_nr, "Prev", prev_nr)?;

        // Target: a destination or an action, not both.
        if dict.contains_key("Dest") && dict.contains_key("A") {
            let detail = format!("outline item obj#{cur_nr} has both /Dest and /A");
            if xref.is_strict() {
                return Err(PdfError::corrupt(cur_nr, detail));
            }
            warn!("{detail}, ignoring /Dest");
        }
        if let Some(a) = dict.get("A").cloned() {
            xref.validate_version("outline item action", Version::V11)?;
            validate_action(xref, &a, DICT)?;
            xref.set_cur_obj(cur_nr);
        } else {
            validate_destination_entry(xref, &dict, DICT, "Dest", false, Version::V10)?;
        }

        if let Some(c) = array_entry(xref, &dict, DICT, "C", false, Version::V14, Some(&|a: &[Object]| {
            a.len() == 3
        }))? {
            for el in &c {
                xref.dereference_number(el, DICT, "C")?;
            }
        }
        integer_entry(xref, &dict, DICT, "F", false, Version::V14, Some(&|f: &i64| {
            (0..=3).contains(f)
        }))?;

        let children_visible = validate_children(xref, cur_nr, &dict)?;

        let declared = integer_entry(xref, &dict, DICT, "Count", false, Version::V10, None)?;
        let open = match declared {
            Some(c) if children_visible.is_none() => {
                let detail = format!("outline leaf obj#{cur_nr} declares /Count {c}");
                if xref.is_strict() {
                    return Err(PdfError::rejected(DICT, "Count", cur_nr, detail));
                }
                warn!("{detail}");
                false
            }
            Some(c) => {
                let expected = children_visible.unwrap_or(0) as i64;
                if c.abs() != expected {
                    let detail =
                        format!("outline item obj#{cur_nr} declares /Count {c}, found {expected}");
                    if xref.is_strict() {
                        return Err(PdfError::corrupt(cur_nr, detail));
                    }
                    xref.set_dict_entry(
                        cur_nr,
                        "Count",
                        Object::Integer(if c < 0 { -expected } else { expected }),
                    )?;
                    xref.note_repair(format!("{detail}, corrected"));
                }
                c > 0
            }
            None => false,
        };

        visible += 1;
        if open {
            visible += children_visible.unwrap_or(0);
        }

        match dict.reference("Next") {
            Some(next) => {
                prev_nr = Some(cur_nr);
                cur_nr = next.obj_nr();
            }
            None => {
                if cur_nr != last_nr {
                    let detail = format!(
                        "outline chain ends at obj#{cur_nr} but the parent's /Last is obj#{last_nr}"
                    );
                    if xref.is_strict() {
                        return Err(PdfError::corrupt(cur_nr, detail));
                    }
                    if let Some(parent) = parent_nr {
                        xref.set_dict_entry(
                            parent,
                            "Last",
                            Object::Reference(crate::objects::Reference::new(cur_nr, 0)),
                        )?;
                        xref.note_repair(format!("{detail}, rewired"));
                    } else {
                        warn!("{detail}");
                    }
                }
                break;
            }
        }
    }
    Ok(visible)
}

/// `/First` and `/Last` come in pairs; walks the child level when both
/// are present. `None` means the item is a leaf.
fn validate_children(xref: &mut XRefTable, item_nr: u32, dict: &Dict) -> Result<Option<u32>> {
    match (dict.reference("First"), dict.reference("Last")) {
        (None, None) => Ok(None),
        (Some(first), Some(last)) => {
            Ok(Some(validate_level(xref, Some(item_nr), first.obj_nr(), last.obj_nr())?))
        }
        (one, _) => {
            let detail = format!("outline item obj#{item_nr} has /First or /Last but not both");
            if xref.is_strict() {
                return Err(PdfError::corrupt(item_nr, detail));
            }
            let present = if one.is_some() { "First" } else { "Last" };
            xref.remove_dict_entry(item_nr, present)?;
            xref.note_repair(format!("{detail}, treating the item as a leaf"));
            Ok(None)
        }
    }
}

/// Back-pointers (`/Parent`, `/Prev`) must match the position the walk
/// arrived from. `expected == None` means the entry must be absent.
fn check_backlink(
    xref: &mut XRefTable,
    dict: &Dict,
    item_nr: u32,
    key: &str,
    expected: Option<u32>,
) -> Result<()> {
    let actual = dict.reference(key).map(|r| r.obj_nr());
    match (actual, expected) {
        (a, e) if a == e => Ok(()),
        (Some(_), None) => {
            let detail = format!("first outline item obj#{item_nr} carries /{key}");
            if xref.is_strict() {
                return Err(PdfError::corrupt(item_nr, detail));
            }
            xref.remove_dict_entry(item_nr, key)?;
            xref.note_repair(format!("{detail}, stripped"));
            Ok(())
        }
        (_, Some(e)) => {
            let detail = match actual {
                Some(nr) => format!("outline item obj#{item_nr} /{key} points at obj#{nr} instead of obj#{e}"),
                None => format!("outline item obj#{item_nr} is missing /{key}"),
            };
            if xref.is_strict() {
                return Err(PdfError::corrupt(item_nr, detail));
            }
            xref.set_dict_entry(
                item_nr,
                key,
                Object::Reference(crate::objects::Reference::new(e, 0)),
            )?;
            xref.note_repair(format!("{detail}, rewired"));
            Ok(())
        }
        (None, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationMode;
    use crate::objects::Reference;

    fn item(title: &str, parent: u32) -> Dict {
        Dict::new()
            .with("Title", Object::string(title))
            .with("Parent", Reference::new(parent, 0))
    }

    /// Root 10 with children 11 and 12.
    fn outline_xref() -> XRefTable {
        let mut xref = XRefTable::default();
        xref.insert_object(
            10,
            Dict::new()
                .with("Type", Object::name("Outlines"))
                .with("First", Reference::new(11, 0))
                .with("Last", Reference::new(12, 0))
                .with("Count", 2),
        );
        xref.insert_object(11, item("One", 10).with("Next", Reference::new(12, 0)));
        xref.insert_object(12, item("Two", 10).with("Prev", Reference::new(11, 0)));
        xref
    }

    fn catalog() -> Dict {
        Dict::new().with("Outlines", Reference::new(10, 0))
    }

    #[test]
    fn test_intact_outline_passes() {
        let mut xref = outline_xref();
        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_outlines(&mut xref, &catalog()).is_ok());
        assert!(xref.stats.repairs.is_empty());
    }

    #[test]
    fn test_orphan_prev_stripped_and_idempotent() {
        let mut xref = XRefTable::default();
        xref.insert_object(
            10,
            Dict::new()
                .with("First", Reference::new(11, 0))
                .with("Last", Reference::new(11, 0)),
        );
        xref.insert_object(11, item("Lone", 10).with("Prev", Reference::new(11, 0)));

        assert!(validate_outlines(&mut xref, &catalog()).is_ok());
        assert_eq!(xref.stats.repairs.len(), 1);
        let fixed = xref
            .dereference_dict(&Object::Reference(Reference::new(11, 0)), "t", "t")
            .unwrap();
        assert!(!fixed.contains_key("Prev"));

        // A second pass over the repaired table finds nothing to fix.
        xref.reset_validation_state();
        xref.stats.repairs.clear();
        assert!(validate_outlines(&mut xref, &catalog()).is_ok());
        assert!(xref.stats.repairs.is_empty());
    }

    #[test]
    fn test_orphan_prev_fails_strict() {
        let mut xref = XRefTable::default();
        xref.insert_object(
            10,
            Dict::new()
                .with("First", Reference::new(11, 0))
                .with("Last", Reference::new(11, 0)),
        );
        xref.insert_object(11, item("Lone", 10).with("Prev", Reference::new(11, 0)));
        xref.validation_mode = ValidationMode::Strict;
        assert!(matches!(
            validate_outlines(&mut xref, &catalog()),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_sibling_cycle_truncated_in_relaxed() {
        let mut xref = outline_xref();
        // 12 loops back to 11.
        xref.set_dict_entry(12, "Next", Object::Reference(Reference::new(11, 0)))
            .unwrap();
        assert!(validate_outlines(&mut xref, &catalog()).is_ok());
        assert!(xref.stats.repairs.iter().any(|r| r.contains("truncated")));
        let twelve = xref
            .dereference_dict(&Object::Reference(Reference::new(12, 0)), "t", "t")
            .unwrap();
        assert!(!twelve.contains_key("Next"));
    }

    #[test]
    fn test_root_count_recomputed() {
        let mut xref = outline_xref();
        xref.set_dict_entry(10, "Count", Object::Integer(9)).unwrap();
        assert!(validate_outlines(&mut xref, &catalog()).is_ok());
        let root = xref
            .dereference_dict(&Object::Reference(Reference::new(10, 0)), "t", "t")
            .unwrap();
        assert_eq!(root.integer("Count"), Some(2));
    }

    #[test]
    fn test_open_children_add_to_visible_count() {
        let mut xref = outline_xref();
        // Item 11 gains two children and is open.
        xref.set_dict_entry(11, "First", Object::Reference(Reference::new(13, 0)))
            .unwrap();
        xref.set_dict_entry(11, "Last", Object::Reference(Reference::new(14, 0)))
            .unwrap();
        xref.set_dict_entry(11, "Count", Object::Integer(2)).unwrap();
        xref.insert_object(13, item("Sub one", 11).with("Next", Reference::new(14, 0)));
        xref.insert_object(14, item("Sub two", 11).with("Prev", Reference::new(13, 0)));
        xref.set_dict_entry(10, "Count", Object::Integer(4)).unwrap();

        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_outlines(&mut xref, &catalog()).is_ok());
    }

    #[test]
    fn test_closed_children_do_not_count_at_root() {
        let mut xref = outline_xref();
        xref.set_dict_entry(11, "First", Object::Reference(Reference::new(13, 0)))
            .unwrap();
        xref.set_dict_entry(11, "Last", Object::Reference(Reference::new(13, 0)))
            .unwrap();
        xref.set_dict_entry(11, "Count", Object::Integer(-1)).unwrap();
        xref.insert_object(13, item("Hidden", 11));

        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_outlines(&mut xref, &catalog()).is_ok());
    }

    #[test]
    fn test_missing_title_fails() {
        let mut xref = outline_xref();
        xref.remove_dict_entry(11, "Title").unwrap();
        assert!(matches!(
            validate_outlines(&mut xref, &catalog()),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "Title"
        ));
    }

    #[test]
    fn test_dest_and_action_conflict_strict() {
        let mut xref = outline_xref();
        xref.set_dict_entry(11, "Dest", Object::name("top")).unwrap();
        xref.set_dict_entry(
            11,
            "A",
            Object::Dict(Dict::new().with("S", Object::name("Named")).with("N", Object::name("NextPage"))),
        )
        .unwrap();
        xref.validation_mode = ValidationMode::Strict;
        assert!(matches!(
            validate_outlines(&mut xref, &catalog()),
            Err(PdfError::CorruptStructure { .. })
        ));
    }
}
