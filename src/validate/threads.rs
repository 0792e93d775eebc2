//! Article thread validation (ISO 32000-1, 12.4.3).
//!
//! A thread's beads form a doubly linked ring: every bead names its
//! successor in `/N` and its predecessor in `/V`, and the first bead's
//! `/V` closes the ring by naming the last. A single-bead thread points
//! both entries at itself.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object, Reference};
use crate::validate::entries::{dict_entry, reference_entry};
use crate::version::Version;
use crate::xref::XRefTable;

/// Validates the catalog's `/Threads` array, when present.
pub fn validate_threads(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    let Some(raw) = catalog.get("Threads") else {
        return Ok(());
    };
    if !matches!(raw, Object::Reference(_)) && xref.is_strict() {
        return Err(PdfError::TypeMismatch {
            dict: "catalog".to_string(),
            entry: "Threads".to_string(),
            expected: "indirect reference",
            found: raw.type_name(),
            obj_nr: xref.cur_obj(),
        });
    }
    xref.validate_version("catalog entry Threads", Version::V11)?;
    let threads = match xref.dereference(raw)? {
        Object::Array(a) => a,
        Object::Null => return Ok(()),
        other => {
            return Err(PdfError::TypeMismatch {
                dict: "catalog".to_string(),
                entry: "Threads".to_string(),
                expected: "array",
                found: other.type_name(),
                obj_nr: xref.cur_obj(),
            });
        }
    };
    for thread in &threads {
        validate_thread(xref, thread)?;
    }
    Ok(())
}

fn validate_thread(xref: &mut XRefTable, obj: &Object) -> Result<()> {
    const DICT: &str = "thread";
    if let Object::Reference(r) = obj {
        xref.set_cur_obj(r.obj_nr());
    }
    let thread = xref.dereference_dict(obj, "catalog", "Threads")?;
    if let Some(t) = thread.dict_type() {
        if t != "Thread" {
            return Err(PdfError::rejected(
                DICT,
                "Type",
                xref.cur_obj(),
                format!("/{t} is not /Thread"),
            ));
        }
    }
    // /I carries document-info style metadata for the article.
    dict_entry(xref, &thread, DICT, "I", false, Version::V11, None)?;

    let Some(first) = reference_entry(xref, &thread, DICT, "F", true)? else {
        return Ok(());
    };
    validate_bead_ring(xref, first.obj_nr())
}

fn validate_bead_ring(xref: &mut XRefTable, first_nr: u32) -> Result<()> {
    const DICT: &str = "bead";
    let mut prev_nr: Option<u32> = None;
    let mut cur_nr = first_nr;
    loop {
        if !xref.mark(cur_nr) {
            return Err(PdfError::corrupt(
                cur_nr,
                "bead ring revisits a bead before closing",
            ));
        }
        xref.set_cur_obj(cur_nr);
        let bead =
            xref.dereference_dict(&Object::Reference(Reference::new(cur_nr, 0)), DICT, "N")?;
        if let Some(t) = bead.dict_type() {
            if t != "Bead" {
                return Err(PdfError::rejected(
                    DICT,
                    "Type",
                    cur_nr,
                    format!("/{t} is not /Bead"),
                ));
            }
        }
        // The first bead optionally points back at its thread.
        if prev_nr.is_none() {
            reference_entry(xref, &bead, DICT, "T", false)?;
        }
        validate_bead_page(xref, &bead, cur_nr)?;

        let Some(next) = reference_entry(xref, &bead, DICT, "N", true)? else {
            return Ok(());
        };
        let Some(back) = reference_entry(xref, &bead, DICT, "V", true)? else {
            return Ok(());
        };
        if let Some(prev) = prev_nr {
            if back.obj_nr() != prev {
                return Err(PdfError::corrupt(
                    cur_nr,
                    format!(
                        "bead /V points at obj#{} instead of obj#{prev}",
                        back.obj_nr()
                    ),
                ));
            }
        } else if next.obj_nr() == first_nr && back.obj_nr() != first_nr {
            // Single-bead ring: both links point home.
            return Err(PdfError::corrupt(
                cur_nr,
                "single-bead thread must point /V at itself",
            ));
        }

        if next.obj_nr() == first_nr {
            if prev_nr.is_some() {
                // Ring closed: the first bead's /V names the last bead.
                let first = xref.dereference_dict(
                    &Object::Reference(Reference::new(first_nr, 0)),
                    DICT,
                    "V",
                )?;
                if first.reference("V").map(|r| r.obj_nr()) != Some(cur_nr) {
                    return Err(PdfError::corrupt(
                        first_nr,
                        format!("first bead /V does not point at the last bead obj#{cur_nr}"),
                    ));
                }
            }
            return Ok(());
        }
        prev_nr = Some(cur_nr);
        cur_nr = next.obj_nr();
    }
}

/// `/P` names the page a bead is drawn on; that page's `/B` array should
/// list the bead in return.
fn validate_bead_page(xref: &mut XRefTable, bead: &Dict, bead_nr: u32) -> Result<()> {
    const DICT: &str = "bead";
    let Some(p) = reference_entry(xref, bead, DICT, "P", xref.is_strict())? else {
        return Ok(());
    };
    let page = match xref.dereference(&Object::Reference(p))? {
        Object::Dict(d) => d,
        Object::Null => {
            let detail = format!("bead obj#{bead_nr} /P is dangling");
            if xref.is_strict() {
                return Err(PdfError::DanglingRef {
                    obj_nr: p.obj_nr(),
                    gen_nr: p.gen_nr(),
                });
            }
            warn!("{detail}");
            return Ok(());
        }
        other => {
            return Err(PdfError::TypeMismatch {
                dict: DICT.to_string(),
                entry: "P".to_string(),
                expected: "dict",
                found: other.type_name(),
                obj_nr: bead_nr,
            });
        }
    };
    if let Some(t) = page.dict_type() {
        if t != "Page" {
            return Err(PdfError::rejected(
                DICT,
                "P",
                bead_nr,
                format!("/{t} is not /Page"),
            ));
        }
    }
    if let Some(beads) = page.array("B") {
        let listed = beads
            .iter()
            .any(|b| matches!(b, Object::Reference(r) if r.obj_nr() == bead_nr));
        if !listed {
            let detail = format!("page obj#{} /B does not list bead obj#{bead_nr}", p.obj_nr());
            if xref.is_strict() {
                return Err(PdfError::corrupt(bead_nr, detail));
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

    fn bead(page: u32, back: u32, next: u32) -> Dict {
        Dict::new()
            .with("Type", Object::name("Bead"))
            .with("P", Reference::new(page, 0))
            .with("V", Reference::new(back, 0))
            .with("N", Reference::new(next, 0))
    }

    fn ring_xref() -> (XRefTable, Dict) {
        let mut xref = XRefTable::default();
        xref.insert_object(
            5,
            Dict::new().with("Type", Object::name("Page")).with(
                "B",
                vec![
                    Object::Reference(Reference::new(31, 0)),
                    Object::Reference(Reference::new(32, 0)),
                    Object::Reference(Reference::new(33, 0)),
                ],
            ),
        );
        xref.insert_object(31, bead(5, 33, 32).with("T", Reference::new(30, 0)));
        xref.insert_object(32, bead(5, 31, 33));
        xref.insert_object(33, bead(5, 32, 31));
        xref.insert_object(
            30,
            Dict::new()
                .with("Type", Object::name("Thread"))
                .with("F", Reference::new(31, 0)),
        );
        let threads = xref.insert_object(40, vec![Object::Reference(Reference::new(30, 0))]);
        let catalog = Dict::new().with("Threads", threads);
        (xref, catalog)
    }

    #[test]
    fn test_three_bead_ring_passes_strict() {
        let (mut xref, catalog) = ring_xref();
        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_threads(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_single_bead_points_home() {
        let mut xref = XRefTable::default();
        xref.insert_object(5, Dict::new().with("Type", Object::name("Page")));
        xref.insert_object(31, bead(5, 31, 31));
        xref.insert_object(
            30,
            Dict::new().with("F", Reference::new(31, 0)),
        );
        let threads = xref.insert_object(40, vec![Object::Reference(Reference::new(30, 0))]);
        let catalog = Dict::new().with("Threads", threads);
        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_threads(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_single_bead_with_stray_back_pointer_fails() {
        let mut xref = XRefTable::default();
        xref.insert_object(5, Dict::new().with("Type", Object::name("Page")));
        xref.insert_object(31, bead(5, 99, 31));
        xref.insert_object(30, Dict::new().with("F", Reference::new(31, 0)));
        let threads = xref.insert_object(40, vec![Object::Reference(Reference::new(30, 0))]);
        let catalog = Dict::new().with("Threads", threads);
        assert!(matches!(
            validate_threads(&mut xref, &catalog),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_broken_back_pointer_fails() {
        let (mut xref, catalog) = ring_xref();
        xref.set_dict_entry(32, "V", Object::Reference(Reference::new(33, 0)))
            .unwrap();
        assert!(matches!(
            validate_threads(&mut xref, &catalog),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_first_bead_must_name_last() {
        let (mut xref, catalog) = ring_xref();
        xref.set_dict_entry(31, "V", Object::Reference(Reference::new(32, 0)))
            .unwrap();
        assert!(matches!(
            validate_threads(&mut xref, &catalog),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_bead_missing_next_fails() {
        let (mut xref, catalog) = ring_xref();
        xref.remove_dict_entry(32, "N").unwrap();
        assert!(matches!(
            validate_threads(&mut xref, &catalog),
            Err(PdfError::MissingRequired { ref entry, .. }) if entry == "N"
        ));
    }

    #[test]
    fn test_page_missing_bead_listing() {
        let (mut xref, catalog) = ring_xref();
        xref.set_dict_entry(5, "B", Object::Array(vec![])).unwrap();
        // Relaxed tolerates the stale page listing, strict does not.
        assert!(validate_threads(&mut xref, &catalog).is_ok());
        xref.validation_mode = ValidationMode::Strict;
        xref.reset_validation_state();
        assert!(matches!(
            validate_threads(&mut xref, &catalog),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_ring_escape_detected() {
        let (mut xref, catalog) = ring_xref();
        // 33 jumps back to 32 instead of closing at 31.
        xref.set_dict_entry(33, "N", Object::Reference(Reference::new(32, 0)))
            .unwrap();
        assert!(matches!(
            validate_threads(&mut xref, &catalog),
            Err(PdfError::CorruptStructure { .. })
        ));
    }
}
