//! Viewer preferences validation (ISO 32000-1, 12.2).

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object};
use crate::validate::entries::{array_entry, boolean_entry, dict_entry, integer_entry, name_entry};
use crate::version::Version;
use crate::xref::XRefTable;

fn is_page_boundary(name: &str) -> bool {
    matches!(name, "MediaBox" | "CropBox" | "BleedBox" | "TrimBox" | "ArtBox")
}

/// Validates the catalog's `/ViewerPreferences` dict, when present.
pub fn validate_viewer_preferences(xref: &mut XRefTable, catalog: &Dict) -> Result<()> {
    const DICT: &str = "viewer preferences";
    let Some(prefs) = dict_entry(xref, catalog, "catalog", "ViewerPreferences", false, Version::V12, None)?
    else {
        return Ok(());
    };

    for key in ["HideToolbar", "HideMenubar", "HideWindowUI", "FitWindow", "CenterWindow"] {
        boolean_entry(xref, &prefs, DICT, key, false, Version::V12)?;
    }
    boolean_entry(xref, &prefs, DICT, "DisplayDocTitle", false, Version::V14)?;

    name_entry(xref, &prefs, DICT, "NonFullScreenPageMode", false, Version::V12, Some(&|m: &str| {
        matches!(m, "UseNone" | "UseOutlines" | "UseThumbs" | "UseOC")
    }))?;
    name_entry(xref, &prefs, DICT, "Direction", false, Version::V13, Some(&|d: &str| {
        matches!(d, "L2R" | "R2L")
    }))?;

    for key in ["ViewArea", "ViewClip", "PrintArea", "PrintClip"] {
        name_entry(xref, &prefs, DICT, key, false, Version::V14, Some(&is_page_boundary))?;
    }

    name_entry(xref, &prefs, DICT, "PrintScaling", false, Version::V16, Some(&|s: &str| {
        matches!(s, "None" | "AppDefault")
    }))?;
    name_entry(xref, &prefs, DICT, "Duplex", false, Version::V17, Some(&|d: &str| {
        matches!(d, "Simplex" | "DuplexFlipShortEdge" | "DuplexFlipLongEdge")
    }))?;
    boolean_entry(xref, &prefs, DICT, "PickTrayByPDFSize", false, Version::V17)?;
    validate_print_page_range(xref, &prefs)?;
    integer_entry(xref, &prefs, DICT, "NumCopies", false, Version::V17, Some(&|n: &i64| *n >= 1))?;
    Ok(())
}

/// `/PrintPageRange` holds 1-based inclusive page pairs.
fn validate_print_page_range(xref: &XRefTable, prefs: &Dict) -> Result<()> {
    const DICT: &str = "viewer preferences";
    let Some(range) = array_entry(xref, prefs, DICT, "PrintPageRange", false, Version::V17, Some(&|a: &[Object]| {
        !a.is_empty() && a.len() % 2 == 0
    }))?
    else {
        return Ok(());
    };
    for pair in range.chunks_exact(2) {
        let from = xref.dereference_integer(&pair[0], DICT, "PrintPageRange")?;
        let to = xref.dereference_integer(&pair[1], DICT, "PrintPageRange")?;
        if from < 1 || to < from {
            return Err(PdfError::rejected(
                DICT,
                "PrintPageRange",
                xref.cur_obj(),
                format!("page pair {from}..{to} out of order"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ValidationMode;

    fn catalog_with(prefs: Dict) -> Dict {
        Dict::new().with("ViewerPreferences", prefs)
    }

    #[test]
    fn test_typical_preferences_pass() {
        let catalog = catalog_with(
            Dict::new()
                .with("HideToolbar", true)
                .with("FitWindow", true)
                .with("DisplayDocTitle", true)
                .with("Direction", Object::name("L2R"))
                .with("PrintScaling", Object::name("AppDefault"))
                .with("NumCopies", 2)
                .with("PrintPageRange", vec![Object::Integer(1), Object::Integer(5)]),
        );
        let mut xref = XRefTable::default();
        xref.validation_mode = ValidationMode::Strict;
        assert!(validate_viewer_preferences(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_unknown_direction_rejected() {
        let catalog = catalog_with(Dict::new().with("Direction", Object::name("T2B")));
        let mut xref = XRefTable::default();
        assert!(matches!(
            validate_viewer_preferences(&mut xref, &catalog),
            Err(PdfError::ValueRejected { ref entry, .. }) if entry == "Direction"
        ));
    }

    #[test]
    fn test_page_range_must_ascend() {
        let catalog = catalog_with(
            Dict::new().with("PrintPageRange", vec![Object::Integer(4), Object::Integer(2)]),
        );
        let mut xref = XRefTable::default();
        assert!(matches!(
            validate_viewer_preferences(&mut xref, &catalog),
            Err(PdfError::ValueRejected { .. })
        ));
    }

    #[test]
    fn test_odd_page_range_rejected() {
        let catalog = catalog_with(
            Dict::new().with("PrintPageRange", vec![Object::Integer(1)]),
        );
        let mut xref = XRefTable::default();
        assert!(matches!(
            validate_viewer_preferences(&mut xref, &catalog),
            Err(PdfError::ValueRejected { .. })
        ));
    }

    #[test]
    fn test_duplex_gated_at_v17() {
        let catalog = catalog_with(Dict::new().with("Duplex", Object::name("Simplex")));
        let mut xref = XRefTable::new(Version::V15);
        xref.validation_mode = ValidationMode::Strict;
        assert!(matches!(
            validate_viewer_preferences(&mut xref, &catalog),
            Err(PdfError::VersionViolation { .. })
        ));
        xref.validation_mode = ValidationMode::Relaxed;
        assert!(validate_viewer_preferences(&mut xref, &catalog).is_ok());
    }

    #[test]
    fn test_boolean_type_enforced() {
        let catalog = catalog_with(Dict::new().with("HideToolbar", Object::name("yes")));
        let mut xref = XRefTable::default();
        assert!(matches!(
            validate_viewer_preferences(&mut xref, &catalog),
            Err(PdfError::TypeMismatch { ref entry, .. }) if entry == "HideToolbar"
        ));
    }
}
