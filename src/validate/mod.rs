//! Conformance validation.
//!
//! [`validate_document`] drives one depth-first walk from the trailer: the
//! catalog first (which recurses through pages, outlines, forms, and the
//! other structures hanging off it), then the info dict. Strict mode stops
//! at the first violation; relaxed mode warns, repairs what it safely can
//! in place, and records every repair in the statistics. A second relaxed
//! pass over a repaired table finds nothing left to fix.

pub mod acroform;
pub mod actions;
pub mod annotations;
pub mod catalog;
pub mod destinations;
pub mod entries;
pub mod filespec;
pub mod fonts;
pub mod info;
pub mod optional_content;
pub mod outlines;
pub mod page_tree;
pub mod threads;
pub mod trees;
pub mod viewer_preferences;

use tracing::{debug, warn};

use crate::error::{PdfError, Result};
use crate::objects::Object;
use crate::xref::XRefTable;

/// Validates a whole document in place.
pub fn validate_document(xref: &mut XRefTable) -> Result<()> {
    xref.reset_validation_state();
    validate_trailer(xref)?;
    catalog::validate_catalog(xref)?;
    info::validate_info(xref)?;
    debug!(
        pages = xref.stats.page_count,
        annotations = xref.stats.annotations,
        repairs = xref.stats.repairs.len(),
        "validation finished"
    );
    Ok(())
}

/// Trailer sanity checks before the walk starts.
fn validate_trailer(xref: &mut XRefTable) -> Result<()> {
    if let Some(size) = xref.trailer.integer("Size") {
        let extent = xref.size() as i64;
        if size < extent {
            let detail = format!("trailer /Size {size} is below the table extent {extent}");
            if xref.is_strict() {
                return Err(PdfError::corrupt(0, detail));
            }
            xref.trailer.set("Size", Object::Integer(extent));
            xref.note_repair(format!("{detail}, corrected"));
        }
    }

    if let Some(id) = xref.trailer.array("ID") {
        let well_formed = id.len() == 2
            && id.iter().all(|o| o.as_string_bytes().is_some());
        if !well_formed {
            let detail = "trailer /ID is not a pair of strings".to_string();
            if xref.is_strict() {
                return Err(PdfError::corrupt(0, detail));
            }
            warn!("{detail}");
        }
    }

    // Decryption is a collaborator's concern; the walk sees whatever the
    // parser handed over.
    if xref.trailer.contains_key("Encrypt") {
        warn!("document declares /Encrypt; strings and streams are validated as stored");
    }
    Ok(())
}
