//! Glyph subsetting for embedded TrueType fonts.
//!
//! The subset keeps the original glyph numbering: unused GIDs collapse to
//! zero-length `loca` ranges instead of being renumbered, so text content
//! referencing the font stays valid. Only `glyf` and `loca` are rewritten;
//! the other carried tables pass through byte for byte.

use std::collections::BTreeSet;

use super::ttf::{table_checksum, Table, TrueTypeFont};
use crate::error::{PdfError, Result};

/// Tables that survive subsetting, in directory (ASCII) order.
const CARRIED_TABLES: [&str; 10] = [
    "OS/2", "cmap", "glyf", "head", "hhea", "hmtx", "loca", "maxp", "name", "post",
];

fn read_u16(data: &[u8], off: usize) -> Result<u16> {
    data.get(off..off + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| PdfError::CorruptGlyf(format!("glyph data truncated at byte {off}")))
}

fn read_i16(data: &[u8], off: usize) -> Result<i16> {
    read_u16(data, off).map(|v| v as i16)
}

fn read_u32(data: &[u8], off: usize) -> Result<u32> {
    data.get(off..off + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| PdfError::CorruptGlyf(format!("glyph data truncated at byte {off}")))
}

fn table<'a>(font: &'a TrueTypeFont, tag: &str) -> Result<&'a Table> {
    font.tables
        .get(tag)
        .ok_or_else(|| PdfError::Font(format!("required table {tag} is missing")))
}

/// Byte range of `gid` inside `glyf`.
fn glyph_range(loca: &[u8], long_format: bool, gid: u16) -> Result<(usize, usize)> {
    let gid = gid as usize;
    let (from, thru) = if long_format {
        (
            read_u32(loca, 4 * gid)? as usize,
            read_u32(loca, 4 * gid + 4)? as usize,
        )
    } else {
        (
            read_u16(loca, 2 * gid)? as usize * 2,
            read_u16(loca, 2 * gid + 2)? as usize * 2,
        )
    };
    if thru < from {
        return Err(PdfError::CorruptGlyf(format!(
            "glyph {gid} has an inverted loca range {from}..{thru}"
        )));
    }
    Ok((from, thru))
}

const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

/// GIDs referenced by a composite outline.
fn component_gids(outline: &[u8]) -> Result<Vec<u16>> {
    let mut gids = Vec::new();
    let mut off = 10;
    loop {
        let flags = read_u16(outline, off)?;
        gids.push(read_u16(outline, off + 2)?);
        off += 4;
        off += if flags & ARG_1_AND_2_ARE_WORDS != 0 { 4 } else { 2 };
        if flags & WE_HAVE_A_SCALE != 0 {
            off += 2;
        }
        if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            off += 4;
        }
        if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            off += 8;
        }
        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }
    Ok(gids)
}

/// Transitive closure of the requested GIDs: the set itself, `.notdef`,
/// and every component a composite glyph pulls in.
pub fn closed_glyph_set(font: &TrueTypeFont, used: &BTreeSet<u16>) -> Result<BTreeSet<u16>> {
    let loca = table(font, "loca")?;
    let glyf = table(font, "glyf")?;
    let long_format = font.index_to_loc_format == 1;

    let mut pending: Vec<u16> = used.iter().copied().collect();
    pending.push(0);
    let mut closed = BTreeSet::new();
    while let Some(gid) = pending.pop() {
        if gid >= font.num_glyphs {
            return Err(PdfError::CorruptGlyf(format!(
                "glyph {gid} is beyond the glyph count {}",
                font.num_glyphs
            )));
        }
        if !closed.insert(gid) {
            continue;
        }
        let (from, thru) = glyph_range(&loca.body, long_format, gid)?;
        if from == thru {
            continue;
        }
        let outline = glyf.body.get(from..thru).ok_or_else(|| {
            PdfError::CorruptGlyf(format!("glyph {gid} overruns the glyf table"))
        })?;
        if read_i16(outline, 0)? < 0 {
            for component in component_gids(outline)? {
                if !closed.contains(&component) {
                    pending.push(component);
                }
            }
        }
    }
    Ok(closed)
}

fn packed(tag: &str, body: &[u8]) -> (u32, u32, Vec<u8>) {
    let size = body.len() as u32;
    let mut padded = body.to_vec();
    padded.resize((body.len() + 3) & !3, 0);
    (table_checksum(tag, &padded), size, padded)
}

/// Produces a subset font file containing the closed set over `used`.
///
/// The output repeats the source sfnt header with the table count fields
/// refreshed, carries the directory in ASCII tag order, and recomputes
/// checksums for the two rewritten tables only. Subsetting a subset with
/// the same GID set reproduces it byte for byte.
pub fn subset(font: &TrueTypeFont, used: &BTreeSet<u16>) -> Result<Vec<u8>> {
    let closed = closed_glyph_set(font, used)?;
    let loca = table(font, "loca")?;
    let glyf = table(font, "glyf")?;
    let long_format = font.index_to_loc_format == 1;

    let mut new_glyf = Vec::new();
    let mut offsets = Vec::with_capacity(font.num_glyphs as usize + 1);
    for gid in 0..font.num_glyphs {
        offsets.push(new_glyf.len());
        if closed.contains(&gid) {
            let (from, thru) = glyph_range(&loca.body, long_format, gid)?;
            let outline = glyf.body.get(from..thru).ok_or_else(|| {
                PdfError::CorruptGlyf(format!("glyph {gid} overruns the glyf table"))
            })?;
            new_glyf.extend_from_slice(outline);
        }
    }
    offsets.push(new_glyf.len());

    let mut new_loca = Vec::new();
    for off in &offsets {
        if long_format {
            new_loca.extend_from_slice(&(*off as u32).to_be_bytes());
        } else {
            new_loca.extend_from_slice(&((*off / 2) as u16).to_be_bytes());
        }
    }

    let mut kept: Vec<(&str, u32, u32, Vec<u8>)> = Vec::new();
    for (tag, t) in &font.tables {
        if !CARRIED_TABLES.contains(&tag.as_str()) {
            continue;
        }
        let entry = match tag.as_str() {
            "glyf" => packed(tag, &new_glyf),
            "loca" => packed(tag, &new_loca),
            _ => (t.checksum, t.size, t.body.clone()),
        };
        kept.push((tag.as_str(), entry.0, entry.1, entry.2));
    }

    if font.sfnt_header.len() != 12 {
        return Err(PdfError::Font("malformed sfnt header".to_string()));
    }
    let n = kept.len() as u16;
    let mut search_range = 1u16;
    let mut entry_selector = 0u16;
    while search_range * 2 <= n {
        search_range *= 2;
        entry_selector += 1;
    }
    search_range *= 16;
    let range_shift = n * 16 - search_range;

    let mut out = font.sfnt_header.clone();
    out[4..6].copy_from_slice(&n.to_be_bytes());
    out[6..8].copy_from_slice(&search_range.to_be_bytes());
    out[8..10].copy_from_slice(&entry_selector.to_be_bytes());
    out[10..12].copy_from_slice(&range_shift.to_be_bytes());

    let mut offset = 12 + 16 * kept.len();
    for (tag, checksum, size, padded_body) in &kept {
        out.extend_from_slice(tag.as_bytes());
        out.extend_from_slice(&checksum.to_be_bytes());
        out.extend_from_slice(&(offset as u32).to_be_bytes());
        out.extend_from_slice(&size.to_be_bytes());
        offset += padded_body.len();
    }
    for (_, _, _, padded_body) in &kept {
        out.extend_from_slice(padded_body);
    }
    Ok(out)
}
