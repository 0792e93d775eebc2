//! TrueType font parsing (sfnt container).
//!
//! Reads a single-font TTF or a TTC collection (first font) into a table
//! map plus the metrics the PDF side needs: PostScript name, glyph widths
//! in PDF glyph space, the character map, and the descriptor fields. CFF
//! outlines (`OTTO`) are rejected; the subsetter only rewrites `glyf`.
//!
//! All multi-byte integers are big-endian. Table checksums are recomputed
//! on load; strict parsing fails on a mismatch, lenient parsing stores the
//! recomputed value.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PdfError, Result};

/// Hex transport for table bodies inside cache files.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(de)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

/// One sfnt table: directory record fields plus the padded body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub checksum: u32,
    /// Offset in the source file.
    pub offset: u32,
    /// Logical length.
    pub size: u32,
    /// Length rounded up to a 4-byte multiple; equals `body.len()`.
    pub padded: u32,
    #[serde(with = "hex_bytes")]
    pub body: Vec<u8>,
}

/// A parsed TrueType font.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrueTypeFont {
    pub postscript_name: String,
    pub units_per_em: u16,
    /// `[xMin, yMin, xMax, yMax]` in font units.
    pub bbox: [i16; 4],
    pub ascent: i16,
    pub descent: i16,
    pub line_gap: i16,
    pub cap_height: i16,
    pub italic_angle: f64,
    pub fixed_pitch: bool,
    pub bold: bool,
    /// OS/2 `fsType` forbids embedding.
    pub protected: bool,
    pub unicode_range: [u32; 4],
    pub first_char_index: u16,
    pub last_char_index: u16,
    /// 0 for 2-byte `loca` offsets, 1 for 4-byte.
    pub index_to_loc_format: u16,
    pub num_glyphs: u16,
    pub hor_metrics_count: u16,
    /// Advance per GID, already converted to PDF glyph space.
    pub glyph_widths: Vec<i32>,
    /// Code point to GID.
    pub chars: BTreeMap<u32, u16>,
    /// Unicode planes the cmap touches.
    pub planes: BTreeSet<u8>,
    /// The source sfnt header, kept for repacking.
    #[serde(with = "hex_bytes")]
    pub sfnt_header: Vec<u8>,
    pub tables: BTreeMap<String, Table>,
}

impl TrueTypeFont {
    /// Parses a TTF or TTC byte buffer. A collection contributes its first
    /// font. `strict` controls checksum enforcement.
    pub fn parse(data: &[u8], strict: bool) -> Result<TrueTypeFont> {
        if data.len() >= 4 && &data[0..4] == b"ttcf" {
            let count = be_u32(data, 8)?;
            if count == 0 {
                return Err(PdfError::Font(
                    "TrueType collection declares zero fonts".to_string(),
                ));
            }
            let first = be_u32(data, 12)? as usize;
            return parse_sfnt(data, first, strict);
        }
        parse_sfnt(data, 0, strict)
    }

    /// Advance of `gid` in PDF glyph space, the last metric repeating for
    /// trailing glyphs.
    pub fn glyph_width(&self, gid: u16) -> i32 {
        self.glyph_widths
            .get(gid as usize)
            .or_else(|| self.glyph_widths.last())
            .copied()
            .unwrap_or(0)
    }

    /// GID for a code point, if mapped.
    pub fn gid(&self, code_point: u32) -> Option<u16> {
        self.chars.get(&code_point).copied()
    }
}

/// Converts a font-unit value to PDF glyph space (thousandths of an em),
/// truncating toward zero.
pub fn to_pdf_glyph_space(v: i64, units_per_em: u16) -> i32 {
    if units_per_em == 0 {
        return 0;
    }
    ((v * 1000) / units_per_em as i64) as i32
}

fn truncated(off: usize) -> PdfError {
    PdfError::Font(format!("font data truncated at byte {off}"))
}

fn be_u16(data: &[u8], off: usize) -> Result<u16> {
    data.get(off..off + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| truncated(off))
}

fn be_i16(data: &[u8], off: usize) -> Result<i16> {
    be_u16(data, off).map(|v| v as i16)
}

fn be_u32(data: &[u8], off: usize) -> Result<u32> {
    data.get(off..off + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| truncated(off))
}

/// Big-endian u32 word sum over the padded body. The `head` table's
/// checksum-adjustment word (bytes 8..12) never participates.
pub(crate) fn table_checksum(tag: &str, body: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    for (i, chunk) in body.chunks(4).enumerate() {
        if tag == "head" && i == 2 {
            continue;
        }
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum = sum.wrapping_add(u32::from_be_bytes(word));
    }
    sum
}

fn required<'a>(tables: &'a BTreeMap<String, Table>, tag: &str) -> Result<&'a Table> {
    tables
        .get(tag)
        .ok_or_else(|| PdfError::Font(format!("required table {tag} is missing")))
}

fn parse_sfnt(data: &[u8], base: usize, strict: bool) -> Result<TrueTypeFont> {
    match be_u32(data, base)? {
        0x0001_0000 | 0x7472_7565 => {}
        0x4F54_544F => {
            return Err(PdfError::Font(
                "OpenType CFF outlines are not supported".to_string(),
            ));
        }
        other => {
            return Err(PdfError::Font(format!("unrecognized sfnt tag 0x{other:08X}")));
        }
    }
    let sfnt_header = data
        .get(base..base + 12)
        .ok_or_else(|| truncated(base))?
        .to_vec();
    let num_tables = be_u16(data, base + 4)? as usize;

    let mut tables: BTreeMap<String, Table> = BTreeMap::new();
    for i in 0..num_tables {
        let rec = base + 12 + 16 * i;
        let tag_bytes = data.get(rec..rec + 4).ok_or_else(|| truncated(rec))?;
        let tag = String::from_utf8_lossy(tag_bytes).into_owned();
        let mut checksum = be_u32(data, rec + 4)?;
        let offset = be_u32(data, rec + 8)?;
        let size = be_u32(data, rec + 12)?;
        let padded = size
            .checked_add(3)
            .map(|v| v & !3)
            .ok_or_else(|| PdfError::Font(format!("table {tag} length overflows")))?;

        let start = offset as usize;
        start
            .checked_add(size as usize)
            .filter(|end| *end <= data.len())
            .ok_or_else(|| truncated(start))?;
        // The final table's padding may run past the end of the file.
        let avail_end = data.len().min(start + padded as usize);
        let mut body = data[start..avail_end].to_vec();
        body.resize(padded as usize, 0);

        let computed = table_checksum(&tag, &body);
        if computed != checksum {
            if strict {
                return Err(PdfError::Font(format!(
                    "table {tag} checksum 0x{checksum:08X} does not match computed 0x{computed:08X}"
                )));
            }
            debug!(table = %tag, "repaired table checksum");
            checksum = computed;
        }
        tables.insert(
            tag,
            Table {
                checksum,
                offset,
                size,
                padded,
                body,
            },
        );
    }

    let head = required(&tables, "head")?;
    if be_u32(&head.body, 12)? != 0x5F0F_3CF5 {
        return Err(PdfError::Font("bad head table magic".to_string()));
    }
    let units_per_em = be_u16(&head.body, 18)?;
    if units_per_em == 0 {
        return Err(PdfError::Font("head declares zero units per em".to_string()));
    }
    let bbox = [
        be_i16(&head.body, 36)?,
        be_i16(&head.body, 38)?,
        be_i16(&head.body, 40)?,
        be_i16(&head.body, 42)?,
    ];
    let index_to_loc_format = be_u16(&head.body, 50)?;
    if index_to_loc_format > 1 {
        return Err(PdfError::Font(format!(
            "unknown loca offset format {index_to_loc_format}"
        )));
    }

    let num_glyphs = be_u16(&required(&tables, "maxp")?.body, 4)?;

    let hhea = required(&tables, "hhea")?;
    let mut ascent = be_i16(&hhea.body, 4)?;
    let mut descent = be_i16(&hhea.body, 6)?;
    let line_gap = be_i16(&hhea.body, 8)?;
    let hor_metrics_count = be_u16(&hhea.body, 34)?;
    if hor_metrics_count == 0 {
        return Err(PdfError::Font("hhea declares zero metrics".to_string()));
    }

    let mut cap_height = 0i16;
    let mut protected = false;
    let mut bold = false;
    let mut unicode_range = [0u32; 4];
    let mut first_char_index = 0u16;
    let mut last_char_index = 0u16;
    if let Some(os2) = tables.get("OS/2") {
        let version = be_u16(&os2.body, 0)?;
        protected = be_u16(&os2.body, 8)? & 0x0002 != 0;
        for (i, slot) in unicode_range.iter_mut().enumerate() {
            *slot = be_u32(&os2.body, 42 + 4 * i)?;
        }
        bold = be_u16(&os2.body, 62)? & 0x0020 != 0;
        first_char_index = be_u16(&os2.body, 64)?;
        last_char_index = be_u16(&os2.body, 66)?;
        ascent = be_i16(&os2.body, 68)?;
        descent = be_i16(&os2.body, 70)?;
        if version >= 2 && os2.body.len() >= 90 {
            cap_height = be_i16(&os2.body, 88)?;
        }
    }
    if cap_height == 0 {
        cap_height = ascent;
    }

    let post = required(&tables, "post")?;
    let italic_angle = be_u32(&post.body, 4)? as i32 as f64 / 65536.0;
    let fixed_pitch = be_u16(&post.body, 16)? != 0;

    let hmtx = required(&tables, "hmtx")?;
    let mut advances = Vec::with_capacity(hor_metrics_count as usize);
    for i in 0..hor_metrics_count as usize {
        advances.push(be_u16(&hmtx.body, 4 * i)?);
    }
    let glyph_widths: Vec<i32> = (0..num_glyphs as usize)
        .map(|gid| {
            let advance = advances[gid.min(advances.len() - 1)];
            to_pdf_glyph_space(advance as i64, units_per_em)
        })
        .collect();

    let postscript_name = parse_postscript_name(&required(&tables, "name")?.body)?;

    let mut chars = BTreeMap::new();
    let mut planes = BTreeSet::new();
    parse_cmap(&required(&tables, "cmap")?.body, &mut chars, &mut planes)?;

    Ok(TrueTypeFont {
        postscript_name,
        units_per_em,
        bbox,
        ascent,
        descent,
        line_gap,
        cap_height,
        italic_angle,
        fixed_pitch,
        bold,
        protected,
        unicode_range,
        first_char_index,
        last_char_index,
        index_to_loc_format,
        num_glyphs,
        hor_metrics_count,
        glyph_widths,
        chars,
        planes,
        sfnt_header,
        tables,
    })
}

/// NameID 6. Windows (3, 1, 0x0409, UTF-16BE) wins over Macintosh
/// (1, 0, 0, single-byte).
fn parse_postscript_name(name: &[u8]) -> Result<String> {
    let count = be_u16(name, 2)? as usize;
    let string_base = be_u16(name, 4)? as usize;
    let mut windows: Option<(usize, usize)> = None;
    let mut mac: Option<(usize, usize)> = None;
    for i in 0..count {
        let rec = 6 + 12 * i;
        let platform = be_u16(name, rec)?;
        let encoding = be_u16(name, rec + 2)?;
        let language = be_u16(name, rec + 4)?;
        if be_u16(name, rec + 6)? != 6 {
            continue;
        }
        let len = be_u16(name, rec + 8)? as usize;
        let off = string_base + be_u16(name, rec + 10)? as usize;
        match (platform, encoding, language) {
            (3, 1, 0x0409) => windows = Some((off, len)),
            (1, 0, 0) => mac = Some((off, len)),
            _ => {}
        }
    }
    if let Some((off, len)) = windows {
        let bytes = name.get(off..off + len).ok_or_else(|| truncated(off))?;
        if bytes.len() % 2 != 0 {
            return Err(PdfError::InvalidEncoding(
                "odd-length UTF-16BE PostScript name".to_string(),
            ));
        }
        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return Ok(String::from_utf16_lossy(&units));
    }
    if let Some((off, len)) = mac {
        let bytes = name.get(off..off + len).ok_or_else(|| truncated(off))?;
        return Ok(bytes.iter().map(|&b| b as char).collect());
    }
    Err(PdfError::Font(
        "font has no PostScript name (name ID 6)".to_string(),
    ))
}

/// Subtable preference, best first. The first three are format 12 full
/// Unicode, the last two format 4 BMP.
const CMAP_PRIORITY: [(u16, u16); 5] = [(0, 10), (0, 4), (3, 10), (0, 3), (3, 1)];

fn parse_cmap(
    cmap: &[u8],
    chars: &mut BTreeMap<u32, u16>,
    planes: &mut BTreeSet<u8>,
) -> Result<()> {
    let count = be_u16(cmap, 2)? as usize;
    let mut subtables: HashMap<(u16, u16), usize> = HashMap::new();
    for i in 0..count {
        let rec = 4 + 8 * i;
        let platform = be_u16(cmap, rec)?;
        let encoding = be_u16(cmap, rec + 2)?;
        let offset = be_u32(cmap, rec + 4)? as usize;
        subtables.insert((platform, encoding), offset);
    }
    for key in CMAP_PRIORITY {
        let Some(&base) = subtables.get(&key) else {
            continue;
        };
        match be_u16(cmap, base)? {
            12 => return parse_cmap_format12(cmap, base, chars, planes),
            4 => return parse_cmap_format4(cmap, base, chars, planes),
            other => {
                debug!(format = other, "skipping unsupported cmap subtable");
                continue;
            }
        }
    }
    Err(PdfError::Font(
        "no usable cmap subtable (format 4 or 12)".to_string(),
    ))
}

fn parse_cmap_format4(
    data: &[u8],
    base: usize,
    chars: &mut BTreeMap<u32, u16>,
    planes: &mut BTreeSet<u8>,
) -> Result<()> {
    let seg_count = (be_u16(data, base + 6)? / 2) as usize;
    let end_base = base + 14;
    let start_base = end_base + seg_count * 2 + 2;
    let delta_base = start_base + seg_count * 2;
    let range_base = delta_base + seg_count * 2;

    for i in 0..seg_count {
        let end = be_u16(data, end_base + 2 * i)?;
        let start = be_u16(data, start_base + 2 * i)?;
        let delta = be_u16(data, delta_base + 2 * i)?;
        let range_offset = be_u16(data, range_base + 2 * i)?;
        if start > end {
            return Err(PdfError::Font(format!(
                "cmap format 4 segment {i} is inverted"
            )));
        }
        if start == 0xFFFF {
            continue;
        }
        for code in start..=end {
            let gid = if range_offset == 0 {
                code.wrapping_add(delta)
            } else {
                let pos = range_base
                    + 2 * i
                    + range_offset as usize
                    + 2 * (code - start) as usize;
                let g = be_u16(data, pos)?;
                if g == 0 {
                    continue;
                }
                g.wrapping_add(delta)
            };
            if gid != 0 {
                chars.insert(code as u32, gid);
                planes.insert(0);
            }
        }
    }
    Ok(())
}

fn parse_cmap_format12(
    data: &[u8],
    base: usize,
    chars: &mut BTreeMap<u32, u16>,
    planes: &mut BTreeSet<u8>,
) -> Result<()> {
    let group_count = be_u32(data, base + 12)? as usize;
    for i in 0..group_count {
        let rec = base + 16 + 12 * i;
        let start = be_u32(data, rec)?;
        let end = be_u32(data, rec + 4)?;
        let first_gid = be_u32(data, rec + 8)?;
        if start > end || end > 0x10FFFF {
            return Err(PdfError::Font(format!(
                "cmap format 12 group {i} is out of range"
            )));
        }
        for (k, cp) in (start..=end).enumerate() {
            chars.insert(cp, (first_gid as usize + k) as u16);
            planes.insert((cp >> 16) as u8);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_font {
    //! Synthetic font builder shared by the font tests.

    use std::collections::BTreeMap;

    use super::table_checksum;

    fn round4(len: usize) -> usize {
        (len + 3) & !3
    }

    /// Assembles a valid single-font TTF from table bodies, computing the
    /// directory and checksums.
    pub fn assemble(tables: &BTreeMap<&'static str, Vec<u8>>) -> Vec<u8> {
        let n = tables.len() as u16;
        let mut search_range = 1u16;
        let mut entry_selector = 0u16;
        while search_range * 2 <= n {
            search_range *= 2;
            entry_selector += 1;
        }
        search_range *= 16;
        let range_shift = n * 16 - search_range;

        let mut out = Vec::new();
        out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        out.extend_from_slice(&n.to_be_bytes());
        out.extend_from_slice(&search_range.to_be_bytes());
        out.extend_from_slice(&entry_selector.to_be_bytes());
        out.extend_from_slice(&range_shift.to_be_bytes());

        let mut offset = 12 + 16 * tables.len();
        let mut bodies = Vec::new();
        for (tag, body) in tables {
            let padded = {
                let mut b = body.clone();
                b.resize(round4(b.len()), 0);
                b
            };
            out.extend_from_slice(tag.as_bytes());
            out.extend_from_slice(&table_checksum(tag, &padded).to_be_bytes());
            out.extend_from_slice(&(offset as u32).to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            offset += padded.len();
            bodies.push(padded);
        }
        for body in bodies {
            out.extend_from_slice(&body);
        }
        out
    }

    pub fn head(units_per_em: u16, index_to_loc_format: u16) -> Vec<u8> {
        let mut b = vec![0u8; 54];
        b[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
        b[18..20].copy_from_slice(&units_per_em.to_be_bytes());
        b[36..38].copy_from_slice(&(-100i16).to_be_bytes());
        b[38..40].copy_from_slice(&(-200i16).to_be_bytes());
        b[40..42].copy_from_slice(&1000i16.to_be_bytes());
        b[42..44].copy_from_slice(&900i16.to_be_bytes());
        b[50..52].copy_from_slice(&index_to_loc_format.to_be_bytes());
        b
    }

    pub fn maxp(num_glyphs: u16) -> Vec<u8> {
        let mut b = vec![0u8; 6];
        b[4..6].copy_from_slice(&num_glyphs.to_be_bytes());
        b
    }

    pub fn hhea(metrics: u16) -> Vec<u8> {
        let mut b = vec![0u8; 36];
        b[4..6].copy_from_slice(&800i16.to_be_bytes());
        b[6..8].copy_from_slice(&(-200i16).to_be_bytes());
        b[8..10].copy_from_slice(&90i16.to_be_bytes());
        b[34..36].copy_from_slice(&metrics.to_be_bytes());
        b
    }

    pub fn hmtx(advances: &[u16]) -> Vec<u8> {
        let mut b = Vec::new();
        for a in advances {
            b.extend_from_slice(&a.to_be_bytes());
            b.extend_from_slice(&0u16.to_be_bytes());
        }
        b
    }

    pub fn post(italic_angle_fixed: i32, fixed_pitch: u16) -> Vec<u8> {
        let mut b = vec![0u8; 18];
        b[4..8].copy_from_slice(&italic_angle_fixed.to_be_bytes());
        b[16..18].copy_from_slice(&fixed_pitch.to_be_bytes());
        b
    }

    /// Name table holding only a Macintosh NameID 6 record.
    pub fn name(ps_name: &str) -> Vec<u8> {
        let bytes = ps_name.as_bytes();
        let mut b = Vec::new();
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&1u16.to_be_bytes());
        b.extend_from_slice(&18u16.to_be_bytes());
        // platform 1, encoding 0, language 0, name 6
        for v in [1u16, 0, 0, 6, bytes.len() as u16, 0] {
            b.extend_from_slice(&v.to_be_bytes());
        }
        b.extend_from_slice(bytes);
        b
    }

    /// One-segment format 4 cmap mapping `start..=end` to GIDs beginning
    /// at `first_gid`.
    pub fn cmap_format4(start: u16, end: u16, first_gid: u16) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&1u16.to_be_bytes());
        // record: platform 3, encoding 1, offset 12
        b.extend_from_slice(&3u16.to_be_bytes());
        b.extend_from_slice(&1u16.to_be_bytes());
        b.extend_from_slice(&12u32.to_be_bytes());

        let delta = first_gid.wrapping_sub(start);
        let seg: [(u16, u16, u16, u16); 2] =
            [(end, start, delta, 0), (0xFFFF, 0xFFFF, 1, 0)];
        b.extend_from_slice(&4u16.to_be_bytes());
        b.extend_from_slice(&((16 + 8 * 2) as u16).to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&4u16.to_be_bytes()); // segCountX2
        b.extend_from_slice(&4u16.to_be_bytes()); // searchRange
        b.extend_from_slice(&1u16.to_be_bytes()); // entrySelector
        b.extend_from_slice(&0u16.to_be_bytes()); // rangeShift
        for (end, _, _, _) in &seg {
            b.extend_from_slice(&end.to_be_bytes());
        }
        b.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
        for (_, start, _, _) in &seg {
            b.extend_from_slice(&start.to_be_bytes());
        }
        for (_, _, delta, _) in &seg {
            b.extend_from_slice(&delta.to_be_bytes());
        }
        for (_, _, _, range) in &seg {
            b.extend_from_slice(&range.to_be_bytes());
        }
        b
    }

    /// A cmap carrying both a format 4 (3,1) and a format 12 (3,10)
    /// subtable mapping `start..=end` to different GID bases, so a test
    /// can tell which one the parser picked.
    pub fn cmap_dual(start: u16, end: u16, first_gid_4: u16, first_gid_12: u16) -> Vec<u8> {
        let format4_off: usize = 4 + 8 * 2;
        let format4_len: usize = 16 + 8 * 2;
        let format12_off = format4_off + format4_len;

        let mut b = Vec::new();
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&2u16.to_be_bytes());
        for (enc, off) in [(1u16, format4_off), (10u16, format12_off)] {
            b.extend_from_slice(&3u16.to_be_bytes());
            b.extend_from_slice(&enc.to_be_bytes());
            b.extend_from_slice(&(off as u32).to_be_bytes());
        }

        let delta = first_gid_4.wrapping_sub(start);
        let seg: [(u16, u16, u16, u16); 2] =
            [(end, start, delta, 0), (0xFFFF, 0xFFFF, 1, 0)];
        b.extend_from_slice(&4u16.to_be_bytes());
        b.extend_from_slice(&(format4_len as u16).to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&4u16.to_be_bytes()); // segCountX2
        b.extend_from_slice(&4u16.to_be_bytes()); // searchRange
        b.extend_from_slice(&1u16.to_be_bytes()); // entrySelector
        b.extend_from_slice(&0u16.to_be_bytes()); // rangeShift
        for (end, _, _, _) in &seg {
            b.extend_from_slice(&end.to_be_bytes());
        }
        b.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
        for (_, start, _, _) in &seg {
            b.extend_from_slice(&start.to_be_bytes());
        }
        for (_, _, delta, _) in &seg {
            b.extend_from_slice(&delta.to_be_bytes());
        }
        for (_, _, _, range) in &seg {
            b.extend_from_slice(&range.to_be_bytes());
        }

        b.extend_from_slice(&12u16.to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
        b.extend_from_slice(&28u32.to_be_bytes()); // length
        b.extend_from_slice(&0u32.to_be_bytes()); // language
        b.extend_from_slice(&1u32.to_be_bytes()); // numGroups
        b.extend_from_slice(&(start as u32).to_be_bytes());
        b.extend_from_slice(&(end as u32).to_be_bytes());
        b.extend_from_slice(&(first_gid_12 as u32).to_be_bytes());
        b
    }

    /// A simple one-contour glyph outline with the given bounding square.
    pub fn simple_glyph(extent: i16) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&1i16.to_be_bytes()); // numberOfContours
        b.extend_from_slice(&0i16.to_be_bytes());
        b.extend_from_slice(&0i16.to_be_bytes());
        b.extend_from_slice(&extent.to_be_bytes());
        b.extend_from_slice(&extent.to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes()); // endPtsOfContours[0]
        b.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
        b.push(0x01); // on-curve flag
        b.push(0); // x delta
        b.push(0); // y delta
        while b.len() % 2 != 0 {
            b.push(0);
        }
        b
    }

    /// A composite glyph referencing `components` with 2-byte args.
    pub fn composite_glyph(components: &[u16]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&(-1i16).to_be_bytes());
        for v in [0i16; 4] {
            b.extend_from_slice(&v.to_be_bytes());
        }
        for (i, gid) in components.iter().enumerate() {
            let more = i + 1 < components.len();
            let flags: u16 = if more { 0x0020 } else { 0 };
            b.extend_from_slice(&flags.to_be_bytes());
            b.extend_from_slice(&gid.to_be_bytes());
            b.extend_from_slice(&0u16.to_be_bytes()); // args, 2 bytes
        }
        b
    }

    /// Builds `glyf` + `loca` from per-GID outlines (empty slice = empty
    /// glyph), honoring the offset format.
    pub fn glyf_and_loca(outlines: &[Vec<u8>], long_format: bool) -> (Vec<u8>, Vec<u8>) {
        let mut glyf = Vec::new();
        let mut offsets = Vec::with_capacity(outlines.len() + 1);
        for outline in outlines {
            offsets.push(glyf.len() as u32);
            glyf.extend_from_slice(outline);
            if !long_format && glyf.len() % 2 != 0 {
                glyf.push(0);
            }
        }
        offsets.push(glyf.len() as u32);

        let mut loca = Vec::new();
        for off in offsets {
            if long_format {
                loca.extend_from_slice(&off.to_be_bytes());
            } else {
                loca.extend_from_slice(&((off / 2) as u16).to_be_bytes());
            }
        }
        (glyf, loca)
    }

    /// A complete little font: `num_glyphs` outlines, BMP cmap for
    /// 'A'-based codes, 1000 units per em.
    pub fn sample_font(outlines: &[Vec<u8>], long_loca: bool) -> Vec<u8> {
        let (glyf, loca) = glyf_and_loca(outlines, long_loca);
        let mut tables: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
        tables.insert("head", head(1000, long_loca as u16));
        tables.insert("maxp", maxp(outlines.len() as u16));
        tables.insert("hhea", hhea(1));
        tables.insert("hmtx", hmtx(&[500]));
        tables.insert("post", post(0, 0));
        tables.insert("name", name("TestSans"));
        tables.insert(
            "cmap",
            cmap_format4(65, 65 + outlines.len() as u16 - 1, 0),
        );
        tables.insert("glyf", glyf);
        tables.insert("loca", loca);
        assemble(&tables)
    }
}

#[cfg(test)]
mod tests {
    use super::test_font::*;
    use super::*;

    fn outlines(n: usize) -> Vec<Vec<u8>> {
        (0..n).map(|i| simple_glyph(100 + i as i16)).collect()
    }

    #[test]
    fn test_parse_sample_font() {
        let data = sample_font(&outlines(4), false);
        let font = TrueTypeFont::parse(&data, true).unwrap();
        assert_eq!(font.postscript_name, "TestSans");
        assert_eq!(font.units_per_em, 1000);
        assert_eq!(font.num_glyphs, 4);
        assert_eq!(font.index_to_loc_format, 0);
        assert_eq!(font.bbox, [-100, -200, 1000, 900]);
        assert_eq!(font.ascent, 800);
        assert_eq!(font.descent, -200);
        // hmtx has one metric; every glyph reuses it
        assert_eq!(font.glyph_widths, vec![500; 4]);
        assert_eq!(font.gid(66), Some(1));
        assert_eq!(font.planes.iter().copied().collect::<Vec<_>>(), vec![0]);
    }

    #[test]
    fn test_cap_height_falls_back_to_ascent() {
        let data = sample_font(&outlines(1), false);
        let font = TrueTypeFont::parse(&data, true).unwrap();
        assert_eq!(font.cap_height, font.ascent);
    }

    #[test]
    fn test_cmap_prefers_format12_over_format4() {
        let (glyf, loca) = glyf_and_loca(&outlines(9), false);
        let mut tables: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
        tables.insert("head", head(1000, 0));
        tables.insert("maxp", maxp(9));
        tables.insert("hhea", hhea(1));
        tables.insert("hmtx", hmtx(&[500]));
        tables.insert("post", post(0, 0));
        tables.insert("name", name("TestSans"));
        // Format 4 maps 'A'..='D' to GIDs from 0, format 12 to GIDs from 5.
        tables.insert("cmap", cmap_dual(65, 68, 0, 5));
        tables.insert("glyf", glyf);
        tables.insert("loca", loca);
        let font = TrueTypeFont::parse(&assemble(&tables), true).unwrap();
        assert_eq!(font.gid(65), Some(5));
        assert_eq!(font.gid(68), Some(8));
    }

    #[test]
    fn test_otto_rejected() {
        let mut data = sample_font(&outlines(1), false);
        data[0..4].copy_from_slice(b"OTTO");
        assert!(matches!(
            TrueTypeFont::parse(&data, false),
            Err(PdfError::Font(msg)) if msg.contains("CFF")
        ));
    }

    #[test]
    fn test_checksum_mismatch_strict_vs_lenient() {
        let mut data = sample_font(&outlines(2), false);
        // Corrupt the stored checksum of the first directory entry.
        data[16] ^= 0xFF;
        assert!(matches!(
            TrueTypeFont::parse(&data, true),
            Err(PdfError::Font(msg)) if msg.contains("checksum")
        ));
        assert!(TrueTypeFont::parse(&data, false).is_ok());
    }

    #[test]
    fn test_ttc_uses_first_font() {
        let sfnt = sample_font(&outlines(1), false);
        let mut data = Vec::new();
        data.extend_from_slice(b"ttcf");
        data.extend_from_slice(&0x0001_0000u32.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(&16u32.to_be_bytes());
        // Table offsets are file-absolute; rebase the directory.
        let mut font = sfnt.clone();
        let num_tables = u16::from_be_bytes([font[4], font[5]]) as usize;
        for i in 0..num_tables {
            let rec = 12 + 16 * i + 8;
            let old = u32::from_be_bytes([font[rec], font[rec + 1], font[rec + 2], font[rec + 3]]);
            font[rec..rec + 4].copy_from_slice(&(old + 16).to_be_bytes());
        }
        data.extend_from_slice(&font);
        let parsed = TrueTypeFont::parse(&data, true).unwrap();
        assert_eq!(parsed.postscript_name, "TestSans");
    }

    #[test]
    fn test_glyph_space_conversion() {
        assert_eq!(to_pdf_glyph_space(500, 1000), 500);
        assert_eq!(to_pdf_glyph_space(1024, 2048), 500);
        assert_eq!(to_pdf_glyph_space(-300, 1000), -300);
        assert_eq!(to_pdf_glyph_space(333, 2048), 162);
    }

    #[test]
    fn test_truncated_font_fails() {
        let data = sample_font(&outlines(1), false);
        assert!(matches!(
            TrueTypeFont::parse(&data[..40], false),
            Err(PdfError::Font(_))
        ));
    }

    #[test]
    fn test_missing_required_table() {
        let (glyf, loca) = glyf_and_loca(&outlines(1), false);
        let mut tables: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
        tables.insert("head", head(1000, 0));
        tables.insert("maxp", maxp(1));
        tables.insert("hhea", hhea(1));
        tables.insert("hmtx", hmtx(&[500]));
        tables.insert("name", name("TestSans"));
        tables.insert("cmap", cmap_format4(65, 65, 0));
        tables.insert("glyf", glyf);
        tables.insert("loca", loca);
        // no post table
        let data = assemble(&tables);
        assert!(matches!(
            TrueTypeFont::parse(&data, false),
            Err(PdfError::Font(msg)) if msg.contains("post")
        ));
    }
}
