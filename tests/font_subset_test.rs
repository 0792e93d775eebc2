//! Subsetter scenarios against a synthetic 800-glyph TrueType font.
//!
//! The builders below assemble a complete sfnt in memory so the tests can
//! drive the public font API the way an embedding path would: parse the
//! file, close the glyph set over composites, cut the subset, and parse
//! the result back.

use std::collections::{BTreeMap, BTreeSet};

use pdfproc::font::{closed_glyph_set, subset, FontCache, TrueTypeFont};

const GLYPH_COUNT: u16 = 800;
/// GID 90 is a composite built from GID 65 plus the accent at GID 200.
const COMPOSITE_GID: u16 = 90;

fn be_u32(data: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
}

/// Big-endian word sum over the padded body. The head table's
/// checksum-adjustment word never participates.
fn checksum(tag: &str, body: &[u8]) -> u32 {
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

fn assemble(tables: &BTreeMap<&'static str, Vec<u8>>) -> Vec<u8> {
    let n = tables.len() as u16;
    let mut search_range = 1u16;
    let mut entry_selector = 0u16;
    while search_range * 2 <= n {
        search_range *= 2;
        entry_selector += 1;
    }
    search_range *= 16;

    let mut out = Vec::new();
    out.extend_from_slice(&0x0001_0000u32.to_be_bytes());
    out.extend_from_slice(&n.to_be_bytes());
    out.extend_from_slice(&search_range.to_be_bytes());
    out.extend_from_slice(&entry_selector.to_be_bytes());
    out.extend_from_slice(&(n * 16 - search_range).to_be_bytes());

    let mut offset = 12 + 16 * tables.len();
    let mut bodies = Vec::new();
    for (tag, body) in tables {
        let mut padded = body.clone();
        padded.resize((padded.len() + 3) & !3, 0);
        out.extend_from_slice(tag.as_bytes());
        out.extend_from_slice(&checksum(tag, &padded).to_be_bytes());
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

fn head_table(units_per_em: u16, index_to_loc_format: u16) -> Vec<u8> {
    let mut b = vec![0u8; 54];
    b[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    b[18..20].copy_from_slice(&units_per_em.to_be_bytes());
    b[36..38].copy_from_slice(&(-120i16).to_be_bytes());
    b[38..40].copy_from_slice(&(-250i16).to_be_bytes());
    b[40..42].copy_from_slice(&1100i16.to_be_bytes());
    b[42..44].copy_from_slice(&950i16.to_be_bytes());
    b[50..52].copy_from_slice(&index_to_loc_format.to_be_bytes());
    b
}

fn maxp_table(num_glyphs: u16) -> Vec<u8> {
    let mut b = vec![0u8; 6];
    b[4..6].copy_from_slice(&num_glyphs.to_be_bytes());
    b
}

fn hhea_table(metrics: u16) -> Vec<u8> {
    let mut b = vec![0u8; 36];
    b[4..6].copy_from_slice(&760i16.to_be_bytes());
    b[6..8].copy_from_slice(&(-240i16).to_be_bytes());
    b[34..36].copy_from_slice(&metrics.to_be_bytes());
    b
}

fn hmtx_table(advances: &[u16]) -> Vec<u8> {
    let mut b = Vec::new();
    for a in advances {
        b.extend_from_slice(&a.to_be_bytes());
        b.extend_from_slice(&0u16.to_be_bytes());
    }
    b
}

fn post_table() -> Vec<u8> {
    vec![0u8; 18]
}

/// Name table holding only a Macintosh NameID 6 record.
fn name_table(ps_name: &str) -> Vec<u8> {
    let bytes = ps_name.as_bytes();
    let mut b = Vec::new();
    b.extend_from_slice(&0u16.to_be_bytes());
    b.extend_from_slice(&1u16.to_be_bytes());
    b.extend_from_slice(&18u16.to_be_bytes());
    for v in [1u16, 0, 0, 6, bytes.len() as u16, 0] {
        b.extend_from_slice(&v.to_be_bytes());
    }
    b.extend_from_slice(bytes);
    b
}

/// Format 4 cmap mapping `start..=end` to the same GID numbers.
fn cmap_identity(start: u16, end: u16) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&0u16.to_be_bytes());
    b.extend_from_slice(&1u16.to_be_bytes());
    // one record: platform 3, encoding 1, subtable at offset 12
    b.extend_from_slice(&3u16.to_be_bytes());
    b.extend_from_slice(&1u16.to_be_bytes());
    b.extend_from_slice(&12u32.to_be_bytes());

    let segs: [(u16, u16, u16); 2] = [(end, start, 0), (0xFFFF, 0xFFFF, 1)];
    b.extend_from_slice(&4u16.to_be_bytes());
    b.extend_from_slice(&32u16.to_be_bytes()); // length
    b.extend_from_slice(&0u16.to_be_bytes()); // language
    b.extend_from_slice(&4u16.to_be_bytes()); // segCountX2
    b.extend_from_slice(&4u16.to_be_bytes()); // searchRange
    b.extend_from_slice(&1u16.to_be_bytes()); // entrySelector
    b.extend_from_slice(&0u16.to_be_bytes()); // rangeShift
    for (end, _, _) in &segs {
        b.extend_from_slice(&end.to_be_bytes());
    }
    b.extend_from_slice(&0u16.to_be_bytes()); // reservedPad
    for (_, start, _) in &segs {
        b.extend_from_slice(&start.to_be_bytes());
    }
    for (_, _, delta) in &segs {
        b.extend_from_slice(&delta.to_be_bytes());
    }
    for _ in &segs {
        b.extend_from_slice(&0u16.to_be_bytes()); // idRangeOffset
    }
    b
}

fn simple_glyph(extent: i16) -> Vec<u8> {
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

/// Composite glyph over `components`, written with word arguments.
fn composite_glyph(components: &[u16]) -> Vec<u8> {
    let mut b = Vec::new();
    b.extend_from_slice(&(-1i16).to_be_bytes());
    for v in [0i16; 4] {
        b.extend_from_slice(&v.to_be_bytes());
    }
    for (i, gid) in components.iter().enumerate() {
        let mut flags = 0x0001u16; // ARG_1_AND_2_ARE_WORDS
        if i + 1 < components.len() {
            flags |= 0x0020; // MORE_COMPONENTS
        }
        b.extend_from_slice(&flags.to_be_bytes());
        b.extend_from_slice(&gid.to_be_bytes());
        b.extend_from_slice(&[0u8; 4]); // word args
    }
    b
}

fn glyf_and_long_loca(outlines: &[Vec<u8>]) -> (Vec<u8>, Vec<u8>) {
    let mut glyf = Vec::new();
    let mut loca = Vec::new();
    for outline in outlines {
        loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
        glyf.extend_from_slice(outline);
    }
    loca.extend_from_slice(&(glyf.len() as u32).to_be_bytes());
    (glyf, loca)
}

/// 800 glyphs with 4-byte loca offsets; every source outline is non-empty.
fn eight_hundred_glyph_font() -> Vec<u8> {
    let outlines: Vec<Vec<u8>> = (0..GLYPH_COUNT)
        .map(|gid| {
            if gid == COMPOSITE_GID {
                composite_glyph(&[65, 200])
            } else {
                simple_glyph(50 + (gid % 700) as i16)
            }
        })
        .collect();
    let (glyf, loca) = glyf_and_long_loca(&outlines);
    let mut tables: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
    tables.insert("head", head_table(1000, 1));
    tables.insert("maxp", maxp_table(GLYPH_COUNT));
    tables.insert("hhea", hhea_table(1));
    tables.insert("hmtx", hmtx_table(&[600]));
    tables.insert("post", post_table());
    tables.insert("name", name_table("SubsetProbe"));
    tables.insert("cmap", cmap_identity(65, 90));
    tables.insert("glyf", glyf);
    tables.insert("loca", loca);
    assemble(&tables)
}

fn gid_set(gids: &[u16]) -> BTreeSet<u16> {
    gids.iter().copied().collect()
}

fn outline_span(loca: &[u8], gid: u16) -> (usize, usize) {
    let gid = gid as usize;
    (
        be_u32(loca, 4 * gid) as usize,
        be_u32(loca, 4 * gid + 4) as usize,
    )
}

#[test]
fn test_closure_over_a_composite_pulls_its_components() {
    let font =
        TrueTypeFont::parse(&eight_hundred_glyph_font(), true).expect("synthetic font parses");
    assert_eq!(font.num_glyphs, GLYPH_COUNT);
    assert_eq!(font.index_to_loc_format, 1);
    assert_eq!(font.postscript_name, "SubsetProbe");
    assert_eq!(font.gid(66), Some(66), "identity cmap");

    let closed = closed_glyph_set(&font, &gid_set(&[65, 66, 90])).expect("closure");
    assert_eq!(
        closed.into_iter().collect::<Vec<_>>(),
        vec![0, 65, 66, 90, 200],
        "closure is the request plus .notdef plus the composite's parts"
    );
}

#[test]
fn test_subset_keeps_numbering_and_collapses_unused_ranges() {
    let original = eight_hundred_glyph_font();
    let font = TrueTypeFont::parse(&original, true).expect("synthetic font parses");
    let cut = subset(&font, &gid_set(&[65, 66, 90])).expect("subset");
    assert!(cut.len() < original.len(), "795 dropped outlines must shrink the file");

    // A strict reparse checks every directory checksum the subsetter wrote.
    let sub = TrueTypeFont::parse(&cut, true).expect("subset parses strictly");
    assert_eq!(sub.num_glyphs, GLYPH_COUNT, "maxp passes through unchanged");

    let loca = &sub.tables["loca"].body;
    assert_eq!(loca.len(), (GLYPH_COUNT as usize + 1) * 4);
    assert_eq!(be_u32(loca, 0), 0, "first offset is zero");
    assert_eq!(
        be_u32(loca, GLYPH_COUNT as usize * 4),
        sub.tables["glyf"].size,
        "last offset closes the glyf table"
    );

    let kept = gid_set(&[0, 65, 66, 90, 200]);
    for gid in 0..GLYPH_COUNT {
        let (from, thru) = outline_span(loca, gid);
        if kept.contains(&gid) {
            assert!(thru > from, "GID {gid} should keep its outline");
        } else {
            assert_eq!(from, thru, "GID {gid} should collapse to zero length");
        }
    }
}

#[test]
fn test_kept_outlines_are_copied_verbatim() {
    let font =
        TrueTypeFont::parse(&eight_hundred_glyph_font(), true).expect("synthetic font parses");
    let cut = subset(&font, &gid_set(&[65, 66, 90])).expect("subset");
    let sub = TrueTypeFont::parse(&cut, true).expect("subset parses");

    for gid in [0u16, 65, 66, 90, 200] {
        let (of, ot) = outline_span(&font.tables["loca"].body, gid);
        let (nf, nt) = outline_span(&sub.tables["loca"].body, gid);
        assert_eq!(
            &font.tables["glyf"].body[of..ot],
            &sub.tables["glyf"].body[nf..nt],
            "GID {gid} outline should survive byte for byte"
        );
    }
}

#[test]
fn test_subsetting_twice_with_the_same_set_is_stable() {
    let font =
        TrueTypeFont::parse(&eight_hundred_glyph_font(), true).expect("synthetic font parses");
    let wanted = gid_set(&[65, 66, 90]);
    let first = subset(&font, &wanted).expect("first cut");
    let again = TrueTypeFont::parse(&first, true).expect("first cut parses");
    let second = subset(&again, &wanted).expect("second cut");
    assert_eq!(first, second, "the same set must reproduce the file");
}

#[test]
fn test_parsed_font_survives_the_disk_cache() {
    let data = eight_hundred_glyph_font();
    let font = TrueTypeFont::parse(&data, true).expect("synthetic font parses");

    let dir = tempfile::tempdir().expect("temp dir");
    let cache = FontCache::new(dir.path());
    cache.store(&font, &data).expect("store");
    let (loaded, bytes) = cache.load("SubsetProbe").expect("load").expect("verified hit");
    assert_eq!(loaded, font);
    assert_eq!(bytes, data);

    // The cached copy subsets exactly like the fresh parse.
    let wanted = gid_set(&[65, 66, 90]);
    assert_eq!(
        subset(&loaded, &wanted).expect("subset cached"),
        subset(&font, &wanted).expect("subset fresh")
    );
}
