//! Document serialization.
//!
//! Output is deterministic: objects in ascending number order, dict keys
//! sorted, reals trimmed to at most six decimals, and the file identifier
//! derived from the written bytes. Stream `/Length` values are recomputed,
//! never trusted.

use std::collections::{HashMap, HashSet};
use std::io::Write;

use tracing::debug;

use crate::config::Configuration;
use crate::error::{PdfError, Result};
use crate::objects::{Dict, Object, Reference};
use crate::optimize::collect_garbage;
use crate::xref::{XRefEntry, XRefTable};

/// Serializes one object body (without the `N G obj` wrapper).
pub fn serialize_object(o: &Object) -> Vec<u8> {
    let mut buf = Vec::new();
    write_object(&mut buf, o);
    buf
}

/// Writes the whole document to `out`.
///
/// With `extract_page_nr` set, a working copy of the table is trimmed to
/// that single page (kids and counts adjusted up the chain, unreachable
/// objects swept) before serialization.
pub fn write_document<W: Write>(
    xref: &XRefTable,
    config: &Configuration,
    out: &mut W,
) -> Result<()> {
    let mut working = xref.clone();
    if let Some(page_nr) = config.extract_page_nr {
        extract_page(&mut working, page_nr, config.reduced_feature_set)?;
        collect_garbage(&mut working)?;
    }
    working.ensure_free_head();
    working.relink_free_list();

    let root = working
        .trailer
        .get("Root")
        .cloned()
        .ok_or_else(|| PdfError::MissingRequired {
            dict: "trailer".to_string(),
            entry: "Root".to_string(),
            obj_nr: 0,
        })?;

    let mut buf: Vec<u8> = Vec::new();
    buf.extend_from_slice(format!("%PDF-{}\n", working.version()).as_bytes());
    // Binary marker comment so transfer agents treat the file as binary.
    buf.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets: HashMap<u32, usize> = HashMap::new();
    let mut written = 0u32;
    for nr in working.sorted_obj_nrs() {
        let Some(entry) = working.lookup(nr) else {
            continue;
        };
        let Some(object) = entry.object() else {
            continue;
        };
        offsets.insert(nr, buf.len());
        buf.extend_from_slice(format!("{nr} {} obj\n", entry.gen_nr()).as_bytes());
        write_object(&mut buf, object);
        buf.extend_from_slice(b"\nendobj\n");
        written += 1;
    }

    let xref_offset = buf.len();
    write_xref_table(&mut buf, &working, &offsets);

    // File identifier: fingerprint of everything written so far.
    let digest = md5::compute(&buf).0.to_vec();
    let mut trailer = Dict::new();
    trailer.set("Size", working.size() as i64);
    trailer.set("Root", root);
    if let Some(info) = working.trailer.get("Info") {
        trailer.set("Info", info.clone());
    }
    trailer.set(
        "ID",
        vec![
            Object::HexLiteral(digest.clone()),
            Object::HexLiteral(digest),
        ],
    );

    buf.extend_from_slice(b"trailer\n");
    write_object(&mut buf, &Object::Dict(trailer));
    buf.extend_from_slice(format!("\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());

    debug!(objects = written, bytes = buf.len(), "document serialized");
    out.write_all(&buf)?;
    Ok(())
}

/// Trims the page tree of `xref` down to the 1-based `page_nr`. Every
/// ancestor keeps a single kid and a count of one.
fn extract_page(xref: &mut XRefTable, page_nr: u32, reduced: bool) -> Result<()> {
    let catalog = xref.catalog()?;
    let pages = catalog
        .reference("Pages")
        .ok_or_else(|| PdfError::MissingRequired {
            dict: "catalog".to_string(),
            entry: "Pages".to_string(),
            obj_nr: xref.catalog_obj_nr().unwrap_or(0),
        })?;

    let mut counter = 0u32;
    let mut path = Vec::new();
    let mut visited = HashSet::new();
    let found = find_page_path(
        xref,
        pages.obj_nr(),
        page_nr,
        &mut counter,
        &mut path,
        &mut visited,
    )?;
    if !found {
        return Err(PdfError::rejected(
            "configuration",
            "extractPageNr",
            0,
            format!("page {page_nr} is out of range ({counter} pages)"),
        ));
    }

    for pair in path.windows(2) {
        let (parent, child) = (pair[0], pair[1]);
        let child_gen = xref.lookup(child).map(|e| e.gen_nr()).unwrap_or(0);
        xref.set_dict_entry(
            parent,
            "Kids",
            Object::Array(vec![Object::Reference(Reference::new(child, child_gen))]),
        )?;
        xref.set_dict_entry(parent, "Count", Object::Integer(1))?;
    }
    if reduced {
        if let Some(&leaf) = path.last() {
            xref.remove_dict_entry(leaf, "Annots")?;
            debug!(page = page_nr, "dropped annotations from extracted page");
        }
    }
    Ok(())
}

fn find_page_path(
    xref: &XRefTable,
    node_nr: u32,
    target: u32,
    counter: &mut u32,
    path: &mut Vec<u32>,
    visited: &mut HashSet<u32>,
) -> Result<bool> {
    if !visited.insert(node_nr) {
        return Ok(false);
    }
    let Some(Object::Dict(node)) = xref.lookup(node_nr).and_then(|e| e.object()) else {
        return Ok(false);
    };
    if node.dict_type() == Some("Page") {
        *counter += 1;
        if *counter == target {
            path.push(node_nr);
            return Ok(true);
        }
        return Ok(false);
    }
    path.push(node_nr);
    if let Some(kids) = node.array("Kids") {
        let kid_nrs: Vec<u32> = kids
            .iter()
            .filter_map(|o| o.as_reference())
            .map(|r| r.obj_nr())
            .collect();
        for kid in kid_nrs {
            if find_page_path(xref, kid, target, counter, path, visited)? {
                return Ok(true);
            }
        }
    }
    path.pop();
    Ok(false)
}

fn write_xref_table(buf: &mut Vec<u8>, xref: &XRefTable, offsets: &HashMap<u32, usize>) {
    buf.extend_from_slice(b"xref\n");
    let nrs = xref.sorted_obj_nrs();
    let mut i = 0;
    while i < nrs.len() {
        let start = i;
        while i + 1 < nrs.len() && nrs[i + 1] == nrs[i] + 1 {
            i += 1;
        }
        buf.extend_from_slice(format!("{} {}\n", nrs[start], i - start + 1).as_bytes());
        for &nr in &nrs[start..=i] {
            match xref.lookup(nr) {
                Some(XRefEntry::Free { gen_nr, next_free }) => {
                    buf.extend_from_slice(
                        format!("{next_free:010} {gen_nr:05} f\r\n").as_bytes(),
                    );
                }
                Some(entry) => {
                    let off = offsets.get(&nr).copied().unwrap_or(0);
                    buf.extend_from_slice(
                        format!("{off:010} {:05} n\r\n", entry.gen_nr()).as_bytes(),
                    );
                }
                None => {}
            }
        }
        i += 1;
    }
}

fn write_object(buf: &mut Vec<u8>, o: &Object) {
    match o {
        Object::Null => buf.extend_from_slice(b"null"),
        Object::Boolean(true) => buf.extend_from_slice(b"true"),
        Object::Boolean(false) => buf.extend_from_slice(b"false"),
        Object::Integer(i) => buf.extend_from_slice(i.to_string().as_bytes()),
        Object::Real(r) => buf.extend_from_slice(format_real(*r).as_bytes()),
        Object::Name(n) => write_name(buf, n.as_str()),
        Object::StringLiteral(bytes) => write_string_literal(buf, bytes),
        Object::HexLiteral(bytes) => {
            buf.push(b'<');
            buf.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            buf.push(b'>');
        }
        Object::Array(items) => {
            buf.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_object(buf, item);
            }
            buf.push(b']');
        }
        Object::Dict(d) => write_dict(buf, d),
        Object::Stream(sd) => {
            let mut dict = sd.dict.clone();
            dict.set("Length", sd.raw.len() as i64);
            write_dict(buf, &dict);
            buf.extend_from_slice(b"\nstream\n");
            buf.extend_from_slice(&sd.raw);
            buf.extend_from_slice(b"\nendstream");
        }
        Object::Reference(r) => {
            buf.extend_from_slice(format!("{} {} R", r.obj_nr(), r.gen_nr()).as_bytes());
        }
    }
}

fn write_dict(buf: &mut Vec<u8>, d: &Dict) {
    buf.extend_from_slice(b"<<");
    for key in d.sorted_keys() {
        write_name(buf, key);
        buf.push(b' ');
        if let Some(value) = d.get(key) {
            write_object(buf, value);
        }
    }
    buf.extend_from_slice(b">>");
}

/// Names escape `#`, delimiters, and anything outside `!`..`~` as `#xx`
/// (ISO 32000-1, 7.3.5).
fn write_name(buf: &mut Vec<u8>, name: &str) {
    buf.push(b'/');
    for &b in name.as_bytes() {
        let delimiter = matches!(
            b,
            b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
        );
        if delimiter || !(b'!'..=b'~').contains(&b) {
            buf.push(b'#');
            buf.extend_from_slice(format!("{b:02X}").as_bytes());
        } else {
            buf.push(b);
        }
    }
}

fn write_string_literal(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.push(b'(');
    for &b in bytes {
        match b {
            b'(' | b')' | b'\\' => {
                buf.push(b'\\');
                buf.push(b);
            }
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            0x08 => buf.extend_from_slice(b"\\b"),
            0x0C => buf.extend_from_slice(b"\\f"),
            b if b < 0x20 => {
                buf.extend_from_slice(format!("\\{b:03o}").as_bytes());
            }
            b => buf.push(b),
        }
    }
    buf.push(b')');
}

/// At most six decimals, trailing zeros trimmed; whole values print as
/// integers.
fn format_real(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let mut s = format!("{v:.6}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    s
}
