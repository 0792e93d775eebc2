//! Text-string decoding (ISO 32000-1, 7.9.2 and Annex D).

use crate::error::{PdfError, Result};

/// Decodes a text string's payload bytes to characters.
///
/// Strings beginning with the byte-order mark `FE FF` are UTF-16BE; an odd
/// number of payload bytes or an unpaired surrogate fails with
/// [`PdfError::InvalidEncoding`]. Everything else is PDFDocEncoding, which
/// always succeeds (undefined code points decode to U+FFFD).
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return decode_utf16_be(&bytes[2..]);
    }
    Ok(bytes.iter().map(|&b| pdf_doc_char(b)).collect())
}

fn decode_utf16_be(payload: &[u8]) -> Result<String> {
    if payload.len() % 2 != 0 {
        return Err(PdfError::InvalidEncoding(format!(
            "UTF-16BE text string has odd payload length {}",
            payload.len()
        )));
    }
    let units: Vec<u16> = payload
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| {
            PdfError::InvalidEncoding(format!(
                "UTF-16BE text string contains unpaired surrogate {:#06x}",
                e.unpaired_surrogate()
            ))
        })
}

/// Single-byte PDFDocEncoding lookup (Annex D.3).
///
/// Agrees with ASCII in 0x20..0x7E and with Latin-1 in 0xA1..0xFF; the
/// differences are the accent row at 0x18..0x1F, the punctuation and
/// ligature block at 0x80..0x9E, and the euro sign at 0xA0.
fn pdf_doc_char(b: u8) -> char {
    match b {
        0x09 | 0x0A | 0x0D => b as char,
        0x18 => '\u{02D8}', // breve
        0x19 => '\u{02C7}', // caron
        0x1A => '\u{02C6}', // modifier circumflex
        0x1B => '\u{02D9}', // dot accent
        0x1C => '\u{02DD}', // double acute
        0x1D => '\u{02DB}', // ogonek
        0x1E => '\u{02DA}', // ring above
        0x1F => '\u{02DC}', // small tilde
        0x20..=0x7E => b as char,
        0x80 => '\u{2022}', // bullet
        0x81 => '\u{2020}', // dagger
        0x82 => '\u{2021}', // double dagger
        0x83 => '\u{2026}', // ellipsis
        0x84 => '\u{2014}', // em dash
        0x85 => '\u{2013}', // en dash
        0x86 => '\u{0192}', // florin
        0x87 => '\u{2044}', // fraction slash
        0x88 => '\u{2039}', // single left guillemet
        0x89 => '\u{203A}', // single right guillemet
        0x8A => '\u{2212}', // minus sign
        0x8B => '\u{2030}', // per mille
        0x8C => '\u{201E}', // low double quote
        0x8D => '\u{201C}', // left double quote
        0x8E => '\u{201D}', // right double quote
        0x8F => '\u{2018}', // left single quote
        0x90 => '\u{2019}', // right single quote
        0x91 => '\u{201A}', // low single quote
        0x92 => '\u{2122}', // trademark
        0x93 => '\u{FB01}', // fi ligature
        0x94 => '\u{FB02}', // fl ligature
        0x95 => '\u{0141}', // Lslash
        0x96 => '\u{0152}', // OE
        0x97 => '\u{0160}', // Scaron
        0x98 => '\u{0178}', // Ydieresis
        0x99 => '\u{017D}', // Zcaron
        0x9A => '\u{0131}', // dotless i
        0x9B => '\u{0142}', // lslash
        0x9C => '\u{0153}', // oe
        0x9D => '\u{0161}', // scaron
        0x9E => '\u{017E}', // zcaron
        0xA0 => '\u{20AC}', // euro
        0xA1..=0xFF if b != 0xAD => {
            // Latin-1 block.
            char::from_u32(b as u32).unwrap_or('\u{FFFD}')
        }
        _ => '\u{FFFD}',
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passthrough() {
        assert_eq!(decode_text(b"Hello PDF").ok().as_deref(), Some("Hello PDF"));
    }

    #[test]
    fn test_pdf_doc_specials() {
        // bullet, euro, fi ligature
        assert_eq!(
            decode_text(&[0x80, 0xA0, 0x93]).ok().as_deref(),
            Some("\u{2022}\u{20AC}\u{FB01}")
        );
    }

    #[test]
    fn test_latin1_block() {
        // é = 0xE9, ü = 0xFC
        assert_eq!(decode_text(&[0xE9, 0xFC]).ok().as_deref(), Some("éü"));
    }

    #[test]
    fn test_undefined_bytes_become_replacement() {
        assert_eq!(
            decode_text(&[0x01, 0x7F, 0xAD]).ok().as_deref(),
            Some("\u{FFFD}\u{FFFD}\u{FFFD}")
        );
    }

    #[test]
    fn test_utf16_be_with_bom() {
        // "Ab€" as UTF-16BE
        let bytes = [0xFE, 0xFF, 0x00, 0x41, 0x00, 0x62, 0x20, 0xAC];
        assert_eq!(decode_text(&bytes).ok().as_deref(), Some("Ab\u{20AC}"));
    }

    #[test]
    fn test_utf16_supplementary_plane() {
        // U+1D11E musical G clef as a surrogate pair
        let bytes = [0xFE, 0xFF, 0xD8, 0x34, 0xDD, 0x1E];
        assert_eq!(decode_text(&bytes).ok().as_deref(), Some("\u{1D11E}"));
    }

    #[test]
    fn test_odd_utf16_payload_rejected() {
        let bytes = [0xFE, 0xFF, 0x00, 0x41, 0x00];
        assert!(matches!(
            decode_text(&bytes),
            Err(PdfError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_unpaired_surrogate_rejected() {
        let bytes = [0xFE, 0xFF, 0xD8, 0x34, 0x00, 0x41];
        assert!(matches!(
            decode_text(&bytes),
            Err(PdfError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(decode_text(b"").ok().as_deref(), Some(""));
        // BOM alone is an empty UTF-16 string
        assert_eq!(decode_text(&[0xFE, 0xFF]).ok().as_deref(), Some(""));
    }
}
