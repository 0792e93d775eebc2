//! Stream decoding according to ISO 32000-1 Section 7.4.
//!
//! The pipeline applies each stage of a stream's `/Filter` chain in order.
//! Supported codecs are FlateDecode, LZWDecode, ASCIIHexDecode,
//! ASCII85Decode, and RunLengthDecode; anything else (image codecs, crypt
//! filters) fails with [`PdfError::UnsupportedFilter`] so callers can decide
//! whether the payload matters to them.

use std::io::Read;

use flate2::read::ZlibDecoder;
use weezl::{decode::Decoder as LzwDecoder, BitOrder};

use crate::error::{PdfError, Result};
use crate::objects::{Dict, FilterEntry, StreamDict};

/// Filters this build can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    FlateDecode,
    LZWDecode,
    ASCIIHexDecode,
    ASCII85Decode,
    RunLengthDecode,
}

impl Filter {
    /// Maps a `/Filter` name to a codec.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FlateDecode" => Some(Filter::FlateDecode),
            "LZWDecode" => Some(Filter::LZWDecode),
            "ASCIIHexDecode" => Some(Filter::ASCIIHexDecode),
            "ASCII85Decode" => Some(Filter::ASCII85Decode),
            "RunLengthDecode" => Some(Filter::RunLengthDecode),
            _ => None,
        }
    }
}

/// Fully decodes a stream's payload by running its filter pipeline.
pub fn decode_stream(sd: &StreamDict) -> Result<Vec<u8>> {
    let pipeline = sd.filter_pipeline()?;
    let mut data = sd.raw.clone();
    for entry in &pipeline {
        data = apply_filter(&data, entry)?;
    }
    Ok(data)
}

/// Applies one pipeline stage.
pub fn apply_filter(data: &[u8], entry: &FilterEntry) -> Result<Vec<u8>> {
    let filter = Filter::from_name(entry.name.as_str())
        .ok_or_else(|| PdfError::UnsupportedFilter(entry.name.as_str().to_string()))?;

    let decoded = match filter {
        Filter::FlateDecode => decode_flate(data)?,
        Filter::LZWDecode => decode_lzw(data, entry.parms.as_ref())?,
        Filter::ASCIIHexDecode => decode_ascii_hex(data)?,
        Filter::ASCII85Decode => decode_ascii85(data)?,
        Filter::RunLengthDecode => decode_run_length(data)?,
    };

    // Predictors only apply to the compression codecs.
    match filter {
        Filter::FlateDecode | Filter::LZWDecode => apply_predictor(decoded, entry.parms.as_ref()),
        _ => Ok(decoded),
    }
}

fn decode_flate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| PdfError::InvalidEncoding(format!("flate stream: {e}")))?;
    Ok(result)
}

/// LZW with PDF bit packing: MSB first, 8-bit codes. `/EarlyChange 0`
/// selects TIFF-style late code-size switching.
fn decode_lzw(data: &[u8], parms: Option<&Dict>) -> Result<Vec<u8>> {
    let early_change = parms
        .and_then(|d| d.integer("EarlyChange"))
        .unwrap_or(1);
    let mut decoder = if early_change == 0 {
        LzwDecoder::with_tiff_size_switch(BitOrder::Msb, 8)
    } else {
        LzwDecoder::new(BitOrder::Msb, 8)
    };
    let mut output = Vec::new();
    decoder
        .into_vec(&mut output)
        .decode(data)
        .status
        .map_err(|e| PdfError::InvalidEncoding(format!("LZW stream: {e}")))?;
    Ok(output)
}

fn hex_digit_value(ch: u8) -> Option<u8> {
    match ch {
        b'0'..=b'9' => Some(ch - b'0'),
        b'A'..=b'F' => Some(ch - b'A' + 10),
        b'a'..=b'f' => Some(ch - b'a' + 10),
        _ => None,
    }
}

fn decode_ascii_hex(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut high: Option<u8> = None;
    for &b in data {
        if b.is_ascii_whitespace() {
            continue;
        }
        if b == b'>' {
            break;
        }
        let v = hex_digit_value(b).ok_or_else(|| {
            PdfError::InvalidEncoding(format!("ASCIIHex stream: invalid digit {:?}", b as char))
        })?;
        match high.take() {
            None => high = Some(v),
            Some(h) => result.push((h << 4) | v),
        }
    }
    // Odd digit count: final digit is the high nibble.
    if let Some(h) = high {
        result.push(h << 4);
    }
    Ok(result)
}

fn decode_ascii85(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut group = [0u8; 5];
    let mut group_len = 0usize;

    let mut bytes = data.iter().filter(|b| !b.is_ascii_whitespace()).peekable();
    // Optional <~ prefix.
    if bytes.peek() == Some(&&b'<') {
        let mut clone = bytes.clone();
        clone.next();
        if clone.peek() == Some(&&b'~') {
            bytes = clone;
            bytes.next();
        }
    }

    while let Some(&b) = bytes.next() {
        match b {
            b'~' => break,
            b'z' if group_len == 0 => result.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[group_len] = b - b'!';
                group_len += 1;
                if group_len == 5 {
                    let value = group
                        .iter()
                        .fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
                    result.extend_from_slice(&value.to_be_bytes());
                    group_len = 0;
                }
            }
            _ => {
                return Err(PdfError::InvalidEncoding(format!(
                    "ASCII85 stream: invalid character {:?}",
                    b as char
                )));
            }
        }
    }

    // Partial final group: pad with 'u', emit group_len - 1 bytes.
    if group_len > 0 {
        if group_len == 1 {
            return Err(PdfError::InvalidEncoding(
                "ASCII85 stream: single trailing digit".to_string(),
            ));
        }
        let out_len = group_len - 1;
        for slot in group.iter_mut().skip(group_len) {
            *slot = 84;
        }
        let value = group
            .iter()
            .fold(0u32, |acc, &d| acc.wrapping_mul(85).wrapping_add(d as u32));
        result.extend_from_slice(&value.to_be_bytes()[..out_len]);
    }

    Ok(result)
}

fn decode_run_length(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut i = 0usize;
    while i < data.len() {
        let length = data[i];
        i += 1;
        match length {
            0..=127 => {
                let n = length as usize + 1;
                if i + n > data.len() {
                    return Err(PdfError::InvalidEncoding(
                        "run-length stream: literal run past end of data".to_string(),
                    ));
                }
                result.extend_from_slice(&data[i..i + n]);
                i += n;
            }
            128 => break, // EOD
            129..=255 => {
                let Some(&b) = data.get(i) else {
                    return Err(PdfError::InvalidEncoding(
                        "run-length stream: repeat run past end of data".to_string(),
                    ));
                };
                i += 1;
                result.extend(std::iter::repeat(b).take(257 - length as usize));
            }
        }
    }
    Ok(result)
}

/// Reverses `/Predictor` transforms declared in DecodeParms. Predictor 1
/// (or absent parms) is the identity; 2 is the TIFF horizontal differencing
/// predictor; 10..15 are the PNG row filters, where each row carries its
/// own filter tag byte.
fn apply_predictor(data: Vec<u8>, parms: Option<&Dict>) -> Result<Vec<u8>> {
    let Some(parms) = parms else {
        return Ok(data);
    };
    let predictor = parms.integer("Predictor").unwrap_or(1);
    if predictor <= 1 {
        return Ok(data);
    }

    let colors = parms.integer("Colors").unwrap_or(1).max(1) as usize;
    let bits = parms.integer("BitsPerComponent").unwrap_or(8) as usize;
    let columns = parms.integer("Columns").unwrap_or(1).max(1) as usize;

    match predictor {
        2 => {
            if bits != 8 {
                return Err(PdfError::InvalidEncoding(format!(
                    "TIFF predictor with {bits} bits per component is not supported"
                )));
            }
            Ok(tiff_predictor(data, colors, columns))
        }
        10..=15 => png_predictor(&data, colors, bits, columns),
        other => Err(PdfError::InvalidEncoding(format!(
            "unknown predictor {other}"
        ))),
    }
}

fn tiff_predictor(mut data: Vec<u8>, colors: usize, columns: usize) -> Vec<u8> {
    let row_bytes = colors * columns;
    if row_bytes == 0 {
        return data;
    }
    for row_start in (0..data.len()).step_by(row_bytes) {
        let end = (row_start + row_bytes).min(data.len());
        for i in row_start + colors..end {
            data[i] = data[i].wrapping_add(data[i - colors]);
        }
    }
    data
}

fn png_predictor(data: &[u8], colors: usize, bits: usize, columns: usize) -> Result<Vec<u8>> {
    let row_bytes = (colors * columns * bits + 7) / 8;
    let bpp = ((colors * bits) / 8).max(1);
    let row_size = row_bytes + 1;
    if row_bytes == 0 || data.len() % row_size != 0 {
        return Err(PdfError::InvalidEncoding(format!(
            "PNG predictor: data length {} is not a multiple of row size {}",
            data.len(),
            row_size
        )));
    }

    let mut result = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_bytes];

    for chunk in data.chunks_exact(row_size) {
        let filter_type = chunk[0];
        let row_data = &chunk[1..];
        let mut row = vec![0u8; row_bytes];

        match filter_type {
            0 => row.copy_from_slice(row_data),
            1 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    row[i] = row_data[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..row_bytes {
                    row[i] = row_data[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let above = prev_row[i] as u16;
                    row[i] = row_data[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                for i in 0..row_bytes {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let above = prev_row[i];
                    let upper_left = if i >= bpp { prev_row[i - bpp] } else { 0 };
                    row[i] = row_data[i].wrapping_add(paeth(left, above, upper_left));
                }
            }
            other => {
                return Err(PdfError::InvalidEncoding(format!(
                    "PNG predictor: unknown row filter {other}"
                )));
            }
        }

        result.extend_from_slice(&row);
        prev_row = row;
    }

    Ok(result)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Name, Object};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn entry(name: &str) -> FilterEntry {
        FilterEntry {
            name: Name::new(name),
            parms: None,
        }
    }

    fn flate(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).and_then(|_| enc.finish()).unwrap()
    }

    #[test]
    fn test_flate_roundtrip() {
        let plain = b"stream payload with some repetition repetition repetition";
        let encoded = flate(plain);
        let decoded = apply_filter(&encoded, &entry("FlateDecode")).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn test_ascii_hex() {
        assert_eq!(
            apply_filter(b"48 65 6C 6C 6F>", &entry("ASCIIHexDecode")).unwrap(),
            b"Hello"
        );
        // odd digit count pads the low nibble with zero
        assert_eq!(
            apply_filter(b"7>", &entry("ASCIIHexDecode")).unwrap(),
            vec![0x70]
        );
    }

    #[test]
    fn test_ascii_hex_rejects_bad_digit() {
        assert!(matches!(
            apply_filter(b"4G>", &entry("ASCIIHexDecode")),
            Err(PdfError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_ascii85() {
        // "Man " encodes to 9jqo^
        assert_eq!(
            apply_filter(b"9jqo^~>", &entry("ASCII85Decode")).unwrap(),
            b"Man "
        );
        // z shorthand for four zero bytes
        assert_eq!(
            apply_filter(b"z~>", &entry("ASCII85Decode")).unwrap(),
            vec![0, 0, 0, 0]
        );
        // partial group: "Ma" encodes to 9jn
        assert_eq!(
            apply_filter(b"9jn~>", &entry("ASCII85Decode")).unwrap(),
            b"Ma"
        );
    }

    #[test]
    fn test_run_length() {
        // literal run of 3, then 'x' repeated 5 times, then EOD
        let data = [2u8, b'a', b'b', b'c', 252, b'x', 128];
        assert_eq!(
            apply_filter(&data, &entry("RunLengthDecode")).unwrap(),
            b"abcxxxxx"
        );
    }

    #[test]
    fn test_run_length_truncated_is_invalid() {
        assert!(matches!(
            apply_filter(&[5u8, b'a'], &entry("RunLengthDecode")),
            Err(PdfError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn test_unsupported_filter() {
        assert!(matches!(
            apply_filter(b"", &entry("DCTDecode")),
            Err(PdfError::UnsupportedFilter(name)) if name == "DCTDecode"
        ));
    }

    #[test]
    fn test_png_up_predictor() {
        // two rows of four bytes, filter 2 (Up)
        let rows = [
            2u8, 10, 20, 30, 40, //
            2u8, 1, 1, 1, 1,
        ];
        let parms = Dict::new()
            .with("Predictor", 12)
            .with("Columns", 4)
            .with("Colors", 1)
            .with("BitsPerComponent", 8);
        let encoded = flate(&rows);
        let e = FilterEntry {
            name: Name::new("FlateDecode"),
            parms: Some(parms),
        };
        assert_eq!(
            apply_filter(&encoded, &e).unwrap(),
            vec![10, 20, 30, 40, 11, 21, 31, 41]
        );
    }

    #[test]
    fn test_tiff_predictor() {
        let parms = Dict::new().with("Predictor", 2).with("Columns", 4);
        let e = FilterEntry {
            name: Name::new("FlateDecode"),
            parms: Some(parms),
        };
        let encoded = flate(&[1u8, 1, 1, 1]);
        assert_eq!(apply_filter(&encoded, &e).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_decode_stream_chain() {
        // Flate output wrapped in ASCIIHex; pipeline lists the outermost
        // filter first.
        let plain = b"chained";
        let compressed = flate(plain);
        let hex_bytes = {
            let mut s = hex::encode_upper(&compressed).into_bytes();
            s.push(b'>');
            s
        };
        let dict = Dict::new().with(
            "Filter",
            vec![Object::name("ASCIIHexDecode"), Object::name("FlateDecode")],
        );
        let sd = StreamDict::new(dict, hex_bytes);
        assert_eq!(decode_stream(&sd).unwrap(), plain);
    }
}
