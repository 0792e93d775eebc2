//! On-disk cache of parsed fonts.
//!
//! One JSON file per PostScript name, holding the parsed structure next to
//! the hex-encoded source bytes. Entries are never trusted blindly: a load
//! reparses the stored bytes and deep-compares the result against the
//! stored structure, treating any divergence as a miss.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ttf::TrueTypeFont;
use crate::error::{PdfError, Result};

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    font: TrueTypeFont,
    /// The raw TTF bytes, hex-encoded.
    font_file: String,
}

#[derive(Debug, Clone)]
pub struct FontCache {
    dir: PathBuf,
}

impl FontCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FontCache { dir: dir.into() }
    }

    fn entry_path(&self, postscript_name: &str) -> PathBuf {
        let safe: String = postscript_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    /// Stores a parsed font together with its source bytes.
    pub fn store(&self, font: &TrueTypeFont, font_file: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            font: font.clone(),
            font_file: hex::encode(font_file),
        };
        let json = serde_json::to_string(&entry)
            .map_err(|e| PdfError::Font(format!("cannot serialize font cache entry: {e}")))?;
        fs::write(self.entry_path(&font.postscript_name), json)?;
        Ok(())
    }

    /// Loads a cached font and its source bytes. An entry is only trusted
    /// after its bytes reparse to the stored structure; anything else
    /// counts as a miss.
    pub fn load(&self, postscript_name: &str) -> Result<Option<(TrueTypeFont, Vec<u8>)>> {
        let path = self.entry_path(postscript_name);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        let entry: CacheEntry = match serde_json::from_str(&json) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%err, path = %path.display(), "discarding unreadable font cache entry");
                return Ok(None);
            }
        };
        let bytes = match hex::decode(&entry.font_file) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "discarding font cache entry with a bad hex payload");
                return Ok(None);
            }
        };
        let reparsed = match TrueTypeFont::parse(&bytes, false) {
            Ok(font) => font,
            Err(err) => {
                warn!(%err, "discarding font cache entry that no longer parses");
                return Ok(None);
            }
        };
        if reparsed != entry.font {
            warn!(
                name = postscript_name,
                "discarding font cache entry failing the round-trip compare"
            );
            return Ok(None);
        }
        Ok(Some((entry.font, bytes)))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::super::ttf::test_font::{sample_font, simple_glyph};
    use super::*;

    fn parsed_sample() -> (TrueTypeFont, Vec<u8>) {
        let data = sample_font(&[simple_glyph(100), simple_glyph(200)], false);
        let font = TrueTypeFont::parse(&data, true).unwrap();
        (font, data)
    }

    #[test]
    fn test_store_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FontCache::new(dir.path());
        let (font, data) = parsed_sample();
        cache.store(&font, &data).unwrap();

        let (loaded, bytes) = cache.load("TestSans").unwrap().unwrap();
        assert_eq!(loaded, font);
        assert_eq!(bytes, data);
    }

    #[test]
    fn test_missing_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FontCache::new(dir.path());
        assert!(cache.load("NoSuchFont").unwrap().is_none());
    }

    #[test]
    fn test_garbage_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FontCache::new(dir.path());
        fs::write(dir.path().join("Broken.json"), "not json at all").unwrap();
        assert!(cache.load("Broken").unwrap().is_none());
    }

    #[test]
    fn test_bad_hex_payload_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FontCache::new(dir.path());
        let (font, _) = parsed_sample();
        let entry = CacheEntry {
            font,
            font_file: "zz-not-hex".to_string(),
        };
        fs::write(
            dir.path().join("TestSans.json"),
            serde_json::to_string(&entry).unwrap(),
        )
        .unwrap();
        assert!(cache.load("TestSans").unwrap().is_none());
    }

    #[test]
    fn test_struct_drift_fails_the_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FontCache::new(dir.path());
        let (mut font, data) = parsed_sample();
        font.units_per_em = 2048;
        cache.store(&font, &data).unwrap();
        assert!(cache.load("TestSans").unwrap().is_none());
    }

    #[test]
    fn test_awkward_names_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FontCache::new(dir.path());
        let (mut font, data) = parsed_sample();
        font.postscript_name = "Weird/Name Font".to_string();
        cache.store(&font, &data).unwrap();
        assert!(dir.path().join("Weird-Name-Font.json").exists());
    }
}
