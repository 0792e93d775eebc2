//! Embedded font handling: TrueType parsing, glyph subsetting, and the
//! user-font cache.

pub mod cache;
pub mod subset;
pub mod ttf;

pub use cache::FontCache;
pub use subset::{closed_glyph_set, subset};
pub use ttf::{to_pdf_glyph_space, TrueTypeFont};
