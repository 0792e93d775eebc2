//! The PDF object model (ISO 32000-1, 7.3).
//!
//! A document is a table of numbered objects; each object is one of the
//! variants of [`Object`]. The model here is fully decoded: no byte offsets,
//! no lexer state, just values. Indirect references are plain
//! (object number, generation) pairs resolved against an
//! [`XRefTable`](crate::xref::XRefTable).

mod dictionary;
mod object;
mod stream;
mod text;

pub use dictionary::Dict;
pub use object::{Name, Object, Reference};
pub use stream::{FilterEntry, StreamDict};
pub use text::decode_text;
