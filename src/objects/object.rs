//! Core object variants.

use std::fmt;

use crate::objects::{Dict, StreamDict};

/// A PDF name object (ISO 32000-1, 7.3.5).
///
/// Stored fully decoded: `#xx` escapes from the file syntax have already
/// been resolved, and two names are equal iff their byte sequences are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(pub String);

impl Name {
    pub fn new(s: impl Into<String>) -> Self {
        Name(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for Name {
    fn from(s: &str) -> Self {
        Name(s.to_string())
    }
}

impl From<String> for Name {
    fn from(s: String) -> Self {
        Name(s)
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// An indirect reference: object number and generation (ISO 32000-1, 7.3.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reference {
    obj_nr: u32,
    gen_nr: u16,
}

impl Reference {
    pub fn new(obj_nr: u32, gen_nr: u16) -> Self {
        Reference { obj_nr, gen_nr }
    }

    pub fn obj_nr(&self) -> u32 {
        self.obj_nr
    }

    pub fn gen_nr(&self) -> u16 {
        self.gen_nr
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.obj_nr, self.gen_nr)
    }
}

/// A decoded PDF object.
///
/// String payloads keep their raw bytes; text-string interpretation
/// (UTF-16BE vs. PDFDocEncoding) happens in [`decode_text`] when a consumer
/// asks for characters. The literal/hex distinction is retained only so a
/// rewrite can reproduce the original notation.
///
/// [`decode_text`]: crate::objects::decode_text
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Name),
    /// String written in `(...)` notation, unescaped payload bytes.
    StringLiteral(Vec<u8>),
    /// String written in `<...>` notation, decoded payload bytes.
    HexLiteral(Vec<u8>),
    Array(Vec<Object>),
    Dict(Dict),
    Stream(StreamDict),
    Reference(Reference),
}

impl Object {
    /// Name of the variant, used for mismatch diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "null",
            Object::Boolean(_) => "boolean",
            Object::Integer(_) => "integer",
            Object::Real(_) => "real",
            Object::Name(_) => "name",
            Object::StringLiteral(_) => "string literal",
            Object::HexLiteral(_) => "hex literal",
            Object::Array(_) => "array",
            Object::Dict(_) => "dict",
            Object::Stream(_) => "stream",
            Object::Reference(_) => "indirect reference",
        }
    }

    pub fn name(s: impl Into<String>) -> Self {
        Object::Name(Name(s.into()))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Object::StringLiteral(s.into().into_bytes())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of an integer or real.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Raw bytes of a string, regardless of notation.
    pub fn as_string_bytes(&self) -> Option<&[u8]> {
        match self {
            Object::StringLiteral(b) | Object::HexLiteral(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dict(d) => Some(d),
            // A stream is usable wherever a dict is expected.
            Object::Stream(sd) => Some(&sd.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&StreamDict> {
        match self {
            Object::Stream(sd) => Some(sd),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<Reference> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Object::Boolean(b)
    }
}

impl From<i64> for Object {
    fn from(i: i64) -> Self {
        Object::Integer(i)
    }
}

impl From<i32> for Object {
    fn from(i: i32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<u32> for Object {
    fn from(i: u32) -> Self {
        Object::Integer(i as i64)
    }
}

impl From<f64> for Object {
    fn from(r: f64) -> Self {
        Object::Real(r)
    }
}

impl From<Name> for Object {
    fn from(n: Name) -> Self {
        Object::Name(n)
    }
}

impl From<Reference> for Object {
    fn from(r: Reference) -> Self {
        Object::Reference(r)
    }
}

impl From<Dict> for Object {
    fn from(d: Dict) -> Self {
        Object::Dict(d)
    }
}

impl From<StreamDict> for Object {
    fn from(sd: StreamDict) -> Self {
        Object::Stream(sd)
    }
}

impl From<Vec<Object>> for Object {
    fn from(a: Vec<Object>) -> Self {
        Object::Array(a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_equality_is_byte_equality() {
        assert_eq!(Name::new("Pages"), Name::new("Pages"));
        assert_ne!(Name::new("Pages"), Name::new("pages"));
        assert_eq!(Name::new("Type"), *"Type");
    }

    #[test]
    fn test_reference_display() {
        assert_eq!(Reference::new(7, 0).to_string(), "7 0 R");
        assert_eq!(Reference::new(12, 3).to_string(), "12 3 R");
    }

    #[test]
    fn test_string_notations_hold_same_bytes() {
        let lit = Object::StringLiteral(b"abc".to_vec());
        let hex = Object::HexLiteral(b"abc".to_vec());
        assert_eq!(lit.as_string_bytes(), hex.as_string_bytes());
        // but the variants stay distinct for the writer
        assert_ne!(lit, hex);
    }

    #[test]
    fn test_as_number_covers_both_numerics() {
        assert_eq!(Object::Integer(3).as_number(), Some(3.0));
        assert_eq!(Object::Real(2.5).as_number(), Some(2.5));
        assert_eq!(Object::Boolean(true).as_number(), None);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Object::Null.type_name(), "null");
        assert_eq!(Object::name("X").type_name(), "name");
        assert_eq!(
            Object::Reference(Reference::new(1, 0)).type_name(),
            "indirect reference"
        );
    }
}
