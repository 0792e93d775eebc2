//! Dereferencing: resolving indirect references into values.
//!
//! Resolution tolerances differ by mode. A reference into a free or unknown
//! slot, or one whose generation disagrees with the slot, is *dangling*:
//! strict mode fails with [`PdfError::DanglingRef`], relaxed mode logs and
//! substitutes null. A stored object may itself be a reference; one such
//! hop is followed, a second is corrupt.

use tracing::warn;

use crate::error::{PdfError, Result};
use crate::objects::{decode_text, Dict, Name, Object, Reference, StreamDict};
use crate::version::Version;
use crate::xref::{XRefEntry, XRefTable};

/// Optional value predicate used by the checked dereference helpers.
pub type Check<'a, T> = Option<&'a dyn Fn(&T) -> bool>;

impl XRefTable {
    /// Resolves `o` to a value, following at most one intermediate
    /// reference. Non-references come back as clones.
    pub fn dereference(&self, o: &Object) -> Result<Object> {
        let Object::Reference(r) = o else {
            return Ok(o.clone());
        };
        let first = self.resolve_slot(*r)?;
        let Object::Reference(r2) = first else {
            return Ok(first);
        };
        let second = self.resolve_slot(r2)?;
        if let Object::Reference(_) = second {
            return Err(PdfError::corrupt(
                r2.obj_nr(),
                "reference chain exceeds one intermediate reference",
            ));
        }
        Ok(second)
    }

    fn resolve_slot(&self, r: Reference) -> Result<Object> {
        match self.lookup(r.obj_nr()) {
            Some(XRefEntry::InUse { gen_nr, object }) if *gen_nr == r.gen_nr() => {
                Ok(object.clone())
            }
            Some(XRefEntry::Compressed { object, .. }) if r.gen_nr() == 0 => Ok(object.clone()),
            _ => self.dangling(r),
        }
    }

    fn dangling(&self, r: Reference) -> Result<Object> {
        if self.is_strict() {
            return Err(PdfError::DanglingRef {
                obj_nr: r.obj_nr(),
                gen_nr: r.gen_nr(),
            });
        }
        warn!(reference = %r, "dangling reference resolves to null");
        Ok(Object::Null)
    }

    fn mismatch(
        &self,
        src: &str,
        key: &str,
        expected: &'static str,
        found: &Object,
    ) -> PdfError {
        PdfError::TypeMismatch {
            dict: src.to_string(),
            entry: key.to_string(),
            expected,
            found: found.type_name(),
            obj_nr: self.cur_obj(),
        }
    }

    /// Dereferences `o` and requires a dict. A stream satisfies the
    /// requirement through its dict.
    pub fn dereference_dict(&self, o: &Object, src: &str, key: &str) -> Result<Dict> {
        match self.dereference(o)? {
            Object::Dict(d) => Ok(d),
            Object::Stream(sd) => Ok(sd.dict),
            other => Err(self.mismatch(src, key, "dict", &other)),
        }
    }

    pub fn dereference_array(&self, o: &Object, src: &str, key: &str) -> Result<Vec<Object>> {
        match self.dereference(o)? {
            Object::Array(a) => Ok(a),
            other => Err(self.mismatch(src, key, "array", &other)),
        }
    }

    pub fn dereference_stream(&self, o: &Object, src: &str, key: &str) -> Result<StreamDict> {
        match self.dereference(o)? {
            Object::Stream(sd) => Ok(sd),
            other => Err(self.mismatch(src, key, "stream", &other)),
        }
    }

    pub fn dereference_integer(&self, o: &Object, src: &str, key: &str) -> Result<i64> {
        match self.dereference(o)? {
            Object::Integer(i) => Ok(i),
            other => Err(self.mismatch(src, key, "integer", &other)),
        }
    }

    /// Dereferences `o` and requires an integer or real.
    pub fn dereference_number(&self, o: &Object, src: &str, key: &str) -> Result<f64> {
        let v = self.dereference(o)?;
        v.as_number()
            .ok_or_else(|| self.mismatch(src, key, "number", &v))
    }

    pub fn dereference_boolean(&self, o: &Object, src: &str, key: &str) -> Result<bool> {
        match self.dereference(o)? {
            Object::Boolean(b) => Ok(b),
            other => Err(self.mismatch(src, key, "boolean", &other)),
        }
    }

    /// Dereferences `o` to a name, gating on `since` and applying an
    /// optional payload predicate.
    pub fn dereference_name(
        &self,
        o: &Object,
        src: &str,
        key: &str,
        since: Version,
        check: Check<'_, str>,
    ) -> Result<Name> {
        let v = self.dereference(o)?;
        let Object::Name(name) = v else {
            return Err(self.mismatch(src, key, "name", &v));
        };
        self.validate_version(&format!("{src} entry {key}"), since)?;
        if let Some(check) = check {
            if !check(name.as_str()) {
                return Err(PdfError::rejected(
                    src,
                    key,
                    self.cur_obj(),
                    format!("name {name} out of range"),
                ));
            }
        }
        Ok(name)
    }

    /// Dereferences `o` to a string of either notation, gating on `since`
    /// and applying an optional predicate over the decoded text.
    pub fn dereference_string(
        &self,
        o: &Object,
        src: &str,
        key: &str,
        since: Version,
        check: Check<'_, str>,
    ) -> Result<String> {
        let v = self.dereference(o)?;
        let Some(bytes) = v.as_string_bytes() else {
            return Err(self.mismatch(src, key, "string", &v));
        };
        self.validate_version(&format!("{src} entry {key}"), since)?;
        let text = decode_text(bytes)?;
        if let Some(check) = check {
            if !check(text.as_str()) {
                return Err(PdfError::rejected(
                    src,
                    key,
                    self.cur_obj(),
                    format!("string {text:?} out of range"),
                ));
            }
        }
        Ok(text)
    }

    /// Dereferences `o` to a rectangle: an array of four numbers, each of
    /// which may itself be indirect.
    pub fn dereference_rect(&self, o: &Object, src: &str, key: &str) -> Result<[f64; 4]> {
        let a = self.dereference_array(o, src, key)?;
        if a.len() != 4 {
            return Err(PdfError::rejected(
                src,
                key,
                self.cur_obj(),
                format!("rectangle has {} elements, expected 4", a.len()),
            ));
        }
        let mut rect = [0f64; 4];
        for (i, o) in a.iter().enumerate() {
            rect[i] = self.dereference_number(o, src, key)?;
        }
        Ok(rect)
    }
}
