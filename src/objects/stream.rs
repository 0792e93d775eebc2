//! Stream objects and their filter pipelines.

use crate::error::{PdfError, Result};
use crate::objects::{Dict, Name, Object};

/// One stage of a stream's decode pipeline: filter name plus its optional
/// `/DecodeParms` dict.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterEntry {
    pub name: Name,
    pub parms: Option<Dict>,
}

/// A stream object: its dictionary and the raw (still encoded) payload
/// bytes (ISO 32000-1, 7.3.8).
///
/// `raw` holds exactly the bytes between `stream` and `endstream`; the
/// writer recomputes `/Length` from it, so a stale length in `dict` never
/// propagates into output.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamDict {
    pub dict: Dict,
    pub raw: Vec<u8>,
}

impl StreamDict {
    pub fn new(dict: Dict, raw: Vec<u8>) -> Self {
        StreamDict { dict, raw }
    }

    /// Builds a stream around `raw` with only a `/Length` entry.
    pub fn from_bytes(raw: Vec<u8>) -> Self {
        let dict = Dict::new().with("Length", raw.len() as i64);
        StreamDict { dict, raw }
    }

    /// Length of the raw payload in bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Normalizes `/Filter` and `/DecodeParms` into an ordered pipeline.
    ///
    /// Accepts the one-filter form (`/Filter /FlateDecode`) and the array
    /// form; `/DecodeParms` may be a single dict, null, or an array aligned
    /// with the filter array. An unfiltered stream yields an empty pipeline.
    pub fn filter_pipeline(&self) -> Result<Vec<FilterEntry>> {
        let filter = match self.dict.get("Filter") {
            None | Some(Object::Null) => return Ok(Vec::new()),
            Some(o) => o,
        };

        let parms = self.dict.get("DecodeParms").or_else(|| {
            // Pre-1.2 writers used the singular key.
            self.dict.get("DecodeParm")
        });

        match filter {
            Object::Name(name) => {
                let parms = match parms {
                    None | Some(Object::Null) => None,
                    Some(Object::Dict(d)) => Some(d.clone()),
                    // A one-element parms array paired with a single filter.
                    Some(Object::Array(a)) if a.len() == 1 => match &a[0] {
                        Object::Null => None,
                        Object::Dict(d) => Some(d.clone()),
                        other => return Err(parms_mismatch(other)),
                    },
                    Some(other) => return Err(parms_mismatch(other)),
                };
                Ok(vec![FilterEntry {
                    name: name.clone(),
                    parms,
                }])
            }
            Object::Array(filters) => {
                let parms_list: Vec<Option<Dict>> = match parms {
                    None | Some(Object::Null) => vec![None; filters.len()],
                    Some(Object::Dict(d)) if filters.len() == 1 => vec![Some(d.clone())],
                    Some(Object::Array(a)) => {
                        if a.len() != filters.len() {
                            return Err(PdfError::corrupt(
                                0,
                                format!(
                                    "/DecodeParms has {} entries for {} filters",
                                    a.len(),
                                    filters.len()
                                ),
                            ));
                        }
                        let mut list = Vec::with_capacity(a.len());
                        for o in a {
                            match o {
                                Object::Null => list.push(None),
                                Object::Dict(d) => list.push(Some(d.clone())),
                                other => return Err(parms_mismatch(other)),
                            }
                        }
                        list
                    }
                    Some(other) => return Err(parms_mismatch(other)),
                };

                let mut pipeline = Vec::with_capacity(filters.len());
                for (o, parms) in filters.iter().zip(parms_list) {
                    let Object::Name(name) = o else {
                        return Err(PdfError::TypeMismatch {
                            dict: "stream".to_string(),
                            entry: "Filter".to_string(),
                            expected: "name",
                            found: o.type_name(),
                            obj_nr: 0,
                        });
                    };
                    pipeline.push(FilterEntry {
                        name: name.clone(),
                        parms,
                    });
                }
                Ok(pipeline)
            }
            other => Err(PdfError::TypeMismatch {
                dict: "stream".to_string(),
                entry: "Filter".to_string(),
                expected: "name or array",
                found: other.type_name(),
                obj_nr: 0,
            }),
        }
    }
}

fn parms_mismatch(found: &Object) -> PdfError {
    PdfError::TypeMismatch {
        dict: "stream".to_string(),
        entry: "DecodeParms".to_string(),
        expected: "dict, null, or array",
        found: found.type_name(),
        obj_nr: 0,
    }
}
