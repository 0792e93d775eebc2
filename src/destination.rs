//! PDF destinations according to ISO 32000-1 Section 12.3.2.
//!
//! A destination is an array: the target page followed by a fit-mode name
//! and that mode's parameters. The decoded form here round-trips through
//! [`Destination::to_array`] and [`Destination::from_array`].

use crate::error::{PdfError, Result};
use crate::objects::{Object, Reference};
use crate::version::Version;

/// Fit mode and its parameters. `None` stands for a null parameter,
/// meaning "keep the current value".
#[derive(Debug, Clone, PartialEq)]
pub enum DestinationKind {
    /// Position (left, top) at the window corner with the given zoom.
    Xyz {
        left: Option<f64>,
        top: Option<f64>,
        zoom: Option<f64>,
    },
    /// Fit the whole page.
    Fit,
    /// Fit the page width, scrolled to `top`.
    FitH { top: Option<f64> },
    /// Fit the page height, scrolled to `left`.
    FitV { left: Option<f64> },
    /// Fit the given rectangle.
    FitR {
        left: f64,
        bottom: f64,
        right: f64,
        top: f64,
    },
    /// Fit the bounding box.
    FitB,
    /// Fit the bounding-box width.
    FitBH { top: Option<f64> },
    /// Fit the bounding-box height.
    FitBV { left: Option<f64> },
}

impl DestinationKind {
    pub fn fit_name(&self) -> &'static str {
        match self {
            DestinationKind::Xyz { .. } => "XYZ",
            DestinationKind::Fit => "Fit",
            DestinationKind::FitH { .. } => "FitH",
            DestinationKind::FitV { .. } => "FitV",
            DestinationKind::FitR { .. } => "FitR",
            DestinationKind::FitB => "FitB",
            DestinationKind::FitBH { .. } => "FitBH",
            DestinationKind::FitBV { .. } => "FitBV",
        }
    }

    /// Version that introduced the fit mode. The bounding-box modes
    /// arrived with PDF 1.1.
    pub fn since(&self) -> Version {
        match self {
            DestinationKind::FitB
            | DestinationKind::FitBH { .. }
            | DestinationKind::FitBV { .. } => Version::V11,
            _ => Version::V10,
        }
    }
}

/// The page a destination targets: an object reference within this
/// document, or a 0-based page number in a remote one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageTarget {
    Ref(Reference),
    Number(i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub page: PageTarget,
    pub kind: DestinationKind,
}

impl Destination {
    pub fn new(page: PageTarget, kind: DestinationKind) -> Self {
        Destination { page, kind }
    }

    /// Encodes into the canonical array form. Absent parameters are
    /// written as null.
    pub fn to_array(&self) -> Vec<Object> {
        let mut arr = Vec::with_capacity(6);
        arr.push(match self.page {
            PageTarget::Ref(r) => Object::Reference(r),
            PageTarget::Number(n) => Object::Integer(n),
        });
        arr.push(Object::name(self.kind.fit_name()));
        match &self.kind {
            DestinationKind::Xyz { left, top, zoom } => {
                arr.push(opt_number(*left));
                arr.push(opt_number(*top));
                arr.push(opt_number(*zoom));
            }
            DestinationKind::Fit | DestinationKind::FitB => {}
            DestinationKind::FitH { top } | DestinationKind::FitBH { top } => {
                arr.push(opt_number(*top));
            }
            DestinationKind::FitV { left } | DestinationKind::FitBV { left } => {
                arr.push(opt_number(*left));
            }
            DestinationKind::FitR {
                left,
                bottom,
                right,
                top,
            } => {
                arr.push(Object::Real(*left));
                arr.push(Object::Real(*bottom));
                arr.push(Object::Real(*right));
                arr.push(Object::Real(*top));
            }
        }
        arr
    }

    /// Decodes the array form.
    ///
    /// `relaxed` additionally accepts the four-element `XYZ` shape some
    /// producers write when they omit the zoom parameter.
    pub fn from_array(arr: &[Object], relaxed: bool) -> Result<Destination> {
        if arr.len() < 2 {
            return Err(PdfError::corrupt(
                0,
                format!("destination array has {} elements, expected 2 or more", arr.len()),
            ));
        }

        let page = match &arr[0] {
            Object::Reference(r) => PageTarget::Ref(*r),
            Object::Integer(n) if *n >= 0 => PageTarget::Number(*n),
            Object::Integer(n) => {
                return Err(PdfError::corrupt(
                    0,
                    format!("destination page number {n} is negative"),
                ));
            }
            other => {
                return Err(PdfError::TypeMismatch {
                    dict: "destination".to_string(),
                    entry: "page".to_string(),
                    expected: "indirect reference or integer",
                    found: other.type_name(),
                    obj_nr: 0,
                });
            }
        };

        let Some(fit) = arr[1].as_name() else {
            return Err(PdfError::TypeMismatch {
                dict: "destination".to_string(),
                entry: "fit mode".to_string(),
                expected: "name",
                found: arr[1].type_name(),
                obj_nr: 0,
            });
        };

        let params = &arr[2..];
        let kind = match fit.as_str() {
            "XYZ" => match params.len() {
                3 => DestinationKind::Xyz {
                    left: nullable_number(&params[0])?,
                    top: nullable_number(&params[1])?,
                    zoom: nullable_number(&params[2])?,
                },
                2 if relaxed => DestinationKind::Xyz {
                    left: nullable_number(&params[0])?,
                    top: nullable_number(&params[1])?,
                    zoom: None,
                },
                n => return Err(arity("XYZ", n + 2)),
            },
            "Fit" => match params.len() {
                0 => DestinationKind::Fit,
                n => return Err(arity("Fit", n + 2)),
            },
            "FitB" => match params.len() {
                0 => DestinationKind::FitB,
                n => return Err(arity("FitB", n + 2)),
            },
            "FitH" => DestinationKind::FitH {
                top: one_nullable("FitH", params)?,
            },
            "FitBH" => DestinationKind::FitBH {
                top: one_nullable("FitBH", params)?,
            },
            "FitV" => DestinationKind::FitV {
                left: one_nullable("FitV", params)?,
            },
            "FitBV" => DestinationKind::FitBV {
                left: one_nullable("FitBV", params)?,
            },
            "FitR" => {
                if params.len() != 4 {
                    return Err(arity("FitR", params.len() + 2));
                }
                let mut v = [0f64; 4];
                for (i, o) in params.iter().enumerate() {
                    v[i] = o.as_number().ok_or_else(|| {
                        PdfError::corrupt(0, "FitR destination parameter is not a number")
                    })?;
                }
                DestinationKind::FitR {
                    left: v[0],
                    bottom: v[1],
                    right: v[2],
                    top: v[3],
                }
            }
            other => {
                return Err(PdfError::corrupt(
                    0,
                    format!("unknown destination fit mode /{other}"),
                ));
            }
        };

        Ok(Destination { page, kind })
    }
}

fn opt_number(v: Option<f64>) -> Object {
    match v {
        Some(n) => Object::Real(n),
        None => Object::Null,
    }
}

fn nullable_number(o: &Object) -> Result<Option<f64>> {
    match o {
        Object::Null => Ok(None),
        other => match other.as_number() {
            Some(n) => Ok(Some(n)),
            None => Err(PdfError::corrupt(
                0,
                format!(
                    "destination parameter is a {}, expected number or null",
                    other.type_name()
                ),
            )),
        },
    }
}

fn one_nullable(fit: &str, params: &[Object]) -> Result<Option<f64>> {
    if params.len() != 1 {
        return Err(arity(fit, params.len() + 2));
    }
    nullable_number(&params[0])
}

fn arity(fit: &str, len: usize) -> PdfError {
    PdfError::corrupt(0, format!("/{fit} destination array has {len} elements"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageTarget {
        PageTarget::Ref(Reference::new(5, 0))
    }

    #[test]
    fn test_roundtrip_all_kinds() {
        let kinds = vec![
            DestinationKind::Xyz {
                left: Some(72.0),
                top: None,
                zoom: Some(1.5),
            },
            DestinationKind::Fit,
            DestinationKind::FitH { top: Some(700.0) },
            DestinationKind::FitV { left: None },
            DestinationKind::FitR {
                left: 10.0,
                bottom: 20.0,
                right: 200.0,
                top: 400.0,
            },
            DestinationKind::FitB,
            DestinationKind::FitBH { top: None },
            DestinationKind::FitBV { left: Some(36.0) },
        ];
        for kind in kinds {
            let d = Destination::new(page(), kind);
            let decoded = Destination::from_array(&d.to_array(), false);
            assert_eq!(decoded.ok().as_ref(), Some(&d));
        }
    }

    #[test]
    fn test_remote_page_number_roundtrip() {
        let d = Destination::new(PageTarget::Number(3), DestinationKind::Fit);
        let arr = d.to_array();
        assert_eq!(arr[0], Object::Integer(3));
        assert_eq!(Destination::from_array(&arr, false).ok(), Some(d));
    }

    #[test]
    fn test_negative_page_number_rejected() {
        let arr = vec![Object::Integer(-1), Object::name("Fit")];
        assert!(Destination::from_array(&arr, false).is_err());
    }

    #[test]
    fn test_short_xyz_relaxed_only() {
        let arr = vec![
            Object::Reference(Reference::new(5, 0)),
            Object::name("XYZ"),
            Object::Integer(72),
            Object::Integer(700),
        ];
        assert!(Destination::from_array(&arr, false).is_err());
        let d = Destination::from_array(&arr, true).ok();
        assert_eq!(
            d.map(|d| d.kind),
            Some(DestinationKind::Xyz {
                left: Some(72.0),
                top: Some(700.0),
                zoom: None,
            })
        );
    }

    #[test]
    fn test_short_form_of_other_kinds_stays_rejected() {
        let arr = vec![
            Object::Reference(Reference::new(5, 0)),
            Object::name("FitR"),
            Object::Integer(0),
            Object::Integer(0),
        ];
        assert!(Destination::from_array(&arr, true).is_err());
    }

    #[test]
    fn test_unknown_fit_mode() {
        let arr = vec![Object::Reference(Reference::new(5, 0)), Object::name("Zoom")];
        assert!(matches!(
            Destination::from_array(&arr, true),
            Err(PdfError::CorruptStructure { .. })
        ));
    }

    #[test]
    fn test_bounding_box_modes_are_v11() {
        assert_eq!(DestinationKind::FitB.since(), Version::V11);
        assert_eq!(DestinationKind::Fit.since(), Version::V10);
    }
}
