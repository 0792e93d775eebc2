//! PDF specification versions.
//!
//! A document carries its version in the file header and may override it
//! with the catalog's `/Version` entry (ISO 32000-1, 7.5.2). Feature gating
//! during validation compares against the effective version, which is the
//! maximum of the two.

use std::fmt;
use std::str::FromStr;

use crate::error::PdfError;

/// A PDF specification version.
///
/// Ordering follows publication order, so `Version::V14 < Version::V17`
/// holds and feature gates can be written as plain comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Version {
    V10,
    V11,
    V12,
    V13,
    V14,
    V15,
    V16,
    V17,
    V20,
}

impl Version {
    /// All versions a file header may declare, oldest first.
    pub const ALL: [Version; 9] = [
        Version::V10,
        Version::V11,
        Version::V12,
        Version::V13,
        Version::V14,
        Version::V15,
        Version::V16,
        Version::V17,
        Version::V20,
    ];

    /// Major version digit.
    pub fn major(self) -> u8 {
        match self {
            Version::V20 => 2,
            _ => 1,
        }
    }

    /// Minor version digit.
    pub fn minor(self) -> u8 {
        match self {
            Version::V10 => 0,
            Version::V11 => 1,
            Version::V12 => 2,
            Version::V13 => 3,
            Version::V14 => 4,
            Version::V15 => 5,
            Version::V16 => 6,
            Version::V17 => 7,
            Version::V20 => 0,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::V17
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl FromStr for Version {
    type Err = PdfError;

    /// Parses the `M.m` form used by the header and the catalog `/Version`
    /// name, e.g. `"1.4"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1.0" => Ok(Version::V10),
            "1.1" => Ok(Version::V11),
            "1.2" => Ok(Version::V12),
            "1.3" => Ok(Version::V13),
            "1.4" => Ok(Version::V14),
            "1.5" => Ok(Version::V15),
            "1.6" => Ok(Version::V16),
            "1.7" => Ok(Version::V17),
            "2.0" => Ok(Version::V20),
            _ => Err(PdfError::InvalidEncoding(format!(
                "unknown PDF version \"{s}\""
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_ordering() {
        assert!(Version::V10 < Version::V11);
        assert!(Version::V14 < Version::V17);
        assert!(Version::V17 < Version::V20);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(Version::V13.to_string(), "1.3");
        assert_eq!(Version::V20.to_string(), "2.0");
    }

    #[test]
    fn test_version_parse() {
        assert_eq!("1.6".parse::<Version>().ok(), Some(Version::V16));
        assert!("3.1".parse::<Version>().is_err());
        assert!("1".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_roundtrip() {
        for v in Version::ALL {
            assert_eq!(v.to_string().parse::<Version>().ok(), Some(v));
        }
    }
}
