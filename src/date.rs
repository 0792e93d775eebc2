//! PDF date strings (ISO 32000-1, 7.9.4).
//!
//! The canonical form is `D:YYYYMMDDHHmmSSOHH'mm'` where every component
//! after the year is optional and `O` is `+`, `-`, or `Z`. Files in the
//! wild drop the `D:` prefix, drop apostrophes, or append trailing noise;
//! relaxed parsing accepts those, strict does not.

use chrono::{DateTime, FixedOffset, TimeZone};

/// Parses a PDF date string. Returns `None` when it does not conform.
pub fn parse_date(s: &str, relaxed: bool) -> Option<DateTime<FixedOffset>> {
    let rest = match s.strip_prefix("D:") {
        Some(r) => r,
        None if relaxed => s,
        None => return None,
    };
    let b = rest.as_bytes();
    let mut i = 0usize;

    let year = take_digits(b, &mut i, 4)?;
    let mut month = take_optional_digits(b, &mut i, 2).unwrap_or(1);
    let mut day = take_optional_digits(b, &mut i, 2).unwrap_or(1);
    let hour = take_optional_digits(b, &mut i, 2).unwrap_or(0);
    let minute = take_optional_digits(b, &mut i, 2).unwrap_or(0);
    let second = take_optional_digits(b, &mut i, 2).unwrap_or(0);

    if relaxed {
        // Zero month/day appear in the wild; clamp to January 1st semantics.
        if month == 0 {
            month = 1;
        }
        if day == 0 {
            day = 1;
        }
    }

    let offset_seconds = parse_offset(b, &mut i, relaxed)?;

    if i != b.len() && !relaxed {
        return None;
    }

    let offset = FixedOffset::east_opt(offset_seconds)?;
    offset
        .with_ymd_and_hms(year as i32, month, day, hour, minute, second)
        .single()
}

/// Checks a date string without keeping the parsed value.
pub fn is_valid_date(s: &str, relaxed: bool) -> bool {
    parse_date(s, relaxed).is_some()
}

fn parse_offset(b: &[u8], i: &mut usize, relaxed: bool) -> Option<i32> {
    let sign = match b.get(*i) {
        None => return Some(0),
        Some(b'Z') => {
            *i += 1;
            // Z may be followed by an explicit (redundant) 00'00'.
            let _ = take_optional_digits(b, i, 2);
            skip_apostrophe(b, i);
            let _ = take_optional_digits(b, i, 2);
            skip_apostrophe(b, i);
            return Some(0);
        }
        Some(b'+') => 1,
        Some(b'-') => -1,
        Some(_) if relaxed => return Some(0),
        Some(_) => return None,
    };
    *i += 1;

    let oh = take_digits(b, i, 2)?;
    if oh > 23 {
        return None;
    }
    let had_apostrophe = skip_apostrophe(b, i);
    let om = match take_optional_digits(b, i, 2) {
        Some(om) if om > 59 => return None,
        // Canonical form separates hours and minutes with an apostrophe.
        Some(_) if !had_apostrophe && !relaxed => return None,
        Some(om) => om,
        None => 0,
    };
    skip_apostrophe(b, i);

    Some(sign * (oh as i32 * 3600 + om as i32 * 60))
}

fn skip_apostrophe(b: &[u8], i: &mut usize) -> bool {
    if b.get(*i) == Some(&b'\'') {
        *i += 1;
        true
    } else {
        false
    }
}

fn take_digits(b: &[u8], i: &mut usize, n: usize) -> Option<u32> {
    if *i + n > b.len() {
        return None;
    }
    let mut value = 0u32;
    for &d in &b[*i..*i + n] {
        if !d.is_ascii_digit() {
            return None;
        }
        value = value * 10 + (d - b'0') as u32;
    }
    *i += n;
    Some(value)
}

fn take_optional_digits(b: &[u8], i: &mut usize, n: usize) -> Option<u32> {
    if *i + n > b.len() || !b[*i..*i + n].iter().all(u8::is_ascii_digit) {
        return None;
    }
    take_digits(b, i, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_canonical_date() {
        let dt = parse_date("D:20240131115959+01'00'", false);
        let dt = dt.as_ref().map(|d| d.to_rfc3339());
        assert_eq!(dt.as_deref(), Some("2024-01-31T11:59:59+01:00"));
    }

    #[test]
    fn test_progressively_optional_components() {
        assert!(is_valid_date("D:2024", false));
        assert!(is_valid_date("D:202401", false));
        assert!(is_valid_date("D:20240131", false));
        assert!(is_valid_date("D:2024013111", false));
        assert!(is_valid_date("D:20240131115959Z", false));
    }

    #[test]
    fn test_year_only_defaults() {
        let dt = parse_date("D:1999", false);
        let dt = dt.as_ref().map(|d| d.to_rfc3339());
        assert_eq!(dt.as_deref(), Some("1999-01-01T00:00:00+00:00"));
    }

    #[test]
    fn test_negative_offset() {
        let dt = parse_date("D:20230601120000-05'30'", false);
        let dt = dt.as_ref().map(|d| d.to_rfc3339());
        assert_eq!(dt.as_deref(), Some("2023-06-01T12:00:00-05:30"));
    }

    #[test]
    fn test_missing_prefix_only_in_relaxed() {
        assert!(!is_valid_date("20240131", false));
        assert!(is_valid_date("20240131", true));
    }

    #[test]
    fn test_missing_apostrophe_only_in_relaxed() {
        assert!(!is_valid_date("D:20240131115959+0100", false));
        assert!(is_valid_date("D:20240131115959+0100", true));
    }

    #[test]
    fn test_trailing_apostrophe_optional() {
        // PDF 2.0 dropped the trailing apostrophe; accept both.
        assert!(is_valid_date("D:20240131115959+01'00", false));
    }

    #[test]
    fn test_bad_calendar_values_rejected() {
        assert!(!is_valid_date("D:20240231", false)); // Feb 31
        assert!(!is_valid_date("D:20241301", false)); // month 13
        assert!(!is_valid_date("D:2024013125", false)); // hour 25
        assert!(!is_valid_date("D:20240131115960Z", false)); // second 60
    }

    #[test]
    fn test_zero_month_day_clamped_in_relaxed() {
        assert!(!is_valid_date("D:20240000", false));
        let dt = parse_date("D:20240000", true);
        let dt = dt.as_ref().map(|d| d.to_rfc3339());
        assert_eq!(dt.as_deref(), Some("2024-01-01T00:00:00+00:00"));
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(!is_valid_date("D:20240131xyz", false));
        assert!(is_valid_date("D:20240131xyz", true));
    }
}
