//! Parsing of date strings reported by the metadata provider

use super::CaptureTime;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use std::sync::OnceLock;
use tracing::trace;

/// Fixed layouts, tried in order before the flexible fallback
const FIXED_LAYOUTS: &[&str] = &["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Layouts accepted by the flexible fallback
const FLEXIBLE_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y:%m:%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y:%m:%d %H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_ONLY_LAYOUTS: &[&str] = &["%Y:%m:%d", "%Y-%m-%d", "%Y/%m/%d"];

/// Trailing UTC offset: `Z`, `+01:00`, `-0200`
static OFFSET_PATTERN: OnceLock<Regex> = OnceLock::new();

fn offset_pattern() -> &'static Regex {
    OFFSET_PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<body>.*\d)(?P<offset>Z|[+-]\d{2}:?\d{2})$").expect("valid offset regex")
    })
}

/// Parse a metadata date string such as `2019:10:06 11:02:50.575+01:00`.
///
/// Sub-second digits and the UTC offset are kept when present. Returns
/// `None` when no layout matches.
pub fn parse_exif_datetime(raw: &str) -> Option<CaptureTime> {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() {
        return None;
    }

    if let Some(parsed) = parse_fixed(s) {
        trace!(raw, "Parsed date with fixed layout");
        return Some(parsed);
    }

    let parsed = parse_flexible(s);
    if parsed.is_some() {
        trace!(raw, "Parsed date with flexible layout");
    }
    parsed
}

fn parse_fixed(s: &str) -> Option<CaptureTime> {
    let (body, offset) = split_offset(s);

    let (main, fraction) = match body.split_once('.') {
        Some((main, fraction)) => (main, Some(fraction)),
        None => (body, None),
    };

    if let Some(fraction) = fraction
        && (fraction.is_empty() || !fraction.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    let datetime = FIXED_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(main, layout).ok())?;

    let datetime = match fraction {
        Some(digits) => datetime.with_nanosecond(fraction_to_nanos(digits)?)?,
        None => datetime,
    };

    Some(CaptureTime {
        datetime,
        offset,
        subseconds: fraction.map(str::to_string),
    })
}

fn parse_flexible(s: &str) -> Option<CaptureTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s).or_else(|_| DateTime::parse_from_rfc2822(s)) {
        return Some(from_fixed_offset(dt));
    }

    let (body, offset) = split_offset(s);

    if let Some(datetime) = FLEXIBLE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(body, layout).ok())
    {
        return Some(CaptureTime {
            datetime,
            offset,
            subseconds: subsecond_digits(datetime.nanosecond()),
        });
    }

    DATE_ONLY_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(body, layout).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| CaptureTime {
            datetime,
            offset,
            subseconds: None,
        })
}

fn from_fixed_offset(dt: DateTime<FixedOffset>) -> CaptureTime {
    let datetime = dt.naive_local();
    CaptureTime {
        datetime,
        offset: Some(*dt.offset()),
        subseconds: subsecond_digits(datetime.nanosecond()),
    }
}

/// Split a trailing UTC offset from the date string
fn split_offset(s: &str) -> (&str, Option<FixedOffset>) {
    let Some(caps) = offset_pattern().captures(s) else {
        return (s, None);
    };

    let (Some(body), Some(offset)) = (caps.name("body"), caps.name("offset")) else {
        return (s, None);
    };

    match parse_offset(offset.as_str()) {
        Some(parsed) => (body.as_str(), Some(parsed)),
        None => (s, None),
    }
}

fn parse_offset(s: &str) -> Option<FixedOffset> {
    if s == "Z" {
        return FixedOffset::east_opt(0);
    }

    let sign = match s.as_bytes().first()? {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = s[1..].chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// `"575"` -> 575_000_000 nanoseconds; digits past nanosecond precision are dropped
fn fraction_to_nanos(digits: &str) -> Option<u32> {
    let truncated = &digits[..digits.len().min(9)];
    let value: u32 = truncated.parse().ok()?;
    Some(value * 10u32.pow(9 - truncated.len() as u32))
}

fn subsecond_digits(nanos: u32) -> Option<String> {
    if nanos == 0 {
        return None;
    }
    let digits = format!("{:09}", nanos % 1_000_000_000);
    Some(digits.trim_end_matches('0').to_string())
}
