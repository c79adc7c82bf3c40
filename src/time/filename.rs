//! Filename timestamp parsing
//!
//! Dates are read through named capture groups: `year`, `month` and `day`
//! are required, `hour`, `minute`, `second` and `microsecond` default to
//! zero when the group is missing or did not take part in the match.
//! A `microsecond` group adds precision to the timestamp but is never
//! appended to renamed files.

use super::CaptureTime;
use chrono::NaiveDate;
use regex::{Captures, Regex};
use std::sync::OnceLock;
use tracing::trace;

/// Matches names such as `IMG_20160915_123456.jpg`
pub const DEFAULT_FILENAME_PATTERN: &str = r".*[_-](?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})[_-]?(?P<hour>\d{2})(?P<minute>\d{2})(?P<second>\d{2})";

static DEFAULT_PATTERN: OnceLock<Regex> = OnceLock::new();

/// The built-in filename pattern
pub fn default_pattern() -> &'static Regex {
    DEFAULT_PATTERN.get_or_init(|| Regex::new(DEFAULT_FILENAME_PATTERN).unwrap())
}

/// Parse a timestamp out of `filename` using `pattern`
pub fn parse_filename_time(filename: &str, pattern: &Regex) -> Option<CaptureTime> {
    let caps = pattern.captures(filename)?;

    let year: i32 = caps.name("year")?.as_str().parse().ok()?;
    let month = required(&caps, "month")?;
    let day = required(&caps, "day")?;
    let hour = optional(&caps, "hour")?;
    let minute = optional(&caps, "minute")?;
    let second = optional(&caps, "second")?;

    let subseconds = caps
        .name("microsecond")
        .map(|m| m.as_str())
        .filter(|digits| !digits.is_empty());
    let nanos = match subseconds {
        Some(digits) if digits.bytes().all(|b| b.is_ascii_digit()) => {
            let truncated = &digits[..digits.len().min(9)];
            truncated.parse::<u32>().ok()? * 10u32.pow(9 - truncated.len() as u32)
        }
        Some(_) => return None,
        None => 0,
    };

    let datetime =
        NaiveDate::from_ymd_opt(year, month, day)?.and_hms_nano_opt(hour, minute, second, nanos)?;

    trace!(filename, %datetime, "Matched filename pattern");
    Some(CaptureTime {
        datetime,
        offset: None,
        subseconds: None,
    })
}

fn required(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

/// Missing groups count as zero; a group that matched garbage fails the parse
fn optional(caps: &Captures<'_>, name: &str) -> Option<u32> {
    match caps.name(name) {
        Some(m) => m.as_str().parse().ok(),
        None => Some(0),
    }
}
