//! Reading-time and relative-time formatting for feed posts.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{BlogrollError, Result};

/// Words-per-minute rate used when the caller does not supply one.
pub const DEFAULT_WORDS_PER_MINUTE: u32 = 250;

/// Elapsed seconds under which a timestamp still reads as "just now".
pub const JUST_NOW_THRESHOLD_SECS: i64 = 5;

/// Shown in place of a relative date when a post has no usable timestamp.
pub const UNKNOWN_DATE: &str = "Unknown Date";

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[^>]+(>|$)").expect("tag pattern is valid"));

static ENTITY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&[^;]+;").expect("entity pattern is valid"));

/// Estimates how long a post takes to read, as a label like "3 min read".
///
/// HTML tags are stripped and character entities count as word breaks, so
/// markup never inflates the estimate. Content with no words at all yields
/// "0 min read"; anything else rounds the duration up to a whole minute.
pub fn reading_time(content: &str, words_per_minute: u32) -> Result<String> {
    if words_per_minute == 0 {
        return Err(BlogrollError::Value(
            "words_per_minute must be greater than zero".to_string(),
        ));
    }
    let stripped = TAG_PATTERN.replace_all(content, "");
    let text = ENTITY_PATTERN.replace_all(&stripped, " ");
    let words = text.split_whitespace().count();
    if words == 0 {
        return Ok("0 min read".to_string());
    }
    let minutes = words.div_ceil(words_per_minute as usize);
    Ok(format!("{minutes} min read"))
}

/// [`reading_time`] at the default rate. Infallible since the rate is fixed.
pub fn estimate_reading_time(content: &str) -> String {
    match reading_time(content, DEFAULT_WORDS_PER_MINUTE) {
        Ok(label) => label,
        Err(_) => "0 min read".to_string(),
    }
}

/// Time buckets for relative formatting, largest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

const INTERVALS: [Interval; 6] = [
    Interval::Year,
    Interval::Month,
    Interval::Day,
    Interval::Hour,
    Interval::Minute,
    Interval::Second,
];

impl Interval {
    /// Fixed bucket lengths: a year is 365 days, a month 30 days.
    fn seconds(self) -> i64 {
        match self {
            Interval::Year => 31_536_000,
            Interval::Month => 2_592_000,
            Interval::Day => 86_400,
            Interval::Hour => 3_600,
            Interval::Minute => 60,
            Interval::Second => 1,
        }
    }

    fn default_label(self) -> &'static str {
        match self {
            Interval::Year => "year",
            Interval::Month => "month",
            Interval::Day => "day",
            Interval::Hour => "hour",
            Interval::Minute => "minute",
            Interval::Second => "second",
        }
    }
}

/// Formats how long ago `date` was, e.g. "2 hours ago" or "just now".
///
/// `labels` overrides the unit word per bucket (the "s" plural is still
/// appended for counts above one). `threshold` is the elapsed-seconds cutoff
/// below which the result is "just now"; future dates read "in the future".
pub fn relative_time(
    date: DateTime<Utc>,
    labels: &HashMap<Interval, String>,
    threshold: i64,
) -> String {
    time_since(Utc::now(), date, labels, threshold)
}

/// Relative label for an optional post date, with the default unit labels.
pub fn relative_date(date: Option<DateTime<Utc>>) -> String {
    match date {
        Some(date) => relative_time(date, &HashMap::new(), JUST_NOW_THRESHOLD_SECS),
        None => UNKNOWN_DATE.to_string(),
    }
}

fn time_since(
    now: DateTime<Utc>,
    date: DateTime<Utc>,
    labels: &HashMap<Interval, String>,
    threshold: i64,
) -> String {
    let seconds = (now - date).num_seconds();
    if seconds < 0 {
        return "in the future".to_string();
    }
    if seconds < threshold {
        return "just now".to_string();
    }
    for interval in INTERVALS {
        let count = seconds / interval.seconds();
        if count >= 1 {
            let label = labels
                .get(&interval)
                .map(String::as_str)
                .unwrap_or_else(|| interval.default_label());
            let plural = if count == 1 { "" } else { "s" };
            return format!("{count} {label}{plural} ago");
        }
    }
    // Reachable only with a non-positive threshold and zero elapsed seconds.
    "just now".to_string()
}
