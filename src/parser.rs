use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::calendar;
use crate::model::Slot;

/// What the adapter hands the core: a candidate resource name plus a raw
/// range already snapped to the 10-minute grid. The hint is untrusted free
/// text; resolving it to a concrete resource is the engine's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub resource_hint: Option<String>,
    pub slot: Slot,
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    EmptyText,
    /// No `YYYY-MM-DD` date and no relative day keyword in the text.
    MissingDate,
    /// A date-shaped fragment that is not a real calendar date.
    InvalidDate(String),
    /// Fewer than two `HH:MM` times in the text.
    MissingTime,
    NonPositiveDuration,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::EmptyText => write!(f, "request text must not be empty"),
            ParseError::MissingDate => {
                write!(f, "could not find a date; expected YYYY-MM-DD, 'today' or 'tomorrow'")
            }
            ParseError::InvalidDate(text) => write!(f, "not a valid calendar date: {text}"),
            ParseError::MissingTime => {
                write!(f, "could not find start/end times; expected two HH:MM values")
            }
            ParseError::NonPositiveDuration => {
                write!(f, "start time must be earlier than end time")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Narrow seam between free text and the core. Implementations are
/// interchangeable strategies; the engine only sees this contract.
pub trait RequestParser: Send + Sync {
    fn parse(&self, text: &str, reference: NaiveDateTime) -> Result<ParsedRequest, ParseError>;
}

/// Regex-driven parser for explicit dates (`2025-06-02` or `2025/06/02`)
/// plus the relative keywords `today` / `tomorrow` resolved against the
/// reference instant.
pub struct StrictDateParser {
    date_re: Regex,
    time_re: Regex,
}

impl Default for StrictDateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StrictDateParser {
    pub fn new() -> Self {
        Self {
            date_re: Regex::new(r"(\d{4})[/-](\d{1,2})[/-](\d{1,2})")
                .expect("date pattern is well-formed"),
            time_re: Regex::new(r"(\d{1,2}):(\d{2})").expect("time pattern is well-formed"),
        }
    }

    /// First date-shaped fragment with non-digit boundaries, or a relative
    /// day keyword. Returns the matched fragment alongside the date so the
    /// hint extraction can strip it.
    fn find_date(
        &self,
        text: &str,
        reference: NaiveDateTime,
    ) -> Result<(NaiveDate, Option<(usize, usize)>), ParseError> {
        for caps in self.date_re.captures_iter(text) {
            let whole = caps.get(0).ok_or(ParseError::MissingDate)?;
            if !digit_bounded(text, whole.start(), whole.end()) {
                continue;
            }
            let year: i32 = caps[1].parse().map_err(|_| ParseError::MissingDate)?;
            let month: u32 = caps[2].parse().map_err(|_| ParseError::MissingDate)?;
            let day: u32 = caps[3].parse().map_err(|_| ParseError::MissingDate)?;
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or_else(|| ParseError::InvalidDate(whole.as_str().to_string()))?;
            return Ok((date, Some((whole.start(), whole.end()))));
        }

        let lowered = text.to_lowercase();
        if lowered.contains("tomorrow") {
            return Ok((reference.date() + Duration::days(1), None));
        }
        if lowered.contains("today") {
            return Ok((reference.date(), None));
        }
        Err(ParseError::MissingDate)
    }

    /// All plausible `HH:MM` fragments with non-digit boundaries and in-range
    /// hour/minute values, in order of appearance.
    fn find_times(&self, text: &str) -> Vec<(usize, usize, u32, u32)> {
        let mut times = Vec::new();
        for caps in self.time_re.captures_iter(text) {
            let Some(whole) = caps.get(0) else { continue };
            if !digit_bounded(text, whole.start(), whole.end()) {
                continue;
            }
            let Ok(hour) = caps[1].parse::<u32>() else { continue };
            let Ok(minute) = caps[2].parse::<u32>() else { continue };
            if hour > 23 || minute > 59 {
                continue;
            }
            times.push((whole.start(), whole.end(), hour, minute));
        }
        times
    }
}

impl RequestParser for StrictDateParser {
    fn parse(&self, text: &str, reference: NaiveDateTime) -> Result<ParsedRequest, ParseError> {
        if text.trim().is_empty() {
            return Err(ParseError::EmptyText);
        }

        let (date, date_span) = self.find_date(text, reference)?;
        let times = self.find_times(text);
        if times.len() < 2 {
            return Err(ParseError::MissingTime);
        }

        let (s0, s1, start_h, start_m) = times[0];
        let (e0, e1, end_h, end_m) = times[1];
        let start = date
            .and_hms_opt(start_h, start_m, 0)
            .ok_or(ParseError::MissingTime)?;
        let end = date
            .and_hms_opt(end_h, end_m, 0)
            .ok_or(ParseError::MissingTime)?;
        if start >= end {
            return Err(ParseError::NonPositiveDuration);
        }

        let slot = calendar::normalize(start, end).map_err(|_| ParseError::NonPositiveDuration)?;

        let mut consumed = vec![(s0, s1), (e0, e1)];
        if let Some(span) = date_span {
            consumed.push(span);
        }
        let resource_hint = extract_hint(text, &consumed);

        Ok(ParsedRequest {
            resource_hint,
            slot,
            raw_text: text.to_string(),
        })
    }
}

/// The match may not sit inside a longer digit run ("110:00" is not a time).
fn digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let bytes = text.as_bytes();
    if start > 0 && bytes[start - 1].is_ascii_digit() {
        return false;
    }
    if end < bytes.len() && bytes[end].is_ascii_digit() {
        return false;
    }
    true
}

const FILLER_WORDS: &[&str] = &[
    "reserve", "book", "booking", "please", "from", "to", "until", "at", "on", "for", "a", "an",
    "the", "today", "tomorrow",
];

/// Whatever is left after blanking the recognized date/time fragments and
/// dropping separators and filler words becomes the resource hint.
fn extract_hint(text: &str, consumed: &[(usize, usize)]) -> Option<String> {
    let mut buf: Vec<u8> = text.as_bytes().to_vec();
    for &(start, end) in consumed {
        for b in &mut buf[start..end] {
            *b = b' ';
        }
    }
    let blanked = String::from_utf8(buf).unwrap_or_else(|_| text.to_string());

    let cleaned: Vec<String> = blanked
        .split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|token| !token.is_empty())
        .filter(|token| !FILLER_WORDS.contains(&token.to_lowercase().as_str()))
        .map(|token| token.to_string())
        .collect();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join(" "))
    }
}
