use crate::record::{Record, TIMESTAMP_FIELD};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimestampError {
    #[error("field '{field}' is not present in the schema")]
    MissingField { field: String },

    #[error("invalid date pattern '{pattern}'")]
    InvalidPattern { pattern: String },

    #[error("failed to parse date '{value}' with format '{format}': {source}")]
    InvalidDate {
        value: String,
        format: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("failed to parse time of day '{value}', expected H:MM[:SS[.fraction]]")]
    InvalidTime { value: String },
}

/// Date pattern in chrono strptime form.
///
/// Accepts either a strptime string (`%Y-%m-%d`) or the `yyyy-MM-dd` token
/// style; anything without a `%` is treated as the latter and translated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatePattern {
    original: String,
    strptime: String,
}

impl DatePattern {
    pub fn new(pattern: &str) -> Result<Self, TimestampError> {
        let strptime = if pattern.contains('%') {
            pattern.to_string()
        } else {
            translate_token_pattern(pattern)
        };

        if strptime.is_empty() || StrftimeItems::new(&strptime).any(|item| matches!(item, Item::Error)) {
            return Err(TimestampError::InvalidPattern {
                pattern: pattern.to_string(),
            });
        }

        Ok(Self {
            original: pattern.to_string(),
            strptime,
        })
    }

    pub fn as_strptime(&self) -> &str {
        &self.strptime
    }

    pub fn parse(&self, value: &str) -> Result<NaiveDate, TimestampError> {
        NaiveDate::parse_from_str(value, &self.strptime).map_err(|source| {
            TimestampError::InvalidDate {
                value: value.to_string(),
                format: self.original.clone(),
                source,
            }
        })
    }
}

/// Translates `yyyy-MM-dd` style tokens into strptime directives.
/// Single-quoted segments are copied literally.
fn translate_token_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            i += 1;
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let run = chars[i..].iter().take_while(|&&x| x == c).count();
        let directive = match (c, run) {
            ('y', 1..=2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1..=2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1..=2) => Some("%d"),
            ('d', 3) => Some("%a"),
            ('d', _) => Some("%A"),
            _ => None,
        };

        match directive {
            Some(d) => out.push_str(d),
            None => (0..run).for_each(|_| push_literal(&mut out, c)),
        }
        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

/// Parses a time of day written as `H:MM[:SS[.fraction]]`.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, TimestampError> {
    let invalid = || TimestampError::InvalidTime {
        value: value.to_string(),
    };

    let mut parts = value.split(':');
    let hours = parse_component(parts.next(), 23).ok_or_else(invalid)?;
    let minutes = parse_component(parts.next(), 59).ok_or_else(invalid)?;

    let (seconds, nanos) = match parts.next() {
        None => (0, 0),
        Some(sec) => {
            let (whole, fraction) = match sec.split_once('.') {
                Some((whole, fraction)) => (whole, Some(fraction)),
                None => (sec, None),
            };
            let seconds = parse_component(Some(whole), 59).ok_or_else(invalid)?;
            let nanos = match fraction {
                Some(f) => parse_fraction(f).ok_or_else(invalid)?,
                None => 0,
            };
            (seconds, nanos)
        }
    };

    if parts.next().is_some() {
        return Err(invalid());
    }

    NaiveTime::from_hms_nano_opt(hours, minutes, seconds, nanos).ok_or_else(invalid)
}

fn parse_component(part: Option<&str>, max: u32) -> Option<u32> {
    let part = part?;
    if part.is_empty() || part.len() > 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok().filter(|v| *v <= max)
}

fn parse_fraction(fraction: &str) -> Option<u32> {
    if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let padded = format!("{:0<9}", fraction);
    padded.parse().ok()
}

/// Turns the configured date and time columns of a parsed line into the
/// record's event timestamp.
#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    date_field: String,
    time_field: String,
    date_pattern: DatePattern,
}

impl TimestampExtractor {
    pub fn new(date_field: &str, time_field: &str, date_format: &str) -> Result<Self, TimestampError> {
        Ok(Self {
            date_field: date_field.to_string(),
            time_field: time_field.to_string(),
            date_pattern: DatePattern::new(date_format)?,
        })
    }

    /// Combines date and time into a UTC timestamp. The two source fields are
    /// removed and replaced by `@timestamp`.
    pub fn extract(&self, mut fields: BTreeMap<String, String>) -> Result<Record, TimestampError> {
        let date_value = fields
            .remove(&self.date_field)
            .ok_or_else(|| TimestampError::MissingField {
                field: self.date_field.clone(),
            })?;
        let time_value = fields
            .remove(&self.time_field)
            .ok_or_else(|| TimestampError::MissingField {
                field: self.time_field.clone(),
            })?;

        let date = self.date_pattern.parse(&date_value)?;
        let time = parse_time_of_day(&time_value)?;
        let timestamp: DateTime<Utc> = Utc.from_utc_datetime(&date.and_time(time));

        fields.insert(TIMESTAMP_FIELD.to_string(), format_timestamp(&timestamp));

        Ok(Record::new(timestamp, fields))
    }
}

/// ISO-8601 in UTC with a `Z` designator, sub-second digits only when present.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true)
}
