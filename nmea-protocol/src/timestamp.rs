//! ZDA Timestamp Decoding
//!
//! The ZDA sentence carries the absolute UTC date and time of the recording:
//!
//! ```text
//! $GPZDA,hhmmss.ss,dd,mm,yyyy,zh,zm*CC
//! ```
//!
//! Decoding trusts the recording. Malformed fields produce a [`DecodeError`]
//! which callers are expected to propagate rather than skip, since a bad ZDA
//! line means the log itself is damaged.

use crate::sentence::{CHECKSUM_DELIMITER, FIELD_DELIMITER};
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Number of fractional digits kept (microsecond resolution)
const FRACTION_DIGITS: usize = 6;

/// Timestamp decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("sentence is not valid UTF-8")]
    NotUtf8,

    #[error("missing {0} field")]
    MissingField(&'static str),

    #[error("invalid {field} field: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("invalid fractional seconds: {0:?}")]
    InvalidFraction(String),

    #[error("date/time out of range: {0}")]
    OutOfRange(ZdaTimestamp),
}

/// Calendar fields decoded from a ZDA sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ZdaTimestamp {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub microsecond: u32,
}

impl ZdaTimestamp {
    /// Decode the calendar fields from a raw ZDA line
    ///
    /// The line may include its checksum and line terminator. Only the
    /// time, day, month and year fields are read; the local zone fields
    /// are ignored. Calendar validity is checked by [`Self::to_datetime`].
    pub fn decode(line: &str) -> Result<Self, DecodeError> {
        let body = line.trim_end_matches(['\r', '\n']);
        let body = match body.find(CHECKSUM_DELIMITER) {
            Some(pos) => &body[..pos],
            None => body,
        };

        let mut fields = body.split(FIELD_DELIMITER).skip(1);
        let time = fields.next().ok_or(DecodeError::MissingField("time"))?;
        let day = fields.next().ok_or(DecodeError::MissingField("day"))?;
        let month = fields.next().ok_or(DecodeError::MissingField("month"))?;
        let year = fields.next().ok_or(DecodeError::MissingField("year"))?;

        if time.len() < 6 || !time.as_bytes()[..6].is_ascii() {
            return Err(DecodeError::InvalidField {
                field: "time",
                value: time.to_string(),
            });
        }

        Ok(ZdaTimestamp {
            year: parse_digits("year", year)? as i32,
            month: parse_digits("month", month)?,
            day: parse_digits("day", day)?,
            hour: parse_digits("hour", &time[0..2])?,
            minute: parse_digits("minute", &time[2..4])?,
            second: parse_digits("second", &time[4..6])?,
            microsecond: parse_fraction(&time[6..])?,
        })
    }

    /// Decode from raw bytes, rejecting non-UTF-8 input
    pub fn decode_bytes(line: &[u8]) -> Result<Self, DecodeError> {
        let line = std::str::from_utf8(line).map_err(|_| DecodeError::NotUtf8)?;
        Self::decode(line)
    }

    /// Convert to a calendar point in time
    pub fn to_datetime(&self) -> Result<NaiveDateTime, DecodeError> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
            .and_then(|date| {
                date.and_hms_micro_opt(self.hour, self.minute, self.second, self.microsecond)
            })
            .ok_or(DecodeError::OutOfRange(*self))
    }

    /// Build a ZDA sentence carrying these fields
    ///
    /// The fraction is always written with six digits so decoding recovers
    /// the microseconds exactly. The zone fields are written as zero.
    pub fn encode(&self, talker: &str) -> String {
        let body = format!(
            "{}ZDA,{:02}{:02}{:02}.{:06},{:02},{:02},{:04},00,00",
            talker, self.hour, self.minute, self.second, self.microsecond, self.day, self.month,
            self.year
        );
        format!("${}*{:02X}\r\n", body, checksum(&body))
    }
}

impl std::fmt::Display for ZdaTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.microsecond
        )
    }
}

/// Decode a ZDA line straight to a point in time
pub fn decode_datetime(line: &[u8]) -> Result<NaiveDateTime, DecodeError> {
    ZdaTimestamp::decode_bytes(line)?.to_datetime()
}

/// XOR of every byte in the sentence body (between `$` and `*`)
pub fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn parse_digits(field: &'static str, value: &str) -> Result<u32, DecodeError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| DecodeError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Parse `.ddd` into microseconds; an absent fraction means zero
fn parse_fraction(value: &str) -> Result<u32, DecodeError> {
    if value.is_empty() {
        return Ok(0);
    }

    let digits = value
        .strip_prefix('.')
        .ok_or_else(|| DecodeError::InvalidFraction(value.to_string()))?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::InvalidFraction(value.to_string()));
    }

    // Digits beyond microseconds are truncated
    let mut micros = 0u32;
    for position in 0..FRACTION_DIGITS {
        let digit = digits.as_bytes().get(position).map_or(0, |b| b - b'0');
        micros = micros * 10 + u32::from(digit);
    }
    Ok(micros)
}
