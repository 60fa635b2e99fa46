//! Sentence Classification
//!
//! NMEA0183 parametric sentences are single text lines of the form
//! `$TTSSS,f1,f2,...,fn*CC`, where `TT` is the talker ID and `SSS` the
//! three-character sentence type. This module extracts the type code and the
//! comma-separated fields without validating the checksum.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Marker that opens every parametric sentence
pub const START_MARKER: u8 = b'$';

/// Separator between sentence fields
pub const FIELD_DELIMITER: char = ',';

/// Separator between the sentence body and its checksum
pub const CHECKSUM_DELIMITER: char = '*';

/// A line must be strictly longer than this to carry a type code
pub const MIN_TYPED_LEN: usize = 6;

/// Byte offset of the type code (after the start marker and talker ID)
const TYPE_OFFSET: usize = 3;

/// Errors parsing a sentence type code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseTypeError {
    #[error("sentence type must be exactly 3 characters, got {0:?}")]
    InvalidLength(String),

    #[error("sentence type must be ASCII alphanumeric, got {0:?}")]
    InvalidCharacter(String),
}

/// Three-character sentence type code, such as `ZDA` or `RMC`
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SentenceType([u8; 3]);

impl SentenceType {
    /// Time and date, the sentence that drives playback pacing
    pub const ZDA: SentenceType = SentenceType(*b"ZDA");

    /// Meteorological composite
    pub const MDA: SentenceType = SentenceType(*b"MDA");

    /// Transducer measurement
    pub const XDR: SentenceType = SentenceType(*b"XDR");

    /// Create a type code from raw bytes, if they are printable ASCII
    pub fn from_bytes(code: &[u8]) -> Option<Self> {
        match code {
            [a, b, c] if code.iter().all(|byte| byte.is_ascii_graphic()) => {
                Some(SentenceType([*a, *b, *c]))
            }
            _ => None,
        }
    }

    /// Get the raw code bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    /// Get the code as a string slice
    pub fn as_str(&self) -> &str {
        // Construction only admits printable ASCII
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for SentenceType {
    type Err = ParseTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 3 {
            return Err(ParseTypeError::InvalidLength(s.to_string()));
        }
        if !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(ParseTypeError::InvalidCharacter(s.to_string()));
        }
        SentenceType::from_bytes(s.as_bytes())
            .ok_or_else(|| ParseTypeError::InvalidCharacter(s.to_string()))
    }
}

impl fmt::Display for SentenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for SentenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SentenceType({})", self.as_str())
    }
}

/// Returns the sentence type of a raw line
///
/// Yields `None` when the line is not longer than [`MIN_TYPED_LEN`] or does
/// not begin with [`START_MARKER`]. Never fails.
pub fn sentence_type(line: &[u8]) -> Option<SentenceType> {
    if line.first() != Some(&START_MARKER) {
        return None;
    }
    type_code_at_offset(line)
}

/// Returns whatever occupies the type code position, ignoring the start marker
///
/// Encapsulated sentences (`!AIVDM`) carry their type at the same offset, so
/// exclusion filtering uses this looser form.
pub fn type_code_at_offset(line: &[u8]) -> Option<SentenceType> {
    if line.len() <= MIN_TYPED_LEN {
        return None;
    }
    SentenceType::from_bytes(&line[TYPE_OFFSET..TYPE_OFFSET + 3])
}

/// A classified sentence borrowed from its source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence<'a> {
    raw: &'a str,
    sentence_type: Option<SentenceType>,
    fields: Vec<&'a str>,
}

impl<'a> Sentence<'a> {
    /// Classify a line and split it into fields
    ///
    /// The fields exclude the leading address token (`$GPZDA`) and the
    /// trailing token, which carries the checksum.
    pub fn parse(raw: &'a str) -> Self {
        let trimmed = raw.trim_end_matches(['\r', '\n']);
        let tokens: Vec<&str> = trimmed.split(FIELD_DELIMITER).collect();
        let fields = if tokens.len() > 2 {
            tokens[1..tokens.len() - 1].to_vec()
        } else {
            Vec::new()
        };

        Sentence {
            raw,
            sentence_type: sentence_type(raw.as_bytes()),
            fields,
        }
    }

    /// The original line, terminator included
    pub fn raw(&self) -> &'a str {
        self.raw
    }

    pub fn sentence_type(&self) -> Option<SentenceType> {
        self.sentence_type
    }

    pub fn fields(&self) -> &[&'a str] {
        &self.fields
    }

    /// Whether this is the timestamp sentence used for pacing
    pub fn is_timestamp(&self) -> bool {
        self.sentence_type == Some(SentenceType::ZDA)
    }
}

/// Set of sentence types excluded from playback or analysis
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeFilter {
    excluded: HashSet<SentenceType>,
}

impl TypeFilter {
    /// Create an empty filter that excludes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-separated list such as `GSV,GSA`
    ///
    /// Empty entries are ignored.
    pub fn parse(list: &str) -> Result<Self, ParseTypeError> {
        Self::from_codes(list.split(FIELD_DELIMITER))
    }

    /// Build a filter from individual codes
    pub fn from_codes<I, S>(codes: I) -> Result<Self, ParseTypeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut excluded = HashSet::new();
        for code in codes {
            let code = code.as_ref().trim();
            if code.is_empty() {
                continue;
            }
            excluded.insert(code.parse()?);
        }
        Ok(TypeFilter { excluded })
    }

    /// Check whether the given type is excluded
    pub fn excludes(&self, sentence_type: SentenceType) -> bool {
        self.excluded.contains(&sentence_type)
    }

    /// Check whether a raw line should be skipped
    pub fn excludes_line(&self, line: &[u8]) -> bool {
        !self.excluded.is_empty()
            && type_code_at_offset(line).is_some_and(|code| self.excludes(code))
    }

    pub fn is_empty(&self) -> bool {
        self.excluded.is_empty()
    }

    pub fn len(&self) -> usize {
        self.excluded.len()
    }
}
