//! Sentence Coverage Analysis
//!
//! Offline summary of a recorded log: how many of each sentence type it
//! contains and over which time windows they were present. Time comes from
//! the ZDA sentences in the log, measured from the first one.
//!
//! MDA and XDR are composite sentences, so their entries also track which
//! measurements they actually carried.

use crate::sentence::{Sentence, SentenceType, TypeFilter};
use crate::timestamp::{decode_datetime, DecodeError};
use chrono::{NaiveDateTime, TimeDelta};
use std::collections::BTreeMap;
use tracing::info;

/// A gap longer than this many seconds opens a new coverage window
pub const STALENESS_LIMIT_SECS: i64 = 60;

/// Span of session time during which a sentence was present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverageWindow {
    pub start: TimeDelta,
    pub end: TimeDelta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Breakdown {
    None,
    Mda,
    Xdr,
}

/// Count and coverage windows for one sentence type or measurement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentenceCoverage {
    label: String,
    count: u64,
    windows: Vec<CoverageWindow>,
    breakdown: Breakdown,
    children: Vec<SentenceCoverage>,
}

impl SentenceCoverage {
    /// Create an entry for a sentence type
    pub fn new(sentence_type: SentenceType) -> Self {
        let (breakdown, labels): (Breakdown, &[&str]) = match sentence_type {
            SentenceType::MDA => (
                Breakdown::Mda,
                &[
                    "- with pressure",
                    "- with air temp",
                    "- with water temp",
                    "- with humidity",
                    "- with dew point",
                ],
            ),
            SentenceType::XDR => (
                Breakdown::Xdr,
                &[
                    "- angle",
                    "- pressure",
                    "- temperature",
                    "- humidity",
                    "- unknown",
                ],
            ),
            _ => (Breakdown::None, &[]),
        };

        SentenceCoverage {
            label: sentence_type.to_string(),
            count: 0,
            windows: Vec::new(),
            breakdown,
            children: labels.iter().map(|label| Self::leaf(label)).collect(),
        }
    }

    fn leaf(label: &str) -> Self {
        SentenceCoverage {
            label: label.to_string(),
            count: 0,
            windows: Vec::new(),
            breakdown: Breakdown::None,
            children: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn windows(&self) -> &[CoverageWindow] {
        &self.windows
    }

    pub fn children(&self) -> &[SentenceCoverage] {
        &self.children
    }

    /// Find a child entry by label
    pub fn child(&self, label: &str) -> Option<&SentenceCoverage> {
        self.children.iter().find(|child| child.label == label)
    }

    /// Record one occurrence at `event_time` since the session start
    ///
    /// `fields` excludes the address token and the checksum token.
    pub fn record(&mut self, event_time: TimeDelta, fields: &[&str]) {
        self.count += 1;
        let limit = TimeDelta::seconds(STALENESS_LIMIT_SECS);
        match self.windows.last_mut() {
            Some(window) if event_time - window.end <= limit => {
                window.end = event_time;
            }
            _ => self.windows.push(CoverageWindow {
                start: event_time,
                end: event_time,
            }),
        }

        match self.breakdown {
            Breakdown::None => {}
            Breakdown::Mda => {
                for (child, index) in [2, 4, 6, 8, 10].into_iter().enumerate() {
                    if fields.get(index).is_some_and(|field| !field.is_empty()) {
                        self.children[child].record(event_time, fields);
                    }
                }
            }
            Breakdown::Xdr => {
                for transducer in fields.iter().step_by(4) {
                    let child = match *transducer {
                        "A" => 0,
                        "P" => 1,
                        "C" => 2,
                        "H" => 3,
                        _ => 4,
                    };
                    self.children[child].record(event_time, fields);
                }
            }
        }
    }

    /// Human-readable summary, children on following lines
    pub fn summary(&self) -> String {
        let windows = self
            .windows
            .iter()
            .map(|w| format!("{:.1}-{:.1}s", seconds(w.start), seconds(w.end)))
            .collect::<Vec<_>>()
            .join(", ");

        let mut output = format!(
            "{}: Total {} over time windows {}",
            self.label,
            format_count(self.count),
            windows
        );
        for child in self.children.iter().filter(|child| child.count > 0) {
            output.push('\n');
            output.push_str(&child.summary());
        }
        output
    }
}

/// Streaming analyzer over the lines of a log
#[derive(Debug, Clone, Default)]
pub struct CoverageAnalyzer {
    exclude: TypeFilter,
    sentences: BTreeMap<SentenceType, SentenceCoverage>,
    start_time: Option<NaiveDateTime>,
    last_time: Option<NaiveDateTime>,
    lines: u64,
}

impl CoverageAnalyzer {
    pub fn new(exclude: TypeFilter) -> Self {
        CoverageAnalyzer {
            exclude,
            ..Default::default()
        }
    }

    /// Process one line
    ///
    /// Untyped and excluded lines are ignored. A malformed ZDA line is an
    /// error. Lines before the first ZDA are counted but not placed in time.
    pub fn observe_line(&mut self, line: &str) -> Result<(), DecodeError> {
        self.lines += 1;
        let sentence = Sentence::parse(line);
        let Some(sentence_type) = sentence.sentence_type() else {
            return Ok(());
        };
        if self.exclude.excludes(sentence_type) {
            return Ok(());
        }

        if sentence.is_timestamp() {
            let timestamp = decode_datetime(line.as_bytes())?;
            self.last_time = Some(timestamp);
            if self.start_time.is_none() {
                info!("Found first timestamp {}", timestamp.format("%Y-%m-%d %H:%M:%S"));
                self.start_time = Some(timestamp);
            }
        }

        let entry = self
            .sentences
            .entry(sentence_type)
            .or_insert_with(|| SentenceCoverage::new(sentence_type));
        if let (Some(start), Some(last)) = (self.start_time, self.last_time) {
            entry.record(last - start, sentence.fields());
        }
        Ok(())
    }

    /// Finish and return the per-type report
    pub fn finish(self) -> CoverageReport {
        CoverageReport {
            first_timestamp: self.start_time,
            last_timestamp: self.last_time,
            lines: self.lines,
            sentences: self.sentences.into_values().collect(),
        }
    }
}

/// Result of a coverage analysis, sorted by sentence type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageReport {
    pub first_timestamp: Option<NaiveDateTime>,
    pub last_timestamp: Option<NaiveDateTime>,
    pub lines: u64,
    pub sentences: Vec<SentenceCoverage>,
}

impl CoverageReport {
    /// Look up the entry for a sentence type
    pub fn get(&self, sentence_type: SentenceType) -> Option<&SentenceCoverage> {
        self.sentences
            .iter()
            .find(|entry| entry.label == sentence_type.as_str())
    }

    /// Total session time covered by the log
    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.last_timestamp? - self.first_timestamp?)
    }
}

fn seconds(delta: TimeDelta) -> f64 {
    match delta.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}

/// Format a count with thousands separators
pub fn format_count(count: u64) -> String {
    let digits = count.to_string();
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze(lines: &[&str]) -> CoverageReport {
        let mut analyzer = CoverageAnalyzer::new(TypeFilter::new());
        for line in lines {
            analyzer.observe_line(line).unwrap();
        }
        analyzer.finish()
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }

    #[test]
    fn test_windows_split_on_gap() {
        let report = analyze(&[
            "$GPZDA,120000.00,01,01,2023,00,00*00\r\n",
            "$GPRMC,a,b,c*00\r\n",
            "$GPZDA,120030.00,01,01,2023,00,00*00\r\n",
            "$GPRMC,a,b,c*00\r\n",
            "$GPZDA,120200.00,01,01,2023,00,00*00\r\n",
            "$GPRMC,a,b,c*00\r\n",
        ]);

        let rmc = report.get("RMC".parse().unwrap()).unwrap();
        assert_eq!(rmc.count(), 3);
        assert_eq!(rmc.windows().len(), 2);
        assert_eq!(rmc.summary(), "RMC: Total 3 over time windows 0.0-30.0s, 120.0-120.0s");
    }

    #[test]
    fn test_lines_before_first_timestamp() {
        let report = analyze(&[
            "$GPRMC,a,b,c*00\r\n",
            "$GPZDA,120000.00,01,01,2023,00,00*00\r\n",
        ]);

        let rmc = report.get("RMC".parse().unwrap()).unwrap();
        assert_eq!(rmc.count(), 0);
        assert!(rmc.windows().is_empty());
        assert_eq!(report.sentences.len(), 2);
    }

    #[test]
    fn test_untyped_and_excluded_lines() {
        let mut analyzer = CoverageAnalyzer::new(TypeFilter::parse("GSV").unwrap());
        analyzer.observe_line("garbage\n").unwrap();
        analyzer.observe_line("$GPGSV,1,1*00\n").unwrap();
        let report = analyzer.finish();

        assert_eq!(report.lines, 2);
        assert!(report.sentences.is_empty());
        assert!(report.first_timestamp.is_none());
    }

    #[test]
    fn test_mda_breakdown() {
        let report = analyze(&[
            "$GPZDA,120000.00,01,01,2023,00,00*00\r\n",
            "$IIMDA,30.1,I,1.02,B,18.5,C,,C,,,,C,,T,,M,,N,,M*00\r\n",
        ]);

        let mda = report.get(SentenceType::MDA).unwrap();
        assert_eq!(mda.count(), 1);
        assert_eq!(mda.child("- with pressure").unwrap().count(), 1);
        assert_eq!(mda.child("- with air temp").unwrap().count(), 1);
        assert_eq!(mda.child("- with water temp").unwrap().count(), 0);
        assert_eq!(mda.child("- with humidity").unwrap().count(), 0);
        assert_eq!(
            mda.summary(),
            "MDA: Total 1 over time windows 0.0-0.0s\n\
             - with pressure: Total 1 over time windows 0.0-0.0s\n\
             - with air temp: Total 1 over time windows 0.0-0.0s"
        );
    }

    #[test]
    fn test_mda_short_sentence() {
        let report = analyze(&[
            "$GPZDA,120000.00,01,01,2023,00,00*00\r\n",
            "$IIMDA,30.1,I,1.02*00\r\n",
        ]);

        let mda = report.get(SentenceType::MDA).unwrap();
        assert_eq!(mda.count(), 1);
        assert!(mda.children().iter().all(|child| child.count() == 0));
    }

    #[test]
    fn test_xdr_breakdown() {
        let report = analyze(&[
            "$GPZDA,120000.00,01,01,2023,00,00*00\r\n",
            "$IIXDR,A,1.5,D,PITCH,C,20.1,C,AIR,P,1.01,B,BARO,X,0,,FOO,*00\r\n",
        ]);

        let xdr = report.get(SentenceType::XDR).unwrap();
        assert_eq!(xdr.child("- angle").unwrap().count(), 1);
        assert_eq!(xdr.child("- temperature").unwrap().count(), 1);
        assert_eq!(xdr.child("- pressure").unwrap().count(), 1);
        assert_eq!(xdr.child("- humidity").unwrap().count(), 0);
        assert_eq!(xdr.child("- unknown").unwrap().count(), 1);
    }

    #[test]
    fn test_malformed_timestamp_is_error() {
        let mut analyzer = CoverageAnalyzer::new(TypeFilter::new());
        assert!(analyzer.observe_line("$GPZDA,garbage*00\r\n").is_err());
    }

    #[test]
    fn test_report_duration() {
        let report = analyze(&[
            "$GPZDA,120000.00,01,01,2023,00,00*00\r\n",
            "$GPZDA,120130.50,01,01,2023,00,00*00\r\n",
        ]);
        assert_eq!(report.duration(), Some(TimeDelta::milliseconds(90_500)));
    }
}
