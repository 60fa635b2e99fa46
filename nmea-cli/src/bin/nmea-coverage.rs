//! NMEA Coverage - summarize which sentences a log contains and when
//!
//! Prints, per sentence type, how many sentences were seen and the time
//! windows (relative to the first ZDA) they cover.

use anyhow::Context;
use clap::Parser;
use nmea_cli::stats::format_duration;
use nmea_protocol::{CoverageAnalyzer, CoverageReport, TypeFilter};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nmea-coverage")]
#[command(about = "Summarize sentence coverage of a recorded NMEA0183 log", long_about = None)]
struct Args {
    /// Recorded NMEA0183 log file
    #[arg(value_name = "NMEA_FILE")]
    input: PathBuf,

    /// Sentence types to ignore (e.g. GSV,GSA)
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn analyze<R: BufRead>(mut reader: R, exclude: TypeFilter) -> anyhow::Result<CoverageReport> {
    let mut analyzer = CoverageAnalyzer::new(exclude);
    let mut buf = Vec::new();
    let mut line_number = 0u64;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_number += 1;
        // Classified with its terminator, as playback sees it
        let line = String::from_utf8_lossy(&buf);
        analyzer
            .observe_line(&line)
            .with_context(|| format!("line {}", line_number))?;
    }

    Ok(analyzer.finish())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let exclude = TypeFilter::from_codes(&args.exclude)?;
    let file = File::open(&args.input)
        .with_context(|| format!("cannot open {}", args.input.display()))?;
    let report = analyze(BufReader::new(file), exclude)?;

    if let Some(duration) = report.duration().and_then(|delta| delta.to_std().ok()) {
        tracing::info!(
            "{} lines spanning {}",
            report.lines,
            format_duration(duration)
        );
    }
    for entry in &report.sentences {
        println!("{}", entry.summary());
    }

    Ok(())
}
