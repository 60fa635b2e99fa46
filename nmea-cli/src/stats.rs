//! Statistics display and formatting

use nmea_protocol::coverage::format_count;
use nmea_replay::ReplayStats;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a pacing interval in human-readable form
pub fn format_interval(interval: Duration) -> String {
    let micros = interval.as_micros();
    if micros >= 1_000_000 {
        format!("{:.2}s", micros as f64 / 1_000_000.0)
    } else if micros >= 1_000 {
        format!("{:.2}ms", micros as f64 / 1_000.0)
    } else {
        format!("{}µs", micros)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Display the counters of one finished pass
pub fn display_pass_stats(pass: u64, stats: &ReplayStats, elapsed: Duration) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ PASS {:<55}│", pass);
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Elapsed:    {:<48}│", format_duration(elapsed));
    println!(
        "│ Lines:      {:<48}│",
        format!(
            "{} read / {} excluded",
            format_count(stats.lines_read),
            format_count(stats.lines_excluded)
        )
    );
    println!(
        "│ Timestamps: {:<48}│",
        format!(
            "{} / {} anomalies",
            format_count(stats.timestamps),
            stats.pacing_anomalies
        )
    );
    println!(
        "│ Sent:       {:<48}│",
        format!(
            "{} datagrams / {}",
            format_count(stats.datagrams_sent),
            format_bytes(stats.bytes_sent)
        )
    );
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ {:<60}│", fault_summary(stats));
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// One-line summary of the injected faults
pub fn fault_summary(stats: &ReplayStats) -> String {
    let mut summary = format!(
        "Faults: {} split, {} deferred, {} corrupted, {} truncated",
        stats.splits, stats.deferrals, stats.corruptions, stats.truncations
    );
    if stats.dropped_carry_bytes > 0 {
        summary.push_str(&format!(", {} B dropped", stats.dropped_carry_bytes));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.00 MB");
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_micros(500)), "500µs");
        assert_eq!(format_interval(Duration::from_millis(50)), "50.00ms");
        assert_eq!(format_interval(Duration::from_secs(2)), "2.00s");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 01m 01s");
    }

    #[test]
    fn test_fault_summary() {
        let mut stats = ReplayStats {
            splits: 2,
            deferrals: 1,
            ..ReplayStats::default()
        };
        assert_eq!(
            fault_summary(&stats),
            "Faults: 2 split, 1 deferred, 0 corrupted, 0 truncated"
        );

        stats.dropped_carry_bytes = 12;
        assert!(fault_summary(&stats).ends_with(", 12 B dropped"));
    }
}
