//! NMEA Replay - play a recorded NMEA0183 log onto the network
//!
//! Sends each line of the log as a UDP broadcast datagram, paced by the
//! log's own ZDA timestamps, optionally injecting transport faults.

use clap::Parser;
use nmea_cli::signal;
use nmea_cli::stats::{display_pass_stats, format_interval};
use nmea_cli::ReplayConfig;
use nmea_io::{shutdown_channel, BroadcastSocket, SystemClock};
use nmea_protocol::RandomDecisions;
use nmea_replay::{ReplayEngine, ReplaySession, SessionOutcome};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nmea-replay")]
#[command(about = "Replay a recorded NMEA0183 log as UDP broadcast", long_about = None)]
struct Args {
    /// Recorded NMEA0183 log file
    #[arg(value_name = "NMEA_FILE")]
    input: Option<PathBuf>,

    /// Destination UDP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Randomly corrupt and truncate sentences
    #[arg(short, long)]
    corrupt: bool,

    /// Sentence types to skip (e.g. GSV,GSA)
    #[arg(short = 'x', long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Destination address
    #[arg(long)]
    destination: Option<Ipv4Addr>,

    /// Play the log once instead of looping
    #[arg(long)]
    once: bool,

    /// Seed for reproducible fault injection
    #[arg(long)]
    seed: Option<u64>,

    /// Pacing interval before the first timestamp, in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Load settings from a TOML file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective settings to a TOML file and exit
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Command-line values override the loaded configuration
    fn merge_into(self, mut config: ReplayConfig) -> ReplayConfig {
        if let Some(input) = self.input {
            config.input = Some(input);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if self.corrupt {
            config.corrupt = true;
        }
        if !self.exclude.is_empty() {
            config.exclude = self.exclude;
        }
        if let Some(destination) = self.destination {
            config.destination = destination;
        }
        if self.once {
            config.loop_playback = false;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.initial_interval_ms = interval_ms;
        }
        config
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let base = match &args.config {
        Some(path) => ReplayConfig::from_file(path)?,
        None => ReplayConfig::default(),
    };
    let write_config = args.write_config.clone();
    let config = args.merge_into(base);

    if let Some(path) = write_config {
        config.to_file(&path)?;
        tracing::info!("Configuration written to {}", path.display());
        return Ok(());
    }

    config.validate()?;
    let input = match &config.input {
        Some(input) => input.clone(),
        None => anyhow::bail!("No input file given"),
    };

    let socket = BroadcastSocket::connect(config.destination_addr())?;
    tracing::info!(
        "Replaying {} to {} (corrupt: {}, loop: {})",
        input.display(),
        config.destination_addr(),
        config.corrupt,
        config.loop_playback
    );

    let decisions = match config.seed {
        Some(seed) => {
            tracing::info!("Fault injection seeded with {}", seed);
            RandomDecisions::seeded(seed)
        }
        None => RandomDecisions::from_entropy(),
    };

    signal::install_handlers();
    let (trigger, listener) = shutdown_channel();
    let watcher = signal::spawn_watcher(trigger.clone())?;

    let engine = ReplayEngine::new(
        socket,
        decisions,
        SystemClock::with_shutdown(listener),
        config.engine_options()?,
    );
    let mut session = ReplaySession::new(engine, input, config.loop_playback);

    let mut pass_start = Instant::now();
    let result = session.run(|pass, stats| {
        display_pass_stats(pass, stats, pass_start.elapsed());
        pass_start = Instant::now();
    });

    // Stop the watcher whether or not playback succeeded
    trigger.trigger();
    if watcher.join().is_err() {
        tracing::warn!("Shutdown watcher panicked");
    }

    match result? {
        SessionOutcome::Completed { passes } => {
            tracing::info!(
                "Playback finished after {} pass(es), final interval {}",
                passes,
                format_interval(session.engine().interval())
            );
        }
        SessionOutcome::Interrupted { pass } => {
            tracing::info!(
                "Playback interrupted during pass {} ({} lines, {} datagrams)",
                pass,
                session.engine().stats().lines_read,
                session.engine().stats().datagrams_sent
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_overrides_config() {
        let args = Args::parse_from([
            "nmea-replay",
            "log.txt",
            "-p",
            "10110",
            "-x",
            "GSV,GSA",
            "--once",
            "--seed",
            "3",
        ]);
        let base = ReplayConfig {
            corrupt: true,
            ..ReplayConfig::example()
        };
        let config = args.merge_into(base);

        assert_eq!(config.input, Some(PathBuf::from("log.txt")));
        assert_eq!(config.port, 10110);
        assert_eq!(config.exclude, vec!["GSV".to_string(), "GSA".to_string()]);
        assert!(!config.loop_playback);
        assert!(config.corrupt);
        assert_eq!(config.seed, Some(3));
    }

    #[test]
    fn test_config_kept_without_flags() {
        let args = Args::parse_from(["nmea-replay"]);
        let config = args.merge_into(ReplayConfig::example());

        assert_eq!(config, ReplayConfig::example());
    }
}
