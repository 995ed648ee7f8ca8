mod analysis;
mod clock;
mod config;
mod detector;
mod error;
mod estimator;
mod history;
mod monitor;
mod reporter;
mod ring;
mod source;
mod uploader;
mod window;

use clap::{Parser, Subcommand};
use clock::{Clock, MonotonicClock};
use config::{Config, SourceConfig};
use monitor::Monitor;
use reporter::{HttpReporter, LogReporter, Reporter, STARTUP_PATH};
use source::{ReplaySource, SampleSource, SyntheticPulse};
use std::error::Error;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use uploader::QueuedReporter;

/// Readings the uploader may hold while an exchange is in flight
const UPLOAD_QUEUE_LEN: usize = 2;

/// Pulse-sensor heart-rate monitor
#[derive(Parser, Debug)]
#[command(name = "pulse-relay")]
#[command(author, version, about = "Detect heartbeats and relay BPM readings to a collector")]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Command to execute (defaults to `run`)
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sample the source, detect beats and report BPM
    Run,

    /// Detect beats in a recorded CSV trace
    Analyze {
        /// CSV file with a `Value` column
        #[arg(value_name = "TRACE")]
        trace: PathBuf,

        /// Sample rate of the trace in Hz
        #[arg(long, default_value_t = analysis::DEFAULT_SAMPLE_RATE_HZ)]
        rate: u32,

        /// Factor applied to each value before rounding
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
    },
}

fn build_source(config: &Config) -> Result<Box<dyn SampleSource>, Box<dyn Error>> {
    match &config.source {
        SourceConfig::Synthetic {
            bpm,
            baseline,
            amplitude,
        } => {
            let pulse = SyntheticPulse::new(*bpm, config.sampling.tick_ms, *baseline, *amplitude);
            log::info!(
                "Sampling synthetic pulse at {} BPM ({} ticks per beat)",
                bpm,
                pulse.period_ticks()
            );
            Ok(Box::new(pulse))
        }
        SourceConfig::Replay { path, scale } => {
            let samples = analysis::load_trace(path, *scale)?;
            log::info!("Replaying {} samples from {}", samples.len(), path.display());
            let replay = ReplaySource::new(samples)
                .ok_or_else(|| format!("trace {} has no samples", path.display()))?;
            Ok(Box::new(replay))
        }
    }
}

/// Bring up the link, make the startup request, then hand the reporter to
/// the upload thread.
fn build_reporter(config: &Config) -> Result<Box<dyn Reporter>, Box<dyn Error>> {
    let server = match &config.server {
        Some(server) => server,
        None => {
            log::info!("No server configured, readings will only be logged");
            return Ok(Box::new(LogReporter));
        }
    };

    let http = HttpReporter::new(server.host.clone(), server.port, server.fetch_policy())?;
    http.wait_for_link(server.link_retry());

    match http.fetch(STARTUP_PATH) {
        Ok(response) => {
            log::info!("Got status code: {}", response.status);
            log::info!("Body returned follows: {}", response.body);
        }
        Err(e) => log::warn!("Startup request failed: {}", e),
    }

    Ok(Box::new(QueuedReporter::spawn(Box::new(http), UPLOAD_QUEUE_LEN)?))
}

fn run(config: &Config) -> Result<(), Box<dyn Error>> {
    log::info!(
        "Pulse sensor on pin {}, tick {} ms, report every {} ms",
        config.sampling.sensor_pin,
        config.sampling.tick_ms,
        config.reporting.interval_ms
    );

    let mut source = build_source(config)?;
    let mut reporter = build_reporter(config)?;
    let clock = MonotonicClock::new();
    let mut monitor = Monitor::from_config(config, clock.now_ms());

    // Nothing sets this yet; the loop runs for the life of the process
    let should_stop = AtomicBool::new(false);
    monitor::run(
        &mut monitor,
        source.as_mut(),
        &clock,
        reporter.as_mut(),
        Duration::from_millis(config.sampling.tick_ms as u64),
        &should_stop,
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Analyze { trace, rate, scale }) => {
            let samples = analysis::load_trace(&trace, scale)?;
            let report = analysis::analyze(&samples, rate)?;
            println!("{}", report);
            Ok(())
        }
        None | Some(Commands::Run) => {
            let loaded = match &cli.config {
                Some(path) => Config::load_from(path),
                None => Config::load(),
            };
            let config = loaded.map_err(|e| {
                log::error!("{}", e);
                e
            })?;
            run(&config)
        }
    }
}
