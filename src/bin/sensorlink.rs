//! Command-line front end for sensorlink
//!
//! - `sensorlink ports` lists serial ports
//! - `sensorlink poll` polls the sensor until Ctrl-C or `--count` samples
//! - `sensorlink replay <FILE>` runs the same loop over a captured byte dump

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sensorlink::{
    DriverOptions, FrameError, LinkError, Sample, SensorConfig, SensorConnection, SensorLink,
    SerialTransport, UpdateRate,
};

/// Poll a Modbus-RTU current sensor over a serial line
#[derive(Parser, Debug)]
#[command(name = "sensorlink", version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List available serial ports
    Ports,

    /// Poll the sensor on a serial port
    Poll {
        #[command(flatten)]
        link: LinkArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run the poll loop over a captured byte dump
    Replay {
        /// Raw capture of the sensor line
        #[arg(value_name = "FILE")]
        capture: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct LinkArgs {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Pause between poll cycles in milliseconds
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Number of samples kept in the history
    #[arg(long)]
    capacity: Option<usize>,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Print samples as JSON lines
    #[arg(long)]
    json: bool,

    /// Stop after this many samples
    #[arg(short = 'n', long, value_name = "N")]
    count: Option<u64>,
}

/// One printed sample.
#[derive(Serialize)]
struct Reading {
    sequence: u64,
    elapsed_s: f64,
    raw: u16,
    value: f64,
}

impl Reading {
    fn new(sample: &Sample, scale: f64) -> Self {
        Self {
            sequence: sample.sequence,
            elapsed_s: sample.elapsed_secs(),
            raw: sample.value,
            value: sample.scaled(scale),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            SensorConfig::load(path)?
        }
        None => SensorConfig::default(),
    };

    match cli.command {
        Command::Ports => list_ports(),
        Command::Poll { link, output } => {
            link.apply(&mut config);
            config.validate()?;
            let transport = SerialTransport::open(&config.port, config.baud_rate)
                .with_context(|| format!("opening {}", config.port))?;
            info!(port = %config.port, baud = config.baud_rate, "Polling sensor");
            let connection = SensorLink::attach_with(
                transport,
                &config,
                Arc::new(()),
                output.driver_options(&config),
            )?;
            run(connection, &output).await
        }
        Command::Replay { capture, output } => {
            let transport = sensorlink::ReplayTransport::from_capture(&capture)?
                .on_exhausted(sensorlink::transports::ExhaustedBehavior::Close);
            let connection = SensorLink::attach_with(
                transport,
                &config,
                Arc::new(()),
                output.driver_options(&config),
            )?;
            run(connection, &output).await
        }
    }
}

impl LinkArgs {
    fn apply(&self, config: &mut SensorConfig) {
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.baud_rate = baud;
        }
        if let Some(ms) = self.interval_ms {
            config.timing.poll_interval_ms = ms;
        }
        if let Some(capacity) = self.capacity {
            config.history_capacity = capacity;
        }
    }
}

impl OutputArgs {
    fn driver_options(&self, config: &SensorConfig) -> DriverOptions {
        DriverOptions { max_samples: self.count, ..config.driver_options() }
    }
}

fn list_ports() -> Result<()> {
    let ports = SerialTransport::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found.");
    }
    for port in ports {
        println!("{port}");
    }
    Ok(())
}

/// Print samples until the loop ends or Ctrl-C, then dump the history.
async fn run(connection: SensorConnection, output: &OutputArgs) -> Result<()> {
    let scale = connection.scale();
    let history = connection.history();
    let mut updates = connection.subscribe(UpdateRate::Native);
    let mut printed = 0;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
            next = updates.next() => {
                // The update stream keeps only the newest sample; the history has the rest
                for sample in connection.samples_after(printed) {
                    print_sample(&sample, scale, output.json)?;
                    printed = sample.sequence;
                }
                if next.is_none() {
                    break;
                }
            }
        }
    }

    let outcome = connection.shutdown().await;

    let collected = history.snapshot();
    if collected.is_empty() {
        println!("No data collected.");
    } else if !output.json {
        println!("Collected {} samples:", collected.len());
        for sample in &collected {
            print_sample(sample, scale, false)?;
        }
    }

    match outcome {
        Ok(summary) => {
            info!(
                "Done ({} cycles, {} samples, {} errors)",
                summary.cycles, summary.samples, summary.errors
            );
            Ok(())
        }
        Err(LinkError::Frame(FrameError::TransportClosed { reason, .. })) => {
            warn!("Transport closed: {reason}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_sample(sample: &Sample, scale: f64, json: bool) -> Result<()> {
    let reading = Reading::new(sample, scale);
    if json {
        println!("{}", serde_json::to_string(&reading)?);
    } else {
        println!(
            "#{:<6} {:>9.3}s  raw={:<5} {:.2}",
            reading.sequence, reading.elapsed_s, reading.raw, reading.value
        );
    }
    Ok(())
}
