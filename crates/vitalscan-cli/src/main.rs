use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use vitalscan_core::{Demographics, Gender, ScanOrchestrator, ScanParams, ScanState, SyntheticFace, VitalScanConfig};
use vitalscan_signals::ProjectionMethod;

#[derive(Parser)]
#[command(name = "vitalscan", about = "Vital-sign scans from facial colour signals")]
struct Cli {
    /// TOML config file; VITALSCAN_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full scan on a synthetic subject and print the report as JSON
    Simulate {
        #[arg(long, default_value_t = 72.0)]
        bpm: f32,
        #[arg(long, default_value_t = 45)]
        duration: u32,
        /// Projection method: pos or chrom
        #[arg(long, default_value = "pos")]
        method: ProjectionMethod,
        #[arg(long, default_value_t = 35)]
        age: u32,
        #[arg(long, default_value = "female")]
        gender: Gender,
        #[arg(long, default_value_t = 165.0)]
        height: f32,
        #[arg(long, default_value_t = 60.0)]
        weight: f32,
        /// Sensor noise standard deviation in pixel units
        #[arg(long, default_value_t = 0.1)]
        noise: f32,
        /// Every N-th frame has no face
        #[arg(long)]
        dropout: Option<usize>,
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print the effective configuration
    Config {},
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitalscan=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();
    let config = VitalScanConfig::load_layered(cli.config.as_deref())?;

    match cli.cmd {
        Commands::Simulate {
            bpm,
            duration,
            method,
            age,
            gender,
            height,
            weight,
            noise,
            dropout,
            seed,
        } => {
            let fs = config.capture.sampling_rate_hz;
            let session = ScanOrchestrator::new(config)?;
            session.set_demographics(Demographics {
                age,
                gender,
                height_cm: height,
                weight_kg: weight,
            })?;
            session.start_scan(ScanParams::new(method, duration))?;

            let mut face = SyntheticFace::new(bpm, fs).with_seed(seed).with_noise(noise);
            if let Some(every) = dropout {
                face = face.with_dropout(every);
            }
            let samples = face.take_seconds(duration as f32);
            let n = samples.len();
            tracing::info!(samples = n, bpm, %method, "feeding synthetic subject");
            for (i, roi) in samples.into_iter().enumerate() {
                session.push_roi(roi, 100.0 * (i + 1) as f32 / n as f32)?;
            }

            let deadline = Instant::now() + Duration::from_secs(60);
            while session.status().state == ScanState::Scanning {
                if Instant::now() >= deadline {
                    return Err("timed out waiting for scan processing".into());
                }
                thread::sleep(Duration::from_millis(25));
            }

            let report = session.result()?;
            println!("{}", report.to_json_pretty()?);
        }
        Commands::Config {} => {
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}
