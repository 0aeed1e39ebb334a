use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use dabmsc_rs::pad::PadEvent;
use dabmsc_rs::superframe::{FirecodeReport, SuperframeDecoder};
use dabmsc_rs::synth::{SynthConfig, TransmissionSynth};
use dabmsc_rs::ui::print_banner;
use dabmsc_rs::ui::progress::ProgressManager;
use dabmsc_rs::utils::consts::LOG_LEVEL;
use dabmsc_rs::utils::logging::init_logging_with;
use dabmsc_rs::{DabError, MscFlowgraph, ReceiverConfig, Result};

#[derive(Parser)]
#[command(author, version, about = "DAB+ MSC decoder", long_about = None)]
struct Cli {
    /// Debug level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a recorded symbol stream into checked superframes
    Decode {
        /// TOML configuration, command line flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Directory holding the input files and debug output
        #[arg(short, long)]
        dir: Option<PathBuf>,
        #[arg(long)]
        mode: Option<u8>,
        #[arg(long)]
        address: Option<usize>,
        #[arg(long)]
        size: Option<usize>,
        /// Protection index 0..3
        #[arg(long)]
        protection: Option<u8>,
        /// Use the EEP-B tables
        #[arg(long)]
        eep_b: bool,
        #[arg(long)]
        bit_rate_n: Option<usize>,
        #[arg(long)]
        output: Option<String>,
        /// Also decode access units and PAD of every checked superframe
        #[arg(long)]
        superframes: bool,
        /// Skip msc_subchannel.dat and msc_decoded.dat
        #[arg(long)]
        no_debug: bool,
        /// Fail unless the firecode passes at 0, 5, 10, ... after sync
        #[arg(long)]
        expect_cadence: bool,
        /// Write the run summary as JSON
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        progress: bool,
    },
    /// Generate a test symbol stream for the configured subchannel
    Synth {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Transmission frames to generate
        #[arg(short = 'n', long, default_value_t = 12)]
        frames: usize,
        /// Standard deviation of additive Gaussian noise
        #[arg(long, default_value_t = 0.0)]
        noise: f32,
        /// Route the bits through the differential QPSK chain
        #[arg(long)]
        dqpsk: bool,
        /// Dynamic label to carry in the PAD
        #[arg(long)]
        label: Option<String>,
        #[arg(long, default_value_t = 0x5eed)]
        seed: u64,
        #[arg(long)]
        progress: bool,
    },
    /// Show format, AUs and PAD of a checked superframe file
    Inspect {
        input: PathBuf,
        #[arg(long, default_value_t = 15)]
        bit_rate_n: usize,
    },
    /// Print the default configuration as TOML
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<ReceiverConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            ReceiverConfig::from_file(path)
        }
        None => Ok(ReceiverConfig::default()),
    }
}

fn print_firecode(report: &FirecodeReport) {
    let ok: Vec<String> = report.ok_frames.iter().map(|i| i.to_string()).collect();
    println!(
        "firecode: {} frames, {} superframes, {} dropped, OK at [{}]",
        report.frames_received,
        report.superframes,
        report.frames_dropped,
        ok.join(", ")
    );
}

fn print_event(event: &PadEvent) {
    match event {
        PadEvent::DynamicLabel { charset, text } => {
            println!("label (charset {}): {}", charset, text)
        }
        PadEvent::ClearDisplay => println!("label cleared"),
        PadEvent::MotObject(object) => println!(
            "MOT object {} type {}/{} {:?}: {} bytes",
            object.transport_id,
            object.content_type,
            object.content_subtype,
            object.content_name,
            object.body.len()
        ),
    }
}

/// Superframe decoder for `inspect`, which has no config validation of its own
fn inspect_decoder(bit_rate_n: usize) -> Result<SuperframeDecoder> {
    if bit_rate_n == 0 {
        return Err(DabError::config("bit rate factor must be at least 1"));
    }
    Ok(SuperframeDecoder::new(bit_rate_n))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Decode {
            config,
            dir,
            mode,
            address,
            size,
            protection,
            eep_b,
            bit_rate_n,
            output,
            superframes,
            no_debug,
            expect_cadence,
            json,
            progress,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(dir) = dir {
                config.debug_dir = dir;
            }
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if let Some(address) = address {
                config.subchannel.address = address;
            }
            if let Some(size) = size {
                config.subchannel.size = size;
            }
            if let Some(protection) = protection {
                config.subchannel.protection = protection;
            }
            if eep_b {
                config.subchannel.option = 1;
            }
            if let Some(n) = bit_rate_n {
                config.bit_rate_n = n;
            }
            if let Some(output) = output {
                config.files.output = output;
            }
            config.decode_superframes |= superframes;
            config.debug &= !no_debug;
            config.verbose &= !cli.quiet;

            let mut graph = MscFlowgraph::new(config);
            if progress {
                graph = graph.with_progress(Arc::new(ProgressManager::new()));
            }
            let summary = graph.run()?;

            print_firecode(&summary.firecode);
            if let Some(format) = summary.audio_format {
                println!(
                    "audio: {} Hz, SBR {}, PS {}, {} AUs",
                    format.sample_rate(),
                    format.sbr,
                    format.ps,
                    format.num_aus()
                );
            }
            for event in &summary.pad_events {
                print_event(event);
            }
            if let Some(path) = json {
                std::fs::write(&path, summary.to_json()?)?;
                info!("Summary written to {}", path.display());
            }
            if expect_cadence && !summary.firecode.follows_superframe_cadence() {
                return Err(DabError::superframe(
                    "firecode checks do not follow the superframe cadence",
                ));
            }
        }
        Commands::Synth {
            config,
            dir,
            frames,
            noise,
            dqpsk,
            label,
            seed,
            progress,
        } => {
            let receiver = load_config(config.as_ref())?;
            let dir = dir.unwrap_or_else(|| receiver.debug_dir.clone());
            let synth_config = SynthConfig {
                transmission_frames: frames,
                noise_sigma: noise,
                dqpsk,
                label,
                seed,
                ..SynthConfig::for_receiver(&receiver)?
            };
            let mut synth = TransmissionSynth::new(synth_config)?;
            let progress = progress.then(ProgressManager::new);
            let summary = synth.write_to(&dir, progress.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Inspect { input, bit_rate_n } => {
            let data = std::fs::read(&input)?;
            let mut decoder = inspect_decoder(bit_rate_n)?;
            let len = decoder.superframe_len();
            if data.len() % len != 0 {
                warn!(
                    "{} bytes are not a whole number of {} byte superframes",
                    data.len(),
                    len
                );
            }
            for (i, superframe) in data.chunks_exact(len).enumerate() {
                match decoder.decode(superframe) {
                    Ok(decoded) => {
                        let sizes: Vec<usize> =
                            decoded.access_units.iter().map(|au| au.data.len()).collect();
                        println!(
                            "superframe {}: {} Hz SBR {} | AUs {:?} | {} CRC errors | RS {} fixed",
                            i,
                            decoded.format.sample_rate(),
                            decoded.format.sbr,
                            sizes,
                            decoded.au_crc_errors,
                            decoded.correction.bytes_corrected
                        );
                        for event in &decoded.pad_events {
                            print_event(event);
                        }
                    }
                    Err(e) => println!("superframe {}: {}", i, e),
                }
            }
            println!("{}", serde_json::to_string_pretty(decoder.stats())?);
        }
        Commands::Config => {
            print!("{}", ReceiverConfig::default().to_toml_string()?);
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        LOG_LEVEL
    };
    init_logging_with(level);
    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_rejects_zero_bit_rate() {
        assert!(matches!(inspect_decoder(0), Err(DabError::Config { .. })));
        let decoder = inspect_decoder(15).unwrap();
        assert_eq!(decoder.superframe_len(), 1800);
    }

    #[test]
    fn test_inspect_zero_bit_rate_exits_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("checked.dat");
        std::fs::write(&input, [0u8; 16]).unwrap();
        let cli = Cli::parse_from([
            "dabmsc-rs",
            "inspect",
            input.to_str().unwrap(),
            "--bit-rate-n",
            "0",
        ]);
        assert!(run(cli).is_err());
    }
}
