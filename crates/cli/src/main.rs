use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use converter::{run_batch, DestinationStrategy, PipelineConfig};
use log::info;
use std::path::PathBuf;

/// Batch video converter: re-encode libraries in place or sort converted
/// files into season folders.
#[derive(Parser, Debug)]
#[command(name = "vconvert", author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (JSON or TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert files in place, replacing each original after verification
    Replace {
        /// Folder to scan for video files
        source: PathBuf,

        /// Codecs that need no conversion (comma separated)
        #[arg(long, value_delimiter = ',')]
        acceptable_codec: Vec<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Convert files into a sorted target folder tree
    Sort {
        /// Folder to scan for video files
        source: PathBuf,

        /// Root folder for converted output
        target: PathBuf,

        /// Mirror the source folder layout instead of sorting into
        /// season folders parsed from file names
        #[arg(long)]
        keep_folder_structure: bool,

        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options shared by both workflows; each overrides the loaded config.
#[derive(Args, Debug)]
struct CommonArgs {
    /// Log ffmpeg commands instead of executing them
    #[arg(long)]
    dry_run: bool,

    /// Skip files whose destination already exists
    #[arg(long)]
    resume: bool,

    /// List conversion candidates and exit without converting
    #[arg(long)]
    check_only: bool,

    /// Re-encode even files already at an acceptable/target codec
    #[arg(long)]
    force: bool,

    /// Relative duration tolerance for verification (e.g. 0.05 for 5%)
    #[arg(long)]
    tolerance: Option<f64>,

    /// Absolute duration-difference floor in seconds
    #[arg(long)]
    min_duration_diff: Option<f64>,

    /// Audio languages to keep (comma separated, empty keeps all)
    #[arg(long, value_delimiter = ',')]
    audio_language: Vec<String>,

    /// Subtitle languages to keep (comma separated, empty keeps all)
    #[arg(long, value_delimiter = ',')]
    subtitle_language: Vec<String>,

    /// Downscale video wider than this to this width
    #[arg(long)]
    max_width: Option<u32>,

    /// Encoder preset override (e.g. p5)
    #[arg(long)]
    preset: Option<String>,

    /// Constant-quality override for the encoder
    #[arg(long)]
    cq: Option<u32>,

    /// File suffixes to scan for (comma separated, without the dot)
    #[arg(long, value_delimiter = ',')]
    suffix: Vec<String>,

    /// Path to the ffmpeg binary
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe binary
    #[arg(long)]
    ffprobe: Option<PathBuf>,
}

impl CommonArgs {
    /// Fold command-line overrides into the loaded configuration.
    fn apply(&self, cfg: &mut PipelineConfig) {
        cfg.batch.dry_run |= self.dry_run;
        cfg.batch.resume |= self.resume;
        cfg.batch.check_only |= self.check_only;
        cfg.batch.force_reencode |= self.force;

        if let Some(tolerance) = self.tolerance {
            cfg.batch.duration_tolerance = tolerance;
        }
        if let Some(floor) = self.min_duration_diff {
            cfg.batch.min_duration_diff_secs = floor;
        }
        if !self.audio_language.is_empty() {
            cfg.media.audio_languages = self.audio_language.clone();
        }
        if !self.subtitle_language.is_empty() {
            cfg.media.subtitle_languages = self.subtitle_language.clone();
        }
        if let Some(width) = self.max_width {
            cfg.media.maximum_width = Some(width);
        }
        if let Some(preset) = &self.preset {
            set_video_param(&mut cfg.media.video_params, "preset", preset);
        }
        if let Some(cq) = self.cq {
            set_video_param(&mut cfg.media.video_params, "cq", &cq.to_string());
        }
        if !self.suffix.is_empty() {
            cfg.batch.suffixes = self.suffix.iter().map(|s| s.to_lowercase()).collect();
        }
        if let Some(ffmpeg) = &self.ffmpeg {
            cfg.batch.ffmpeg_bin = ffmpeg.clone();
        }
        if let Some(ffprobe) = &self.ffprobe {
            cfg.batch.ffprobe_bin = ffprobe.clone();
        }
    }
}

/// Replace a named codec parameter in place, or append it.
fn set_video_param(params: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some(entry) = params.iter_mut().find(|(n, _)| n == name) {
        entry.1 = value.to_string();
    } else {
        params.push((name.to_string(), value.to_string()));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = env_logger::Builder::from_default_env();
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.format_timestamp_secs().init();

    let mut cfg = PipelineConfig::load_config(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let (source, strategy) = match &cli.command {
        Command::Replace {
            source,
            acceptable_codec,
            common,
        } => {
            common.apply(&mut cfg);
            if !acceptable_codec.is_empty() {
                cfg.batch.acceptable_codecs = acceptable_codec.clone();
            }
            (source.clone(), DestinationStrategy::InPlace)
        }
        Command::Sort {
            source,
            target,
            keep_folder_structure,
            common,
        } => {
            common.apply(&mut cfg);
            let strategy = if *keep_folder_structure {
                DestinationStrategy::Mirror {
                    target: target.clone(),
                }
            } else {
                DestinationStrategy::SeasonFolders {
                    target: target.clone(),
                }
            };
            (source.clone(), strategy)
        }
    };

    anyhow::ensure!(
        source.is_dir(),
        "Source folder does not exist: {}",
        source.display()
    );

    info!("Starting conversion batch");
    info!("  Source: {}", source.display());
    info!("  Target codec: {}", cfg.media.video_codec);
    info!("  Acceptable codecs: {:?}", cfg.batch.acceptable_codecs);
    info!(
        "  Verification: {:.0}% tolerance, {:.0}s floor",
        cfg.batch.duration_tolerance * 100.0,
        cfg.batch.min_duration_diff_secs
    );

    let report = run_batch(&source, strategy, &cfg.media, &cfg.batch)
        .await
        .context("Batch aborted")?;

    if cfg.batch.check_only {
        println!("{} files would be converted", report.planned.len());
        for planned in &report.planned {
            println!(
                "  {} -> {}",
                planned.source.display(),
                planned.destination.display()
            );
        }
        return Ok(());
    }

    println!(
        "Done: {} converted, {} skipped, {} failed",
        report.converted, report.skipped, report.failed
    );

    if report.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
