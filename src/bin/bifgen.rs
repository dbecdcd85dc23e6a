use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use bifgen::{
    BifGenerator, DurationProbe, ExtractOptions, ExtractionMode, FfmpegLogLevel, FfprobeDuration,
    ProgressCallback, ProgressInfo, ThumbnailProfile,
};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  bifgen generate input.mp4 --out input.bif --interval 10 --workers 8 --progress\n  bifgen generate input.mp4 --out input.bif --mode stream --profile compact\n  bifgen probe input.mp4 --json\n  bifgen completions zsh > _bifgen";

#[derive(Debug, Parser)]
#[command(
    name = "bifgen",
    version,
    about = "Generate BIF scrub-bar thumbnail indexes from video files",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional logging output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar while extracting.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Path to the ffmpeg executable.
    #[arg(long, global = true)]
    ffmpeg: Option<PathBuf>,

    /// Path to the ffprobe executable.
    #[arg(long, global = true)]
    ffprobe: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build a BIF file from a video.
    #[command(
        about = "Generate a BIF file",
        after_help = "Examples:\n  bifgen generate input.mp4 --out input.bif\n  bifgen generate input.mp4 --out input.bif --interval 5 --workers 8 --timeout 600\n  bifgen generate input.mp4 --out input.bif --mode stream --width 320 --height 180 --quality 10"
    )]
    Generate {
        /// Input video path.
        input: PathBuf,
        /// Output BIF path.
        #[arg(long)]
        out: PathBuf,
        /// Seconds between thumbnails.
        #[arg(long, default_value_t = 10.0)]
        interval: f64,
        /// Number of parallel ffmpeg processes (per-frame mode only).
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Acquisition strategy: per-frame | stream.
        #[arg(long, default_value = "per-frame")]
        mode: String,
        /// Thumbnail preset: standard (320x180) | compact (240x160).
        #[arg(long, default_value = "standard")]
        profile: String,
        /// Override the thumbnail width.
        #[arg(long)]
        width: Option<u32>,
        /// Override the thumbnail height.
        #[arg(long)]
        height: Option<u32>,
        /// Override the JPEG quality (2 = best, 31 = worst).
        #[arg(long)]
        quality: Option<u32>,
        /// Abort the whole job after this many seconds.
        #[arg(long)]
        timeout: Option<f64>,
    },

    /// Print the duration of a video and the thumbnail count a job would need.
    #[command(
        about = "Probe video duration",
        after_help = "Examples:\n  bifgen probe input.mp4\n  bifgen probe input.mp4 --interval 5 --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,
        /// Seconds between thumbnails.
        #[arg(long, default_value_t = 10.0)]
        interval: f64,
        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_mode(value: &str) -> Option<ExtractionMode> {
    match value.to_ascii_lowercase().as_str() {
        "per-frame" | "perframe" | "frame" | "parallel" => Some(ExtractionMode::PerFrame),
        "stream" | "single" => Some(ExtractionMode::Stream),
        _ => None,
    }
}

fn parse_profile(value: &str) -> Option<ThumbnailProfile> {
    match value.to_ascii_lowercase().as_str() {
        "standard" | "sd" => Some(ThumbnailProfile::standard()),
        "compact" | "small" => Some(ThumbnailProfile::compact()),
        _ => None,
    }
}

/// A preset with optional size and quality overrides.
fn thumbnail_profile(
    preset: &str,
    width: Option<u32>,
    height: Option<u32>,
    quality: Option<u32>,
) -> Result<ThumbnailProfile, String> {
    let mut profile = parse_profile(preset).ok_or(format!("unsupported --profile: {preset}"))?;
    if width.is_some() || height.is_some() {
        let (width, height) = (
            width.unwrap_or(profile.width),
            height.unwrap_or(profile.height),
        );
        profile = profile.with_resolution(width, height);
    }
    if let Some(quality) = quality {
        profile = profile.with_quality(quality);
    }
    Ok(profile)
}

fn parse_seconds(value: f64, flag: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    if !value.is_finite() || value <= 0.0 {
        return Err(format!("{flag} must be a positive number of seconds").into());
    }
    Ok(Duration::try_from_secs_f64(value)?)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn init_logging(global: &GlobalOptions) {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => {
            builder.parse_filters(&filters);
        }
        Err(_) if global.verbose => {
            builder.filter_level(log::LevelFilter::Debug);
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Info);
        }
    }
    builder.init();
}

fn base_extract_options(
    global: &GlobalOptions,
) -> Result<ExtractOptions, Box<dyn std::error::Error>> {
    let mut options = ExtractOptions::new();

    if let Some(level) = &global.log_level {
        let parsed =
            FfmpegLogLevel::from_name(level).ok_or(format!("unsupported --log-level: {level}"))?;
        options = options.with_ffmpeg_log_level(parsed);
    }
    if let Some(ffmpeg) = &global.ffmpeg {
        options = options.with_ffmpeg_path(ffmpeg);
    }
    if let Some(ffprobe) = &global.ffprobe {
        options = options.with_ffprobe_path(ffprobe);
    }

    Ok(options)
}

/// Feeds an indicatif bar from progress callbacks.
struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if let Some(total) = info.total {
            self.bar.set_length(total);
        }
        self.bar.set_position(info.current);
        if let Some(timestamp) = info.current_timestamp {
            self.bar.set_message(format!("t={:.0}s", timestamp.as_secs_f64()));
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.global);

    match cli.command {
        Commands::Generate {
            input,
            out,
            interval,
            workers,
            mode,
            profile,
            width,
            height,
            quality,
            timeout,
        } => {
            let interval = parse_seconds(interval, "--interval")?;
            let mode = parse_mode(&mode).ok_or(format!("unsupported --mode: {mode}"))?;
            let profile = thumbnail_profile(&profile, width, height, quality)?;

            ensure_writable_path(&out, cli.global.overwrite)?;

            let mut options = base_extract_options(&cli.global)?
                .with_workers(workers)
                .with_mode(mode)
                .with_profile(profile);
            if let Some(timeout) = timeout {
                options = options.with_timeout(parse_seconds(timeout, "--timeout")?);
            }
            let progress = if cli.global.progress {
                let progress = Arc::new(TerminalProgress::new()?);
                options = options.with_progress(Arc::clone(&progress) as Arc<dyn ProgressCallback>);
                Some(progress)
            } else {
                None
            };

            let started = Instant::now();
            let result = BifGenerator::new(&input, interval)
                .with_options(options)
                .save(&out);
            if let Some(progress) = &progress {
                progress.finish();
            }
            let written = result?;

            println!(
                "{} wrote {} ({} bytes)",
                "success:".green().bold(),
                out.display(),
                written
            );
            println!("Processed in {:.2}s", started.elapsed().as_secs_f64());
        }
        Commands::Probe {
            input,
            interval,
            json,
        } => {
            let interval = parse_seconds(interval, "--interval")?;
            let prober = match &cli.global.ffprobe {
                Some(ffprobe) => FfprobeDuration::with_program(ffprobe),
                None => FfprobeDuration::new(),
            };
            let duration = prober.probe(&input)?;
            let frames = bifgen::frame_count(duration, interval)?;
            let profile = ThumbnailProfile::default();

            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "duration_seconds": duration,
                    "interval_seconds": interval.as_secs_f64(),
                    "frame_count": frames,
                    "width": profile.width,
                    "height": profile.height,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Duration: {duration:.3}s");
                println!("Interval: {:.3}s", interval.as_secs_f64());
                println!("Frames: {frames}");
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "bifgen", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}
