use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rewind::{
    BatchReport, CombineMode, FfmpegLogLevel, InputReport, InputStatus, OperationType,
    OutputLayout, PipelineOptions, ProgressCallback, ProgressInfo, ReversalSpec, VideoCodec,
    VideoEncoderOptions,
};

const CLI_AFTER_HELP: &str = "Examples:\n  rewind --video clip.mp4\n  rewind --video a.mp4 b.mov --keep-frames --video-loop ab\n  rewind --video clip.mp4 --codec mpeg4 --json\n  rewind                      (opens the web form on http://127.0.0.1:7860)\n  rewind --completions zsh > _rewind";

#[derive(Debug, Parser)]
#[command(
    name = "rewind",
    version,
    about = "Reverse videos frame by frame, keep the frames, and loop them with the original",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    /// Input videos. Without this flag the web form is started instead.
    #[arg(long, num_args = 1.., value_name = "PATH")]
    video: Vec<PathBuf>,

    /// Also write the reversed frames as images.
    #[arg(long)]
    keep_frames: bool,

    /// Join original and reversed: ab (original first) or ba (reversed first).
    #[arg(long, value_name = "MODE")]
    video_loop: Option<CombineMode>,

    /// Directory for reversed and combined videos.
    #[arg(long, default_value = rewind::layout::DEFAULT_VIDEOS_DIR)]
    output_dir: PathBuf,

    /// Directory for extracted frames.
    #[arg(long, default_value = rewind::layout::DEFAULT_FRAMES_DIR)]
    frames_dir: PathBuf,

    /// Container extension for output videos.
    #[arg(long, default_value = "mp4")]
    ext: String,

    /// Image extension for extracted frames (jpg, png, bmp, ...).
    #[arg(long, default_value = "jpg")]
    frame_ext: String,

    /// Output codec (h264, h265, mpeg4).
    #[arg(long, default_value = "h264")]
    codec: VideoCodec,

    /// Constant Rate Factor for h264/h265 (0-51, lower is better).
    #[arg(long)]
    crf: Option<u32>,

    /// Target bitrate in bits per second; overrides --crf.
    #[arg(long)]
    bitrate: Option<usize>,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long)]
    log_level: Option<FfmpegLogLevel>,

    /// Show additional logging output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Print the batch report as JSON.
    #[arg(long)]
    json: bool,

    /// Process inputs concurrently, one worker per input.
    #[cfg(feature = "rayon")]
    #[arg(long)]
    parallel: bool,

    /// Address the web form listens on.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port the web form listens on.
    #[arg(long, default_value_t = 7860)]
    port: u16,

    /// Print a shell completion script and exit.
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

/// What this invocation does.
#[derive(Debug, PartialEq)]
enum Mode {
    /// Process the given batch and exit.
    Cli(ReversalSpec),
    /// Serve the upload form.
    Web(SocketAddr),
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.video.is_empty() {
            return Mode::Web(SocketAddr::new(self.host, self.port));
        }
        Mode::Cli(
            ReversalSpec::new(self.video.iter().cloned())
                .keep_frames(self.keep_frames)
                .combine(self.video_loop.unwrap_or_default()),
        )
    }

    fn layout(&self) -> OutputLayout {
        OutputLayout::default()
            .with_videos_dir(&self.output_dir)
            .with_frames_dir(&self.frames_dir)
            .with_video_extension(&self.ext)
            .with_image_extension(&self.frame_ext)
    }

    fn encoder_options(&self) -> VideoEncoderOptions {
        let mut options = VideoEncoderOptions::default().codec(self.codec);
        if let Some(crf) = self.crf {
            options = options.crf(crf);
        }
        if let Some(bitrate) = self.bitrate {
            options = options.bitrate(bitrate);
        }
        options
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.green} {msg:32} {bar:40.cyan/blue} {pos}/{len}",
        )?;
        bar.set_style(style.progress_chars("##-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        let operation = match info.operation {
            OperationType::Decoding => "decoding",
            OperationType::Encoding => "encoding",
            OperationType::FrameExtraction => "writing frames",
            OperationType::Combining => "combining",
            _ => "working",
        };
        let name = info
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.bar.set_length(info.total.unwrap_or(0).max(info.current));
        self.bar.set_position(info.current);
        self.bar.set_message(format!("{operation} {name}"));
    }
}

fn print_input(report: &InputReport) {
    match report.status() {
        InputStatus::Succeeded => {
            let reversed = report
                .reversed
                .as_ref()
                .map(|video| video.path.display().to_string())
                .unwrap_or_default();
            println!(
                "{} {} -> {}",
                "success:".green().bold(),
                report.input.display(),
                reversed
            );
        }
        InputStatus::Partial => {
            println!("{} {}", "partial:".yellow().bold(), report.input.display());
        }
        InputStatus::Failed => {
            println!("{} {}", "error:".red().bold(), report.input.display());
        }
    }

    if let Some(combined) = &report.combined {
        println!("  combined: {}", combined.path.display());
    }
    if let Some(first) = report.frames.first() {
        let folder = first.parent().map(|dir| dir.display().to_string()).unwrap_or_default();
        println!("  frames:   {} in {folder}", report.frames.len());
    }
    for failure in &report.failures {
        println!(
            "  {} {}: {}",
            "failed".red(),
            failure.step.as_str(),
            failure.message
        );
    }
}

fn print_summary(report: &BatchReport) {
    let summary = format!(
        "{} succeeded, {} partial, {} failed",
        report.succeeded(),
        report.partial(),
        report.failed()
    );
    if report.failed() + report.partial() == 0 {
        println!("{}", summary.green());
    } else {
        println!("{}", summary.yellow());
    }
}

fn run_batch(cli: &Cli, spec: &ReversalSpec) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = PipelineOptions::new().with_encoder(cli.encoder_options());
    let progress = if cli.progress && !cli.json {
        let progress = Arc::new(TerminalProgress::new()?);
        options = options.with_progress(progress.clone());
        Some(progress)
    } else {
        None
    };

    let layout = cli.layout();

    #[cfg(feature = "rayon")]
    let report = if cli.parallel {
        rewind::process_batch_parallel(spec, &layout, &options)?
    } else {
        rewind::process_batch(spec, &layout, &options)?
    };
    #[cfg(not(feature = "rayon"))]
    let report = rewind::process_batch(spec, &layout, &options)?;

    if let Some(progress) = progress {
        progress.bar.finish_and_clear();
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        for input in report.inputs() {
            print_input(input);
        }
        print_summary(&report);
    }
    Ok(())
}

#[cfg(feature = "web")]
fn run_web(cli: &Cli, addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let options = PipelineOptions::new().with_encoder(cli.encoder_options());
    let config = rewind::WebConfig::new(cli.layout()).with_options(options);

    println!("{} http://{addr}", "serving".cyan().bold());
    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(rewind::web::serve(addr, config))?;
    Ok(())
}

#[cfg(not(feature = "web"))]
fn run_web(_cli: &Cli, _addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    Err("no --video given and web mode requires building with the `web` feature".into())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "rewind", &mut std::io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose);
    rewind::ffmpeg::init()?;
    if let Some(level) = cli.log_level {
        rewind::set_ffmpeg_log_level(level);
    }

    match cli.mode() {
        Mode::Cli(spec) => run_batch(&cli, &spec),
        Mode::Web(addr) => run_web(&cli, addr),
    }
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rewind").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn video_flag_selects_cli_mode() {
        let cli = parse(&["--video", "a.mp4", "b.mov", "--keep-frames", "--video-loop", "ba"]);
        let expected = ReversalSpec::new(["a.mp4", "b.mov"])
            .keep_frames(true)
            .combine(CombineMode::ReversedThenOriginal);
        assert_eq!(cli.mode(), Mode::Cli(expected));
    }

    #[test]
    fn no_video_selects_web_mode() {
        let cli = parse(&["--port", "8080", "--host", "0.0.0.0"]);
        assert_eq!(cli.mode(), Mode::Web("0.0.0.0:8080".parse().unwrap()));
    }

    #[test]
    fn loop_defaults_to_none() {
        let cli = parse(&["--video", "a.mp4"]);
        match cli.mode() {
            Mode::Cli(spec) => assert_eq!(spec.mode, CombineMode::None),
            Mode::Web(_) => panic!("expected CLI mode"),
        }
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(Cli::try_parse_from(["rewind", "--video", "a.mp4", "--video-loop", "abc"]).is_err());
        assert!(Cli::try_parse_from(["rewind", "--video", "a.mp4", "--codec", "vp9"]).is_err());
        assert!(Cli::try_parse_from(["rewind", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn layout_and_encoder_follow_flags() {
        let cli = parse(&[
            "--video", "a.mp4", "--output-dir", "out", "--frames-dir", "imgs", "--ext", "mkv",
            "--frame-ext", "png", "--codec", "mpeg4", "--bitrate", "800000",
        ]);
        let layout = cli.layout();
        assert_eq!(layout.reversed_path("a"), PathBuf::from("out/a_reversed.mkv"));
        assert_eq!(layout.frame_path("a", 0), PathBuf::from("imgs/a/frame_00000.png"));

        let encoder = cli.encoder_options();
        assert_eq!(encoder.codec, VideoCodec::Mpeg4);
        assert_eq!(encoder.bitrate, Some(800_000));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
