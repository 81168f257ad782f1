use clap::{Args, Parser, Subcommand};
use inkpage::config::{self, InkpageConfig};
use inkpage::encoder::Png2XtcEncoder;
use inkpage::imaging::{ContrastBoost, DitherAlgorithm, Margin, PadColor, ReadingOrder, SplitAxis};
use inkpage::output;
use inkpage::pipeline::{BwOptions, MangaOptions, run_bw, run_manga};
use inkpage::scan::{PageContrasts, PageList, PageSelection};
use inkpage::scheduler::{ProgressEvent, Scheduler};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inkpage")]
#[command(about = "Convert manga pages and images for the XTEink X4 e-reader")]
#[command(long_about = "\
Convert manga pages and images for the XTEink X4 e-reader

  manga  Folders of page images become one .xtc book each. Pages are split
         into halves, rotated, fitted to 480x800 and dithered, then encoded
         with png2xtc.py (from epub2xtc).

           manga/
           ├── inkpage.toml        # optional config
           ├── Vol 1/              # one book per folder
           │   ├── 001.jpg
           │   └── 002.jpg
           ├── .temp_png/Vol 1/    # rendered pages (0001_1l.png, ...)
           └── xtc_output/Vol 1.xtc

  bw     An image or a folder of images becomes 1-bit BMPs for the sleep
         screen: photo.jpg -> photo_bw_floyd.bmp

Dithering: none (threshold), floyd (Floyd-Steinberg), ordered (Bayer 8x8),
rasterize (halftone dots).

Run 'inkpage gen-config' to generate a documented inkpage.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: inkpage.toml in the input directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Parallel page jobs (overrides config and INKPAGE_WORKERS)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Print the final report as JSON instead of progress lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by both conversion commands.
#[derive(Args, Clone)]
struct DitherArgs {
    /// Dithering algorithm
    #[arg(long)]
    dither: Option<DitherAlgorithm>,

    /// Plain threshold, same as --dither none
    #[arg(long, conflicts_with = "dither")]
    no_dither: bool,

    /// Pad with black instead of white
    #[arg(long)]
    pad_black: bool,
}

impl DitherArgs {
    fn algorithm(&self) -> Option<DitherAlgorithm> {
        if self.no_dither {
            Some(DitherAlgorithm::None)
        } else {
            self.dither
        }
    }

    fn pad(&self) -> Option<PadColor> {
        self.pad_black.then_some(PadColor::Black)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Convert folders of manga pages into XTC books
    Manga(MangaArgs),
    /// Convert images into 1-bit BMP backgrounds
    Bw(BwArgs),
    /// Print a stock inkpage.toml with all options documented
    GenConfig,
}

#[derive(Args)]
struct MangaArgs {
    /// Folder of books, or a single book folder
    #[arg(default_value = ".")]
    input: PathBuf,

    /// Keep pages whole
    #[arg(long)]
    no_split: bool,

    /// Split into left/right (vertical) or top/bottom (horizontal) halves
    #[arg(long)]
    split_axis: Option<SplitAxis>,

    /// Right half first (right-to-left reading)
    #[arg(long)]
    rtl: bool,

    #[command(flatten)]
    dither: DitherArgs,

    /// Remove the .temp_png folder after encoding
    #[arg(long)]
    clean: bool,

    /// Contrast level 0-8, or DARK,LIGHT
    #[arg(long)]
    contrast: Option<ContrastBoost>,

    /// Margin crop: auto, P, or L,T,R,B (percent)
    #[arg(long)]
    margin: Option<Margin>,

    /// Pages to leave out, e.g. 1,2,40
    #[arg(long)]
    skip: Option<PageList>,

    /// Only these pages
    #[arg(long)]
    only: Option<PageList>,

    /// First page to convert
    #[arg(long)]
    start: Option<u32>,

    /// Last page to convert
    #[arg(long)]
    stop: Option<u32>,

    /// Pages kept whole while the rest are split, e.g. 1,52
    #[arg(long, value_name = "PAGES")]
    dont_split: Option<PageList>,

    /// Per-page contrast as PAGE-DARK-LIGHT, e.g. 1-6-2,40-3-3
    #[arg(long, value_name = "SPEC")]
    special_contrast: Option<PageContrasts>,

    /// Path to png2xtc.py or its folder
    #[arg(long)]
    encoder: Option<PathBuf>,
}

#[derive(Args)]
struct BwArgs {
    /// Image file or folder of images
    input: PathBuf,

    #[command(flatten)]
    dither: DitherArgs,

    /// Keep the source size instead of fitting to the screen
    #[arg(long)]
    keep_size: bool,

    /// Write BMPs here instead of next to the sources
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match &cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(ExitCode::SUCCESS)
        }
        Command::Manga(args) => {
            let mut config = load_config(cli.config.as_deref(), &args.input)?;
            apply_manga_args(&mut config, args);
            let selection = PageSelection {
                skip: args.skip.clone().unwrap_or_default(),
                only: args.only.clone().unwrap_or_default(),
                start: args.start,
                stop: args.stop,
                keep_whole: args.dont_split.clone().unwrap_or_default(),
                contrast: args.special_contrast.clone().unwrap_or_default(),
            };
            let options = MangaOptions::from_config(&config, selection)?;
            let encoder = Png2XtcEncoder::discover(
                args.encoder.as_deref(),
                config.encoder.path.as_deref(),
                config.encoder.interpreter.clone(),
                Duration::from_secs(config.encoder.timeout_secs),
            )?;
            let scheduler = Scheduler::new(config::effective_threads(&config.processing, cli.workers))?;

            let (events, printer) = progress_channel(cli.json);
            let report = run_manga(&args.input, &options, &scheduler, &encoder, events);
            join_printer(printer);
            let report = report?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!();
                output::print_manga_report(&report);
            }
            Ok(exit_code(report.has_failures()))
        }
        Command::Bw(args) => {
            let mut config = load_config(cli.config.as_deref(), &args.input)?;
            if let Some(alg) = args.dither.algorithm() {
                config.bw.dither = alg;
            }
            if let Some(pad) = args.dither.pad() {
                config.bw.pad = pad;
            }
            let options = BwOptions::from_config(&config.bw, args.keep_size, args.output.clone());
            let scheduler = Scheduler::new(config::effective_threads(&config.processing, cli.workers))?;

            let (events, printer) = progress_channel(cli.json);
            let summary = run_bw(&args.input, &options, &scheduler, events);
            join_printer(printer);
            let summary = summary?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!();
                output::print_run_summary(&summary);
            }
            Ok(exit_code(summary.has_failures()))
        }
    }
}

/// Explicit `--config`, else `inkpage.toml` beside the input; then environment.
fn load_config(explicit: Option<&Path>, input: &Path) -> Result<InkpageConfig, config::ConfigError> {
    let mut config = match explicit {
        Some(path) => config::load_config_file(path)?,
        None => {
            let dir = if input.is_file() {
                input.parent().unwrap_or(Path::new("."))
            } else {
                input
            };
            config::load_config(dir)?
        }
    };
    config::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn apply_manga_args(config: &mut InkpageConfig, args: &MangaArgs) {
    let manga = &mut config.manga;
    if args.no_split {
        manga.split = false;
    }
    if let Some(axis) = args.split_axis {
        manga.split_axis = axis;
    }
    if args.rtl {
        manga.reading_order = ReadingOrder::RightToLeft;
    }
    if let Some(alg) = args.dither.algorithm() {
        manga.dither = alg;
    }
    if let Some(pad) = args.dither.pad() {
        manga.pad = pad;
    }
    if args.clean {
        manga.cleanup = true;
    }
    if let Some(contrast) = args.contrast {
        manga.contrast = contrast.to_string();
    }
    if let Some(margin) = args.margin {
        manga.margin = margin.to_string();
    }
}

/// Progress lines go through a channel to a printer thread so workers never block on stdout.
fn progress_channel(json: bool) -> (Option<Sender<ProgressEvent>>, Option<JoinHandle<()>>) {
    if json {
        return (None, None);
    }
    let (tx, rx) = mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_progress_event(&event) {
                println!("{}", line);
            }
        }
    });
    (Some(tx), Some(printer))
}

fn join_printer(printer: Option<JoinHandle<()>>) {
    if let Some(handle) = printer {
        if handle.join().is_err() {
            tracing::warn!("progress printer panicked");
        }
    }
}

fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
