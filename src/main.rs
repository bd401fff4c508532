use analyze_image::analyze::{AnalyzeError, analyze};
use analyze_image::imaging::RustBackend;
use analyze_image::types::BrowserData;
use analyze_image::{config, output};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "analyze-image")]
#[command(about = "Audit an image for web performance problems")]
#[command(long_about = "\
Audit an image for web performance problems

Reports format, dimensions and size, produces optimized, resized and
modern-format variants, and flags best-practice violations (offenders):

  imageNotOptimized             re-encoding saves a material amount of bytes
  imageScaledDown               the image is larger than it is displayed
  imageOldFormat                WebP/AVIF would be materially smaller
  imageWithIncorrectSizesParam  the sizes attribute disagrees with the layout
  imageExcessiveDensity         more pixels than any screen can show

The report is printed as JSON on stdout. Logs go to stderr.

Run 'analyze-image gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Log module scheduling to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze one image file ('-' reads stdin)
    Analyze(AnalyzeArgs),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// Image file
    file: PathBuf,

    /// Rendered width in CSS pixels
    #[arg(long)]
    display_width: Option<u32>,

    /// Rendered height in CSS pixels
    #[arg(long)]
    display_height: Option<u32>,

    #[arg(long)]
    viewport_width: Option<u32>,

    #[arg(long)]
    viewport_height: Option<u32>,

    /// Device pixel ratio
    #[arg(long)]
    dpr: Option<f64>,

    /// The <img> sizes attribute
    #[arg(long)]
    sizes: Option<String>,

    /// The <img> srcset attribute
    #[arg(long)]
    srcset: Option<String>,

    /// Options file (see gen-config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Keep base64 transform bodies in the report
    #[arg(long)]
    keep_buffers: bool,

    /// Print a text summary instead of JSON
    #[arg(long)]
    summary: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Analyze(#[from] AnalyzeError),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write report: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            CliError::Analyze(e) => e.exit_code(),
            _ => 1,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Analyze(args) => run_analyze(args),
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), CliError> {
    let mut options = config::load_config(args.config.as_deref()).map_err(AnalyzeError::from)?;
    if args.keep_buffers {
        options.output.remove_buffers_from_transforms = false;
    }
    init_thread_pool(&options.processing);

    let image = read_image(&args.file)?;
    let browser = BrowserData {
        display_width: args.display_width,
        display_height: args.display_height,
        viewport_width: args.viewport_width,
        viewport_height: args.viewport_height,
        device_pixel_ratio: args.dpr,
        sizes_attribute: args.sizes,
        srcset_attribute: args.srcset,
    };

    let report = analyze(&RustBackend::new(), image, &browser, &options)?;

    if args.summary {
        output::print_report(&report, &args.file.display().to_string());
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

fn read_image(path: &Path) -> Result<Vec<u8>, CliError> {
    let read = if path.as_os_str() == "-" {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf).map(|_| buf)
    } else {
        std::fs::read(path)
    };
    read.map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins; otherwise `-v` selects debug and the default is warn.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores. User can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
