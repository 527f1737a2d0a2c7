use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;
use marker_bridge::core::{
    rotate_180_in_place, yuv420_to_rgba, ColorError, ImageError, YuvFrame, YuvLayout,
};
use marker_bridge::{
    calibration_file, choose_preview_size, render_preview, BridgeConfig, BridgeError,
    CalibrationFileError, ConfigError, PresentError, Size,
};

#[derive(Parser, Debug)]
#[command(name = "marker-bridge", author, version, about = "Marker bridge file tools")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit JSON log lines with span timings.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default bridge configuration as JSON.
    InitConfig {
        #[arg(long)]
        out: PathBuf,
    },
    /// Decode a raw YUV 4:2:0 dump to PNG.
    YuvToPng {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        width: usize,
        #[arg(long)]
        height: usize,
        #[arg(long, value_enum, default_value_t = Layout::Nv21)]
        layout: Layout,
        #[arg(long)]
        out: PathBuf,
        /// Apply the display orientation and debug overlays used for previews.
        #[arg(long)]
        preview: bool,
        /// Config supplying the debug overlays (defaults otherwise).
        #[arg(long, requires = "preview")]
        config: Option<PathBuf>,
    },
    /// Rotate a PNG by 180 degrees.
    Rotate180 {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Print a saved `calibration.yml` as JSON.
    ShowCalibration {
        #[arg(long)]
        path: PathBuf,
    },
    /// Choose a camera output size for a view, e.g. `--view 1080x1920`.
    PreviewSize {
        #[arg(long)]
        view: Size,
        #[arg(long, value_delimiter = ',', required = true)]
        candidates: Vec<Size>,
    },
    /// Detect markers in a PNG and write the annotated frame.
    #[cfg(feature = "opencv")]
    Annotate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the first marker's model-view matrix for a PNG.
    #[cfg(feature = "opencv")]
    Pose {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    Nv21,
    Nv12,
    I420,
    Yv12,
}

impl From<Layout> for YuvLayout {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Nv21 => YuvLayout::Nv21,
            Layout::Nv12 => YuvLayout::Nv12,
            Layout::I420 => YuvLayout::I420,
            Layout::Yv12 => YuvLayout::Yv12,
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Png(#[from] image::ImageError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error(transparent)]
    Present(#[from] PresentError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    CalibrationFile(#[from] CalibrationFileError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no preview size candidates")]
    NoCandidates,
}

fn main() {
    let cli = Cli::parse();
    #[cfg(feature = "tracing")]
    init_tracing(cli.verbose, cli.log_json);
    #[cfg(not(feature = "tracing"))]
    init_logging(cli.verbose);
    if let Err(e) = run(cli.command) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(not(feature = "tracing"))]
fn init_logging(verbose: u8) {
    let env = env_logger::Env::default().default_filter_or(default_filter(verbose));
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

#[cfg(feature = "tracing")]
fn init_tracing(verbose: u8, json: bool) {
    if !marker_bridge::core::init_tracing(default_filter(verbose), json) {
        eprintln!("warning: a global logger was already installed");
    }
}

fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::InitConfig { out } => {
            BridgeConfig::default().write_json(&out)?;
            info!("wrote {}", out.display());
        }
        Command::YuvToPng {
            input,
            width,
            height,
            layout,
            out,
            preview,
            config,
        } => {
            let data = read(&input)?;
            let yuv = YuvFrame::from_packed(width, height, layout.into(), &data)?;
            let frame = if preview {
                let config = load_config(config.as_deref())?;
                render_preview(&yuv, &config.debug_rects)?
            } else {
                yuv420_to_rgba(&yuv)?
            };
            info!("{}x{} -> {}", frame.width, frame.height, out.display());
            frame.into_dynamic()?.save(&out)?;
        }
        Command::Rotate180 { input, out } => {
            match image::open(&input)? {
                image::DynamicImage::ImageLuma8(mut gray) => {
                    let (w, h) = (gray.width() as usize, gray.height() as usize);
                    rotate_180_in_place(&mut gray, w, h, 1)?;
                    gray.save(&out)?;
                }
                other => {
                    let mut rgba = other.to_rgba8();
                    let (w, h) = (rgba.width() as usize, rgba.height() as usize);
                    rotate_180_in_place(&mut rgba, w, h, 4)?;
                    rgba.save(&out)?;
                }
            }
        }
        Command::ShowCalibration { path } => {
            let intrinsics = calibration_file::load(&path)?;
            let k = &intrinsics.camera_matrix;
            let rows: Vec<[f64; 3]> = (0..3).map(|r| [k[(r, 0)], k[(r, 1)], k[(r, 2)]]).collect();
            let json = serde_json::json!({
                "camera_matrix": rows,
                "dist_coeffs": intrinsics.dist_coeffs,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Command::PreviewSize { view, candidates } => {
            let size = choose_preview_size(view, &candidates).ok_or(CliError::NoCandidates)?;
            println!("{size}");
        }
        #[cfg(feature = "opencv")]
        Command::Annotate { input, out, config } => {
            use marker_bridge::core::{ImageView, PixelFormat};
            use marker_bridge::{BridgeContext, OpenCvBackend};

            let rgba = image::open(&input)?.to_rgba8();
            let (w, h) = (rgba.width() as usize, rgba.height() as usize);
            let view = ImageView::new(w, h, PixelFormat::Rgba8, rgba.as_raw())?;
            let mut ctx = BridgeContext::new(OpenCvBackend::new(), load_config(config.as_deref())?)?;
            ctx.annotate_frame(&view)?.into_dynamic()?.save(&out)?;
        }
        #[cfg(feature = "opencv")]
        Command::Pose { input, config } => {
            use marker_bridge::core::gray_view;
            use marker_bridge::{BridgeContext, OpenCvBackend, PoseOutcome};

            let gray = image::open(&input)?.to_luma8();
            let mut ctx = BridgeContext::new(OpenCvBackend::new(), load_config(config.as_deref())?)?;
            let json = match ctx
                .estimate_marker_pose(&gray_view(&gray))
                .map_err(BridgeError::from)?
            {
                PoseOutcome::Found {
                    marker_id,
                    model_view,
                } => serde_json::json!({ "marker_id": marker_id, "model_view": model_view }),
                PoseOutcome::NoMarkers => serde_json::Value::Null,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, CliError> {
    fs::read(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig, CliError> {
    Ok(match path {
        Some(path) => BridgeConfig::load_json(path)?,
        None => BridgeConfig::default(),
    })
}
