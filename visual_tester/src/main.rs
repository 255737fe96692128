use anyhow::{Context, Result, bail};
use clap::Parser;
use image::RgbImage;
use rps_vision::{Frame, Gesture, HandTrackingPipeline, PipelineConfig, TickReport};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];
const READ_AHEAD: usize = 4;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Run the two-player hand tracker over a directory of frames and write annotated copies"
)]
struct Args {
    /// Pipeline configuration (JSON).
    #[arg(long)]
    config: PathBuf,
    /// Directory of lens-corrected frames, processed in file-name order.
    #[arg(long)]
    input: PathBuf,
    /// Directory that receives the annotated frames.
    #[arg(long)]
    output: PathBuf,
    /// Optional JSON-lines file with one tick report per processed frame.
    #[arg(long)]
    results: Option<PathBuf>,
    /// Stop after this many frames.
    #[arg(long)]
    limit: Option<usize>,
    /// Also save each player's cleaned mask next to the annotated frame.
    #[arg(long)]
    masks: bool,
}

enum LoadedFrame {
    Decoded { path: PathBuf, image: RgbImage },
    Unreadable { path: PathBuf, error: image::ImageError },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- 1. Argument Parsing & Setup ---
    let args = Args::parse();
    let config = PipelineConfig::from_path(&args.config)
        .with_context(|| format!("loading config from {}", args.config.display()))?;
    let mut pipeline = HandTrackingPipeline::new(config).context("building pipeline")?;

    let mut frames = list_frames(&args.input)?;
    if let Some(limit) = args.limit {
        frames.truncate(limit);
    }
    if frames.is_empty() {
        bail!("no frames found in {}", args.input.display());
    }
    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;

    let mut results = match &args.results {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => None,
    };

    info!(frames = frames.len(), input = %args.input.display(), "starting");

    // --- 2. Frame Source ---
    // Decoding runs on a blocking thread and stays a few frames ahead. The
    // pipeline itself consumes one frame at a time on this task.
    let (tx, mut rx) = mpsc::channel::<LoadedFrame>(READ_AHEAD);
    let reader = tokio::task::spawn_blocking(move || {
        for path in frames {
            let loaded = match image::open(&path) {
                Ok(image) => LoadedFrame::Decoded {
                    path,
                    image: image.to_rgb8(),
                },
                Err(error) => LoadedFrame::Unreadable { path, error },
            };
            if tx.blocking_send(loaded).is_err() {
                break;
            }
        }
    });

    // --- 3. Main Processing Loop ---
    let mut processed = 0usize;
    let mut skipped = 0usize;
    let mut last_report: Option<TickReport> = None;

    while let Some(loaded) = rx.recv().await {
        let (path, image) = match loaded {
            LoadedFrame::Decoded { path, image } => (path, image),
            LoadedFrame::Unreadable { path, error } => {
                warn!(path = %path.display(), %error, "skipping unreadable frame");
                skipped += 1;
                continue;
            }
        };

        let frame = Frame::from_rgb_image(&image);
        let outcome = if args.masks {
            pipeline.process_with_masks(&frame)
        } else {
            pipeline.process(&frame).map(|report| (report, Vec::new()))
        };
        let (report, masks) = match outcome {
            Ok(output) => output,
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping malformed frame");
                skipped += 1;
                continue;
            }
        };

        // --- 4. Visualization ---
        let annotated = pipeline.annotate(&frame, &report);
        let out_path = annotated_path(&args.output, &path);
        annotated
            .save(&out_path)
            .with_context(|| format!("writing {}", out_path.display()))?;
        for (player, mask) in pipeline.config().players.iter().zip(&masks) {
            let dest = mask_path(&args.output, &path, &player.name);
            mask.save(&dest)
                .with_context(|| format!("writing {}", dest.display()))?;
        }

        // --- 5. Result Log ---
        if let Some(writer) = results.as_mut() {
            serde_json::to_writer(&mut *writer, &report).context("serializing tick report")?;
            writeln!(writer).context("writing tick report")?;
        }

        for result in &report.results {
            debug!(
                frame = report.frame_index,
                player = %result.name,
                stable = %result.stable_gesture,
                raw = %result.raw_gesture,
                "result"
            );
        }
        processed += 1;
        last_report = Some(report);
    }

    reader.await.context("frame reader stopped unexpectedly")?;
    if let Some(mut writer) = results {
        writer.flush().context("flushing result log")?;
    }

    info!(processed, skipped, output = %args.output.display(), "processing complete");
    if let Some(report) = last_report {
        for result in report.results {
            let gesture = match result.stable_gesture {
                Gesture::Unknown => "no stable gesture".to_string(),
                gesture => gesture.to_string(),
            };
            info!(player = %result.name, final_gesture = %gesture, "summary");
        }
    }
    Ok(())
}

fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

fn frame_stem(input: &Path) -> &str {
    input.file_stem().and_then(|s| s.to_str()).unwrap_or("frame")
}

fn annotated_path(output: &Path, input: &Path) -> PathBuf {
    output.join(format!("{}_annotated.png", frame_stem(input)))
}

fn mask_path(output: &Path, input: &Path, player: &str) -> PathBuf {
    output.join(format!("{}_{player}_mask.png", frame_stem(input)))
}
