//! strawberry_count - count and grade strawberries in an image or video
//!
//! Runs every frame through the inference pipeline and prints one JSON summary
//! line per frame to stdout. Logs go to stderr (`RUST_LOG`, default `info`).

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use strawberry_vision::{
    frames, Config, FrameSource, ImageSource, InferencePipeline, VideoConfig, VideoSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Single image to process.
    #[arg(long, default_value = "sample.jpg")]
    image: PathBuf,
    /// Video file to process (takes precedence over --image).
    #[arg(long)]
    video: Option<String>,
    /// ONNX detector model (overrides STRAWBERRY_MODEL and the config file).
    #[arg(long)]
    model: Option<PathBuf>,
    /// Stop a video after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = Config::load()?;
    if let Some(model) = args.model {
        config.model_path = Some(model);
    }

    let mut pipeline = InferencePipeline::from_config(&config);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
            .context("error setting Ctrl-C handler")?;
    }

    let source: Box<dyn FrameSource> = match args.video {
        Some(path) => Box::new(VideoSource::new(
            VideoConfig::new(path).with_max_frames(args.max_frames),
        )),
        None => Box::new(ImageSource::new(args.image)),
    };
    log::info!("reading frames from {}", source.describe());

    let output_dir = config.visualizer.output_dir.clone();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for mut frame in frames(source) {
        let result = pipeline.run(&mut frame);
        let line = serde_json::to_string(&result.summary()).context("serialize summary")?;
        writeln!(out, "{}", line).context("write summary to stdout")?;

        if let Some(dir) = output_dir.as_deref() {
            let visualizer = pipeline.visualizer();
            if let Err(err) = visualizer.add_summary_overlay(&mut frame, &result.counts, result.total)
            {
                log::warn!("summary overlay failed: {:#}", err);
            }
            let path = dir.join(format!("frame_{:06}.jpg", result.frame_processed));
            visualizer.save_frame(&frame, &path);
        }

        if stop.load(Ordering::SeqCst) {
            log::info!(
                "shutdown signal received, stopping after frame {}",
                result.frame_processed
            );
            break;
        }
    }

    let metrics = pipeline.get_metrics();
    log::info!(
        "processed {} frames in {:.3}s ({:.3}s/frame, {:.2} fps), {} strawberries tracked",
        metrics.total_frames,
        metrics.total_time,
        metrics.avg_time_per_frame,
        metrics.fps,
        metrics.total_tracked
    );

    Ok(())
}
