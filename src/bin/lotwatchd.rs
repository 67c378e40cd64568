//! lotwatchd - parking lot occupancy daemon
//!
//! This daemon:
//! 1. Derives spot regions from the configured mask image
//! 2. Pulls frames from the configured source (image directory or stub)
//! 3. Runs the change-gated classification pipeline per sampled frame
//! 4. Publishes the status vector for external consumers and logs
//!    occupancy statistics periodically
//! 5. Optionally writes annotated frames to an output directory

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use lotwatch::{
    build_classifier, extract_regions, load_mask, open_source, BufferedSource, ChangeScheduler,
    DriverOptions, FrameAnnotator, FrameSource, LotwatchConfig, OccupancyClassifier,
    OccupancyTracker, StreamDriver,
};

const STATS_LOG_INTERVAL: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = LotwatchConfig::load()?;

    let mask = load_mask(&cfg.mask.path)?;
    let regions = extract_regions(&mask, cfg.mask.min_spot_area)?;
    log::info!(
        "{} spots extracted from {}",
        regions.len(),
        cfg.mask.path.display()
    );

    let mut classifier = build_classifier(&cfg.classifier)?;
    classifier.warm_up()?;
    log::info!(
        "classifier backend '{}', input {}x{}",
        classifier.name(),
        cfg.classifier.input_width,
        cfg.classifier.input_height
    );

    let source = open_source(&cfg.source.locator, cfg.source.width, cfg.source.height)?;
    let source: Box<dyn FrameSource> = match cfg.source.queue_depth {
        Some(depth) => {
            log::info!("ingest decoupled behind a {}-frame queue", depth);
            Box::new(BufferedSource::spawn(source, depth)?)
        }
        None => {
            let mut source = source;
            source.connect()?;
            source
        }
    };

    let annotator = match &cfg.annotate.font_path {
        Some(path) => FrameAnnotator::with_font(path)?,
        None => FrameAnnotator::new(),
    };

    if let Some(dir) = &cfg.annotate.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output dir {}", dir.display()))?;
    }

    let tracker = OccupancyTracker::new(
        regions.clone(),
        classifier,
        cfg.classifier.input_width,
        cfg.classifier.input_height,
    );
    let mut driver = StreamDriver::new(
        source,
        regions,
        ChangeScheduler::new(cfg.diff_threshold),
        tracker,
        annotator,
        DriverOptions {
            sample_step: cfg.source.sample_step,
        },
    );
    let status = driver.status_handle();

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .context("failed to install signal handler")?;

    log::info!(
        "lotwatchd running: source={} step={} threshold={}",
        cfg.source.locator,
        cfg.source.sample_step,
        cfg.diff_threshold
    );

    let mut last_stats_log = Instant::now();
    let mut frame_counter = 0u64;
    let output_dir = cfg.annotate.output_dir.clone();
    let sample_step = cfg.source.sample_step as u64;

    let stream_stats = driver.run(&stop, |annotated| {
        if let Some(dir) = &output_dir {
            if frame_counter % sample_step == 0 {
                let path = dir.join(format!("frame_{:08}.png", frame_counter));
                annotated
                    .save(&path)
                    .with_context(|| format!("failed to write {}", path.display()))?;
            }
        }
        frame_counter += 1;

        if last_stats_log.elapsed() >= STATS_LOG_INTERVAL {
            let stats = status.statistics();
            log::info!(
                "occupancy {}/{} ({} free, {} unknown, rate {:.2})",
                stats.occupied,
                stats.total_spots,
                stats.free,
                stats.unknown,
                stats.occupancy_rate
            );
            last_stats_log = Instant::now();
        }
        Ok(())
    })?;

    let stats = status.statistics();
    log::info!(
        "session complete: {} frames seen, {} processed, final occupancy {}/{}",
        stream_stats.frames_seen,
        stream_stats.frames_processed,
        stats.occupied,
        stats.total_spots
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
