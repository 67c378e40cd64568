//! End-to-end pipeline scenarios: mask to regions to dirty set to status
//! vector, plus a full driver session over a synthetic source.

use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use image::{GrayImage, Luma};

use lotwatch::{
    extract_regions, load_mask, BufferedSource, ChangeScheduler, Cycle, DriverOptions,
    FrameAnnotator, FrameBuffer, Occupancy, OccupancyClassifier, OccupancyTracker, PixelFormat,
    PipelineError, Rect, Region, SpotStatus, StreamDriver,
};
use lotwatch::source::{synthetic_spot_rects, SyntheticSource};

fn mask_with_boxes(width: u32, height: u32, boxes: &[Rect]) -> GrayImage {
    let mut mask = GrayImage::from_pixel(width, height, Luma([0u8]));
    for rect in boxes {
        for y in rect.y..rect.y + rect.height {
            for x in rect.x..rect.x + rect.width {
                mask.put_pixel(x, y, Luma([255u8]));
            }
        }
    }
    mask
}

fn gray_frame(width: u32, height: u32, value: u8) -> FrameBuffer {
    FrameBuffer::new(
        vec![value; (width * height) as usize],
        width,
        height,
        PixelFormat::Gray,
    )
    .unwrap()
}

struct FixedClassifier(Occupancy);

impl OccupancyClassifier for FixedClassifier {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn classify(&mut self, _patch: &FrameBuffer) -> Result<Occupancy> {
        Ok(self.0)
    }
}

struct FailingClassifier;

impl OccupancyClassifier for FailingClassifier {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn classify(&mut self, _patch: &FrameBuffer) -> Result<Occupancy> {
        Err(anyhow!("inference backend unavailable"))
    }
}

#[test]
fn changed_region_is_the_only_one_reclassified() {
    // Mask with two components: boxes (0,0,10,10) and (20,20,10,10).
    let boxes = [Rect::new(0, 0, 10, 10), Rect::new(20, 20, 10, 10)];
    let mask = mask_with_boxes(64, 64, &boxes);
    let regions = extract_regions(&mask, 4).unwrap();
    assert_eq!(regions.len(), 2);

    // frame1 equals frame0 except region 1 flipped to maximum intensity.
    let frame0 = gray_frame(64, 64, 0);
    let mut bytes = frame0.as_bytes().to_vec();
    for y in 20..30u32 {
        for x in 20..30u32 {
            bytes[(y * 64 + x) as usize] = 255;
        }
    }
    let frame1 = FrameBuffer::new(bytes, 64, 64, PixelFormat::Gray).unwrap();

    let scheduler = ChangeScheduler::new(0.4);
    let dirty = scheduler
        .select_dirty(Some(&frame0), &frame1, &regions)
        .unwrap();
    assert_eq!(dirty.iter().copied().collect::<Vec<_>>(), vec![1]);

    let mut tracker = OccupancyTracker::new(
        regions,
        Box::new(FixedClassifier(Occupancy::Occupied)),
        15,
        15,
    );
    tracker.update(&frame1, &dirty, 1);

    let status = tracker.status();
    assert_eq!(status[0].status, SpotStatus::Unknown);
    assert_eq!(status[1].status, SpotStatus::Occupied);
    assert_eq!(status[1].last_checked_frame, Some(1));
}

#[test]
fn empty_mask_file_fails_with_invalid_mask() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("mask.png");
    GrayImage::from_pixel(48, 48, Luma([0u8]))
        .save(&path)
        .expect("write mask");

    let mask = load_mask(&path).unwrap();
    let err = extract_regions(&mask, 4).unwrap_err();
    let pipeline = err.downcast_ref::<PipelineError>().expect("typed error");
    assert!(matches!(pipeline, PipelineError::InvalidMask { .. }));
}

#[test]
fn unreadable_mask_fails_with_invalid_mask() {
    let err = load_mask("does/not/exist.png").unwrap_err();
    let pipeline = err.downcast_ref::<PipelineError>().expect("typed error");
    assert!(matches!(pipeline, PipelineError::InvalidMask { .. }));
}

#[test]
fn classifier_failure_leaves_the_status_vector_untouched() {
    let boxes = [Rect::new(0, 0, 10, 10), Rect::new(20, 20, 10, 10)];
    let mask = mask_with_boxes(64, 64, &boxes);
    let regions = extract_regions(&mask, 4).unwrap();

    let mut tracker = OccupancyTracker::new(regions, Box::new(FailingClassifier), 15, 15);
    let before = tracker.status();

    let frame = gray_frame(64, 64, 128);
    let dirty: BTreeSet<usize> = [0, 1].into();
    let report = tracker.update(&frame, &dirty, 0);

    assert_eq!(report.failures.len(), 2);
    assert!(report.checked.is_empty());
    assert_eq!(tracker.status(), before);
}

#[test]
fn round_trip_invariant_holds_after_every_update() {
    let boxes = [
        Rect::new(0, 0, 10, 10),
        Rect::new(20, 0, 10, 10),
        Rect::new(40, 0, 10, 10),
    ];
    let mask = mask_with_boxes(64, 64, &boxes);
    let regions = extract_regions(&mask, 4).unwrap();

    let mut tracker = OccupancyTracker::new(
        regions,
        Box::new(FixedClassifier(Occupancy::Free)),
        15,
        15,
    );
    let frame = gray_frame(64, 64, 128);

    for (cycle, dirty) in [
        BTreeSet::from([0]),
        BTreeSet::from([1]),
        BTreeSet::from([0, 2]),
    ]
    .into_iter()
    .enumerate()
    {
        tracker.update(&frame, &dirty, cycle as u64);
        let stats = tracker.statistics();
        assert_eq!(
            stats.occupied + stats.free + stats.unknown,
            stats.total_spots
        );
    }
    assert_eq!(tracker.statistics().unknown, 0);
}

#[test]
fn buffered_session_matches_the_inline_pipeline_contract() {
    let width = 120;
    let height = 80;
    let regions: Vec<Region> = synthetic_spot_rects(width, height)
        .into_iter()
        .enumerate()
        .map(|(id, rect)| Region { id, rect })
        .collect();

    let inner = SyntheticSource::new("stub://integration", width, height).with_limit(12);
    let source = BufferedSource::spawn(Box::new(inner), 3).unwrap();

    let tracker = OccupancyTracker::new(
        regions.clone(),
        Box::new(lotwatch::StubClassifier::default()),
        15,
        15,
    );
    let mut driver = StreamDriver::new(
        Box::new(source),
        regions,
        ChangeScheduler::new(0.4),
        tracker,
        FrameAnnotator::new(),
        DriverOptions { sample_step: 3 },
    );

    let mut frames = 0;
    loop {
        match driver.next_cycle().unwrap() {
            Cycle::Frame(annotated) => {
                assert_eq!(annotated.dimensions(), (width, height));
                frames += 1;
            }
            Cycle::End => break,
        }
    }
    assert_eq!(frames, 12);

    let stream = driver.stream_stats();
    assert_eq!(stream.frames_seen, 12);
    // Frames 0, 3, 6, 9.
    assert_eq!(stream.frames_processed, 4);

    let stats = driver.statistics();
    assert_eq!(stats.total_spots, 4);
    assert_eq!(stats.unknown, 0);
    assert_eq!(stats.occupied + stats.free, stats.total_spots);
}
