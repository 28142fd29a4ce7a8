//! Recording labeled hand landmark samples.

use std::time::{Duration, Instant};

use crate::{
    dataset::{DatasetError, DatasetWriter},
    gui::Preview,
    hand::HandDetector,
    image::draw,
    landmark::HandLandmarks,
    timer::{Cooldown, FpsCounter},
    video::FrameSource,
};

/// Minimum time between two captured samples.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(300);

/// Title of the collector's preview window.
pub const WINDOW_TITLE: &str = "Collecting Data - press q to quit";

/// Decides which detected hands are recorded, and records them.
///
/// A hand is appended to the dataset when the cooldown since the last capture has elapsed and
/// fewer than `target` samples have been collected in this run.
#[derive(Debug)]
pub struct Collector {
    label: String,
    target: usize,
    collected: usize,
    cooldown: Cooldown,
    writer: DatasetWriter,
}

impl Collector {
    pub fn new(
        label: impl Into<String>,
        target: usize,
        cooldown: Duration,
        writer: DatasetWriter,
    ) -> Self {
        Self {
            label: label.into(),
            target,
            collected: 0,
            cooldown: Cooldown::new(cooldown),
            writer,
        }
    }

    /// Offers a hand detected at `now` for recording.
    ///
    /// Returns whether a row was appended.
    pub fn offer(&mut self, now: Instant, hand: &HandLandmarks) -> Result<bool, DatasetError> {
        if self.is_complete() || !self.cooldown.is_ready(now) {
            return Ok(false);
        }

        self.writer.append(hand, &self.label)?;
        self.collected += 1;
        self.cooldown.trigger(now);
        log::trace!("captured sample {}/{}", self.collected, self.target);
        Ok(true)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of samples appended during this run.
    pub fn collected(&self) -> usize {
        self.collected
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn is_complete(&self) -> bool {
        self.collected >= self.target
    }

    /// The progress line drawn onto the preview.
    pub fn status(&self) -> String {
        format!(
            "Label: {}  Collected: {}/{}",
            self.label, self.collected, self.target
        )
    }
}

/// Runs the capture loop until the user quits or the frame source fails.
///
/// Every frame is run through `detector`, each detected hand is drawn and offered to `collector`,
/// and the annotated frame is shown in `preview`. Detector and dataset errors abort the loop.
pub fn run(
    source: &mut impl FrameSource,
    detector: &mut impl HandDetector,
    preview: &mut impl Preview,
    collector: &mut Collector,
) -> anyhow::Result<()> {
    let mut fps = FpsCounter::new("collect");
    loop {
        let mut image = match source.read() {
            Ok(image) => image,
            Err(e) => {
                log::warn!("camera read failed, stopping: {e:#}");
                break;
            }
        };

        let hands = detector.detect(&image)?;
        for hand in &hands {
            hand.draw(&mut image);
            collector.offer(Instant::now(), hand)?;
        }

        let status = collector.status();
        draw::text(&mut image, 10.0, 30.0, &status)
            .align_left()
            .align_bottom();

        preview.show(&image)?;
        fps.tick_with(detector.timers());

        if preview.quit_requested() {
            break;
        }
    }

    log::debug!(
        "collector stopped after {}/{} samples",
        collector.collected(),
        collector.target()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::landmark::{Handedness, NUM_LANDMARKS};

    use super::*;

    fn hand() -> HandLandmarks {
        HandLandmarks::new([[0.5, 0.5, 0.0]; NUM_LANDMARKS], 1.0, Handedness::Right)
    }

    fn collector(dir: &tempfile::TempDir, target: usize) -> Collector {
        let writer = DatasetWriter::open(dir.path().join("data.csv")).unwrap();
        Collector::new("thumbs_up", target, DEFAULT_COOLDOWN, writer)
    }

    #[test]
    fn respects_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(&dir, 10);
        let t0 = Instant::now();

        assert!(collector.offer(t0, &hand()).unwrap());
        assert!(!collector.offer(t0 + Duration::from_millis(100), &hand()).unwrap());
        assert!(!collector.offer(t0 + Duration::from_millis(299), &hand()).unwrap());
        assert!(collector.offer(t0 + Duration::from_millis(300), &hand()).unwrap());
        // Rejected offers don't restart the cooldown.
        assert!(!collector.offer(t0 + Duration::from_millis(500), &hand()).unwrap());
        assert!(collector.offer(t0 + Duration::from_millis(600), &hand()).unwrap());
        assert_eq!(collector.collected(), 3);

        let text = fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().skip(1).all(|l| l.ends_with(",thumbs_up")));
    }

    #[test]
    fn stops_at_target() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = collector(&dir, 2);
        let t0 = Instant::now();
        for i in 0..5 {
            collector
                .offer(t0 + DEFAULT_COOLDOWN * i, &hand())
                .unwrap();
        }
        assert_eq!(collector.collected(), 2);
        assert!(collector.is_complete());
        assert_eq!(collector.status(), "Label: thumbs_up  Collected: 2/2");
    }
}
