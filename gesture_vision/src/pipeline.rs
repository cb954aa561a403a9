// THEORY:
// The `pipeline` module is the top-level API of the gesture engine. It wraps the
// full per-frame stack into a single driver that an external capture loop calls
// once per frame and whose report a display loop renders.
//
// It is a two-phase state machine:
// 1.  **Calibrating**: for the first `calibration_frames` frames every region is
//     folded into the background model and no hand processing happens.
// 2.  **Detecting**: every later frame is segmented against the frozen
//     background. A found silhouette refreshes the hand's extremities, the wave
//     check and vote run on their own cadences, and a raw finger count is added
//     to the vote window.
//
// `frames_elapsed` advances exactly once per processed frame and is never reset.
// Interval checks use the index of the frame being processed, so with the
// defaults the first detecting frame is frame 30 and the first vote closes on
// frame 36.

use crate::config::PipelineConfig;
use crate::core_modules::background_model::BackgroundModel;
use crate::core_modules::finger_counter::count_fingers;
use crate::core_modules::gesture::GestureLabel;
use crate::core_modules::hand_state::{Extremities, HandState};
use crate::core_modules::region;
use crate::core_modules::segmenter::{self, Segmentation, Silhouette};
use crate::error::PipelineError;
use image::{GrayImage, RgbImage};
use tracing::{debug, info};

/// Which phase the pipeline was in when a frame was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Calibrating,
    Detecting,
}

/// The output of the gesture pipeline for a single frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    pub phase: Phase,
    pub label: GestureLabel,
    /// The unsmoothed finger count measured on this frame.
    pub raw_fingers: Option<u32>,
    /// The segmentation result, kept for debug display.
    pub silhouette: Option<Silhouette>,
    /// The tracked hand after this frame was applied.
    pub hand: Option<HandState>,
}

pub struct GesturePipeline {
    config: PipelineConfig,
    background: BackgroundModel,
    hand: Option<HandState>,
    frames_elapsed: u64,
}

impl GesturePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self {
            background: BackgroundModel::new(config.background_weight),
            config,
            hand: None,
            frames_elapsed: 0,
        })
    }

    /// Runs one camera frame through the pipeline.
    pub fn process_frame(&mut self, frame: &RgbImage) -> Result<FrameReport, PipelineError> {
        let expected = (self.config.frame_width, self.config.frame_height);
        if frame.dimensions() != expected {
            return Err(PipelineError::FrameSize {
                expected_width: expected.0,
                expected_height: expected.1,
                actual_width: frame.width(),
                actual_height: frame.height(),
            });
        }

        let region = region::extract(frame, &self.config.region, self.config.blur_sigma);
        self.process_region(&region)
    }

    /// Runs an already extracted (cropped, greyscale, blurred) region through the pipeline.
    pub fn process_region(&mut self, region: &GrayImage) -> Result<FrameReport, PipelineError> {
        let expected = (self.config.region.width(), self.config.region.height());
        if region.dimensions() != expected {
            return Err(PipelineError::region_size(expected, region.dimensions()));
        }

        let frame_index = self.frames_elapsed;
        let report = if frame_index < self.config.calibration_frames {
            self.calibrate(frame_index, region)?
        } else {
            self.detect(frame_index, region)?
        };
        self.frames_elapsed += 1;
        Ok(report)
    }

    fn calibrate(&mut self, frame_index: u64, region: &GrayImage) -> Result<FrameReport, PipelineError> {
        self.background.accumulate(region)?;
        if frame_index + 1 == self.config.calibration_frames {
            info!(
                frames = self.background.frames_accumulated(),
                weight = self.background.weight(),
                "background calibrated"
            );
        }
        Ok(FrameReport {
            frame_index,
            phase: Phase::Calibrating,
            label: GestureLabel::Calibrating,
            raw_fingers: None,
            silhouette: None,
            hand: None,
        })
    }

    fn detect(&mut self, frame_index: u64, region: &GrayImage) -> Result<FrameReport, PipelineError> {
        let silhouette = match segmenter::segment(&self.background, region, self.config.foreground_threshold)? {
            Segmentation::Found(silhouette) => silhouette,
            Segmentation::NotFound => {
                self.mark_missing(frame_index);
                return Ok(self.report(frame_index, None, None));
            }
        };

        let Some(extremities) = Extremities::from_contour(&silhouette.contour) else {
            debug!(frame_index, points = silhouette.contour.len(), "degenerate hull, skipping hand update");
            self.mark_missing(frame_index);
            return Ok(self.report(frame_index, None, Some(silhouette)));
        };

        let heuristics = &self.config.heuristics;
        let hand = match self.hand.take() {
            Some(mut hand) => {
                hand.update_extremities(extremities);
                hand
            }
            None => {
                info!(frame_index, center_x = extremities.center_x(), area = silhouette.area, "hand detected");
                HandState::seed(extremities)
            }
        };
        let hand = self.hand.insert(hand);
        hand.mark_in_frame();

        if frame_index % heuristics.wave_interval == 0 {
            let was_waving = hand.is_waving();
            hand.check_wave(extremities.center_x(), heuristics.wave_threshold);
            if hand.is_waving() != was_waving {
                debug!(frame_index, waving = hand.is_waving(), center_x = hand.center_x(), "wave state changed");
            }
        }

        let fingers = count_fingers(&silhouette.mask, hand.extremities(), heuristics);
        hand.record_vote(fingers);

        if frame_index % heuristics.vote_interval == 0 {
            let previous = hand.fingers();
            let voted = hand.cast_vote();
            if voted != previous {
                debug!(frame_index, ?voted, "finger vote changed");
            }
        }

        Ok(self.report(frame_index, Some(fingers), Some(silhouette)))
    }

    fn mark_missing(&mut self, frame_index: u64) {
        let Some(hand) = self.hand.as_mut() else {
            return;
        };
        let missing = hand.mark_missing();
        if let Some(limit) = self.config.absence_reset_frames {
            if missing >= limit {
                debug!(frame_index, missing, "hand absent, dropping state");
                self.hand = None;
            }
        }
    }

    fn report(&self, frame_index: u64, raw_fingers: Option<u32>, silhouette: Option<Silhouette>) -> FrameReport {
        FrameReport {
            frame_index,
            phase: Phase::Detecting,
            label: self.current_label(),
            raw_fingers,
            silhouette,
            hand: self.hand.clone(),
        }
    }

    /// The label for the pipeline's present state.
    pub fn current_label(&self) -> GestureLabel {
        if !self.is_calibrated() {
            return GestureLabel::Calibrating;
        }
        match &self.hand {
            Some(hand) if hand.is_in_frame() => {
                if hand.is_waving() {
                    GestureLabel::Waving
                } else {
                    GestureLabel::from_fingers(hand.fingers())
                }
            }
            _ => GestureLabel::NoHand,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.frames_elapsed >= self.config.calibration_frames
    }

    pub fn frames_elapsed(&self) -> u64 {
        self.frames_elapsed
    }

    pub fn hand(&self) -> Option<&HandState> {
        self.hand.as_ref()
    }

    pub fn background(&self) -> &BackgroundModel {
        &self.background
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigError, Region};
    use image::Luma;

    fn config() -> PipelineConfig {
        PipelineConfig {
            frame_width: 60,
            frame_height: 60,
            region: Region::new(0, 60, 0, 60).unwrap(),
            calibration_frames: 3,
            blur_sigma: 0.0,
            ..PipelineConfig::default()
        }
    }

    fn square(value: u8) -> GrayImage {
        GrayImage::from_fn(60, 60, |x, y| {
            if (15..45).contains(&x) && (15..45).contains(&y) {
                Luma([value])
            } else {
                Luma([20])
            }
        })
    }

    #[test]
    fn invalid_config_fails_construction() {
        let config = PipelineConfig {
            background_weight: 0.0,
            ..config()
        };
        assert!(matches!(
            GesturePipeline::new(config),
            Err(PipelineError::Config(ConfigError::BackgroundWeight(_)))
        ));
    }

    #[test]
    fn calibration_phase_only_learns_background() {
        let mut pipeline = GesturePipeline::new(config()).unwrap();
        let blank = GrayImage::from_pixel(60, 60, Luma([20]));
        for i in 0..3 {
            let report = pipeline.process_region(&blank).unwrap();
            assert_eq!(report.frame_index, i);
            assert_eq!(report.phase, Phase::Calibrating);
            assert_eq!(report.label, GestureLabel::Calibrating);
            assert!(report.hand.is_none());
        }
        assert!(pipeline.is_calibrated());
        assert_eq!(pipeline.background().frames_accumulated(), 3);

        // A foreground frame after calibration does not touch the background.
        pipeline.process_region(&square(200)).unwrap();
        assert_eq!(pipeline.background().frames_accumulated(), 3);
        assert_eq!(pipeline.background().rounded().unwrap(), blank);
    }

    #[test]
    fn empty_scenes_report_no_hand() {
        let mut pipeline = GesturePipeline::new(config()).unwrap();
        let blank = GrayImage::from_pixel(60, 60, Luma([20]));
        for _ in 0..3 {
            pipeline.process_region(&blank).unwrap();
        }
        let report = pipeline.process_region(&blank).unwrap();
        assert_eq!(report.phase, Phase::Detecting);
        assert_eq!(report.label, GestureLabel::NoHand);
        assert!(report.silhouette.is_none());
        assert!(pipeline.hand().is_none());
    }

    #[test]
    fn silhouette_marks_hand_in_frame() {
        let mut pipeline = GesturePipeline::new(config()).unwrap();
        for _ in 0..3 {
            pipeline.process_region(&GrayImage::from_pixel(60, 60, Luma([20]))).unwrap();
        }
        let report = pipeline.process_region(&square(200)).unwrap();
        let hand = report.hand.expect("hand state");
        assert!(hand.is_in_frame());
        assert_eq!(hand.gesture_votes().len(), 1);
        assert_eq!(report.silhouette.map(|s| s.contour_count), Some(1));
    }

    #[test]
    fn frames_elapsed_counts_every_frame() {
        let mut pipeline = GesturePipeline::new(config()).unwrap();
        for _ in 0..10 {
            pipeline.process_region(&GrayImage::from_pixel(60, 60, Luma([20]))).unwrap();
        }
        assert_eq!(pipeline.frames_elapsed(), 10);
    }

    #[test]
    fn wrong_sizes_are_rejected_without_advancing() {
        let mut pipeline = GesturePipeline::new(config()).unwrap();
        assert!(matches!(
            pipeline.process_frame(&RgbImage::new(61, 60)),
            Err(PipelineError::FrameSize { actual_width: 61, .. })
        ));
        assert!(matches!(
            pipeline.process_region(&GrayImage::new(10, 10)),
            Err(PipelineError::RegionSize { .. })
        ));
        assert_eq!(pipeline.frames_elapsed(), 0);
    }
}
