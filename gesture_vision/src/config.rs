// THEORY:
// The `config` module gathers every tunable of the engine into plain data
// structures that are handed to the `GesturePipeline` at construction. Nothing
// in the detection path reads a module-level constant; calibration length,
// blend weight, foreground threshold and the geometric heuristics all travel
// with the pipeline instance. This makes it possible to drive the engine with
// synthetic parameters in tests and to retune the heuristics for a different
// camera resolution without touching code.
//
// Validation happens once, eagerly. An invalid configuration is rejected with a
// `ConfigError`; values are never clamped into range behind the caller's back.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating a `PipelineConfig`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("region must satisfy top < bottom and left < right (got top={top}, bottom={bottom}, left={left}, right={right})")]
    InvertedRegion {
        top: u32,
        bottom: u32,
        left: u32,
        right: u32,
    },
    #[error("region {region:?} does not fit within a {frame_width}x{frame_height} frame")]
    RegionOutOfBounds {
        region: Region,
        frame_width: u32,
        frame_height: u32,
    },
    #[error("background weight must be in (0, 1], got {0}")]
    BackgroundWeight(f32),
    #[error("calibration needs at least one frame")]
    ZeroCalibration,
    #[error("blur sigma must be zero (disabled) or positive, got {0}")]
    BlurSigma(f32),
    #[error("{0} interval must be at least one frame")]
    ZeroInterval(&'static str),
    #[error("scan line fraction must be in [0, 1], got {0}")]
    ScanLineFraction(f32),
    #[error("finger width ratio must be positive, got {0}")]
    FingerWidthRatio(f32),
}

/// The fixed rectangle of the frame that is examined for a hand, in frame pixel
/// coordinates. `bottom` and `right` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl Region {
    pub fn new(top: u32, bottom: u32, left: u32, right: u32) -> Result<Self, ConfigError> {
        let region = Self {
            top,
            bottom,
            left,
            right,
        };
        region.check_ordering()?;
        Ok(region)
    }

    /// The right half of the frame, from the top edge down to two thirds of its height.
    /// This keeps the operator's face out of the region for a right-handed user.
    pub fn right_upper_two_thirds(frame_width: u32, frame_height: u32) -> Self {
        Self {
            top: 0,
            bottom: frame_height * 2 / 3,
            left: frame_width / 2,
            right: frame_width,
        }
    }

    pub fn width(&self) -> u32 {
        self.right - self.left
    }

    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }

    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.right <= frame_width && self.bottom <= frame_height
    }

    fn check_ordering(&self) -> Result<(), ConfigError> {
        if self.top < self.bottom && self.left < self.right {
            Ok(())
        } else {
            Err(ConfigError::InvertedRegion {
                top: self.top,
                bottom: self.bottom,
                left: self.left,
                right: self.right,
            })
        }
    }
}

/// Empirical constants of the silhouette heuristics. They were tuned for a
/// 640x480 webcam and usually need adjusting for other resolutions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    /// Where the finger scan line sits, as a fraction of the hand's height below its top.
    pub scan_line_fraction: f32,
    /// Runs on the scan line must be strictly wider than this many pixels to count as a finger.
    pub finger_min_width: u32,
    /// Runs must be strictly narrower than this fraction of the hand's width.
    pub finger_max_width_ratio: f32,
    /// Horizontal center displacement (pixels) between wave samples that counts as waving.
    pub wave_threshold: i32,
    /// Frames between wave samples.
    pub wave_interval: u64,
    /// Frames between gesture votes.
    pub vote_interval: u64,
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        Self {
            scan_line_fraction: 0.2,
            finger_min_width: 5,
            finger_max_width_ratio: 0.75,
            wave_threshold: 3,
            wave_interval: 6,
            vote_interval: 12,
        }
    }
}

/// Configuration for the GesturePipeline, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    pub region: Region,
    /// Number of frames fed to the background model before detection starts.
    pub calibration_frames: u64,
    /// Blend weight of the newest frame in the background running average.
    pub background_weight: f32,
    /// Absolute difference a pixel must exceed to be foreground.
    pub foreground_threshold: u8,
    /// Sigma of the Gaussian blur applied to the region. `0.0` disables blurring.
    pub blur_sigma: f32,
    pub heuristics: HeuristicConfig,
    /// Drop the tracked hand after this many consecutive frames without a silhouette.
    /// `None` keeps the last hand forever and only flags it as out of frame.
    pub absence_reset_frames: Option<u32>,
}

impl PipelineConfig {
    /// Builds the default configuration for frames of the given size, watching
    /// the right upper two thirds of the frame.
    pub fn for_frame(frame_width: u32, frame_height: u32) -> Self {
        Self {
            frame_width,
            frame_height,
            region: Region::right_upper_two_thirds(frame_width, frame_height),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.region.check_ordering()?;
        if !self.region.fits_within(self.frame_width, self.frame_height) {
            return Err(ConfigError::RegionOutOfBounds {
                region: self.region,
                frame_width: self.frame_width,
                frame_height: self.frame_height,
            });
        }
        if !(self.background_weight > 0.0 && self.background_weight <= 1.0) {
            return Err(ConfigError::BackgroundWeight(self.background_weight));
        }
        if self.calibration_frames == 0 {
            return Err(ConfigError::ZeroCalibration);
        }
        if !(self.blur_sigma >= 0.0) || !self.blur_sigma.is_finite() {
            return Err(ConfigError::BlurSigma(self.blur_sigma));
        }

        let h = &self.heuristics;
        if h.wave_interval == 0 {
            return Err(ConfigError::ZeroInterval("wave"));
        }
        if h.vote_interval == 0 {
            return Err(ConfigError::ZeroInterval("vote"));
        }
        if !(0.0..=1.0).contains(&h.scan_line_fraction) {
            return Err(ConfigError::ScanLineFraction(h.scan_line_fraction));
        }
        if !(h.finger_max_width_ratio > 0.0) {
            return Err(ConfigError::FingerWidthRatio(h.finger_max_width_ratio));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            region: Region::right_upper_two_thirds(640, 480),
            calibration_frames: 30,
            background_weight: 0.5,
            foreground_threshold: 18,
            // Matches a 7x7 Gaussian kernel.
            blur_sigma: 1.4,
            heuristics: HeuristicConfig::default(),
            absence_reset_frames: None,
        }
    }
}
