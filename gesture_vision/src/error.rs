use crate::config::ConfigError;
use thiserror::Error;

/// Errors produced while driving the gesture pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("frame is {actual_width}x{actual_height}, pipeline was configured for {expected_width}x{expected_height}")]
    FrameSize {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("region is {actual_width}x{actual_height}, background model holds {expected_width}x{expected_height}")]
    RegionSize {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("segmentation requires a calibrated background model")]
    NotCalibrated,
}

impl PipelineError {
    pub(crate) fn region_size(expected: (u32, u32), actual: (u32, u32)) -> Self {
        Self::RegionSize {
            expected_width: expected.0,
            expected_height: expected.1,
            actual_width: actual.0,
            actual_height: actual.1,
        }
    }
}
