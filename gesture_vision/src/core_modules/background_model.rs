// THEORY:
// The `BackgroundModel` is the subtraction reference of the whole engine. During
// the calibration window it observes the empty region and folds every frame into
// a floating-point running average, so that slow sensor flicker is averaged out
// before any foreground decision is made.
//
// Lifecycle:
// 1.  **Uninitialized**: no accumulator exists until the first region arrives.
// 2.  **Seeding**: the first region is copied in verbatim, promoted to `f32`.
// 3.  **Blending**: each later region is blended in with an exponential moving
//     average, `acc = (1 - w) * acc + w * region`.
// 4.  **Frozen**: once calibration ends the pipeline stops calling `accumulate`
//     and the accumulator is only read by the segmenter.

use crate::error::PipelineError;
use image::{GrayImage, ImageBuffer, Luma};

/// Per-pixel floating-point intensity, same dimensions as the region.
pub type Accumulator = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone)]
pub struct BackgroundModel {
    weight: f32,
    accumulator: Option<Accumulator>,
    frames_accumulated: u64,
}

impl BackgroundModel {
    /// `weight` is the share of the newest frame in the running average and must be in (0, 1].
    pub fn new(weight: f32) -> Self {
        Self {
            weight,
            accumulator: None,
            frames_accumulated: 0,
        }
    }

    /// Seeds the accumulator with `region` on first use, blends it in afterwards.
    pub fn accumulate(&mut self, region: &GrayImage) -> Result<(), PipelineError> {
        let Some(accumulator) = self.accumulator.as_mut() else {
            self.accumulator = Some(Accumulator::from_fn(region.width(), region.height(), |x, y| {
                Luma([region.get_pixel(x, y)[0] as f32])
            }));
            self.frames_accumulated = 1;
            return Ok(());
        };

        if accumulator.dimensions() != region.dimensions() {
            return Err(PipelineError::region_size(
                accumulator.dimensions(),
                region.dimensions(),
            ));
        }

        let keep = 1.0 - self.weight;
        for (acc, px) in accumulator.pixels_mut().zip(region.pixels()) {
            acc[0] = keep * acc[0] + self.weight * px[0] as f32;
        }
        self.frames_accumulated += 1;
        Ok(())
    }

    pub fn accumulator(&self) -> Option<&Accumulator> {
        self.accumulator.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.accumulator.is_some()
    }

    pub fn frames_accumulated(&self) -> u64 {
        self.frames_accumulated
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// The accumulator rounded back to 8-bit intensities, as used for subtraction.
    pub fn rounded(&self) -> Option<GrayImage> {
        self.accumulator.as_ref().map(|acc| {
            GrayImage::from_fn(acc.width(), acc.height(), |x, y| {
                Luma([round_intensity(acc.get_pixel(x, y)[0])])
            })
        })
    }
}

pub(crate) fn round_intensity(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_region_is_copied_verbatim() {
        let mut model = BackgroundModel::new(0.5);
        assert!(!model.is_initialized());

        let mut region = GrayImage::from_pixel(4, 3, Luma([7]));
        region.put_pixel(2, 1, Luma([250]));
        model.accumulate(&region).unwrap();

        let acc = model.accumulator().unwrap();
        assert_eq!(acc.get_pixel(0, 0)[0], 7.0);
        assert_eq!(acc.get_pixel(2, 1)[0], 250.0);
        assert_eq!(model.frames_accumulated(), 1);
    }

    #[test]
    fn later_regions_are_blended_with_weight() {
        let mut model = BackgroundModel::new(0.5);
        model.accumulate(&GrayImage::from_pixel(2, 2, Luma([100]))).unwrap();
        model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200]))).unwrap();
        assert_eq!(model.accumulator().unwrap().get_pixel(1, 1)[0], 150.0);

        model.accumulate(&GrayImage::from_pixel(2, 2, Luma([200]))).unwrap();
        assert_eq!(model.accumulator().unwrap().get_pixel(1, 1)[0], 175.0);
    }

    #[test]
    fn constant_input_is_a_fixed_point() {
        let region = GrayImage::from_fn(8, 8, |x, y| Luma([(x * 20 + y) as u8]));

        let mut model = BackgroundModel::new(0.5);
        for _ in 0..30 {
            model.accumulate(&region).unwrap();
        }
        assert_eq!(model.rounded().unwrap(), region);
        for (acc, px) in model.accumulator().unwrap().pixels().zip(region.pixels()) {
            assert_eq!(acc[0], px[0] as f32);
        }

        let mut model = BackgroundModel::new(0.3);
        for _ in 0..30 {
            model.accumulate(&region).unwrap();
        }
        for (acc, px) in model.accumulator().unwrap().pixels().zip(region.pixels()) {
            assert_relative_eq!(acc[0], px[0] as f32, epsilon = 1e-3);
        }
        assert_eq!(model.rounded().unwrap(), region);
    }

    #[test]
    fn full_weight_tracks_latest_region() {
        let mut model = BackgroundModel::new(1.0);
        model.accumulate(&GrayImage::from_pixel(3, 3, Luma([10]))).unwrap();
        model.accumulate(&GrayImage::from_pixel(3, 3, Luma([90]))).unwrap();
        assert_eq!(model.accumulator().unwrap().get_pixel(0, 0)[0], 90.0);
    }

    #[test]
    fn mismatched_region_is_rejected() {
        let mut model = BackgroundModel::new(0.5);
        model.accumulate(&GrayImage::new(4, 4)).unwrap();
        assert!(matches!(
            model.accumulate(&GrayImage::new(5, 4)),
            Err(PipelineError::RegionSize { expected_width: 4, actual_width: 5, .. })
        ));
    }
}
