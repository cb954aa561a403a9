// THEORY:
// The `Segmenter` isolates the hand. It compares the current region against the
// frozen background model pixel by pixel, keeps every pixel whose absolute
// difference exceeds a fixed threshold, and traces the outer borders of the
// resulting binary mask. The border with the largest enclosed area is taken to
// be the hand silhouette.
//
// The threshold is fixed and non-adaptive. A moving background or a lighting
// change after calibration shows up as foreground.
//
// An empty scene is not an error. It is reported as `Segmentation::NotFound`
// and the pipeline flags the tracked hand as out of frame.

use crate::core_modules::background_model::{BackgroundModel, round_intensity};
use crate::error::PipelineError;
use image::{GrayImage, Luma};
use imageproc::contours::{BorderType, find_contours};
use imageproc::point::Point;

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// The outcome of a single successful segmentation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Silhouette {
    /// Thresholded difference image, `FOREGROUND` or `BACKGROUND` per pixel.
    pub mask: GrayImage,
    /// The largest outer border found in `mask`, in region coordinates.
    pub contour: Vec<Point<i32>>,
    /// Area enclosed by `contour`.
    pub area: f64,
    /// How many outer borders the mask contained.
    pub contour_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segmentation {
    Found(Silhouette),
    NotFound,
}

/// Subtracts the background from `region` and extracts the hand silhouette.
pub fn segment(
    background: &BackgroundModel,
    region: &GrayImage,
    threshold: u8,
) -> Result<Segmentation, PipelineError> {
    let accumulator = background.accumulator().ok_or(PipelineError::NotCalibrated)?;
    if accumulator.dimensions() != region.dimensions() {
        return Err(PipelineError::region_size(
            accumulator.dimensions(),
            region.dimensions(),
        ));
    }

    let mask = GrayImage::from_fn(region.width(), region.height(), |x, y| {
        let reference = round_intensity(accumulator.get_pixel(x, y)[0]);
        let diff = reference.abs_diff(region.get_pixel(x, y)[0]);
        if diff > threshold {
            Luma([FOREGROUND])
        } else {
            Luma([BACKGROUND])
        }
    });

    let contours = external_contours(&mask);
    let contour_count = contours.len();
    let largest = contours
        .into_iter()
        .map(|contour| (contour_area(&contour), contour))
        .max_by(|a, b| a.0.total_cmp(&b.0));

    Ok(match largest {
        Some((area, contour)) => Segmentation::Found(Silhouette {
            mask,
            contour,
            area,
            contour_count,
        }),
        None => Segmentation::NotFound,
    })
}

/// Outer borders of the foreground components of `mask`, ignoring holes and
/// anything nested inside a hole. Components touching the mask edge are kept.
pub fn external_contours(mask: &GrayImage) -> Vec<Vec<Point<i32>>> {
    // `find_contours` does not treat the outside of the image as background, so
    // trace a copy framed by one pixel of background and shift the points back.
    let mut padded = GrayImage::from_pixel(mask.width() + 2, mask.height() + 2, Luma([BACKGROUND]));
    image::imageops::replace(&mut padded, mask, 1, 1);

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points.into_iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect())
        .collect()
}

/// Area of the polygon traced by `points` (shoelace formula).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice_area: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    twice_area.abs() as f64 / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibrated(region: &GrayImage) -> BackgroundModel {
        let mut model = BackgroundModel::new(0.5);
        model.accumulate(region).unwrap();
        model
    }

    fn with_square(base: &GrayImage, x0: u32, y0: u32, size: u32, value: u8) -> GrayImage {
        let mut out = base.clone();
        for y in y0..y0 + size {
            for x in x0..x0 + size {
                out.put_pixel(x, y, Luma([value]));
            }
        }
        out
    }

    #[test]
    fn identical_region_has_no_silhouette() {
        let region = GrayImage::from_fn(40, 30, |x, y| Luma([(x + y) as u8]));
        let model = calibrated(&region);
        for threshold in [1, 18, 255] {
            assert_eq!(segment(&model, &region, threshold).unwrap(), Segmentation::NotFound);
        }
    }

    #[test]
    fn single_blob_yields_one_contour() {
        let background = GrayImage::from_pixel(40, 40, Luma([30]));
        let model = calibrated(&background);
        let frame = with_square(&background, 10, 12, 8, 200);

        let Segmentation::Found(silhouette) = segment(&model, &frame, 18).unwrap() else {
            panic!("expected a silhouette");
        };
        assert_eq!(silhouette.contour_count, 1);
        assert_eq!(silhouette.area, 49.0);
        assert!(silhouette.contour.iter().all(|p| (10..18).contains(&p.x) && (12..20).contains(&p.y)));
        assert_eq!(silhouette.mask.get_pixel(14, 15)[0], FOREGROUND);
        assert_eq!(silhouette.mask.get_pixel(0, 0)[0], BACKGROUND);
    }

    #[test]
    fn difference_must_exceed_threshold() {
        let background = GrayImage::from_pixel(20, 20, Luma([100]));
        let model = calibrated(&background);

        let at_threshold = with_square(&background, 5, 5, 6, 118);
        assert_eq!(segment(&model, &at_threshold, 18).unwrap(), Segmentation::NotFound);

        let darker = with_square(&background, 5, 5, 6, 81);
        assert!(matches!(segment(&model, &darker, 18).unwrap(), Segmentation::Found(_)));
    }

    #[test]
    fn largest_blob_is_selected() {
        let background = GrayImage::from_pixel(60, 60, Luma([0]));
        let model = calibrated(&background);
        let frame = with_square(&background, 2, 2, 5, 255);
        let frame = with_square(&frame, 20, 20, 30, 255);

        let Segmentation::Found(silhouette) = segment(&model, &frame, 18).unwrap() else {
            panic!("expected a silhouette");
        };
        assert_eq!(silhouette.contour_count, 2);
        assert!(silhouette.contour.iter().all(|p| p.x >= 20 && p.y >= 20));
    }

    #[test]
    fn blobs_touching_the_edge_are_outer_contours() {
        let background = GrayImage::from_pixel(100, 100, Luma([0]));
        let model = calibrated(&background);
        let mut frame = background.clone();
        for y in 20..80 {
            for x in 0..20 {
                frame.put_pixel(x, y, Luma([255]));
            }
        }
        let frame = with_square(&frame, 50, 30, 20, 255);

        let Segmentation::Found(silhouette) = segment(&model, &frame, 18).unwrap() else {
            panic!("expected a silhouette");
        };
        assert_eq!(silhouette.contour_count, 2);
        assert!(silhouette.contour.iter().any(|p| p.x == 0));
        assert!(silhouette.contour.iter().all(|p| p.x < 20 && (20..80).contains(&p.y)));
    }

    #[test]
    fn blob_filling_a_corner_keeps_region_coordinates() {
        let mask = with_square(&GrayImage::new(30, 30), 0, 0, 10, FOREGROUND);
        let contours = external_contours(&mask);
        assert_eq!(contours.len(), 1);
        let xs: Vec<i32> = contours[0].iter().map(|p| p.x).collect();
        let ys: Vec<i32> = contours[0].iter().map(|p| p.y).collect();
        assert_eq!((xs.iter().min(), xs.iter().max()), (Some(&0), Some(&9)));
        assert_eq!((ys.iter().min(), ys.iter().max()), (Some(&0), Some(&9)));
    }

    #[test]
    fn holes_do_not_count_as_contours() {
        let background = GrayImage::from_pixel(30, 30, Luma([0]));
        let model = calibrated(&background);
        let ring = with_square(&background, 5, 5, 20, 255);
        let ring = with_square(&ring, 10, 10, 10, 0);

        let Segmentation::Found(silhouette) = segment(&model, &ring, 18).unwrap() else {
            panic!("expected a silhouette");
        };
        assert_eq!(silhouette.contour_count, 1);
    }

    #[test]
    fn uncalibrated_background_is_an_error() {
        let model = BackgroundModel::new(0.5);
        assert_eq!(
            segment(&model, &GrayImage::new(4, 4), 18),
            Err(PipelineError::NotCalibrated)
        );
    }

    #[test]
    fn shoelace_area_of_square() {
        let square = [
            Point::new(0, 0),
            Point::new(4, 0),
            Point::new(4, 4),
            Point::new(0, 4),
        ];
        assert_eq!(contour_area(&square), 16.0);
        assert_eq!(contour_area(&square[..2]), 0.0);
    }
}
