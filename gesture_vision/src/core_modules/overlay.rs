// THEORY:
// Debug rendering for the display sink and for offline inspection. The
// silhouette view shows the thresholded mask in grey with the selected contour
// traced on top and, when a hand is tracked, the finger scan line and the hull
// extremities. Rendering never feeds back into detection.

use crate::config::HeuristicConfig;
use crate::core_modules::finger_counter::scan_line_y;
use crate::core_modules::hand_state::Extremities;
use crate::core_modules::segmenter::Silhouette;
use image::{ImageEncoder, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use std::path::Path;

const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const SCAN_LINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const EXTREMITY_COLOR: Rgb<u8> = Rgb([0, 128, 255]);

/// Renders `silhouette` as an RGB image with its contour, and the hand geometry if given.
pub fn silhouette_view(
    silhouette: &Silhouette,
    hand: Option<&Extremities>,
    heuristics: &HeuristicConfig,
) -> RgbImage {
    let mask = &silhouette.mask;
    let mut view = RgbImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y)[0] / 2;
        Rgb([v, v, v])
    });

    for p in &silhouette.contour {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < view.width() && (p.y as u32) < view.height() {
            view.put_pixel(p.x as u32, p.y as u32, CONTOUR_COLOR);
        }
    }

    if let Some(hand) = hand {
        let y = scan_line_y(hand, heuristics.scan_line_fraction, mask.height()) as f32;
        draw_line_segment_mut(&mut view, (0.0, y), (mask.width() as f32, y), SCAN_LINE_COLOR);
        for p in [hand.top, hand.bottom, hand.left, hand.right] {
            draw_filled_circle_mut(&mut view, (p.x, p.y), 3, EXTREMITY_COLOR);
        }
    }

    view
}

/// Writes `image` to `path` as a PNG.
pub fn save_png(path: impl AsRef<Path>, image: &RgbImage) -> Result<(), image::ImageError> {
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(std::io::BufWriter::new(output));
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}
