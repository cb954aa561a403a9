// THEORY:
// The `finger_counter` estimates how many fingers are extended from a single
// horizontal slice of the silhouette. Finger tips cluster near the top of the
// hand while the palm mass sits lower, so a line drawn a fixed fraction of the
// way down from the topmost point crosses each extended finger once.
//
// Algorithm:
// 1.  Place the scan line at `top.y + fraction * (bottom.y - top.y)`.
// 2.  Draw a one pixel line across the full mask width and AND it with the mask,
//     keeping only the foreground segments that cross the line.
// 3.  Trace the outer borders of that line image; every contiguous foreground
//     run becomes one contour.
// 4.  Count a run as a finger when its width lies strictly inside the band
//     `(finger_min_width, finger_max_width_ratio * hand_width)`. The lower bound
//     rejects specks, the upper bound rejects the palm or wrist.
//
// The result is a raw per-frame measurement. It is never shown directly; it
// feeds the vote window of the `HandState`.

use crate::config::HeuristicConfig;
use crate::core_modules::hand_state::Extremities;
use crate::core_modules::segmenter::{BACKGROUND, FOREGROUND, external_contours};
use image::{GrayImage, Luma};
use imageproc::drawing::draw_line_segment_mut;
use imageproc::point::Point;

/// Counts the extended fingers of the silhouette in `mask`.
pub fn count_fingers(mask: &GrayImage, hand: &Extremities, heuristics: &HeuristicConfig) -> u32 {
    if mask.width() == 0 || mask.height() == 0 {
        return 0;
    }
    let y = scan_line_y(hand, heuristics.scan_line_fraction, mask.height());
    let max_width = heuristics.finger_max_width_ratio * hand.width() as f32;

    scan_line_runs(mask, y)
        .into_iter()
        .filter(|&width| width > heuristics.finger_min_width && (width as f32) < max_width)
        .count() as u32
}

/// Row of the scan line, `fraction` of the hand's height below its top, kept inside the mask.
pub fn scan_line_y(hand: &Extremities, fraction: f32, mask_height: u32) -> u32 {
    let y = hand.top.y as f32 + fraction * hand.height() as f32;
    (y as i64).clamp(0, mask_height.saturating_sub(1) as i64) as u32
}

/// The mask restricted to a one pixel line at row `y`.
pub fn scan_line_mask(mask: &GrayImage, y: u32) -> GrayImage {
    let mut line = GrayImage::from_pixel(mask.width(), mask.height(), Luma([BACKGROUND]));
    draw_line_segment_mut(
        &mut line,
        (0.0, y as f32),
        (mask.width() as f32, y as f32),
        Luma([FOREGROUND]),
    );
    for (l, m) in line.pixels_mut().zip(mask.pixels()) {
        l[0] &= m[0];
    }
    line
}

/// Widths, in pixels, of the foreground runs crossing row `y`.
pub fn scan_line_runs(mask: &GrayImage, y: u32) -> Vec<u32> {
    external_contours(&scan_line_mask(mask, y))
        .iter()
        .map(|run| run_width(run))
        .collect()
}

fn run_width(run: &[Point<i32>]) -> u32 {
    let min = run.iter().map(|p| p.x).min().unwrap_or(0);
    let max = run.iter().map(|p| p.x).max().unwrap_or(-1);
    (max - min + 1).max(0) as u32
}
