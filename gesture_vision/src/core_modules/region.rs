// THEORY:
// Region extraction turns a full camera frame into the small single-channel
// image that every later stage works on: the configured rectangle is cropped
// out, collapsed to luminance and softened with a Gaussian blur so single-pixel
// sensor noise does not survive background subtraction. Each call produces a
// fresh owned buffer; nothing is shared between consecutive frames.

use crate::config::Region;
use image::{GrayImage, RgbImage, imageops};
use imageproc::filter::gaussian_blur_f32;

/// Crops `region` out of `frame`, converts it to greyscale and blurs it.
/// A `blur_sigma` of zero skips the blur.
pub fn extract(frame: &RgbImage, region: &Region, blur_sigma: f32) -> GrayImage {
    let cropped = imageops::crop_imm(
        frame,
        region.left,
        region.top,
        region.width(),
        region.height(),
    )
    .to_image();
    let grey = imageops::grayscale(&cropped);

    if blur_sigma > 0.0 {
        gaussian_blur_f32(&grey, blur_sigma)
    } else {
        grey
    }
}
