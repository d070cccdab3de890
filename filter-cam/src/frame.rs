//! Frame representation
//!
//! Every stage of the pipeline works on packed RGB24 frames. The capture
//! source, effects and sinks all agree on this layout, so a frame can be
//! handed from one to the next without conversion.

use image::imageops::{self, FilterType};
use image::RgbImage;

/// A single video frame (RGB, 3 bytes per pixel, row-major)
pub type Frame = RgbImage;

/// Bytes per pixel of [`Frame`]
pub const BYTES_PER_PIXEL: usize = 3;

/// Expected buffer size for the given dimensions
pub fn expected_size(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * BYTES_PER_PIXEL
}

/// Stretch a frame to exactly `width` x `height`, ignoring aspect ratio
pub fn fit_stretch(frame: &Frame, width: u32, height: u32) -> Frame {
    if frame.dimensions() == (width, height) {
        return frame.clone();
    }
    imageops::resize(frame, width, height, FilterType::Triangle)
}

/// Resize preserving aspect ratio until the frame covers `width` x `height`,
/// then crop the centre. The result is always exactly the requested size.
pub fn fit_cover(frame: &Frame, width: u32, height: u32) -> Frame {
    let (src_w, src_h) = frame.dimensions();
    if (src_w, src_h) == (width, height) {
        return frame.clone();
    }
    if src_w == 0 || src_h == 0 {
        return Frame::new(width, height);
    }

    let scale = f64::max(
        width as f64 / src_w as f64,
        height as f64 / src_h as f64,
    );
    let scaled_w = ((src_w as f64 * scale).round() as u32).max(width);
    let scaled_h = ((src_h as f64 * scale).round() as u32).max(height);

    let scaled = imageops::resize(frame, scaled_w, scaled_h, FilterType::Triangle);
    let x = (scaled_w - width) / 2;
    let y = (scaled_h - height) / 2;
    imageops::crop_imm(&scaled, x, y, width, height).to_image()
}

/// Mirror a frame left to right (used for the preview copy)
pub fn mirrored(frame: &Frame) -> Frame {
    imageops::flip_horizontal(frame)
}
