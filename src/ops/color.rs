// ============================================================================
// COLOR - colour-space conversion and per-channel range thresholding
// ============================================================================

use image::{GrayImage, Luma, Rgb};
use rayon::prelude::*;

use super::Mat;
use crate::actions::ColorSpace;

/// RGB → HSV in OpenCV's 8-bit convention: H in `0..180`, S and V in `0..=255`.
pub fn rgb_to_hsv_cv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let v = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let diff = v - min;

    let s = if v > 0.0 { 255.0 * diff / v } else { 0.0 };

    let mut h = if diff == 0.0 {
        0.0
    } else if v == rf {
        60.0 * (gf - bf) / diff
    } else if v == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h8 = (h / 2.0).round() as u32 % 180;
    [h8 as u8, s.round() as u8, v as u8]
}

/// Inverse of [`rgb_to_hsv_cv`], used for the threshold swatches. `h` wraps at 180.
pub fn hsv_cv_to_rgb(h: u8, s: u8, v: u8) -> [u8; 3] {
    let hue = (h % 180) as f32 * 2.0;
    let sat = s as f32 / 255.0;
    let val = v as f32;
    let c = val * sat;
    let x = c * (1.0 - ((hue / 60.0) % 2.0 - 1.0).abs());
    let m = val - c;
    let (r, g, b) = match (hue / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        (r + m).round() as u8,
        (g + m).round() as u8,
        (b + m).round() as u8,
    ]
}

/// Convert every pixel into `space`; channel order follows the space's name.
pub fn convert(src: &Mat, space: ColorSpace) -> Mat {
    match space {
        ColorSpace::Hsv => {
            let mut out = src.clone();
            let buf: &mut [u8] = &mut out;
            buf.par_chunks_mut(3).for_each(|px| {
                let hsv = rgb_to_hsv_cv(px[0], px[1], px[2]);
                px.copy_from_slice(&hsv);
            });
            out
        }
    }
}

/// 255 where every channel lies in `lower[c]..=upper[c]`, else 0.
pub fn in_range(src: &Mat, lower: [i32; 3], upper: [i32; 3]) -> GrayImage {
    let (w, h) = src.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (x, y, px) in src.enumerate_pixels() {
        let inside = (0..3).all(|c| {
            let v = px.0[c] as i32;
            v >= lower[c] && v <= upper[c]
        });
        if inside {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

/// Widen a single-channel mask to the three-channel buffer type.
pub fn gray_to_mat(mask: &GrayImage) -> Mat {
    let (w, h) = mask.dimensions();
    Mat::from_fn(w, h, |x, y| {
        let v = mask.get_pixel(x, y).0[0];
        Rgb([v, v, v])
    })
}
