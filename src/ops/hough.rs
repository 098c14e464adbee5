// ============================================================================
// HOUGH CIRCLES - gradient-direction voting for circle centres
// ============================================================================
//
// Edge pixels vote along their gradient line into an accumulator scaled by
// `dp`; local maxima become centre candidates. Each candidate's radius is the
// distance most edge pixels agree on. `GradientAlt` additionally requires a
// minimum fraction of the circumference to be covered by edges.

use image::{GrayImage, Rgb};
use imageproc::drawing::draw_hollow_circle_mut;
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use super::Mat;
use crate::actions::{HoughCircleParams, HoughMethod};

/// Outline colour for detected circles.
pub const CIRCLE_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Minimum accumulator votes for a `GradientAlt` candidate.
const ALT_MIN_VOTES: u32 = 4;
/// Upper bound on centre candidates examined per image.
const MAX_CANDIDATES: usize = 512;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Circle {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

struct EdgePoint {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
}

/// Detect circles in a greyscale image. Parameters are assumed validated.
pub fn hough_circles(gray: &GrayImage, params: &HoughCircleParams) -> Vec<Circle> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return Vec::new();
    }

    let smoothed = gaussian_blur_f32(gray, 1.0);
    let high = params.param1 as f32;
    let edges = canny(&smoothed, high / 2.0, high);
    let gx = horizontal_sobel(&smoothed);
    let gy = vertical_sobel(&smoothed);

    let mut points = Vec::new();
    for (x, y, px) in edges.enumerate_pixels() {
        if px.0[0] == 0 {
            continue;
        }
        let sx = gx.get_pixel(x, y).0[0] as f32;
        let sy = gy.get_pixel(x, y).0[0] as f32;
        let mag = (sx * sx + sy * sy).sqrt();
        if mag > 0.0 {
            points.push(EdgePoint {
                x: x as f32,
                y: y as f32,
                dx: sx / mag,
                dy: sy / mag,
            });
        }
    }
    if points.is_empty() {
        return Vec::new();
    }

    let diagonal = (w as f32).hypot(h as f32);
    let r_min = params.min_radius.max(1) as f32;
    let r_max = if params.max_radius == 0 {
        diagonal
    } else {
        (params.max_radius as f32).min(diagonal)
    };
    if r_min > r_max {
        return Vec::new();
    }

    // -- Vote ----------------------------------------------------------------
    let dp = params.dp.max(1.0) as f32;
    let acc_w = ((w as f32 / dp).ceil() as usize).max(1);
    let acc_h = ((h as f32 / dp).ceil() as usize).max(1);
    let mut acc = vec![0u32; acc_w * acc_h];

    for p in &points {
        for sign in [-1.0f32, 1.0] {
            let mut last = usize::MAX;
            let mut r = r_min;
            while r <= r_max {
                let cx = p.x + sign * r * p.dx;
                let cy = p.y + sign * r * p.dy;
                if cx < 0.0 || cy < 0.0 || cx >= w as f32 || cy >= h as f32 {
                    break;
                }
                let idx = (cy / dp) as usize * acc_w + (cx / dp) as usize;
                // One vote per cell per ray.
                if idx != last {
                    acc[idx] += 1;
                    last = idx;
                }
                r += 1.0;
            }
        }
    }

    // -- Candidate centres ---------------------------------------------------
    let threshold = match params.method {
        HoughMethod::Gradient => params.param2.max(1.0) as u32,
        HoughMethod::GradientAlt => ALT_MIN_VOTES,
    };
    let mut candidates: Vec<(u32, usize, usize)> = Vec::new();
    for ay in 0..acc_h {
        for ax in 0..acc_w {
            let v = acc[ay * acc_w + ax];
            if v < threshold || !is_local_max(&acc, acc_w, acc_h, ax, ay) {
                continue;
            }
            candidates.push((v, ax, ay));
        }
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.2.cmp(&b.2)).then(a.1.cmp(&b.1)));
    candidates.truncate(MAX_CANDIDATES);

    // -- Radius per centre ---------------------------------------------------
    let min_dist2 = (params.min_dist * params.min_dist) as f32;
    let bins = r_max.ceil() as usize + 2;
    let mut found: Vec<Circle> = Vec::new();

    for (_, ax, ay) in candidates {
        let cx = (ax as f32 + 0.5) * dp;
        let cy = (ay as f32 + 0.5) * dp;
        if found
            .iter()
            .any(|c| (c.x - cx).powi(2) + (c.y - cy).powi(2) < min_dist2)
        {
            continue;
        }

        let mut hist = vec![0u32; bins];
        for p in &points {
            let d = ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt();
            if d >= r_min - 0.5 && d <= r_max + 0.5 {
                hist[d.round() as usize] += 1;
            }
        }

        // Best radius by support within a one-pixel band, normalised by circumference.
        let mut best: Option<(f32, f32)> = None;
        let lo = r_min.round() as usize;
        let hi = (r_max.round() as usize).min(bins - 2);
        for r in lo.max(1)..=hi {
            let support = hist[r - 1] + hist[r] + hist[r + 1];
            let coverage = support as f32 / (std::f32::consts::TAU * r as f32);
            if best.is_none_or(|(_, c)| coverage > c) {
                best = Some((r as f32, coverage));
            }
        }
        let Some((radius, coverage)) = best else {
            continue;
        };

        let accepted = match params.method {
            HoughMethod::Gradient => coverage > 0.0,
            HoughMethod::GradientAlt => coverage.min(1.0) >= params.param2 as f32,
        };
        if accepted {
            found.push(Circle { x: cx, y: cy, radius });
        }
    }

    found
}

fn is_local_max(acc: &[u32], w: usize, h: usize, x: usize, y: usize) -> bool {
    let v = acc[y * w + x];
    for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
        for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
            if (nx, ny) == (x, y) {
                continue;
            }
            let n = acc[ny * w + nx];
            // Ties resolve to the first cell in scan order.
            if n > v || (n == v && (ny, nx) < (y, x)) {
                return false;
            }
        }
    }
    true
}

/// Copy of `src` with every circle outlined, two pixels wide.
pub fn draw_circles(src: &Mat, circles: &[Circle]) -> Mat {
    let mut out = src.clone();
    for c in circles {
        let center = (c.x.round() as i32, c.y.round() as i32);
        let r = c.radius.round() as i32;
        draw_hollow_circle_mut(&mut out, center, r, CIRCLE_COLOR);
        draw_hollow_circle_mut(&mut out, center, r + 1, CIRCLE_COLOR);
    }
    out
}
