// ============================================================================
// MORPHOLOGY - structuring elements, erode / dilate and the compound ops
// ============================================================================

use image::Rgb;
use rayon::prelude::*;

use super::Mat;
use crate::actions::{MorphOp, MorphShape};

/// Binary kernel with an anchor point, laid out row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuringElement {
    shape: MorphShape,
    size: u32,
    anchor: u32,
    cells: Vec<bool>,
}

impl StructuringElement {
    /// Square element of side `2 * anchor + 1` with the anchor at its centre.
    ///
    /// Row coverage follows `cv::getStructuringElement`: the cross is the
    /// anchor row plus the anchor column, the ellipse is inscribed in the
    /// square with half-widths rounded per row.
    pub fn new(shape: MorphShape, anchor: u32) -> Self {
        let size = 2 * anchor + 1;
        let n = size as usize;
        let mut cells = vec![false; n * n];
        let r = anchor as f64;
        let inv_r2 = if anchor > 0 { 1.0 / (r * r) } else { 0.0 };

        for i in 0..size {
            let (j1, j2) = match shape {
                MorphShape::Rect => (0, size),
                MorphShape::Cross if i == anchor => (0, size),
                MorphShape::Cross => (anchor, anchor + 1),
                MorphShape::Ellipse => {
                    let dy = i as f64 - r;
                    let dx = (r * ((r * r - dy * dy) * inv_r2).max(0.0).sqrt()).round() as u32;
                    (anchor.saturating_sub(dx), (anchor + dx + 1).min(size))
                }
            };
            let row = i as usize * n;
            for j in j1..j2 {
                cells[row + j as usize] = true;
            }
        }

        Self {
            shape,
            size,
            anchor,
            cells,
        }
    }

    pub fn shape(&self) -> MorphShape {
        self.shape
    }

    /// Side length of the (square) element.
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn anchor(&self) -> (u32, u32) {
        (self.anchor, self.anchor)
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.size && y < self.size && self.cells[(y * self.size + x) as usize]
    }

    /// Offsets of the set cells relative to the anchor.
    pub fn offsets(&self) -> Vec<(i64, i64)> {
        let a = self.anchor as i64;
        (0..self.size)
            .flat_map(|y| (0..self.size).map(move |x| (x, y)))
            .filter(|&(x, y)| self.contains(x, y))
            .map(|(x, y)| (x as i64 - a, y as i64 - a))
            .collect()
    }

    /// Number of set cells.
    pub fn area(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}

#[derive(Clone, Copy)]
enum Extremum {
    Min,
    Max,
}

impl Extremum {
    fn identity(self) -> u8 {
        match self {
            Extremum::Min => u8::MAX,
            Extremum::Max => u8::MIN,
        }
    }

    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            Extremum::Min => a.min(b),
            Extremum::Max => a.max(b),
        }
    }
}

pub fn erode(src: &Mat, element: &StructuringElement) -> Mat {
    rank_filter(src, element, Extremum::Min)
}

pub fn dilate(src: &Mat, element: &StructuringElement) -> Mat {
    rank_filter(src, element, Extremum::Max)
}

/// Apply one morphological operation; the source is left untouched.
pub fn morphology_ex(src: &Mat, op: MorphOp, element: &StructuringElement) -> Mat {
    match op {
        MorphOp::Erode => erode(src, element),
        MorphOp::Dilate => dilate(src, element),
        MorphOp::Open => dilate(&erode(src, element), element),
        MorphOp::Close => erode(&dilate(src, element), element),
        MorphOp::Gradient => {
            let dilated = dilate(src, element);
            let eroded = erode(src, element);
            let mut out = dilated;
            for (o, e) in out.pixels_mut().zip(eroded.pixels()) {
                for c in 0..3 {
                    o.0[c] = o.0[c].saturating_sub(e.0[c]);
                }
            }
            out
        }
    }
}

/// Pixels outside the image never win, matching OpenCV's default morphology border.
fn rank_filter(src: &Mat, element: &StructuringElement, ext: Extremum) -> Mat {
    if element.size() == 1 || src.width() == 0 || src.height() == 0 {
        return src.clone();
    }
    match element.shape() {
        // Rectangles are separable: a row pass then a column pass.
        MorphShape::Rect => separable_pass(&separable_pass(src, element.anchor, ext, true), element.anchor, ext, false),
        _ => general_pass(src, element, ext),
    }
}

fn separable_pass(src: &Mat, radius: u32, ext: Extremum, horizontal: bool) -> Mat {
    let (w, h) = src.dimensions();
    let r = radius as i64;
    let stride = w as usize * 3;
    let raw = src.as_raw();
    let mut out = vec![0u8; raw.len()];

    out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..w as i64 {
            let mut acc = [ext.identity(); 3];
            for k in -r..=r {
                let (sx, sy) = if horizontal { (x + k, y as i64) } else { (x, y as i64 + k) };
                if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                    continue;
                }
                let off = sy as usize * stride + sx as usize * 3;
                for c in 0..3 {
                    acc[c] = ext.pick(acc[c], raw[off + c]);
                }
            }
            row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&acc);
        }
    });

    Mat::from_raw(w, h, out).unwrap_or_else(|| src.clone())
}

fn general_pass(src: &Mat, element: &StructuringElement, ext: Extremum) -> Mat {
    let (w, h) = src.dimensions();
    let offsets = element.offsets();
    let mut out = Mat::new(w, h);
    let stride = w as usize * 3;

    let buf: &mut [u8] = &mut out;
    buf.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..w as i64 {
            let mut acc = [ext.identity(); 3];
            for &(dx, dy) in &offsets {
                let sx = x + dx;
                let sy = y as i64 + dy;
                if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                    continue;
                }
                let Rgb(px) = *src.get_pixel(sx as u32, sy as u32);
                for c in 0..3 {
                    acc[c] = ext.pick(acc[c], px[c]);
                }
            }
            row[x as usize * 3..x as usize * 3 + 3].copy_from_slice(&acc);
        }
    });
    out
}
