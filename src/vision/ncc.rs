//! Zero-mean normalized cross-correlation.
//!
//! Scores lie in `[-1, 1]`: 1 for an exact (affine brightness) match, around 0
//! for unrelated content. Window sums come from integral images so each template
//! costs one dot product per placement.

use image::GrayImage;

/// Below this variance a patch is treated as flat.
const FLAT_VARIANCE: f64 = 1e-6;

/// A template with its mean removed, ready for repeated matching.
#[derive(Clone, Debug)]
pub struct PreparedTemplate {
    width: u32,
    height: u32,
    centered: Vec<f64>,
    mean: f64,
    /// sqrt of the sum of squared centered values
    norm: f64,
}

impl PreparedTemplate {
    pub fn new(template: &GrayImage) -> Self {
        let (width, height) = template.dimensions();
        let n = (width as usize * height as usize).max(1) as f64;
        let mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
        let centered: Vec<f64> = template.pixels().map(|p| p[0] as f64 - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f64>().sqrt();
        Self {
            width,
            height,
            centered,
            mean,
            norm,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn is_flat(&self) -> bool {
        self.norm * self.norm < FLAT_VARIANCE
    }
}

/// Summed-area tables of a region and of its squared values.
pub struct IntegralImage<'a> {
    image: &'a GrayImage,
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl<'a> IntegralImage<'a> {
    pub fn new(image: &'a GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0.0; stride * (height as usize + 1)];
        let mut sum_sq = vec![0.0; stride * (height as usize + 1)];

        for y in 0..height as usize {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..width as usize {
                let v = image.get_pixel(x as u32, y as u32)[0] as f64;
                row += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                sum[idx] = sum[idx - stride] + row;
                sum_sq[idx] = sum_sq[idx - stride] + row_sq;
            }
        }

        Self {
            image,
            stride,
            sum,
            sum_sq,
        }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let a = y * s + x;
        let b = y * s + x + w;
        let c = (y + h) * s + x;
        let d = (y + h) * s + x + w;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
        )
    }

    /// Best score of `template` over every placement inside the region.
    ///
    /// Returns `None` when the template does not fit.
    pub fn best_match(&self, template: &PreparedTemplate) -> Option<f32> {
        let (width, height) = self.image.dimensions();
        if template.width > width || template.height > height {
            return None;
        }

        let tw = template.width as usize;
        let th = template.height as usize;
        let n = (tw * th).max(1) as f64;
        let mut best = f64::NEG_INFINITY;

        for y in 0..=(height as usize - th) {
            for x in 0..=(width as usize - tw) {
                let (sum, sum_sq) = self.window(x, y, tw, th);
                let var = (sum_sq - sum * sum / n).max(0.0);

                let score = if template.is_flat() || var < FLAT_VARIANCE {
                    flat_score(template, var, sum / n)
                } else {
                    let mut dot = 0.0;
                    for ty in 0..th {
                        let base = ty * tw;
                        for tx in 0..tw {
                            let v = self.image.get_pixel((x + tx) as u32, (y + ty) as u32)[0] as f64;
                            dot += template.centered[base + tx] * v;
                        }
                    }
                    dot / (template.norm * var.sqrt())
                };

                if score > best {
                    best = score;
                }
            }
        }

        Some(best.clamp(-1.0, 1.0) as f32)
    }
}

/// Correlation is undefined when either side has no variance. Two flat patches of
/// the same brightness count as identical, anything else as unrelated.
fn flat_score(template: &PreparedTemplate, window_var: f64, window_mean: f64) -> f64 {
    if template.is_flat() && window_var < FLAT_VARIANCE && (template.mean - window_mean).abs() <= 1.0 {
        1.0
    } else {
        0.0
    }
}

/// Similarity of two images of the same size (or `b` fitting inside `a`).
pub fn similarity(a: &GrayImage, b: &GrayImage) -> Option<f32> {
    IntegralImage::new(a).best_match(&PreparedTemplate::new(b))
}
