//! Superpixel segmentation for perturbation-based explainers.
//!
//! A simplified SLIC: cluster centers seeded on a regular grid, then a
//! few assignment/update iterations in joint color-position space. Each
//! resulting segment is treated as one feature unit by the Shapley
//! partition estimator and the surrogate explainer.

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Configuration for SLIC superpixel segmentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlicConfig {
    /// Target number of superpixels.
    pub n_segments: usize,
    /// Compactness: higher values weight spatial proximity over color
    /// similarity, producing squarer segments.
    pub compactness: f32,
    /// Number of assignment/update iterations.
    pub n_iters: usize,
}

impl Default for SlicConfig {
    fn default() -> Self {
        Self {
            n_segments: 50,
            compactness: 10.0,
            n_iters: 10,
        }
    }
}

/// A segmentation of an image into superpixels.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Per-pixel segment label, values in `[0, n_segments)`.
    pub labels: Array2<u32>,
    /// Number of distinct segments actually produced.
    pub n_segments: usize,
}

impl Segmentation {
    /// Broadcast per-segment values back to pixel resolution.
    #[must_use]
    pub fn broadcast(&self, values: &[f32]) -> Array2<f32> {
        self.labels
            .mapv(|l| values.get(l as usize).copied().unwrap_or(0.0))
    }

    /// Pixel mask for a set of segment ids.
    #[must_use]
    pub fn mask_of(&self, segments: &[usize]) -> Array2<bool> {
        self.labels.mapv(|l| segments.contains(&(l as usize)))
    }

    /// Compose a perturbed image: active segments keep the original
    /// pixels, hidden segments show the baseline.
    #[must_use]
    pub fn apply_mask(
        &self,
        pixels: &Array3<f32>,
        baseline: &Array3<f32>,
        active: &[bool],
    ) -> Array3<f32> {
        let (c, h, w) = pixels.dim();
        let mut out = baseline.clone();
        for y in 0..h {
            for x in 0..w {
                if active
                    .get(self.labels[[y, x]] as usize)
                    .copied()
                    .unwrap_or(false)
                {
                    for ch in 0..c {
                        out[[ch, y, x]] = pixels[[ch, y, x]];
                    }
                }
            }
        }
        out
    }
}

#[derive(Clone, Copy)]
struct Center {
    y: f32,
    x: f32,
    rgb: [f32; 3],
}

/// Segment a `(3, H, W)` pixel-space image into superpixels.
///
/// The image is expected in `[0, 1]` RGB (i.e. denormalized); the
/// distance metric mixes squared color distance with squared spatial
/// distance scaled by `compactness / step`.
#[must_use]
pub fn slic(pixels: &Array3<f32>, config: &SlicConfig) -> Segmentation {
    let (_, h, w) = pixels.dim();
    let k = config.n_segments.max(1);

    // Grid step so that roughly k cells tile the image.
    let step = (((h * w) as f32 / k as f32).sqrt().round() as usize).max(1);

    let mut centers: Vec<Center> = Vec::new();
    let mut y = step / 2;
    while y < h {
        let mut x = step / 2;
        while x < w {
            centers.push(Center {
                y: y as f32,
                x: x as f32,
                rgb: pixel_rgb(pixels, y, x),
            });
            x += step;
        }
        y += step;
    }
    if centers.is_empty() {
        centers.push(Center {
            y: (h / 2) as f32,
            x: (w / 2) as f32,
            rgb: pixel_rgb(pixels, h / 2, w / 2),
        });
    }

    // Seed labels by nearest grid cell so every pixel starts assigned.
    let cols = ((w + step - 1) / step).max(1);
    let rows = (centers.len() / cols).max(1);
    let mut labels = Array2::<u32>::zeros((h, w));
    for yy in 0..h {
        for xx in 0..w {
            let cy = (yy / step).min(rows - 1);
            let cx = (xx / step).min(cols - 1);
            let idx = (cy * cols + cx).min(centers.len() - 1);
            labels[[yy, xx]] = idx as u32;
        }
    }

    let spatial_scale = (config.compactness / step as f32).powi(2);
    let mut distances = Array2::<f32>::from_elem((h, w), f32::INFINITY);

    for _ in 0..config.n_iters {
        distances.fill(f32::INFINITY);

        for (idx, center) in centers.iter().enumerate() {
            let y_lo = (center.y as isize - 2 * step as isize).max(0) as usize;
            let y_hi = ((center.y as usize) + 2 * step).min(h);
            let x_lo = (center.x as isize - 2 * step as isize).max(0) as usize;
            let x_hi = ((center.x as usize) + 2 * step).min(w);

            for yy in y_lo..y_hi {
                for xx in x_lo..x_hi {
                    let rgb = pixel_rgb(pixels, yy, xx);
                    let dc = (rgb[0] - center.rgb[0]).powi(2)
                        + (rgb[1] - center.rgb[1]).powi(2)
                        + (rgb[2] - center.rgb[2]).powi(2);
                    let ds = (yy as f32 - center.y).powi(2) + (xx as f32 - center.x).powi(2);
                    let d = dc + spatial_scale * ds;
                    if d < distances[[yy, xx]] {
                        distances[[yy, xx]] = d;
                        labels[[yy, xx]] = idx as u32;
                    }
                }
            }
        }

        // Update centers to the mean of their assigned pixels.
        let mut sums = vec![(0.0f32, 0.0f32, [0.0f32; 3], 0usize); centers.len()];
        for yy in 0..h {
            for xx in 0..w {
                let idx = labels[[yy, xx]] as usize;
                let rgb = pixel_rgb(pixels, yy, xx);
                let entry = &mut sums[idx];
                entry.0 += yy as f32;
                entry.1 += xx as f32;
                entry.2[0] += rgb[0];
                entry.2[1] += rgb[1];
                entry.2[2] += rgb[2];
                entry.3 += 1;
            }
        }
        for (center, (sy, sx, srgb, count)) in centers.iter_mut().zip(sums) {
            if count > 0 {
                let n = count as f32;
                center.y = sy / n;
                center.x = sx / n;
                center.rgb = [srgb[0] / n, srgb[1] / n, srgb[2] / n];
            }
        }
    }

    compact_labels(labels)
}

fn pixel_rgb(pixels: &Array3<f32>, y: usize, x: usize) -> [f32; 3] {
    [
        pixels[[0, y, x]],
        pixels[[1, y, x]],
        pixels[[2, y, x]],
    ]
}

/// Relabel so segment ids are contiguous starting at zero.
fn compact_labels(labels: Array2<u32>) -> Segmentation {
    let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
    let mut remap = vec![u32::MAX; max_label + 1];
    let mut next = 0u32;
    for &l in labels.iter() {
        let slot = &mut remap[l as usize];
        if *slot == u32::MAX {
            *slot = next;
            next += 1;
        }
    }
    let labels = labels.mapv(|l| remap[l as usize]);
    Segmentation {
        labels,
        n_segments: next as usize,
    }
}
