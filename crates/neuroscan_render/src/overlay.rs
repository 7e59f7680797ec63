//! Heatmap overlay composition.

use image::{Rgb, RgbImage};
use ndarray::{Array2, Array3};
use thiserror::Error;

use crate::colormap::{diverging_rgb, hot_rgb, Colormap};
use crate::resize::bilinear_resize;

const EPS: f32 = 1e-8;

/// Result type alias using [`RenderError`].
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while rendering attribution overlays.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Array shapes do not line up.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Image encoding or I/O failed.
    #[error("Image error: {0}")]
    Image(String),
}

/// Rendering parameters shared by all overlay styles.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Heatmap opacity over the original image, in `[0, 1]`.
    pub alpha: f32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self { alpha: 0.55 }
    }
}

/// Color-scale annotation attached to a render.
///
/// `max_magnitude` is the largest absolute attribution value actually
/// observed in the map, i.e. the value the most saturated color stands
/// for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    /// The colormap used.
    pub colormap: Colormap,
    /// Attribution magnitude mapped to full saturation.
    pub max_magnitude: f32,
}

/// A rendered explanation artifact.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    /// The composed RGB image.
    pub image: RgbImage,
    /// Color-scale annotation; absent for placeholder renders.
    pub scale: Option<ColorScale>,
    /// Human-readable caption (set for placeholder renders).
    pub caption: Option<String>,
    /// True when this render is the "explanation unavailable" fallback.
    pub placeholder: bool,
}

impl RenderedMap {
    /// Save the rendered image to a file, format inferred from the
    /// extension.
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.image
            .save(path.as_ref())
            .map_err(|e| RenderError::Image(e.to_string()))
    }
}

/// Reduce a per-channel `(C, H, W)` attribution to a single `(H, W)` map
/// by averaging absolute values across channels.
#[must_use]
pub fn reduce_channels(map: &Array3<f32>) -> Array2<f32> {
    let (c, h, w) = map.dim();
    let mut out = Array2::<f32>::zeros((h, w));
    if c == 0 {
        return out;
    }
    for plane in map.outer_iter() {
        out += &plane.mapv(f32::abs);
    }
    out.mapv_inplace(|v| v / c as f32);
    out
}

fn chw_to_rgb(pixels: &Array3<f32>) -> Result<RgbImage> {
    let (c, h, w) = pixels.dim();
    if c != 3 {
        return Err(RenderError::ShapeMismatch(format!(
            "expected 3 channels, got {c}"
        )));
    }
    let mut img = RgbImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let r = (pixels[[0, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8;
            let g = (pixels[[1, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8;
            let b = (pixels[[2, y, x]].clamp(0.0, 1.0) * 255.0).round() as u8;
            img.put_pixel(x as u32, y as u32, Rgb([r, g, b]));
        }
    }
    Ok(img)
}

fn blend(base: Rgb<u8>, heat: [u8; 3], alpha: f32) -> Rgb<u8> {
    let a = alpha.clamp(0.0, 1.0);
    let Rgb([br, bg, bb]) = base;
    Rgb([
        (a * heat[0] as f32 + (1.0 - a) * br as f32).round() as u8,
        (a * heat[1] as f32 + (1.0 - a) * bg as f32).round() as u8,
        (a * heat[2] as f32 + (1.0 - a) * bb as f32).round() as u8,
    ])
}

/// Render a non-negative single-channel map as a "hot" heatmap over the
/// original image.
///
/// Values are scaled by the map's own maximum absolute value with an
/// epsilon-guarded denominator, so an all-zero map renders as the plain
/// image rather than dividing by zero. Maps below the image resolution
/// are bilinearly upsampled first.
pub fn render_heatmap_overlay(
    map: &Array2<f32>,
    original: &Array3<f32>,
    config: &OverlayConfig,
) -> Result<RenderedMap> {
    let (_, h, w) = original.dim();
    let base = chw_to_rgb(original)?;

    let abs = map.mapv(f32::abs);
    let max_magnitude = abs.iter().copied().fold(0.0f32, f32::max);
    let normalized = abs.mapv(|v| v / (max_magnitude + EPS));
    let full = if normalized.dim() == (h, w) {
        normalized
    } else {
        bilinear_resize(&normalized, h, w)
    };

    let mut image = base;
    for y in 0..h {
        for x in 0..w {
            let heat = hot_rgb(full[[y, x]]);
            let px = *image.get_pixel(x as u32, y as u32);
            image.put_pixel(x as u32, y as u32, blend(px, heat, config.alpha));
        }
    }

    Ok(RenderedMap {
        image,
        scale: Some(ColorScale {
            colormap: Colormap::Hot,
            max_magnitude,
        }),
        caption: None,
        placeholder: false,
    })
}

/// Render a signed surrogate mask with a diverging colormap, painting
/// only the selected segments.
///
/// The color scale is annotated with the maximum absolute weight actually
/// observed, so the saturated ends of the scale are meaningful.
pub fn render_diverging_overlay(
    weights: &Array2<f32>,
    selection: &Array2<bool>,
    original: &Array3<f32>,
    config: &OverlayConfig,
) -> Result<RenderedMap> {
    let (_, h, w) = original.dim();
    if weights.dim() != (h, w) || selection.dim() != (h, w) {
        return Err(RenderError::ShapeMismatch(format!(
            "mask {:?} / selection {:?} vs image ({h}, {w})",
            weights.dim(),
            selection.dim()
        )));
    }

    let max_magnitude = weights.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    let mut image = chw_to_rgb(original)?;

    for y in 0..h {
        for x in 0..w {
            if !selection[[y, x]] {
                continue;
            }
            let v = weights[[y, x]] / (max_magnitude + EPS);
            let heat = diverging_rgb(v);
            let px = *image.get_pixel(x as u32, y as u32);
            image.put_pixel(x as u32, y as u32, blend(px, heat, config.alpha));
        }
    }

    Ok(RenderedMap {
        image,
        scale: Some(ColorScale {
            colormap: Colormap::Diverging,
            max_magnitude,
        }),
        caption: None,
        placeholder: false,
    })
}

/// Render the "explanation unavailable" placeholder: the original image
/// with an explanatory caption and no color scale.
pub fn render_placeholder(original: &Array3<f32>, caption: &str) -> Result<RenderedMap> {
    let image = chw_to_rgb(original)?;
    Ok(RenderedMap {
        image,
        scale: None,
        caption: Some(caption.to_string()),
        placeholder: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_image(h: usize, w: usize) -> Array3<f32> {
        Array3::from_elem((3, h, w), 0.5)
    }

    #[test]
    fn test_reduce_channels_mean_abs() {
        let mut map = Array3::<f32>::zeros((3, 2, 2));
        map[[0, 0, 0]] = 3.0;
        map[[1, 0, 0]] = -3.0;
        map[[2, 0, 0]] = 3.0;

        let reduced = reduce_channels(&map);
        assert_eq!(reduced.dim(), (2, 2));
        assert!((reduced[[0, 0]] - 3.0).abs() < 1e-6);
        assert!(reduced[[1, 1]].abs() < 1e-6);
    }

    #[test]
    fn test_heatmap_overlay_annotates_max() {
        let mut map = Array2::<f32>::zeros((4, 4));
        map[[2, 2]] = 7.5;

        let rendered = render_heatmap_overlay(&map, &gray_image(4, 4), &OverlayConfig::default())
            .unwrap();
        let scale = rendered.scale.unwrap();
        assert_eq!(scale.colormap, Colormap::Hot);
        assert!((scale.max_magnitude - 7.5).abs() < 1e-6);
        assert!(!rendered.placeholder);
    }

    #[test]
    fn test_heatmap_overlay_zero_map_does_not_crash() {
        let map = Array2::<f32>::zeros((4, 4));
        let rendered = render_heatmap_overlay(&map, &gray_image(4, 4), &OverlayConfig::default())
            .unwrap();
        // Epsilon-guarded denominator: all-zero map renders fine.
        assert!((rendered.scale.unwrap().max_magnitude).abs() < 1e-6);
    }

    #[test]
    fn test_heatmap_overlay_upsamples_low_res() {
        let map = Array2::<f32>::from_elem((2, 2), 1.0);
        let rendered = render_heatmap_overlay(&map, &gray_image(8, 8), &OverlayConfig::default())
            .unwrap();
        assert_eq!(rendered.image.dimensions(), (8, 8));
    }

    #[test]
    fn test_diverging_overlay_paints_only_selection() {
        let mut weights = Array2::<f32>::zeros((4, 4));
        weights[[0, 0]] = 1.0;
        weights[[3, 3]] = -1.0;
        let mut selection = Array2::from_elem((4, 4), false);
        selection[[0, 0]] = true;

        let original = gray_image(4, 4);
        let rendered =
            render_diverging_overlay(&weights, &selection, &original, &OverlayConfig::default())
                .unwrap();

        let untouched = rendered.image.get_pixel(3, 3);
        let painted = rendered.image.get_pixel(0, 0);
        assert_eq!(untouched, &Rgb([128, 128, 128]));
        assert_ne!(painted, &Rgb([128, 128, 128]));
    }

    #[test]
    fn test_diverging_overlay_shape_mismatch() {
        let weights = Array2::<f32>::zeros((2, 2));
        let selection = Array2::from_elem((2, 2), true);
        let original = gray_image(4, 4);
        assert!(render_diverging_overlay(
            &weights,
            &selection,
            &original,
            &OverlayConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_placeholder_keeps_original() {
        let rendered = render_placeholder(&gray_image(4, 4), "explanation unavailable").unwrap();
        assert!(rendered.placeholder);
        assert!(rendered.scale.is_none());
        assert_eq!(
            rendered.caption.as_deref(),
            Some("explanation unavailable")
        );
        assert_eq!(rendered.image.get_pixel(0, 0), &Rgb([128, 128, 128]));
    }
}
