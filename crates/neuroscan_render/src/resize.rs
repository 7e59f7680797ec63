//! Bilinear upsampling of attribution maps.

use ndarray::Array2;

/// Resize a 2-D map to the given output resolution with bilinear
/// interpolation.
///
/// Used to lift layer-resolution Grad-CAM maps (e.g. 28×28) up to the
/// input resolution before overlay.
#[must_use]
pub fn bilinear_resize(map: &Array2<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = map.dim();
    if in_h == 0 || in_w == 0 || out_h == 0 || out_w == 0 {
        return Array2::zeros((out_h, out_w));
    }
    if in_h == out_h && in_w == out_w {
        return map.clone();
    }

    let mut out = Array2::<f32>::zeros((out_h, out_w));
    let scale_y = in_h as f32 / out_h as f32;
    let scale_x = in_w as f32 / out_w as f32;

    for oy in 0..out_h {
        // Sample at pixel centers so edges are not over-weighted.
        let sy = ((oy as f32 + 0.5) * scale_y - 0.5).max(0.0);
        let y0 = (sy.floor() as usize).min(in_h - 1);
        let y1 = (y0 + 1).min(in_h - 1);
        let fy = sy - y0 as f32;

        for ox in 0..out_w {
            let sx = ((ox as f32 + 0.5) * scale_x - 0.5).max(0.0);
            let x0 = (sx.floor() as usize).min(in_w - 1);
            let x1 = (x0 + 1).min(in_w - 1);
            let fx = sx - x0 as f32;

            let top = map[[y0, x0]] * (1.0 - fx) + map[[y0, x1]] * fx;
            let bottom = map[[y1, x0]] * (1.0 - fx) + map[[y1, x1]] * fx;
            out[[oy, ox]] = top * (1.0 - fy) + bottom * fy;
        }
    }

    out
}
