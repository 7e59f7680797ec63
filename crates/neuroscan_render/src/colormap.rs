//! Value-to-color mappings for heatmap rendering.

use serde::{Deserialize, Serialize};

/// Which colormap a render uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Colormap {
    /// Sequential black → red → yellow → white, for non-negative maps.
    Hot,
    /// Diverging blue → white → red, for signed maps.
    Diverging,
}

/// Map a `[0, 1]` intensity through the "hot" sequential colormap.
///
/// Piecewise-linear: black → red over the first third, red → yellow over
/// the second, yellow → white over the last.
#[must_use]
pub fn hot_rgb(v: f32) -> [u8; 3] {
    let v = v.clamp(0.0, 1.0);
    let r = (v * 3.0).min(1.0);
    let g = (v * 3.0 - 1.0).clamp(0.0, 1.0);
    let b = (v * 3.0 - 2.0).clamp(0.0, 1.0);
    [
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    ]
}

/// Map a `[-1, 1]` signed value through a diverging colormap.
///
/// Negative values shade toward blue, positive toward red, zero is white,
/// so positive and negative contributions stay visually distinct.
#[must_use]
pub fn diverging_rgb(v: f32) -> [u8; 3] {
    let v = v.clamp(-1.0, 1.0);
    if v >= 0.0 {
        let t = v;
        [
            255,
            ((1.0 - t) * 255.0).round() as u8,
            ((1.0 - t) * 255.0).round() as u8,
        ]
    } else {
        let t = -v;
        [
            ((1.0 - t) * 255.0).round() as u8,
            ((1.0 - t) * 255.0).round() as u8,
            255,
        ]
    }
}
