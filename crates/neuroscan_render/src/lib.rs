//! # neuroscan_render
//!
//! Attribution normalization and visualization for neuroscan-rs.
//!
//! Turns raw, method-specific attribution arrays into uniform renderable
//! heatmap overlays:
//! - sequential ("hot") rendering with absolute-value scaling for
//!   CAM-style non-negative maps
//! - channel reduction (mean of absolute values) for per-channel maps
//! - diverging rendering for signed surrogate masks, annotated with the
//!   observed maximum magnitude
//! - graceful "explanation unavailable" placeholder rendering when the
//!   upstream method produced no map

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod colormap;
mod overlay;
mod resize;

pub use colormap::{diverging_rgb, hot_rgb, Colormap};
pub use overlay::{
    reduce_channels, render_diverging_overlay, render_heatmap_overlay, render_placeholder,
    ColorScale, OverlayConfig, RenderError, RenderedMap, Result,
};
pub use resize::bilinear_resize;
