//! Shared input types.
//!
//! [`BrowserData`] is what an auditing tool already knows about how the image
//! is used on a page. It is read-only for the whole run.

use serde::{Deserialize, Serialize};

/// Display context extracted from the page by the caller.
///
/// Every field is optional. Modules that need a missing field simply don't
/// apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrowserData {
    /// Rendered width of the `<img>` element in CSS pixels.
    pub display_width: Option<u32>,
    pub display_height: Option<u32>,
    pub viewport_width: Option<u32>,
    pub viewport_height: Option<u32>,
    /// Device pixels per CSS pixel. Missing or non-positive means 1.
    pub device_pixel_ratio: Option<f64>,
    /// Raw `sizes` attribute.
    pub sizes_attribute: Option<String>,
    /// Raw `srcset` attribute.
    pub srcset_attribute: Option<String>,
}

impl BrowserData {
    /// Rendered size, when both dimensions are known and non-zero.
    pub fn display_size(&self) -> Option<(u32, u32)> {
        match (self.display_width, self.display_height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        match (self.viewport_width, self.viewport_height) {
            (Some(w), Some(h)) if w > 0 => Some((w, h)),
            _ => None,
        }
    }

    pub fn dpr(&self) -> f64 {
        self.device_pixel_ratio
            .filter(|ratio| ratio.is_finite() && *ratio > 0.0)
            .unwrap_or(1.0)
    }

    /// True when any field the display-stats module reports is present.
    pub fn has_display_context(&self) -> bool {
        self.display_size().is_some()
            || self.sizes_attribute.is_some()
            || self.srcset_attribute.is_some()
    }
}
